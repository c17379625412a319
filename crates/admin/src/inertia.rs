//! Server side of the page-visit protocol spoken by the browser UI.
//!
//! The first visit gets the HTML shell with the page object embedded in
//! `data-page`. Every later visit is an XHR carrying `X-Inertia: true` and
//! gets the page object as JSON:
//!
//! ```text
//! { "component": "Leads/Index", "props": {...}, "url": "/leads?page=2", "version": "0.1.0" }
//! ```
//!
//! Handlers extract [`Inertia`] and call [`Inertia::render`]. Mutations use
//! [`Redirector`] to flash a message or field errors and send the browser
//! back with `303 See Other`.

use askama::Template;
use axum::{
    Json,
    extract::{FromRequestParts, Request, State},
    http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, header, request::Parts},
    middleware::Next,
    response::{Html, IntoResponse, Redirect, Response},
};
use serde::Serialize;
use serde_json::{Map, Value};
use tower_sessions::Session;

use crate::error::AppError;
use crate::middleware::StaffContext;
use crate::models::{Flash, session_keys};
use crate::state::AppState;
use crate::validation::FieldErrors;

pub const X_INERTIA: HeaderName = HeaderName::from_static("x-inertia");
pub const X_INERTIA_VERSION: HeaderName = HeaderName::from_static("x-inertia-version");
pub const X_INERTIA_LOCATION: HeaderName = HeaderName::from_static("x-inertia-location");
pub const X_INERTIA_PARTIAL_COMPONENT: HeaderName =
    HeaderName::from_static("x-inertia-partial-component");
pub const X_INERTIA_PARTIAL_DATA: HeaderName = HeaderName::from_static("x-inertia-partial-data");

/// Props that survive every partial reload.
const ALWAYS_PROPS: &[&str] = &["errors"];

// =============================================================================
// Request
// =============================================================================

/// What the browser asked for, read from the protocol headers.
#[derive(Debug, Clone, Default)]
pub struct PageRequest {
    /// `X-Inertia: true` was sent.
    pub inertia: bool,
    /// Path and query of the visit.
    pub url: String,
    partial_component: Option<String>,
    partial_data: Vec<String>,
}

impl PageRequest {
    #[must_use]
    pub fn from_parts(parts: &Parts) -> Self {
        let headers = &parts.headers;
        let inertia = is_inertia(headers);
        let partial_component = header_str(headers, &X_INERTIA_PARTIAL_COMPONENT).map(str::to_owned);
        let partial_data = header_str(headers, &X_INERTIA_PARTIAL_DATA)
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|name| !name.is_empty())
                    .map(str::to_owned)
                    .collect()
            })
            .unwrap_or_default();

        Self {
            inertia,
            url: parts
                .uri
                .path_and_query()
                .map_or_else(|| parts.uri.path().to_owned(), ToString::to_string),
            partial_component,
            partial_data,
        }
    }

    /// Prop names to keep when this is a partial reload of `component`.
    fn partial_for(&self, component: &str) -> Option<&[String]> {
        (self.inertia
            && self.partial_component.as_deref() == Some(component)
            && !self.partial_data.is_empty())
        .then_some(self.partial_data.as_slice())
    }
}

impl<S> FromRequestParts<S> for PageRequest
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::from_parts(parts))
    }
}

fn is_inertia(headers: &HeaderMap) -> bool {
    header_str(headers, &X_INERTIA).is_some_and(|v| v.eq_ignore_ascii_case("true"))
}

fn header_str<'h>(headers: &'h HeaderMap, name: &HeaderName) -> Option<&'h str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

// =============================================================================
// Shared props
// =============================================================================

/// The signed-in staff member as every page sees them.
#[derive(Debug, Clone, Serialize)]
pub struct AuthUser {
    pub id: i32,
    pub name: String,
    pub email: String,
    pub permissions: Vec<String>,
}

impl From<&StaffContext> for AuthUser {
    fn from(context: &StaffContext) -> Self {
        Self {
            id: context.staff.id.as_i32(),
            name: context.staff.name.clone(),
            email: context.staff.email.as_str().to_owned(),
            permissions: context.permissions.names(),
        }
    }
}

/// Props merged into every page.
#[derive(Debug, Clone, Default)]
pub struct SharedProps {
    pub user: Option<AuthUser>,
    pub flash: Flash,
    pub errors: FieldErrors,
}

impl SharedProps {
    fn into_map(self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert(
            "auth".to_owned(),
            serde_json::json!({ "user": self.user }),
        );
        map.insert(
            "flash".to_owned(),
            serde_json::to_value(self.flash).unwrap_or_default(),
        );
        map.insert(
            "errors".to_owned(),
            serde_json::to_value(self.errors).unwrap_or_default(),
        );
        map
    }
}

// =============================================================================
// Responses
// =============================================================================

/// The JSON page object.
#[derive(Debug, Clone, Serialize)]
pub struct PageObject {
    pub component: String,
    pub props: Value,
    pub url: String,
    pub version: String,
}

/// HTML shell for first visits.
#[derive(Template)]
#[template(path = "app.html")]
struct AppShell<'a> {
    page: &'a str,
    version: &'a str,
}

/// Page renderer for one request.
#[derive(Debug, Clone)]
pub struct Inertia {
    request: PageRequest,
    version: String,
    shared: SharedProps,
}

impl Inertia {
    #[must_use]
    pub fn new(request: PageRequest, version: impl Into<String>) -> Self {
        Self {
            request,
            version: version.into(),
            shared: SharedProps::default(),
        }
    }

    #[must_use]
    pub fn with_shared(mut self, shared: SharedProps) -> Self {
        self.shared = shared;
        self
    }

    /// Build the page object: shared props first, then `props` on top,
    /// filtered for partial reloads.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Internal` if `props` does not serialize to an object.
    pub fn page(self, component: &str, props: impl Serialize) -> Result<PageObject, AppError> {
        let Value::Object(own) = serde_json::to_value(props)
            .map_err(|e| AppError::Internal(format!("page props: {e}")))?
        else {
            return Err(AppError::Internal(format!(
                "props for {component} must be an object"
            )));
        };

        let mut merged = self.shared.into_map();
        merged.extend(own);

        if let Some(only) = self.request.partial_for(component) {
            merged.retain(|key, _| {
                only.iter().any(|name| name == key) || ALWAYS_PROPS.contains(&key.as_str())
            });
        }

        Ok(PageObject {
            component: component.to_owned(),
            props: Value::Object(merged),
            url: self.request.url,
            version: self.version,
        })
    }

    /// Respond with the page: JSON for protocol visits, the HTML shell
    /// otherwise.
    pub fn render(self, component: &str, props: impl Serialize) -> Response {
        let inertia = self.request.inertia;
        let page = match self.page(component, props) {
            Ok(page) => page,
            Err(e) => return e.into_response(),
        };

        if inertia {
            let mut response = Json(page).into_response();
            let headers = response.headers_mut();
            headers.insert(X_INERTIA, HeaderValue::from_static("true"));
            headers.insert(header::VARY, HeaderValue::from_static("X-Inertia"));
            return response;
        }

        let json = match serde_json::to_string(&page) {
            Ok(json) => json,
            Err(e) => return AppError::Internal(format!("page object: {e}")).into_response(),
        };
        let shell = AppShell {
            page: &json,
            version: &page.version,
        };
        match shell.render() {
            Ok(html) => {
                let mut response = Html(html).into_response();
                response
                    .headers_mut()
                    .insert(header::VARY, HeaderValue::from_static("X-Inertia"));
                response
            }
            Err(e) => AppError::Internal(format!("app shell: {e}")).into_response(),
        }
    }
}

impl FromRequestParts<AppState> for Inertia {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let request = PageRequest::from_parts(parts);
        let user = parts.extensions.get::<StaffContext>().map(AuthUser::from);

        let (flash, errors) = match parts.extensions.get::<Session>().cloned() {
            Some(session) => (
                session
                    .remove::<Flash>(session_keys::FLASH)
                    .await
                    .ok()
                    .flatten()
                    .unwrap_or_default(),
                session
                    .remove::<FieldErrors>(session_keys::ERRORS)
                    .await
                    .ok()
                    .flatten()
                    .unwrap_or_default(),
            ),
            None => (Flash::default(), FieldErrors::new()),
        };

        Ok(Self::new(request, state.config().asset_version.clone()).with_shared(SharedProps {
            user,
            flash,
            errors,
        }))
    }
}

// =============================================================================
// Asset version
// =============================================================================

/// The 409 a stale client gets, or `None` when the visit may proceed.
#[must_use]
pub fn version_conflict(method: &Method, headers: &HeaderMap, url: &str, version: &str) -> Option<Response> {
    if method != Method::GET || !is_inertia(headers) {
        return None;
    }
    let sent = header_str(headers, &X_INERTIA_VERSION)?;
    if sent == version {
        return None;
    }

    let mut response = StatusCode::CONFLICT.into_response();
    if let Ok(location) = HeaderValue::from_str(url) {
        response.headers_mut().insert(X_INERTIA_LOCATION, location);
    }
    Some(response)
}

/// Send clients built against an older asset version a full reload.
pub async fn version_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let url = request
        .uri()
        .path_and_query()
        .map_or_else(|| request.uri().path().to_owned(), ToString::to_string);
    if let Some(conflict) = version_conflict(
        request.method(),
        request.headers(),
        &url,
        &state.config().asset_version,
    ) {
        tracing::debug!(url = %url, "Asset version changed, forcing reload");
        return conflict;
    }
    next.run(request).await
}

// =============================================================================
// Redirects
// =============================================================================

/// Redirect to the `Referer`, or `fallback` when there is none.
#[must_use]
pub fn back(headers: &HeaderMap, fallback: &str) -> Redirect {
    let target = headers
        .get(header::REFERER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .unwrap_or(fallback);
    Redirect::to(target)
}

/// Flash messages and redirects for mutation handlers.
pub struct Redirector {
    session: Session,
    headers: HeaderMap,
}

impl Redirector {
    /// Store a success message for the next page.
    pub async fn success(&self, message: impl Into<String>) {
        self.flash(Flash::success(message)).await;
    }

    /// Store an error message for the next page.
    pub async fn error(&self, message: impl Into<String>) {
        self.flash(Flash::error(message)).await;
    }

    async fn flash(&self, flash: Flash) {
        if let Err(e) = self.session.insert(session_keys::FLASH, flash).await {
            tracing::warn!(error = %e, "Failed to store flash message");
        }
    }

    /// `303` back to where the request came from.
    #[must_use]
    pub fn back(&self, fallback: &str) -> Response {
        back(&self.headers, fallback).into_response()
    }

    /// Field errors for the form that was submitted. Page visits get the
    /// errors through the session and a `303` back; plain JSON clients get
    /// a 422.
    pub async fn invalid(&self, errors: FieldErrors, fallback: &str) -> Response {
        let wants_json = !is_inertia(&self.headers)
            && header_str(&self.headers, &header::ACCEPT)
                .is_some_and(|accept| accept.contains("application/json"));
        if wants_json {
            return AppError::Validation(errors).into_response();
        }

        tracing::debug!(fields = errors.len(), "Form rejected");
        if let Err(e) = self.session.insert(session_keys::ERRORS, &errors).await {
            tracing::warn!(error = %e, "Failed to store form errors");
        }
        self.back(fallback)
    }
}

impl<S> FromRequestParts<S> for Redirector
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let session = parts
            .extensions
            .get::<Session>()
            .cloned()
            .ok_or_else(|| AppError::Internal("session layer missing".to_owned()))?;
        Ok(Self {
            session,
            headers: parts.headers.clone(),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use axum::{Router, body::Body, http::Request as HttpRequest, routing::get};
    use serde_json::json;
    use tower::ServiceExt;

    fn app() -> Router {
        Router::new().route(
            "/leads",
            get(|request: PageRequest| async move {
                let shared = SharedProps {
                    user: None,
                    flash: Flash::success("Saved."),
                    errors: FieldErrors::single("phone", "Phone is required."),
                };
                Inertia::new(request, "v1")
                    .with_shared(shared)
                    .render("Leads/Index", json!({ "leads": [1, 2], "cities": ["Guelph"] }))
            }),
        )
    }

    async fn body_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_first_visit_gets_html_shell() {
        let response = app()
            .oneshot(HttpRequest::get("/leads?page=2").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get(X_INERTIA).is_none());

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let html = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(html.contains("data-page="));
        assert!(html.contains("Leads/Index"));
        assert!(html.contains("/leads?page=2"));
    }

    #[tokio::test]
    async fn test_inertia_visit_gets_page_object() {
        let response = app()
            .oneshot(
                HttpRequest::get("/leads?page=2")
                    .header("X-Inertia", "true")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[X_INERTIA], "true");
        assert_eq!(response.headers()[header::VARY], "X-Inertia");

        let page = body_json(response).await;
        assert_eq!(page["component"], "Leads/Index");
        assert_eq!(page["url"], "/leads?page=2");
        assert_eq!(page["version"], "v1");
        assert_eq!(page["props"]["leads"], json!([1, 2]));
        assert_eq!(page["props"]["flash"]["success"], "Saved.");
        assert_eq!(page["props"]["errors"]["phone"], "Phone is required.");
        assert!(page["props"]["auth"]["user"].is_null());
    }

    #[tokio::test]
    async fn test_partial_reload_keeps_listed_props_and_errors() {
        let response = app()
            .oneshot(
                HttpRequest::get("/leads")
                    .header("X-Inertia", "true")
                    .header("X-Inertia-Partial-Component", "Leads/Index")
                    .header("X-Inertia-Partial-Data", "leads")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        let props = body_json(response).await["props"].clone();
        let keys: Vec<&String> = props.as_object().unwrap().keys().collect();
        assert_eq!(keys, vec!["errors", "leads"]);
    }

    #[tokio::test]
    async fn test_partial_reload_for_other_component_is_full() {
        let response = app()
            .oneshot(
                HttpRequest::get("/leads")
                    .header("X-Inertia", "true")
                    .header("X-Inertia-Partial-Component", "Orders/Index")
                    .header("X-Inertia-Partial-Data", "leads")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        let props = body_json(response).await["props"].clone();
        assert!(props.get("cities").is_some());
        assert!(props.get("auth").is_some());
    }

    #[test]
    fn test_version_conflict() {
        let mut headers = HeaderMap::new();
        headers.insert(X_INERTIA, HeaderValue::from_static("true"));
        headers.insert(X_INERTIA_VERSION, HeaderValue::from_static("old"));

        let response = version_conflict(&Method::GET, &headers, "/orders", "new").unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert_eq!(response.headers()[X_INERTIA_LOCATION], "/orders");

        assert!(version_conflict(&Method::GET, &headers, "/orders", "old").is_none());
        assert!(version_conflict(&Method::POST, &headers, "/orders", "new").is_none());
        assert!(version_conflict(&Method::GET, &HeaderMap::new(), "/orders", "new").is_none());
    }

    #[test]
    fn test_back_uses_referer() {
        let mut headers = HeaderMap::new();
        let response = back(&headers, "/leads").into_response();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[header::LOCATION], "/leads");

        headers.insert(header::REFERER, HeaderValue::from_static("/leads?page=3"));
        let response = back(&headers, "/leads").into_response();
        assert_eq!(response.headers()[header::LOCATION], "/leads?page=3");
    }

    #[test]
    fn test_props_must_be_object() {
        let result = Inertia::new(PageRequest::default(), "v1").page("Dashboard", json!([1]));
        assert!(matches!(result, Err(AppError::Internal(_))));
    }
}
