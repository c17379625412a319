//! Staff authentication middleware and extractors.
//!
//! The session only stores [`CurrentStaff`]. On every request the staff
//! context middleware checks that the account still exists and loads its
//! effective permissions, so role edits apply on the next request instead
//! of the next login.

use axum::{
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use tower_sessions::Session;

use partsdesk_core::PermissionSet;

use crate::db::StaffRepository;
use crate::error::{AppError, set_sentry_user};
use crate::models::{CurrentStaff, session_keys};
use crate::state::AppState;

/// Where unauthenticated visits are sent.
pub const LOGIN_PATH: &str = "/login";

/// The signed-in staff member and what they may do.
#[derive(Debug, Clone)]
pub struct StaffContext {
    pub staff: CurrentStaff,
    pub permissions: PermissionSet,
}

impl StaffContext {
    /// Whether the staff member holds `permission`, directly, through a role
    /// or through a wildcard.
    #[must_use]
    pub fn can(&self, permission: &str) -> bool {
        self.permissions.allows(permission)
    }

    /// # Errors
    ///
    /// Returns `AppError::Forbidden` naming the missing permission.
    pub fn require(&self, permission: &str) -> Result<(), AppError> {
        if self.can(permission) {
            Ok(())
        } else {
            tracing::warn!(
                staff_id = %self.staff.id,
                permission,
                "Permission denied"
            );
            Err(AppError::Forbidden(permission.to_owned()))
        }
    }
}

/// Load the staff context for signed-in sessions.
///
/// Sessions whose account has been deleted are flushed, which sends the
/// browser to the login page on its next protected visit.
pub async fn staff_context_middleware(
    State(state): State<AppState>,
    session: Session,
    mut request: Request,
    next: Next,
) -> Response {
    let staff = session
        .get::<CurrentStaff>(session_keys::CURRENT_STAFF)
        .await
        .ok()
        .flatten();

    if let Some(staff) = staff {
        let repo = StaffRepository::new(state.pool());
        match repo.exists(staff.id).await {
            Ok(true) => match repo.permissions(staff.id).await {
                Ok(permissions) => {
                    set_sentry_user(staff.id.as_i32(), Some(staff.email.as_str()));
                    tracing::Span::current().record("staff_id", staff.id.as_i32());
                    request
                        .extensions_mut()
                        .insert(StaffContext { staff, permissions });
                }
                Err(e) => return AppError::from(e).into_response(),
            },
            Ok(false) => {
                tracing::info!(staff_id = %staff.id, "Session for deleted staff user dropped");
                if let Err(e) = session.flush().await {
                    tracing::warn!(error = %e, "Failed to flush session");
                }
            }
            Err(e) => return AppError::from(e).into_response(),
        }
    }

    next.run(request).await
}

/// Extractor that requires a signed-in staff member.
///
/// Visits without one are redirected to the login page.
///
/// # Example
///
/// ```rust,ignore
/// async fn handler(RequireStaff(staff): RequireStaff) -> Result<Response, AppError> {
///     staff.require("orders.edit")?;
///     // ...
/// }
/// ```
pub struct RequireStaff(pub StaffContext);

/// Rejection for [`RequireStaff`].
pub struct LoginRequired;

impl IntoResponse for LoginRequired {
    fn into_response(self) -> Response {
        Redirect::to(LOGIN_PATH).into_response()
    }
}

impl<S> FromRequestParts<S> for RequireStaff
where
    S: Send + Sync,
{
    type Rejection = LoginRequired;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<StaffContext>()
            .cloned()
            .map(Self)
            .ok_or(LoginRequired)
    }
}

/// Extractor that optionally gets the signed-in staff member.
///
/// Unlike [`RequireStaff`], this does not reject anonymous visits.
pub struct OptionalStaff(pub Option<StaffContext>);

impl<S> FromRequestParts<S> for OptionalStaff
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(parts.extensions.get::<StaffContext>().cloned()))
    }
}

/// Store the signed-in staff member, rotating the session id.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn set_current_staff(
    session: &Session,
    staff: &CurrentStaff,
) -> Result<(), tower_sessions::session::Error> {
    session.cycle_id().await?;
    session.insert(session_keys::CURRENT_STAFF, staff).await
}

/// Forget the signed-in staff member (logout).
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn clear_current_staff(session: &Session) -> Result<(), tower_sessions::session::Error> {
    session.flush().await
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use partsdesk_core::{Email, StaffUserId};

    fn context(permissions: &[&str]) -> StaffContext {
        StaffContext {
            staff: CurrentStaff {
                id: StaffUserId::new(7),
                email: Email::parse("sam@partsdesk.test").unwrap(),
                name: "Sam".to_string(),
            },
            permissions: PermissionSet::from_names(permissions.iter().copied()),
        }
    }

    #[test]
    fn test_require_exact_and_wildcards() {
        let staff = context(&["leads.view", "orders.*"]);
        assert!(staff.require("leads.view").is_ok());
        assert!(staff.require("orders.delete").is_ok());
        assert!(matches!(
            staff.require("leads.delete"),
            Err(AppError::Forbidden(p)) if p == "leads.delete"
        ));

        let admin = context(&["*"]);
        assert!(admin.can("roles.manage"));
    }

    #[test]
    fn test_login_required_redirects() {
        let response = LoginRequired.into_response();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()["location"], LOGIN_PATH);
    }
}
