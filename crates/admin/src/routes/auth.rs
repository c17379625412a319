//! Authentication route handlers.
//!
//! Email and password login against argon2 hashes. The session keeps only
//! the staff identity; permissions are loaded per request.

use axum::{
    Json, Router,
    extract::State,
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::json;
use tower_sessions::Session;
use tracing::instrument;

use crate::error::AppError;
use crate::inertia::{Inertia, Redirector};
use crate::middleware::{OptionalStaff, clear_current_staff, set_current_staff};
use crate::services::{AuthError, AuthService};
use crate::state::AppState;
use crate::validation::FieldErrors;

/// Shown on the `email` field for any failed login.
pub const INVALID_CREDENTIALS: &str = "These credentials do not match our records.";

/// `POST /login` body.
#[derive(Clone, Default, Deserialize)]
#[serde(default)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

impl std::fmt::Debug for LoginForm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginForm")
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Build the auth router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/login", get(login_page).post(login))
        .route("/logout", post(logout))
}

/// Render the login page, or go home when already signed in.
///
/// GET /login
async fn login_page(OptionalStaff(staff): OptionalStaff, inertia: Inertia) -> Response {
    if staff.is_some() {
        return Redirect::to("/").into_response();
    }
    inertia.render("Auth/Login", json!({}))
}

/// Verify credentials and start a session.
///
/// POST /login
#[instrument(skip(state, session, redirect, form), fields(email = %form.email))]
async fn login(
    State(state): State<AppState>,
    session: Session,
    redirect: Redirector,
    Json(form): Json<LoginForm>,
) -> Result<Response, AppError> {
    let auth = AuthService::new(state.pool());
    match auth.login(&form.email, &form.password).await {
        Ok(staff) => {
            set_current_staff(&session, &staff)
                .await
                .map_err(|e| AppError::Internal(format!("session: {e}")))?;
            tracing::info!(staff_id = %staff.id, "Staff logged in");
            Ok(Redirect::to("/").into_response())
        }
        Err(AuthError::InvalidCredentials) => {
            tracing::info!("Login rejected");
            Ok(redirect
                .invalid(FieldErrors::single("email", INVALID_CREDENTIALS), "/login")
                .await)
        }
        Err(AuthError::Repository(e)) => Err(e.into()),
        Err(e) => Err(AppError::Internal(e.to_string())),
    }
}

/// Logout and clear session.
///
/// POST /logout
async fn logout(session: Session) -> impl IntoResponse {
    if let Err(e) = clear_current_staff(&session).await {
        tracing::warn!(error = %e, "Failed to clear session on logout");
    }
    Redirect::to("/login")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_form_debug_redacts_password() {
        let form = LoginForm {
            email: "sam@partsdesk.test".to_string(),
            password: "hunter22".to_string(),
        };
        let debug = format!("{form:?}");
        assert!(debug.contains("sam@partsdesk.test"));
        assert!(!debug.contains("hunter22"));
    }
}
