//! HTTP middleware stack for the back-office.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (capture errors)
//! 2. `TraceLayer` (request tracing)
//! 3. Request ID (add unique ID to each request)
//! 4. Security headers (strict CSP)
//! 5. Session layer (tower-sessions with `PostgreSQL` store)
//! 6. Staff context (load the signed-in staff member and their permissions)
//! 7. Asset version check (409 for stale page-visit clients)

pub mod auth;
pub mod request_id;
pub mod security_headers;
pub mod session;

pub use auth::{
    OptionalStaff, RequireStaff, StaffContext, clear_current_staff, set_current_staff,
    staff_context_middleware,
};
pub use request_id::request_id_middleware;
pub use security_headers::security_headers_middleware;
pub use session::create_session_layer;
