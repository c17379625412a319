//! PartsDesk back-office library.
//!
//! This crate provides the back-office server as a library, allowing it to
//! be tested and reused. The binary in `main.rs` only loads configuration,
//! sets up logging and serves [`app`].
//!
//! # Security
//!
//! Every page except `/login` and `/health*` requires a signed-in staff
//! member, and every action checks a named permission.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod filters;
pub mod inertia;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
pub mod validation;

use axum::{Router, middleware::from_fn, middleware::from_fn_with_state};
use tower_http::services::ServeDir;
use tower_http::trace::{DefaultOnResponse, OnResponse, TraceLayer};
use tracing::Span;

use crate::middleware::{
    create_session_layer, request_id_middleware, security_headers_middleware,
    staff_context_middleware,
};
use crate::services::media::MEDIA_URL_PREFIX;
use crate::state::AppState;

/// Compiled front-end assets, relative to the workspace root.
pub const STATIC_DIR: &str = "crates/admin/static";

/// Build the full application: routes, static files and the middleware stack.
pub fn app(state: AppState) -> Router {
    let session_layer = create_session_layer(state.pool(), state.config());
    let media_dir = state.config().media_dir.clone();

    Router::new()
        .merge(routes::routes())
        .merge(routes::health::router())
        .nest_service("/static", ServeDir::new(STATIC_DIR))
        .nest_service(MEDIA_URL_PREFIX, ServeDir::new(media_dir))
        .layer(from_fn_with_state(state.clone(), inertia::version_middleware))
        .layer(from_fn_with_state(state.clone(), staff_context_middleware))
        .layer(session_layer)
        .layer(from_fn(security_headers_middleware))
        .layer(from_fn(request_id_middleware))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                        request_id = tracing::field::Empty,
                        staff_id = tracing::field::Empty,
                        status = tracing::field::Empty,
                        latency_ms = tracing::field::Empty,
                    )
                })
                .on_response(
                    |response: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &Span| {
                        span.record("status", response.status().as_u16());
                        span.record(
                            "latency_ms",
                            u64::try_from(latency.as_millis()).unwrap_or(u64::MAX),
                        );
                        DefaultOnResponse::default().on_response(response, latency, span);
                    },
                ),
        )
        .with_state(state)
        // Sentry layers (outermost for full request coverage)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction())
}
