//! HTTP surface.
//!
//! Thin axum handlers over the operation modules: each handler resolves the
//! request identity once, then delegates. All authorization, read-only
//! gating and validation live in the operation layer so they are enforced
//! identically no matter how an operation is reached.

pub mod handlers;

use axum::http::{header, HeaderMap};
use axum::routing::{get, post, put};
use axum::Router;

use steward_core::rbac::AuthUser;

use crate::auth::{resolve_auth_user, SESSION_COOKIE};
use crate::error::ApiError;
use crate::state::AppState;

/// Build the daemon router.
#[must_use]
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/auth/login", post(handlers::login))
        .route("/api/auth/logout", post(handlers::logout))
        .route("/api/services", get(handlers::list_services).post(handlers::create_service))
        .route("/api/services/bulk-control", post(handlers::bulk_control))
        .route(
            "/api/services/:name",
            get(handlers::get_service).put(handlers::update_service),
        )
        .route("/api/services/:name/control", post(handlers::control_service))
        .route("/api/services/:name/logs", get(handlers::service_logs))
        .route("/api/status", get(handlers::runtime_status))
        .route("/api/apply", post(handlers::apply))
        .route("/api/apply-reload", post(handlers::apply_reload))
        .route("/api/drift", get(handlers::drift))
        .route("/api/settings", get(handlers::get_settings).put(handlers::update_settings))
        .route("/api/export", get(handlers::export))
        .route("/api/users", get(handlers::list_users).post(handlers::create_user))
        .route("/api/users/:id", put(handlers::update_user))
        .route("/api/metrics", get(handlers::metrics_current))
        .route("/api/metrics/history", get(handlers::metrics_history))
        .with_state(state)
}

/// Resolve the request identity from the session cookie, failing with
/// `Unauthorized` when absent or expired.
pub(crate) fn require_auth(state: &AppState, headers: &HeaderMap) -> Result<AuthUser, ApiError> {
    let cookie_header = headers
        .get(header::COOKIE)
        .and_then(|value| value.to_str().ok());
    resolve_auth_user(&state.store, cookie_header)?.ok_or(ApiError::Unauthorized)
}

/// Render the session cookie. `max_age_secs <= 0` clears it.
pub(crate) fn session_cookie(token: &str, max_age_secs: i64, secure: bool) -> String {
    let mut cookie =
        format!("{SESSION_COOKIE}={token}; HttpOnly; SameSite=Lax; Path=/; Max-Age={max_age_secs}");
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}
