//! Request handlers. Each resolves identity, delegates to the operation
//! layer, and shapes the JSON response.

use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap};
use axum::response::{AppendHeaders, IntoResponse, Response};
use axum::Json;
use secrecy::SecretString;
use serde::Deserialize;
use serde_json::json;

use steward_core::service::{NewService, ServicePatch};

use crate::auth::{
    authenticate, close_session, open_session, session_token_from_cookies, SESSION_TTL_SECS,
};
use crate::error::ApiError;
use crate::state::AppState;
use crate::users::{NewUser, UserPatch, UserView};
use crate::{apply as apply_ops, control, drift as drift_ops, metrics, services, settings, users};

use super::{require_auth, session_cookie};

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: SecretString,
}

#[derive(Debug, Deserialize)]
pub struct ControlRequest {
    pub action: control::ControlAction,
}

#[derive(Debug, Deserialize)]
pub struct BulkControlRequest {
    pub action: control::ControlAction,
    #[serde(default)]
    pub names: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct LogsQuery {
    pub lines: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub hours: Option<u32>,
}

const DEFAULT_LOG_LINES: u32 = 200;

pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<Response, ApiError> {
    let record = authenticate(&state.store, &body.username, &body.password)?;
    let session = open_session(&state.store, &record)?;
    let cookie = session_cookie(&session.token, SESSION_TTL_SECS, state.secure_cookies);

    Ok((
        AppendHeaders([(header::SET_COOKIE, cookie)]),
        Json(json!({ "user": UserView::from(&record) })),
    )
        .into_response())
}

pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    if let Some(token) = headers
        .get(header::COOKIE)
        .and_then(|value| value.to_str().ok())
        .and_then(session_token_from_cookies)
    {
        close_session(&state.store, &token)?;
    }

    let cookie = session_cookie("", 0, state.secure_cookies);
    Ok((
        AppendHeaders([(header::SET_COOKIE, cookie)]),
        Json(json!({ "success": true })),
    )
        .into_response())
}

pub async fn list_services(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let user = require_auth(&state, &headers)?;
    let services = services::list_services(&state.store, &user)?;
    Ok(Json(services).into_response())
}

pub async fn create_service(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<NewService>,
) -> Result<Response, ApiError> {
    let user = require_auth(&state, &headers)?;
    let service = services::create_service(&state.store, &user, &body)?;
    Ok(Json(service).into_response())
}

pub async fn get_service(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(name): Path<String>,
) -> Result<Response, ApiError> {
    let user = require_auth(&state, &headers)?;
    let detail =
        services::get_service(&state.store, state.supervisor.as_ref(), &user, &name).await?;
    Ok(Json(detail).into_response())
}

pub async fn update_service(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(name): Path<String>,
    Json(body): Json<ServicePatch>,
) -> Result<Response, ApiError> {
    let user = require_auth(&state, &headers)?;
    let service = services::update_service(&state.store, &user, &name, &body)?;
    Ok(Json(service).into_response())
}

pub async fn service_logs(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(name): Path<String>,
    Query(query): Query<LogsQuery>,
) -> Result<Response, ApiError> {
    let user = require_auth(&state, &headers)?;
    let lines = query.lines.unwrap_or(DEFAULT_LOG_LINES);
    let output =
        services::service_logs(state.supervisor.as_ref(), &user, &name, lines).await?;
    Ok(Json(json!({ "logs": output })).into_response())
}

pub async fn runtime_status(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let user = require_auth(&state, &headers)?;
    let processes = services::runtime_status(state.supervisor.as_ref(), &user).await?;
    Ok(Json(processes).into_response())
}

pub async fn control_service(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(name): Path<String>,
    Json(body): Json<ControlRequest>,
) -> Result<Response, ApiError> {
    let user = require_auth(&state, &headers)?;
    let output = control::control_service(
        &state.store,
        state.supervisor.as_ref(),
        &user,
        &name,
        body.action,
    )
    .await?;
    Ok(Json(json!({ "success": true, "output": output })).into_response())
}

pub async fn bulk_control(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<BulkControlRequest>,
) -> Result<Response, ApiError> {
    let user = require_auth(&state, &headers)?;
    let results = control::bulk_control(
        &state.store,
        state.supervisor.as_ref(),
        &user,
        body.action,
        &body.names,
    )
    .await?;
    Ok(Json(json!({ "success": true, "results": results })).into_response())
}

pub async fn apply(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let user = require_auth(&state, &headers)?;
    let outcome = apply_ops::apply(&state.store, &user).await?;
    Ok(Json(json!({
        "success": true,
        "ecosystem_path": outcome.ecosystem_path,
        "hash": outcome.hash,
    }))
    .into_response())
}

pub async fn apply_reload(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let user = require_auth(&state, &headers)?;
    let outcome =
        apply_ops::apply_and_reload(&state.store, state.supervisor.as_ref(), &user).await?;
    Ok(Json(json!({
        "success": true,
        "ecosystem_path": outcome.ecosystem_path,
        "hash": outcome.hash,
        "output": outcome.reload_output,
    }))
    .into_response())
}

pub async fn drift(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let user = require_auth(&state, &headers)?;
    let report = drift_ops::check_drift(&state.store, &user)?;
    Ok(Json(report).into_response())
}

pub async fn get_settings(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let user = require_auth(&state, &headers)?;
    let current = settings::get_settings(&state.store, &user)?;
    Ok(Json(current).into_response())
}

pub async fn update_settings(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<settings::SettingsPatch>,
) -> Result<Response, ApiError> {
    let user = require_auth(&state, &headers)?;
    let updated = settings::update_settings(&state.store, &user, &body)?;
    Ok(Json(updated).into_response())
}

pub async fn export(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let user = require_auth(&state, &headers)?;
    let snapshot = settings::export_state(&state.store, &user)?;
    Ok(Json(snapshot).into_response())
}

pub async fn list_users(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let user = require_auth(&state, &headers)?;
    let users = users::list_users(&state.store, &user)?;
    Ok(Json(users).into_response())
}

pub async fn create_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<NewUser>,
) -> Result<Response, ApiError> {
    let user = require_auth(&state, &headers)?;
    let created = users::create_user(&state.store, &user, &body)?;
    Ok(Json(created).into_response())
}

pub async fn update_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<UserPatch>,
) -> Result<Response, ApiError> {
    let user = require_auth(&state, &headers)?;
    let updated = users::update_user(&state.store, &user, &id, &body)?;
    Ok(Json(updated).into_response())
}

pub async fn metrics_current(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let user = require_auth(&state, &headers)?;
    let snapshot = metrics::current(&user).await?;
    Ok(Json(snapshot).into_response())
}

pub async fn metrics_history(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<HistoryQuery>,
) -> Result<Response, ApiError> {
    let user = require_auth(&state, &headers)?;
    let samples = metrics::history(&state.store, &user, query.hours)?;
    Ok(Json(samples).into_response())
}
