//! Service intent operations: list, get (with live runtime merge), create,
//! update, logs, and the live status listing.
//!
//! Every operation takes the resolved [`AuthUser`] explicitly and checks
//! permission and scope before touching the store or the supervisor.

use chrono::Utc;
use serde::Serialize;

use steward_core::rbac::{AuthUser, Permission};
use steward_core::service::{
    is_valid_service_name, NewService, ServiceDefinition, ServicePatch,
};
use steward_core::supervisor::{ProcessState, ProcessStatus, SupervisorControl};

use crate::error::ApiError;
use crate::store::Store;

/// Live runtime view of one process, merged into the service detail.
#[derive(Debug, Clone, Serialize)]
pub struct RuntimeStatus {
    /// Supervisor-reported state.
    pub status: ProcessState,
    /// OS pid when running.
    pub pid: Option<u32>,
    /// CPU usage percentage.
    pub cpu: f64,
    /// Resident memory in bytes.
    pub memory: u64,
    /// Restart counter.
    pub restarts: u32,
    /// Milliseconds since the process started, when known.
    pub uptime_ms: Option<i64>,
    /// Interpreter in use, if any.
    pub interpreter: Option<String>,
}

/// Desired plus live state for one named service.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceDetail {
    /// The requested name.
    pub name: String,
    /// Whether a definition exists for this name.
    pub managed: bool,
    /// Whether the definition is enabled (false when unmanaged).
    pub enabled: bool,
    /// The stored intent, when managed.
    pub desired: Option<ServiceDefinition>,
    /// The live supervisor state, when the process is known.
    pub runtime: Option<RuntimeStatus>,
    /// Current global read-only flag, for UI gating.
    pub read_only: bool,
}

/// List service definitions visible to the caller, sorted by name.
///
/// # Errors
///
/// Returns [`ApiError::Forbidden`] without reading the store when the
/// caller lacks service read access.
pub fn list_services(store: &Store, user: &AuthUser) -> Result<Vec<ServiceDefinition>, ApiError> {
    if !user.has_permission(Permission::ServicesRead) {
        return Err(ApiError::Forbidden);
    }
    let filter = (!user.service_scopes.is_empty()).then_some(user.service_scopes.as_slice());
    Ok(store.list_services(filter)?)
}

/// Fetch one service with its live runtime state merged in.
///
/// # Errors
///
/// Fails closed on permission or scope; supervisor listing failures
/// surface verbatim.
pub async fn get_service(
    store: &Store,
    supervisor: &dyn SupervisorControl,
    user: &AuthUser,
    name: &str,
) -> Result<ServiceDetail, ApiError> {
    if !user.has_permission(Permission::ServicesRead) {
        return Err(ApiError::Forbidden);
    }
    if !user.is_service_allowed(name) {
        return Err(ApiError::Forbidden);
    }

    let settings = store.settings()?;
    let service = store.get_service(name)?;
    let processes = supervisor.list().await?;
    let runtime = processes
        .into_iter()
        .find(|p| p.name == name)
        .map(runtime_from_process);

    Ok(ServiceDetail {
        name: name.to_string(),
        managed: service.is_some(),
        enabled: service.as_ref().is_some_and(|s| s.enabled),
        desired: service,
        runtime,
        read_only: settings.read_only,
    })
}

/// Create a service definition. The supervisor is untouched until an
/// explicit apply.
///
/// # Errors
///
/// Fails closed on permission, scope, or the read-only lock; store
/// validation errors (name, duplicate, port collision) propagate.
pub fn create_service(
    store: &Store,
    user: &AuthUser,
    new: &NewService,
) -> Result<ServiceDefinition, ApiError> {
    if !user.has_permission(Permission::ServicesWrite) {
        return Err(ApiError::Forbidden);
    }
    if !user.is_service_allowed(&new.name) {
        return Err(ApiError::Forbidden);
    }
    if store.settings()?.read_only {
        return Err(ApiError::ReadOnly);
    }
    Ok(store.create_service(new)?)
}

/// Update a service definition through the mutable-field allow-list.
///
/// # Errors
///
/// Fails closed on permission, scope, or the read-only lock; store
/// validation errors propagate.
pub fn update_service(
    store: &Store,
    user: &AuthUser,
    name: &str,
    patch: &ServicePatch,
) -> Result<ServiceDefinition, ApiError> {
    if !user.has_permission(Permission::ServicesWrite) {
        return Err(ApiError::Forbidden);
    }
    if !user.is_service_allowed(name) {
        return Err(ApiError::Forbidden);
    }
    if store.settings()?.read_only {
        return Err(ApiError::ReadOnly);
    }
    Ok(store.update_service(name, patch)?)
}

/// Fetch recent log output for one service from the supervisor.
///
/// # Errors
///
/// Fails closed on permission, scope, or an unsafe name.
pub async fn service_logs(
    supervisor: &dyn SupervisorControl,
    user: &AuthUser,
    name: &str,
    lines: u32,
) -> Result<String, ApiError> {
    if !user.has_permission(Permission::ServicesLogs) {
        return Err(ApiError::Forbidden);
    }
    if !is_valid_service_name(name) {
        return Err(ApiError::Validation(format!("invalid service name '{name}'")));
    }
    if !user.is_service_allowed(name) {
        return Err(ApiError::Forbidden);
    }
    Ok(supervisor.logs(name, lines).await?)
}

/// Live supervisor listing, filtered to the caller's scope.
///
/// # Errors
///
/// Fails closed on permission; supervisor failures surface verbatim.
pub async fn runtime_status(
    supervisor: &dyn SupervisorControl,
    user: &AuthUser,
) -> Result<Vec<ProcessStatus>, ApiError> {
    if !user.has_permission(Permission::ServicesRead) {
        return Err(ApiError::Forbidden);
    }
    let processes = supervisor.list().await?;
    Ok(processes
        .into_iter()
        .filter(|p| user.is_service_allowed(&p.name))
        .collect())
}

fn runtime_from_process(process: ProcessStatus) -> RuntimeStatus {
    let uptime_ms = process
        .started_at
        .map(|started| (Utc::now().timestamp_millis() - started).max(0));
    RuntimeStatus {
        status: process.status,
        pid: process.pid,
        cpu: process.cpu,
        memory: process.memory,
        restarts: process.restarts,
        uptime_ms,
        interpreter: process.interpreter,
    }
}
