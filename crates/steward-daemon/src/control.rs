//! Runtime control gateway.
//!
//! Issues start/stop/restart commands against the external supervisor,
//! gated by the control permission, per-service scope, the global read-only
//! lock, and safe-name validation before any name reaches an argument list.
//! Restart is deliberately gated identically to start/stop.
//!
//! Bulk operations authorize the full name list up front (all-or-nothing),
//! then run each command independently: one failing service does not abort
//! the rest, and the caller receives a per-name result map.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use steward_core::rbac::{AuthUser, Permission};
use steward_core::service::is_valid_service_name;
use steward_core::supervisor::SupervisorControl;

use crate::apply::ensure_artifact;
use crate::error::ApiError;
use crate::store::{Settings, Store};

/// A runtime control action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlAction {
    Start,
    Stop,
    Restart,
}

/// Per-service outcome of a bulk operation.
#[derive(Debug, Clone, Serialize)]
pub struct ControlResult {
    /// Whether the supervisor command succeeded.
    pub success: bool,
    /// Captured supervisor output on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    /// Captured failure text on error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Run one control action against one named service.
///
/// # Errors
///
/// Fails closed before invoking the supervisor on missing permission,
/// scope, read-only mode, or an unsafe name. Supervisor failures surface
/// verbatim.
pub async fn control_service(
    store: &Store,
    supervisor: &dyn SupervisorControl,
    user: &AuthUser,
    name: &str,
    action: ControlAction,
) -> Result<String, ApiError> {
    let settings = preconditions(store, user)?;
    authorize_name(user, name)?;
    run_action(supervisor, &settings, name, action).await
}

/// Run one control action against many named services, collecting per-name
/// results. Authorization for every name happens before any command is
/// issued.
///
/// # Errors
///
/// Fails closed on missing permission, read-only mode, an empty name list,
/// or any unauthorized/unsafe name in the list. Individual command failures
/// are captured in the result map instead of failing the call.
pub async fn bulk_control(
    store: &Store,
    supervisor: &dyn SupervisorControl,
    user: &AuthUser,
    action: ControlAction,
    names: &[String],
) -> Result<BTreeMap<String, ControlResult>, ApiError> {
    let settings = preconditions(store, user)?;

    if names.is_empty() {
        return Err(ApiError::Validation("No services selected".to_string()));
    }
    for name in names {
        authorize_name(user, name)?;
    }

    let mut results = BTreeMap::new();
    for name in names {
        let result = match run_action(supervisor, &settings, name, action).await {
            Ok(output) => ControlResult {
                success: true,
                output: Some(output),
                error: None,
            },
            Err(err) => {
                warn!(service = %name, ?action, error = %err, "bulk control item failed");
                ControlResult {
                    success: false,
                    output: None,
                    error: Some(err.to_string()),
                }
            },
        };
        results.insert(name.clone(), result);
    }
    Ok(results)
}

fn preconditions(store: &Store, user: &AuthUser) -> Result<Settings, ApiError> {
    if !user.has_permission(Permission::ServicesControl) {
        return Err(ApiError::Forbidden);
    }
    let settings = store.settings()?;
    if settings.read_only {
        return Err(ApiError::ReadOnly);
    }
    Ok(settings)
}

fn authorize_name(user: &AuthUser, name: &str) -> Result<(), ApiError> {
    if !is_valid_service_name(name) {
        return Err(ApiError::Validation(format!("invalid service name '{name}'")));
    }
    if !user.is_service_allowed(name) {
        return Err(ApiError::Forbidden);
    }
    Ok(())
}

async fn run_action(
    supervisor: &dyn SupervisorControl,
    settings: &Settings,
    name: &str,
    action: ControlAction,
) -> Result<String, ApiError> {
    match action {
        ControlAction::Start => {
            // Starts are scoped to one name and need the artifact as the
            // process definition source.
            ensure_artifact(&settings.ecosystem_path)?;
            Ok(supervisor
                .start_only(&settings.ecosystem_path, name)
                .await?)
        },
        ControlAction::Stop => Ok(supervisor.stop(name).await?),
        ControlAction::Restart => Ok(supervisor.restart(name).await?),
    }
}
