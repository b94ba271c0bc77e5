//! Apply and apply-reload orchestration.
//!
//! Each apply cycle walks `Idle → compute → write artifact → [reload] →
//! commit fingerprint → Idle`. Preconditions (apply permission, read-only
//! off) are checked before any side effect. The plain apply never touches
//! the running supervisor; apply-reload additionally invokes the
//! supervisor's reload and only commits the fingerprint after the reload
//! exits successfully, so a failed reload is never recorded as applied.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::info;

use steward_core::ecosystem::{render_artifact, ARTIFACT_PLACEHOLDER};
use steward_core::fingerprint::fingerprint_services;
use steward_core::rbac::{AuthUser, Permission};
use steward_core::service::ServiceDefinition;
use steward_core::supervisor::SupervisorControl;

use crate::error::ApiError;
use crate::store::{Settings, Store};

/// Result of a successful apply cycle.
#[derive(Debug, Clone, Serialize)]
pub struct ApplyOutcome {
    /// Where the artifact was written.
    pub ecosystem_path: PathBuf,
    /// The fingerprint committed as last-applied.
    pub hash: String,
    /// Supervisor reload output, present only for apply-reload.
    pub reload_output: Option<String>,
}

/// Regenerate the artifact and commit the fingerprint. Never touches the
/// supervisor.
///
/// # Errors
///
/// Fails closed before any side effect on missing permission or the
/// read-only lock; artifact write failures surface with the offending path.
pub async fn apply(store: &Store, user: &AuthUser) -> Result<ApplyOutcome, ApiError> {
    let settings = preconditions(store, user)?;
    let services = store.list_services(None)?;

    write_artifact(&settings.ecosystem_path, &services)?;

    let hash = fingerprint_services(&services);
    store.set_last_applied_hash(&hash)?;
    info!(hash, path = %settings.ecosystem_path.display(), "applied intent");

    Ok(ApplyOutcome {
        ecosystem_path: settings.ecosystem_path,
        hash,
        reload_output: None,
    })
}

/// Apply, then instruct the supervisor to reload from the fresh artifact.
/// The fingerprint is committed only after the reload succeeds.
///
/// # Errors
///
/// A failing reload surfaces the supervisor's diagnostic verbatim and
/// leaves the last-applied fingerprint unchanged.
pub async fn apply_and_reload(
    store: &Store,
    supervisor: &dyn SupervisorControl,
    user: &AuthUser,
) -> Result<ApplyOutcome, ApiError> {
    let settings = preconditions(store, user)?;
    let services = store.list_services(None)?;

    write_artifact(&settings.ecosystem_path, &services)?;

    let reload_output = supervisor.reload(&settings.ecosystem_path).await?;

    let hash = fingerprint_services(&services);
    store.set_last_applied_hash(&hash)?;
    info!(hash, path = %settings.ecosystem_path.display(), "applied intent and reloaded supervisor");

    Ok(ApplyOutcome {
        ecosystem_path: settings.ecosystem_path,
        hash,
        reload_output: Some(reload_output),
    })
}

fn preconditions(store: &Store, user: &AuthUser) -> Result<Settings, ApiError> {
    if !user.has_permission(Permission::Apply) {
        return Err(ApiError::Forbidden);
    }
    let settings = store.settings()?;
    if settings.read_only {
        return Err(ApiError::ReadOnly);
    }
    Ok(settings)
}

/// Make sure the artifact file exists, writing the minimal placeholder when
/// it does not. Also used by the control gateway before scoped starts.
pub fn ensure_artifact(path: &Path) -> Result<(), ApiError> {
    if path.exists() {
        return Ok(());
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| ApiError::Artifact {
            path: path.to_path_buf(),
            source,
        })?;
    }
    std::fs::write(path, ARTIFACT_PLACEHOLDER).map_err(|source| ApiError::Artifact {
        path: path.to_path_buf(),
        source,
    })
}

/// Regenerate the artifact's full contents from the current intent set.
fn write_artifact(path: &Path, services: &[ServiceDefinition]) -> Result<(), ApiError> {
    ensure_artifact(path)?;
    let contents =
        render_artifact(services).map_err(|e| ApiError::Internal(e.to_string()))?;
    std::fs::write(path, contents).map_err(|source| ApiError::Artifact {
        path: path.to_path_buf(),
        source,
    })
}
