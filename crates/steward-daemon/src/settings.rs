//! Settings operations and the state-export snapshot.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use steward_core::rbac::{AuthUser, Permission};
use steward_core::service::ServiceDefinition;

use crate::error::ApiError;
use crate::store::{Settings, Store};

/// Request body for a settings update.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SettingsPatch {
    /// New artifact path; must be absolute.
    #[serde(default)]
    pub ecosystem_path: Option<String>,
    /// New read-only flag.
    #[serde(default)]
    pub read_only: Option<bool>,
}

/// Snapshot of the full desired state for operator export.
#[derive(Debug, Clone, Serialize)]
pub struct ExportSnapshot {
    /// When the export was taken.
    pub timestamp: DateTime<Utc>,
    /// Every stored service definition.
    pub services: Vec<ServiceDefinition>,
    /// Current artifact contents, when the file exists.
    pub ecosystem: Option<String>,
    /// Configured artifact path.
    pub ecosystem_path: std::path::PathBuf,
}

/// Read the settings singleton.
///
/// # Errors
///
/// Fails closed when the caller lacks settings read access.
pub fn get_settings(store: &Store, user: &AuthUser) -> Result<Settings, ApiError> {
    if !user.has_permission(Permission::SettingsRead) {
        return Err(ApiError::Forbidden);
    }
    Ok(store.settings()?)
}

/// Update the settings singleton.
///
/// Turning read-only *off* is exempt from the read-only lock — that is the
/// only way out of read-only mode. The artifact path is only updated while
/// the system is writable.
///
/// # Errors
///
/// Fails closed on permission or the read-only lock; relative artifact
/// paths are rejected.
pub fn update_settings(
    store: &Store,
    user: &AuthUser,
    patch: &SettingsPatch,
) -> Result<Settings, ApiError> {
    if !user.has_permission(Permission::SettingsWrite) {
        return Err(ApiError::Forbidden);
    }

    let mut settings = store.settings()?;

    let can_write = !settings.read_only || patch.read_only == Some(false);
    if !can_write {
        return Err(ApiError::ReadOnly);
    }

    if let Some(path) = patch.ecosystem_path.as_deref().map(str::trim) {
        if !path.is_empty() {
            if !Path::new(path).is_absolute() {
                return Err(ApiError::Validation(
                    "Path must be an absolute filesystem path".to_string(),
                ));
            }
            if !settings.read_only {
                settings.ecosystem_path = path.into();
            }
        }
    }

    if let Some(read_only) = patch.read_only {
        settings.read_only = read_only;
    }

    store.save_settings(&settings)?;
    Ok(settings)
}

/// Export the full desired state plus the current artifact contents.
///
/// # Errors
///
/// Fails closed when the caller lacks settings read access.
pub fn export_state(store: &Store, user: &AuthUser) -> Result<ExportSnapshot, ApiError> {
    if !user.has_permission(Permission::SettingsRead) {
        return Err(ApiError::Forbidden);
    }

    let settings = store.settings()?;
    let services = store.list_services(None)?;
    let ecosystem = std::fs::read_to_string(&settings.ecosystem_path).ok();

    Ok(ExportSnapshot {
        timestamp: Utc::now(),
        services,
        ecosystem,
        ecosystem_path: settings.ecosystem_path,
    })
}
