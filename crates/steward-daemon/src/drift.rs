//! Drift detection.
//!
//! Pure read: computes the current fingerprint of the enabled intent set and
//! compares it to the fingerprint recorded by the last successful apply.
//! Safe to call concurrently and as often as the UI polls.

use serde::Serialize;

use steward_core::fingerprint::fingerprint_services;
use steward_core::rbac::{AuthUser, Permission};

use crate::error::ApiError;
use crate::store::Store;

/// Result of a drift check.
#[derive(Debug, Clone, Serialize)]
pub struct DriftReport {
    /// True when the intent set has never been applied or has changed since
    /// the last apply.
    pub drifted: bool,
    /// Fingerprint recorded by the last successful apply, if any.
    pub last_applied_hash: Option<String>,
    /// Fingerprint of the current enabled intent set.
    pub current_hash: String,
}

/// Compare current intent against the last-applied fingerprint.
///
/// # Errors
///
/// Returns [`ApiError::Forbidden`] without touching the store when the
/// caller lacks settings read access, or a store error otherwise.
pub fn check_drift(store: &Store, user: &AuthUser) -> Result<DriftReport, ApiError> {
    if !user.has_permission(Permission::SettingsRead) {
        return Err(ApiError::Forbidden);
    }

    let services = store.list_services(None)?;
    let current_hash = fingerprint_services(&services);
    let settings = store.settings()?;

    let drifted = settings
        .last_applied_hash
        .as_deref()
        .is_none_or(|last| last != current_hash);

    Ok(DriftReport {
        drifted,
        last_applied_hash: settings.last_applied_hash,
        current_hash,
    })
}
