//! Metrics read operations: live snapshot and stored history.

use chrono::{Duration, Utc};

use steward_core::rbac::{AuthUser, Permission};

use crate::error::ApiError;
use crate::sampler::{sample_system, MetricsSnapshot};
use crate::store::{MetricSample, Store};

/// Default history window in hours.
pub const DEFAULT_HISTORY_HOURS: u32 = 2;
/// Largest allowed history window, matching sample retention.
pub const MAX_HISTORY_HOURS: u32 = 24;

/// Take a live cpu/memory snapshot.
///
/// # Errors
///
/// Fails closed when the caller lacks metrics read access.
pub async fn current(user: &AuthUser) -> Result<MetricsSnapshot, ApiError> {
    if !user.has_permission(Permission::MetricsRead) {
        return Err(ApiError::Forbidden);
    }
    Ok(sample_system().await)
}

/// Stored samples within the requested window, ascending by time.
///
/// The window defaults to [`DEFAULT_HISTORY_HOURS`] and is clamped to
/// [`MAX_HISTORY_HOURS`]; zero falls back to the default.
///
/// # Errors
///
/// Fails closed when the caller lacks metrics read access.
pub fn history(
    store: &Store,
    user: &AuthUser,
    hours: Option<u32>,
) -> Result<Vec<MetricSample>, ApiError> {
    if !user.has_permission(Permission::MetricsRead) {
        return Err(ApiError::Forbidden);
    }

    let hours = match hours {
        Some(0) | None => DEFAULT_HISTORY_HOURS,
        Some(h) => h.min(MAX_HISTORY_HOURS),
    };

    let since = (Utc::now() - Duration::hours(i64::from(hours))).timestamp_millis();
    Ok(store.metric_samples_since(since)?)
}
