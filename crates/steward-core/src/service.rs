//! Service intent model and validation.
//!
//! A [`ServiceDefinition`] records the *desired* configuration of one
//! supervised process, independent of whatever is currently running. Rows
//! are created and mutated through the store; the supervisor is only ever
//! touched by an explicit apply or control operation.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

/// How the service is executed by the supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceKind {
    /// A Node.js process.
    Node,
    /// A static file server.
    Static,
    /// A Python process.
    Python,
}

impl ServiceKind {
    /// Stable string form used in the store and on the wire.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Node => "node",
            Self::Static => "static",
            Self::Python => "python",
        }
    }

    /// Parse the stable string form.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "node" => Some(Self::Node),
            "static" => Some(Self::Static),
            "python" => Some(Self::Python),
            _ => None,
        }
    }
}

/// Supervisor execution mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecMode {
    /// Single forked instance.
    #[default]
    Fork,
    /// Clustered instances behind the supervisor's load balancer.
    Cluster,
}

impl ExecMode {
    /// Stable string form used in the store and on the wire.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Fork => "fork",
            Self::Cluster => "cluster",
        }
    }

    /// Parse the stable string form.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "fork" => Some(Self::Fork),
            "cluster" => Some(Self::Cluster),
            _ => None,
        }
    }
}

/// Desired state for one supervised service.
///
/// `name` is the immutable identity; everything a caller may change after
/// creation is enumerated by [`ServicePatch`]. Timestamps are bookkeeping
/// only and never participate in fingerprinting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceDefinition {
    /// Unique identifier, restricted to [`is_valid_service_name`].
    pub name: String,
    /// What kind of process this is.
    pub kind: ServiceKind,
    /// Working directory the process is launched from.
    pub cwd: String,
    /// Script or entry path, relative to `cwd` or absolute.
    pub script: String,
    /// Optional argument string passed to the script.
    #[serde(default)]
    pub args: Option<String>,
    /// Optional interpreter override.
    #[serde(default)]
    pub interpreter: Option<String>,
    /// Environment variables injected into the process.
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    /// Listen port; must be unique among enabled services.
    #[serde(default)]
    pub port: Option<u16>,
    /// Execution mode.
    #[serde(default)]
    pub exec_mode: ExecMode,
    /// Whether the supervisor watches the script path for changes.
    #[serde(default)]
    pub watch: bool,
    /// Whether the supervisor restarts the process on exit.
    #[serde(default = "default_true")]
    pub autorestart: bool,
    /// Whether this definition participates in apply/fingerprint.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Creation time (bookkeeping, excluded from the fingerprint).
    pub created_at: DateTime<Utc>,
    /// Last update time (bookkeeping, excluded from the fingerprint).
    pub updated_at: DateTime<Utc>,
}

/// Request body for creating a service. Timestamps are assigned by the
/// store; `enabled` defaults to true.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewService {
    pub name: String,
    pub kind: ServiceKind,
    pub cwd: String,
    pub script: String,
    #[serde(default)]
    pub args: Option<String>,
    #[serde(default)]
    pub interpreter: Option<String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub exec_mode: ExecMode,
    #[serde(default)]
    pub watch: bool,
    #[serde(default = "default_true")]
    pub autorestart: bool,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

/// Field-allow-listed update to an existing service.
///
/// Only the fields here are mutable post-creation; the name, kind, and
/// supervisor-shape fields (`exec_mode`, `watch`, `autorestart`,
/// `interpreter`) are fixed at creation. `args` and `port` distinguish
/// "absent" (keep) from "null" (clear) via the double-`Option`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServicePatch {
    #[serde(default)]
    pub cwd: Option<String>,
    #[serde(default)]
    pub script: Option<String>,
    #[serde(default, deserialize_with = "nested_option")]
    pub args: Option<Option<String>>,
    #[serde(default)]
    pub env: Option<BTreeMap<String, String>>,
    #[serde(default, deserialize_with = "nested_option")]
    pub port: Option<Option<u16>>,
    #[serde(default)]
    pub enabled: Option<bool>,
}

impl ServicePatch {
    /// True when the patch carries no changes at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cwd.is_none()
            && self.script.is_none()
            && self.args.is_none()
            && self.env.is_none()
            && self.port.is_none()
            && self.enabled.is_none()
    }
}

/// Deserializes a present-but-null field as `Some(None)`, leaving a missing
/// field as `None` via `#[serde(default)]`.
fn nested_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

fn default_true() -> bool {
    true
}

/// Errors produced by service-shape validation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ServiceValidationError {
    /// The name contains characters outside the safe class.
    #[error("invalid service name '{0}': only letters, digits, '.', '_' and '-' are allowed")]
    InvalidName(String),
}

/// Check a service name against the safe character class.
///
/// Names are interpolated into supervisor command invocations, so they are
/// restricted to `[A-Za-z0-9._-]` to rule out injection through the
/// argument list.
#[must_use]
pub fn is_valid_service_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
}

/// Validate a service name, returning a descriptive error on failure.
///
/// # Errors
///
/// Returns [`ServiceValidationError::InvalidName`] when the name falls
/// outside the safe character class.
pub fn validate_service_name(name: &str) -> Result<(), ServiceValidationError> {
    if is_valid_service_name(name) {
        Ok(())
    } else {
        Err(ServiceValidationError::InvalidName(name.to_string()))
    }
}
