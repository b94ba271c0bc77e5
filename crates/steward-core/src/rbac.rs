//! Role-based access control.
//!
//! Three fixed roles map to permission sets; admin is an implicit wildcard.
//! Authorization additionally honors a per-user service scope list: an empty
//! list means unrestricted, a non-empty list is an allow-list of service
//! names. Every check fails closed.

use serde::{Deserialize, Serialize};

/// User role. Exactly one per user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Full access to every permission.
    Admin,
    /// Day-to-day operation: service reads/writes/control plus apply.
    Operator,
    /// Read-only observation.
    Viewer,
}

impl Role {
    /// Stable string form used in the store and on the wire.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Operator => "operator",
            Self::Viewer => "viewer",
        }
    }

    /// Parse the stable string form.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "admin" => Some(Self::Admin),
            "operator" => Some(Self::Operator),
            "viewer" => Some(Self::Viewer),
            _ => None,
        }
    }
}

/// A single grantable permission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Permission {
    #[serde(rename = "services:read")]
    ServicesRead,
    #[serde(rename = "services:write")]
    ServicesWrite,
    #[serde(rename = "services:control")]
    ServicesControl,
    #[serde(rename = "services:logs")]
    ServicesLogs,
    #[serde(rename = "settings:read")]
    SettingsRead,
    #[serde(rename = "settings:write")]
    SettingsWrite,
    #[serde(rename = "users:manage")]
    UsersManage,
    #[serde(rename = "metrics:read")]
    MetricsRead,
    #[serde(rename = "apply")]
    Apply,
    #[serde(rename = "docs:read")]
    DocsRead,
}

impl Permission {
    /// Stable string form used on the wire, mirroring the serde renames.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ServicesRead => "services:read",
            Self::ServicesWrite => "services:write",
            Self::ServicesControl => "services:control",
            Self::ServicesLogs => "services:logs",
            Self::SettingsRead => "settings:read",
            Self::SettingsWrite => "settings:write",
            Self::UsersManage => "users:manage",
            Self::MetricsRead => "metrics:read",
            Self::Apply => "apply",
            Self::DocsRead => "docs:read",
        }
    }
}

const OPERATOR_PERMISSIONS: &[Permission] = &[
    Permission::ServicesRead,
    Permission::ServicesWrite,
    Permission::ServicesControl,
    Permission::ServicesLogs,
    Permission::SettingsRead,
    Permission::MetricsRead,
    Permission::Apply,
    Permission::DocsRead,
];

const VIEWER_PERMISSIONS: &[Permission] = &[
    Permission::ServicesRead,
    Permission::ServicesLogs,
    Permission::SettingsRead,
    Permission::MetricsRead,
    Permission::DocsRead,
];

/// Explicit permission set for a role, or `None` for the admin wildcard.
#[must_use]
pub const fn permissions_for_role(role: Role) -> Option<&'static [Permission]> {
    match role {
        Role::Admin => None,
        Role::Operator => Some(OPERATOR_PERMISSIONS),
        Role::Viewer => Some(VIEWER_PERMISSIONS),
    }
}

/// Wire representation of a role's permissions: `["*"]` for admin, the
/// explicit list otherwise.
#[must_use]
pub fn wire_permissions(role: Role) -> Vec<String> {
    match permissions_for_role(role) {
        None => vec!["*".to_string()],
        Some(perms) => perms.iter().map(|p| p.as_str().to_string()).collect(),
    }
}

/// Resolved request identity, carrying everything downstream authorization
/// checks need. Built once per request from the session and threaded
/// explicitly; never re-derived from ambient state mid-request.
#[derive(Debug, Clone)]
pub struct AuthUser {
    /// Stable user id.
    pub id: String,
    /// Unique username.
    pub username: String,
    /// The user's role.
    pub role: Role,
    /// Service scope allow-list; empty means all services.
    pub service_scopes: Vec<String>,
}

impl AuthUser {
    /// Whether this user holds `permission` (admin matches everything).
    #[must_use]
    pub fn has_permission(&self, permission: Permission) -> bool {
        match permissions_for_role(self.role) {
            None => true,
            Some(perms) => perms.contains(&permission),
        }
    }

    /// Whether this user may act on the named service.
    #[must_use]
    pub fn is_service_allowed(&self, service_name: &str) -> bool {
        self.service_scopes.is_empty()
            || self.service_scopes.iter().any(|s| s == service_name)
    }
}
