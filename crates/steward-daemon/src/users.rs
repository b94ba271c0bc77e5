//! User management operations.

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use steward_core::rbac::{wire_permissions, AuthUser, Permission, Role};

use crate::auth::hash_password;
use crate::error::ApiError;
use crate::store::{Store, UserRecord, UserUpdate};

/// Wire representation of a user. Never carries the password hash.
#[derive(Debug, Clone, Serialize)]
pub struct UserView {
    pub id: String,
    pub username: String,
    pub role: Role,
    pub service_scopes: Vec<String>,
    /// `["*"]` for admins, the explicit list otherwise.
    pub permissions: Vec<String>,
}

impl From<&UserRecord> for UserView {
    fn from(record: &UserRecord) -> Self {
        Self {
            id: record.id.clone(),
            username: record.username.clone(),
            role: record.role,
            service_scopes: record.service_scopes.clone(),
            permissions: wire_permissions(record.role),
        }
    }
}

/// Request body for creating a user.
#[derive(Debug, Deserialize)]
pub struct NewUser {
    pub username: String,
    pub password: SecretString,
    pub role: Role,
    #[serde(default)]
    pub service_scopes: Vec<String>,
}

/// Request body for updating a user. Absent fields are left untouched.
#[derive(Debug, Default, Deserialize)]
pub struct UserPatch {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<SecretString>,
    #[serde(default)]
    pub role: Option<Role>,
    #[serde(default)]
    pub service_scopes: Option<Vec<String>>,
}

/// List all users.
///
/// # Errors
///
/// Fails closed when the caller lacks user management access.
pub fn list_users(store: &Store, user: &AuthUser) -> Result<Vec<UserView>, ApiError> {
    if !user.has_permission(Permission::UsersManage) {
        return Err(ApiError::Forbidden);
    }
    let users = store.list_users()?;
    Ok(users.iter().map(UserView::from).collect())
}

/// Create a user.
///
/// # Errors
///
/// Fails closed on permission or the read-only lock; blank credentials are
/// rejected and duplicate usernames propagate as conflicts.
pub fn create_user(store: &Store, user: &AuthUser, new: &NewUser) -> Result<UserView, ApiError> {
    if !user.has_permission(Permission::UsersManage) {
        return Err(ApiError::Forbidden);
    }
    if store.settings()?.read_only {
        return Err(ApiError::ReadOnly);
    }

    let username = new.username.trim();
    if username.is_empty() || new.password.expose_secret().is_empty() {
        return Err(ApiError::Validation(
            "Username, password, and role are required".to_string(),
        ));
    }

    let password_hash = hash_password(&new.password);
    let scopes = normalize_scopes(&new.service_scopes);
    let record = store.create_user(username, &password_hash, new.role, &scopes)?;
    Ok(UserView::from(&record))
}

/// Update a user. The store rejects demoting the last remaining admin.
///
/// # Errors
///
/// Fails closed on permission or the read-only lock; invariant violations
/// propagate from the store.
pub fn update_user(
    store: &Store,
    user: &AuthUser,
    id: &str,
    patch: &UserPatch,
) -> Result<UserView, ApiError> {
    if !user.has_permission(Permission::UsersManage) {
        return Err(ApiError::Forbidden);
    }
    if store.settings()?.read_only {
        return Err(ApiError::ReadOnly);
    }

    let update = UserUpdate {
        username: patch
            .username
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .map(ToString::to_string),
        password_hash: patch
            .password
            .as_ref()
            .filter(|p| !p.expose_secret().is_empty())
            .map(hash_password),
        role: patch.role,
        service_scopes: patch.service_scopes.as_deref().map(normalize_scopes),
    };

    let record = store.update_user(id, &update)?;
    Ok(UserView::from(&record))
}

fn normalize_scopes(scopes: &[String]) -> Vec<String> {
    scopes
        .iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
