//! User records and the last-admin invariant.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};
use uuid::Uuid;

use steward_core::rbac::Role;

use super::services::{corrupt, parse_timestamp};
use super::{Store, StoreError};

/// A stored user. The password hash is salted and never recoverable.
#[derive(Debug, Clone)]
pub struct UserRecord {
    /// Stable identifier.
    pub id: String,
    /// Unique username.
    pub username: String,
    /// Salted password hash, `salt_hex$digest_hex`.
    pub password_hash: String,
    /// Exactly one role.
    pub role: Role,
    /// Service scope allow-list; empty means unrestricted.
    pub service_scopes: Vec<String>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

/// Partial update to a user. `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct UserUpdate {
    pub username: Option<String>,
    pub password_hash: Option<String>,
    pub role: Option<Role>,
    pub service_scopes: Option<Vec<String>>,
}

impl Store {
    /// Number of users in the system.
    ///
    /// # Errors
    ///
    /// Returns an error on database failure.
    pub fn count_users(&self) -> Result<u64, StoreError> {
        let conn = self.conn()?;
        let count: u64 = conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
        Ok(count)
    }

    /// List users sorted by username.
    ///
    /// # Errors
    ///
    /// Returns an error on database failure or a corrupt row.
    pub fn list_users(&self) -> Result<Vec<UserRecord>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT * FROM users ORDER BY username ASC")?;
        let rows = stmt.query_map([], user_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Fetch one user by id.
    ///
    /// # Errors
    ///
    /// Returns an error on database failure or a corrupt row.
    pub fn get_user(&self, id: &str) -> Result<Option<UserRecord>, StoreError> {
        let conn = self.conn()?;
        conn.query_row("SELECT * FROM users WHERE id = ?1", params![id], user_from_row)
            .optional()
            .map_err(Into::into)
    }

    /// Fetch one user by username.
    ///
    /// # Errors
    ///
    /// Returns an error on database failure or a corrupt row.
    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRecord>, StoreError> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT * FROM users WHERE username = ?1",
            params![username],
            user_from_row,
        )
        .optional()
        .map_err(Into::into)
    }

    /// Create a user.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DuplicateUsername`] when the username is taken.
    pub fn create_user(
        &self,
        username: &str,
        password_hash: &str,
        role: Role,
        service_scopes: &[String],
    ) -> Result<UserRecord, StoreError> {
        let conn = self.conn()?;

        let exists: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM users WHERE username = ?1",
                params![username],
                |row| row.get(0),
            )
            .optional()?;
        if exists.is_some() {
            return Err(StoreError::DuplicateUsername(username.to_string()));
        }

        let record = UserRecord {
            id: Uuid::new_v4().to_string(),
            username: username.to_string(),
            password_hash: password_hash.to_string(),
            role,
            service_scopes: service_scopes.to_vec(),
            created_at: Utc::now(),
        };

        let scopes_json = serde_json::to_string(&record.service_scopes)
            .map_err(|e| StoreError::Corrupt(format!("scope serialization: {e}")))?;

        conn.execute(
            "INSERT INTO users (id, username, password_hash, role, service_scopes, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                record.id,
                record.username,
                record.password_hash,
                record.role.as_str(),
                scopes_json,
                record.created_at.to_rfc3339(),
            ],
        )?;

        Ok(record)
    }

    /// Apply a partial update to a user.
    ///
    /// Demoting the sole remaining admin is rejected so the system never
    /// loses its last admin.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::UserNotFound`], [`StoreError::DuplicateUsername`]
    /// or [`StoreError::LastAdmin`] on invariant violations.
    pub fn update_user(&self, id: &str, update: &UserUpdate) -> Result<UserRecord, StoreError> {
        let conn = self.conn()?;

        let mut user = conn
            .query_row("SELECT * FROM users WHERE id = ?1", params![id], user_from_row)
            .optional()?
            .ok_or_else(|| StoreError::UserNotFound(id.to_string()))?;

        if let Some(username) = &update.username {
            if *username != user.username {
                let exists: Option<i64> = conn
                    .query_row(
                        "SELECT 1 FROM users WHERE username = ?1",
                        params![username],
                        |row| row.get(0),
                    )
                    .optional()?;
                if exists.is_some() {
                    return Err(StoreError::DuplicateUsername(username.clone()));
                }
                user.username = username.clone();
            }
        }

        if let Some(role) = update.role {
            if user.role == Role::Admin && role != Role::Admin {
                let other_admins: u64 = conn.query_row(
                    "SELECT COUNT(*) FROM users WHERE role = 'admin' AND id != ?1",
                    params![id],
                    |row| row.get(0),
                )?;
                if other_admins == 0 {
                    return Err(StoreError::LastAdmin);
                }
            }
            user.role = role;
        }

        if let Some(scopes) = &update.service_scopes {
            user.service_scopes = scopes.clone();
        }
        if let Some(password_hash) = &update.password_hash {
            user.password_hash = password_hash.clone();
        }

        let scopes_json = serde_json::to_string(&user.service_scopes)
            .map_err(|e| StoreError::Corrupt(format!("scope serialization: {e}")))?;

        conn.execute(
            "UPDATE users
                SET username = ?2, password_hash = ?3, role = ?4, service_scopes = ?5
              WHERE id = ?1",
            params![
                user.id,
                user.username,
                user.password_hash,
                user.role.as_str(),
                scopes_json,
            ],
        )?;

        Ok(user)
    }
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<UserRecord> {
    let role_raw: String = row.get("role")?;
    let role =
        Role::parse(&role_raw).ok_or_else(|| corrupt(3, format!("unknown role '{role_raw}'")))?;

    let scopes_json: String = row.get("service_scopes")?;
    let service_scopes =
        serde_json::from_str(&scopes_json).map_err(|e| corrupt(4, e.to_string()))?;

    Ok(UserRecord {
        id: row.get("id")?,
        username: row.get("username")?,
        password_hash: row.get("password_hash")?,
        role,
        service_scopes,
        created_at: parse_timestamp(row, "created_at", 5)?,
    })
}
