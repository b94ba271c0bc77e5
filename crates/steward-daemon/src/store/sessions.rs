//! Session rows, token-hash indexed.
//!
//! Only the SHA-256 of the bearer token is persisted; the raw token lives
//! solely in the caller's cookie. Expiry is a sliding window refreshed on
//! each successful lookup; expired rows are treated as absent and deleted
//! lazily on the lookup that finds them.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};

use super::{Store, StoreError, UserRecord};

impl Store {
    /// Persist a new session.
    ///
    /// # Errors
    ///
    /// Returns an error on database failure.
    pub fn create_session(
        &self,
        token_hash: &str,
        user_id: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT OR REPLACE INTO sessions (token_hash, user_id, expires_at)
             VALUES (?1, ?2, ?3)",
            params![token_hash, user_id, expires_at.to_rfc3339()],
        )?;
        Ok(())
    }

    /// Resolve a session token hash to its user, sliding the expiry forward
    /// to `refreshed_expiry` on success.
    ///
    /// Returns `None` for unknown or expired sessions; an expired row is
    /// deleted on the way out.
    ///
    /// # Errors
    ///
    /// Returns an error on database failure or a corrupt user row.
    pub fn resolve_session(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
        refreshed_expiry: DateTime<Utc>,
    ) -> Result<Option<UserRecord>, StoreError> {
        let found: Option<(String, String)> = {
            let conn = self.conn()?;
            conn.query_row(
                "SELECT user_id, expires_at FROM sessions WHERE token_hash = ?1",
                params![token_hash],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?
        };

        let Some((user_id, expires_raw)) = found else {
            return Ok(None);
        };

        let expires_at = DateTime::parse_from_rfc3339(&expires_raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| StoreError::Corrupt(format!("session expiry: {e}")))?;

        if expires_at <= now {
            self.delete_session(token_hash)?;
            return Ok(None);
        }

        {
            let conn = self.conn()?;
            conn.execute(
                "UPDATE sessions SET expires_at = ?2 WHERE token_hash = ?1",
                params![token_hash, refreshed_expiry.to_rfc3339()],
            )?;
        }

        self.get_user(&user_id)
    }

    /// Delete a session row. Missing rows are not an error.
    ///
    /// # Errors
    ///
    /// Returns an error on database failure.
    pub fn delete_session(&self, token_hash: &str) -> Result<(), StoreError> {
        let conn = self.conn()?;
        conn.execute(
            "DELETE FROM sessions WHERE token_hash = ?1",
            params![token_hash],
        )?;
        Ok(())
    }
}
