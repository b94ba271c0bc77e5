//! Control-plane settings singleton.
//!
//! Lazily created with defaults on first read. Fetched at the start of each
//! request path and passed down; never cached process-wide, so concurrent
//! handlers never share hidden mutable state.

use std::path::PathBuf;

use rusqlite::{params, OptionalExtension};
use serde::Serialize;

use super::{Store, StoreError};

/// Default location of the generated ecosystem artifact.
pub const DEFAULT_ECOSYSTEM_PATH: &str = "/var/lib/steward/ecosystem.toml";

/// Process-wide control-plane state.
#[derive(Debug, Clone, Serialize)]
pub struct Settings {
    /// Absolute path of the generated ecosystem artifact.
    pub ecosystem_path: PathBuf,
    /// Fingerprint recorded by the last successful apply, if any.
    pub last_applied_hash: Option<String>,
    /// Global soft write lock.
    pub read_only: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            ecosystem_path: PathBuf::from(DEFAULT_ECOSYSTEM_PATH),
            last_applied_hash: None,
            read_only: false,
        }
    }
}

impl Store {
    /// Fetch the settings row, creating it with defaults if absent.
    ///
    /// # Errors
    ///
    /// Returns an error on database failure.
    pub fn settings(&self) -> Result<Settings, StoreError> {
        let conn = self.conn()?;

        let existing = conn
            .query_row(
                "SELECT ecosystem_path, last_applied_hash, read_only FROM settings WHERE id = 1",
                [],
                |row| {
                    Ok(Settings {
                        ecosystem_path: PathBuf::from(row.get::<_, String>(0)?),
                        last_applied_hash: row.get(1)?,
                        read_only: row.get(2)?,
                    })
                },
            )
            .optional()?;

        if let Some(settings) = existing {
            return Ok(settings);
        }

        let defaults = Settings::default();
        conn.execute(
            "INSERT INTO settings (id, ecosystem_path, last_applied_hash, read_only)
             VALUES (1, ?1, NULL, 0)",
            params![defaults.ecosystem_path.to_string_lossy()],
        )?;
        Ok(defaults)
    }

    /// Persist the full settings row.
    ///
    /// # Errors
    ///
    /// Returns an error on database failure.
    pub fn save_settings(&self, settings: &Settings) -> Result<(), StoreError> {
        // Guarantee the row exists before updating it.
        drop(self.settings()?);

        let conn = self.conn()?;
        conn.execute(
            "UPDATE settings
                SET ecosystem_path = ?1, last_applied_hash = ?2, read_only = ?3
              WHERE id = 1",
            params![
                settings.ecosystem_path.to_string_lossy(),
                settings.last_applied_hash,
                settings.read_only,
            ],
        )?;
        Ok(())
    }

    /// Record the fingerprint of a successful apply.
    ///
    /// # Errors
    ///
    /// Returns an error on database failure.
    pub fn set_last_applied_hash(&self, hash: &str) -> Result<(), StoreError> {
        drop(self.settings()?);

        let conn = self.conn()?;
        conn.execute(
            "UPDATE settings SET last_applied_hash = ?1 WHERE id = 1",
            params![hash],
        )?;
        Ok(())
    }
}
