//! Durable state backed by `SQLite`.
//!
//! One connection guarded by a mutex, shared by all collections: service
//! definitions, the settings singleton, users, sessions and metric samples.
//! Critical sections are short; the single-operator cadence of this control
//! plane does not need more. Domain invariants (port uniqueness, username
//! uniqueness, last-admin) are enforced here so every caller gets them.

mod metrics;
mod services;
mod sessions;
mod settings;
mod users;

pub use metrics::MetricSample;
pub use settings::{Settings, DEFAULT_ECOSYSTEM_PATH};
pub use users::{UserRecord, UserUpdate};

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::Connection;
use thiserror::Error;

/// Errors from store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying database failure.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// The connection mutex was poisoned by a panicking holder.
    #[error("store lock poisoned")]
    LockPoisoned,

    /// A persisted row failed to decode.
    #[error("corrupt row: {0}")]
    Corrupt(String),

    /// Service name fails the safe-character validation.
    #[error("invalid service name '{0}': only letters, digits, '.', '_' and '-' are allowed")]
    InvalidName(String),

    /// The port is already used by another enabled service.
    #[error("port {port} is already used by service '{name}'")]
    PortCollision {
        /// The contested port.
        port: u16,
        /// The enabled service already holding it.
        name: String,
    },

    /// A service with this name already exists.
    #[error("service '{0}' already exists")]
    DuplicateService(String),

    /// The addressed service does not exist.
    #[error("service '{0}' not found")]
    ServiceNotFound(String),

    /// A user with this username already exists.
    #[error("username '{0}' already exists")]
    DuplicateUsername(String),

    /// The addressed user does not exist.
    #[error("user '{0}' not found")]
    UserNotFound(String),

    /// Demoting this user would leave the system without an admin.
    #[error("at least one admin must remain")]
    LastAdmin,
}

/// Handle to the durable store. Cheap to clone; all clones share one
/// connection.
#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

impl Store {
    /// Open (or create) the database at `path` and ensure the schema.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or schema creation
    /// fails.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    /// Open an in-memory database. Used by tests.
    ///
    /// # Errors
    ///
    /// Returns an error if schema creation fails.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Lock the shared connection.
    pub(crate) fn conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::LockPoisoned)
    }
}

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS services (
    name         TEXT PRIMARY KEY,
    kind         TEXT NOT NULL,
    cwd          TEXT NOT NULL,
    script       TEXT NOT NULL,
    args         TEXT,
    interpreter  TEXT,
    env          TEXT NOT NULL DEFAULT '{}',
    port         INTEGER,
    exec_mode    TEXT NOT NULL DEFAULT 'fork',
    watch        INTEGER NOT NULL DEFAULT 0,
    autorestart  INTEGER NOT NULL DEFAULT 1,
    enabled      INTEGER NOT NULL DEFAULT 1,
    created_at   TEXT NOT NULL,
    updated_at   TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS settings (
    id                 INTEGER PRIMARY KEY CHECK (id = 1),
    ecosystem_path     TEXT NOT NULL,
    last_applied_hash  TEXT,
    read_only          INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS users (
    id              TEXT PRIMARY KEY,
    username        TEXT NOT NULL UNIQUE,
    password_hash   TEXT NOT NULL,
    role            TEXT NOT NULL,
    service_scopes  TEXT NOT NULL DEFAULT '[]',
    created_at      TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS sessions (
    token_hash  TEXT PRIMARY KEY,
    user_id     TEXT NOT NULL REFERENCES users(id),
    expires_at  TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_sessions_expires ON sessions(expires_at);

CREATE TABLE IF NOT EXISTS metric_samples (
    ts      INTEGER NOT NULL,
    cpu     REAL NOT NULL,
    memory  REAL NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_metric_samples_ts ON metric_samples(ts);
";
