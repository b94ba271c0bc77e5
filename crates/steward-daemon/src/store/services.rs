//! Service intent CRUD.
//!
//! Port-collision and name validation run inside the same lock guard as the
//! subsequent write, so a single request always sees a consistent view.
//! Cross-request serializability is intentionally not guaranteed.

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};

use steward_core::service::{
    validate_service_name, ExecMode, NewService, ServiceDefinition, ServiceKind, ServicePatch,
};

use super::{Store, StoreError};

impl Store {
    /// List services sorted by name, optionally restricted to an
    /// authorization-provided allow-list of names.
    ///
    /// # Errors
    ///
    /// Returns an error on database failure or a corrupt row.
    pub fn list_services(
        &self,
        filter: Option<&[String]>,
    ) -> Result<Vec<ServiceDefinition>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT * FROM services ORDER BY name ASC")?;
        let rows = stmt.query_map([], service_from_row)?;

        let mut services = Vec::new();
        for row in rows {
            let service = row?;
            if filter.is_none_or(|names| names.contains(&service.name)) {
                services.push(service);
            }
        }
        Ok(services)
    }

    /// Fetch one service by name.
    ///
    /// # Errors
    ///
    /// Returns an error on database failure or a corrupt row.
    pub fn get_service(&self, name: &str) -> Result<Option<ServiceDefinition>, StoreError> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT * FROM services WHERE name = ?1",
            params![name],
            service_from_row,
        )
        .optional()
        .map_err(Into::into)
    }

    /// Create a service from validated intent.
    ///
    /// # Errors
    ///
    /// Rejects invalid names, duplicate names, and port collisions with
    /// currently-enabled services.
    pub fn create_service(&self, new: &NewService) -> Result<ServiceDefinition, StoreError> {
        validate_service_name(&new.name).map_err(|_| StoreError::InvalidName(new.name.clone()))?;

        let conn = self.conn()?;

        let exists: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM services WHERE name = ?1",
                params![new.name],
                |row| row.get(0),
            )
            .optional()?;
        if exists.is_some() {
            return Err(StoreError::DuplicateService(new.name.clone()));
        }

        if new.enabled {
            if let Some(port) = new.port {
                check_port_collision(&conn, port, None)?;
            }
        }

        let now = Utc::now();
        let env_json = serde_json::to_string(&new.env)
            .map_err(|e| StoreError::Corrupt(format!("env serialization: {e}")))?;

        conn.execute(
            "INSERT INTO services
                 (name, kind, cwd, script, args, interpreter, env, port,
                  exec_mode, watch, autorestart, enabled, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            params![
                new.name,
                new.kind.as_str(),
                new.cwd,
                new.script,
                new.args,
                new.interpreter,
                env_json,
                new.port,
                new.exec_mode.as_str(),
                new.watch,
                new.autorestart,
                new.enabled,
                now.to_rfc3339(),
                now.to_rfc3339(),
            ],
        )?;

        Ok(ServiceDefinition {
            name: new.name.clone(),
            kind: new.kind,
            cwd: new.cwd.clone(),
            script: new.script.clone(),
            args: new.args.clone(),
            interpreter: new.interpreter.clone(),
            env: new.env.clone(),
            port: new.port,
            exec_mode: new.exec_mode,
            watch: new.watch,
            autorestart: new.autorestart,
            enabled: new.enabled,
            created_at: now,
            updated_at: now,
        })
    }

    /// Apply a field-allow-listed patch to an existing service.
    ///
    /// If the patched state would be enabled with a port, the collision
    /// check re-runs excluding the service's own prior record.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ServiceNotFound`] for unknown names and
    /// [`StoreError::PortCollision`] naming the colliding service.
    pub fn update_service(
        &self,
        name: &str,
        patch: &ServicePatch,
    ) -> Result<ServiceDefinition, StoreError> {
        let conn = self.conn()?;

        let mut service = conn
            .query_row(
                "SELECT * FROM services WHERE name = ?1",
                params![name],
                service_from_row,
            )
            .optional()?
            .ok_or_else(|| StoreError::ServiceNotFound(name.to_string()))?;

        let desired_enabled = patch.enabled.unwrap_or(service.enabled);
        let desired_port = match patch.port {
            Some(port) => port,
            None => service.port,
        };

        if desired_enabled {
            if let Some(port) = desired_port {
                check_port_collision(&conn, port, Some(name))?;
            }
        }

        if let Some(cwd) = &patch.cwd {
            service.cwd = cwd.clone();
        }
        if let Some(script) = &patch.script {
            service.script = script.clone();
        }
        if let Some(args) = &patch.args {
            service.args = args.clone();
        }
        if let Some(env) = &patch.env {
            service.env = env.clone();
        }
        service.port = desired_port;
        service.enabled = desired_enabled;
        service.updated_at = Utc::now();

        let env_json = serde_json::to_string(&service.env)
            .map_err(|e| StoreError::Corrupt(format!("env serialization: {e}")))?;

        conn.execute(
            "UPDATE services
                SET cwd = ?2, script = ?3, args = ?4, env = ?5, port = ?6,
                    enabled = ?7, updated_at = ?8
              WHERE name = ?1",
            params![
                service.name,
                service.cwd,
                service.script,
                service.args,
                env_json,
                service.port,
                service.enabled,
                service.updated_at.to_rfc3339(),
            ],
        )?;

        Ok(service)
    }
}

/// Reject `port` when another enabled service (excluding `exclude`) holds it.
fn check_port_collision(
    conn: &Connection,
    port: u16,
    exclude: Option<&str>,
) -> Result<(), StoreError> {
    let holder: Option<String> = conn
        .query_row(
            "SELECT name FROM services
              WHERE enabled = 1 AND port = ?1 AND name != COALESCE(?2, '')",
            params![port, exclude],
            |row| row.get(0),
        )
        .optional()?;

    match holder {
        Some(name) => Err(StoreError::PortCollision { port, name }),
        None => Ok(()),
    }
}

fn service_from_row(row: &Row<'_>) -> rusqlite::Result<ServiceDefinition> {
    let kind_raw: String = row.get("kind")?;
    let kind = ServiceKind::parse(&kind_raw)
        .ok_or_else(|| corrupt(1, format!("unknown service kind '{kind_raw}'")))?;

    let exec_raw: String = row.get("exec_mode")?;
    let exec_mode = ExecMode::parse(&exec_raw)
        .ok_or_else(|| corrupt(8, format!("unknown exec mode '{exec_raw}'")))?;

    let env_json: String = row.get("env")?;
    let env = serde_json::from_str(&env_json).map_err(|e| corrupt(6, e.to_string()))?;

    Ok(ServiceDefinition {
        name: row.get("name")?,
        kind,
        cwd: row.get("cwd")?,
        script: row.get("script")?,
        args: row.get("args")?,
        interpreter: row.get("interpreter")?,
        env,
        port: row.get("port")?,
        exec_mode,
        watch: row.get("watch")?,
        autorestart: row.get("autorestart")?,
        enabled: row.get("enabled")?,
        created_at: parse_timestamp(row, "created_at", 12)?,
        updated_at: parse_timestamp(row, "updated_at", 13)?,
    })
}

pub(crate) fn parse_timestamp(
    row: &Row<'_>,
    column: &str,
    index: usize,
) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(column)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| corrupt(index, e.to_string()))
}

pub(crate) fn corrupt(index: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        index,
        Type::Text,
        Box::new(std::io::Error::other(message)),
    )
}
