//! Shared fixtures for daemon integration tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;

use steward_core::rbac::{AuthUser, Role};
use steward_core::service::NewService;
use steward_core::supervisor::{ProcessStatus, SupervisorControl, SupervisorError};
use steward_daemon::store::Store;

/// In-memory supervisor double. Records every invocation and can be told to
/// fail reloads or individual names.
#[derive(Default)]
pub struct FakeSupervisor {
    /// When true, `reload` fails with a captured diagnostic.
    pub fail_reload: bool,
    /// Names whose start/stop/restart commands fail.
    pub fail_names: Vec<String>,
    /// Listing returned by `list`.
    pub processes: Vec<ProcessStatus>,
    /// Every invocation, as `"<command> <args...>"`.
    pub calls: Mutex<Vec<String>>,
}

impl FakeSupervisor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_reload() -> Self {
        Self {
            fail_reload: true,
            ..Self::default()
        }
    }

    pub fn failing_names(names: &[&str]) -> Self {
        Self {
            fail_names: names.iter().map(ToString::to_string).collect(),
            ..Self::default()
        }
    }

    pub fn recorded_calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn check_name(&self, command: &str, name: &str) -> Result<String, SupervisorError> {
        if self.fail_names.iter().any(|n| n == name) {
            Err(SupervisorError::CommandFailed {
                output: format!("process {name} not found"),
            })
        } else {
            Ok(format!("{command} {name}: ok"))
        }
    }
}

#[async_trait]
impl SupervisorControl for FakeSupervisor {
    async fn list(&self) -> Result<Vec<ProcessStatus>, SupervisorError> {
        self.record("jlist".to_string());
        Ok(self.processes.clone())
    }

    async fn start_only(&self, artifact: &Path, name: &str) -> Result<String, SupervisorError> {
        self.record(format!("start {} --only {name}", artifact.display()));
        self.check_name("start", name)
    }

    async fn stop(&self, name: &str) -> Result<String, SupervisorError> {
        self.record(format!("stop {name}"));
        self.check_name("stop", name)
    }

    async fn restart(&self, name: &str) -> Result<String, SupervisorError> {
        self.record(format!("restart {name}"));
        self.check_name("restart", name)
    }

    async fn reload(&self, artifact: &Path) -> Result<String, SupervisorError> {
        self.record(format!("reload {}", artifact.display()));
        if self.fail_reload {
            Err(SupervisorError::CommandFailed {
                output: "reload failed: ecosystem parse error".to_string(),
            })
        } else {
            Ok("reloaded".to_string())
        }
    }

    async fn logs(&self, name: &str, lines: u32) -> Result<String, SupervisorError> {
        self.record(format!("logs {name} --lines {lines}"));
        Ok(format!("last {lines} lines of {name}"))
    }
}

/// A user with the given role and scope list, bypassing session plumbing.
pub fn auth_user(role: Role, scopes: &[&str]) -> AuthUser {
    AuthUser {
        id: format!("test-{}", role.as_str()),
        username: format!("{}-user", role.as_str()),
        role,
        service_scopes: scopes.iter().map(ToString::to_string).collect(),
    }
}

pub fn admin() -> AuthUser {
    auth_user(Role::Admin, &[])
}

/// Minimal valid creation request.
pub fn new_service(name: &str, port: Option<u16>) -> NewService {
    serde_json::from_value(serde_json::json!({
        "name": name,
        "kind": "node",
        "cwd": format!("/srv/{name}"),
        "script": "index.js",
        "port": port,
    }))
    .unwrap()
}

/// Fresh in-memory store whose artifact path points into `dir`.
pub fn store_with_artifact(dir: &tempfile::TempDir) -> (Store, PathBuf) {
    let store = Store::open_in_memory().unwrap();
    let artifact = dir.path().join("ecosystem.toml");

    let mut settings = store.settings().unwrap();
    settings.ecosystem_path.clone_from(&artifact);
    store.save_settings(&settings).unwrap();

    (store, artifact)
}

/// Flip the global read-only flag.
pub fn set_read_only(store: &Store, read_only: bool) {
    let mut settings = store.settings().unwrap();
    settings.read_only = read_only;
    store.save_settings(&settings).unwrap();
}
