//! Typed client for the external process supervisor CLI.
//!
//! The supervisor is an external executable controlled through subcommands:
//! `jlist` (structured JSON listing), `start <artifact> --only <name>`,
//! `stop <name>`, `restart <name>`, `reload <artifact>`, and
//! `logs <name> --lines <n> --nostream`. This module wraps those behind the
//! narrow [`SupervisorControl`] trait so callers never build command lines
//! themselves.
//!
//! Invocations use argument arrays, never shell interpolation, and service
//! names are validated against the safe character class before they reach
//! the argument list. Every invocation is bounded by a timeout; exceeding it
//! is a recoverable failure surfaced to the caller, never retried here.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::process::Command;

/// Default bound on a single supervisor invocation.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors from supervisor invocations.
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// The supervisor binary could not be spawned.
    #[error("failed to invoke supervisor: {0}")]
    Spawn(#[from] std::io::Error),

    /// The invocation exceeded the configured timeout.
    #[error("supervisor command timed out after {timeout_secs}s")]
    Timeout {
        /// The timeout that was exceeded, in seconds.
        timeout_secs: u64,
    },

    /// The supervisor exited non-zero. The captured stderr (or stdout when
    /// stderr is empty) is surfaced verbatim for operator diagnosis.
    #[error("supervisor command failed: {output}")]
    CommandFailed {
        /// Captured diagnostic output.
        output: String,
    },

    /// The listing output was not valid JSON of the expected shape.
    #[error("failed to parse supervisor listing: {0}")]
    Parse(String),
}

/// Process state as reported by the supervisor listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessState {
    Online,
    Launching,
    Stopping,
    Stopped,
    Errored,
    /// Any state this client does not know about.
    #[serde(other)]
    Unknown,
}

/// One process entry from the supervisor's JSON listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessStatus {
    /// Process name, matching the service name it was started as.
    pub name: String,
    /// OS pid when running.
    #[serde(default)]
    pub pid: Option<u32>,
    /// Current state.
    pub status: ProcessState,
    /// CPU usage percentage.
    #[serde(default)]
    pub cpu: f64,
    /// Resident memory in bytes.
    #[serde(default)]
    pub memory: u64,
    /// Restart counter since the process was first started.
    #[serde(default)]
    pub restarts: u32,
    /// Start timestamp, epoch milliseconds.
    #[serde(default)]
    pub started_at: Option<i64>,
    /// Interpreter in use, if any.
    #[serde(default)]
    pub interpreter: Option<String>,
    /// Working directory.
    #[serde(default)]
    pub cwd: Option<String>,
    /// Exec path.
    #[serde(default)]
    pub script: Option<String>,
    /// Arguments the process was started with.
    #[serde(default)]
    pub args: Vec<String>,
    /// Environment as reported by the supervisor.
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

/// Narrow control interface over the supervisor.
///
/// The daemon's orchestrator and control gateway depend on this trait, not
/// on the concrete CLI, so tests can substitute an in-memory fake.
#[async_trait]
pub trait SupervisorControl: Send + Sync {
    /// Structured listing of every supervised process.
    async fn list(&self) -> Result<Vec<ProcessStatus>, SupervisorError>;

    /// Start exactly one named process using `artifact` as the definition
    /// source. Never starts unscoped.
    async fn start_only(&self, artifact: &Path, name: &str) -> Result<String, SupervisorError>;

    /// Stop the named process.
    async fn stop(&self, name: &str) -> Result<String, SupervisorError>;

    /// Restart the named process.
    async fn restart(&self, name: &str) -> Result<String, SupervisorError>;

    /// Reload the full process set from `artifact`.
    async fn reload(&self, artifact: &Path) -> Result<String, SupervisorError>;

    /// Fetch the last `lines` log lines for the named process.
    async fn logs(&self, name: &str, lines: u32) -> Result<String, SupervisorError>;
}

/// [`SupervisorControl`] implementation that shells out to the configured
/// supervisor binary.
#[derive(Debug, Clone)]
pub struct CliSupervisor {
    program: PathBuf,
    timeout: Duration,
}

impl CliSupervisor {
    /// Create a client for the given supervisor binary with the default
    /// timeout.
    #[must_use]
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }

    /// Override the per-invocation timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Run the supervisor with the given argument array and capture stdout.
    async fn run(&self, args: &[&str]) -> Result<String, SupervisorError> {
        let mut cmd = Command::new(&self.program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = tokio::time::timeout(self.timeout, cmd.output())
            .await
            .map_err(|_| SupervisorError::Timeout {
                timeout_secs: self.timeout.as_secs(),
            })??;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let diagnostic = if stderr.is_empty() {
                String::from_utf8_lossy(&output.stdout).trim().to_string()
            } else {
                stderr
            };
            return Err(SupervisorError::CommandFailed { output: diagnostic });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl SupervisorControl for CliSupervisor {
    async fn list(&self) -> Result<Vec<ProcessStatus>, SupervisorError> {
        let stdout = self.run(&["jlist"]).await?;
        serde_json::from_str(&stdout).map_err(|e| SupervisorError::Parse(e.to_string()))
    }

    async fn start_only(&self, artifact: &Path, name: &str) -> Result<String, SupervisorError> {
        let artifact = artifact.to_string_lossy();
        self.run(&["start", &artifact, "--only", name]).await
    }

    async fn stop(&self, name: &str) -> Result<String, SupervisorError> {
        self.run(&["stop", name]).await
    }

    async fn restart(&self, name: &str) -> Result<String, SupervisorError> {
        self.run(&["restart", name]).await
    }

    async fn reload(&self, artifact: &Path) -> Result<String, SupervisorError> {
        let artifact = artifact.to_string_lossy();
        self.run(&["reload", &artifact]).await
    }

    async fn logs(&self, name: &str, lines: u32) -> Result<String, SupervisorError> {
        let lines = lines.to_string();
        self.run(&["logs", name, "--lines", &lines, "--nostream"])
            .await
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    /// Write an executable shell script into `dir` and return its path.
    #[cfg(unix)]
    fn fake_supervisor(dir: &tempfile::TempDir, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.path().join("fake-supervisor");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "#!/bin/sh\n{body}").unwrap();
        let mut perms = file.metadata().unwrap().permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&path, perms).unwrap();
        path
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn run_captures_stdout() {
        let dir = tempfile::tempdir().unwrap();
        let bin = fake_supervisor(&dir, r#"echo "$@""#);
        let client = CliSupervisor::new(bin);

        let output = client.stop("web").await.unwrap();
        assert_eq!(output.trim(), "stop web");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn start_is_scoped_to_one_name() {
        let dir = tempfile::tempdir().unwrap();
        let bin = fake_supervisor(&dir, r#"echo "$@""#);
        let client = CliSupervisor::new(bin);

        let output = client
            .start_only(Path::new("/tmp/eco.toml"), "web")
            .await
            .unwrap();
        assert_eq!(output.trim(), "start /tmp/eco.toml --only web");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn non_zero_exit_surfaces_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let bin = fake_supervisor(&dir, "echo boom >&2\nexit 1");
        let client = CliSupervisor::new(bin);

        let err = client.restart("web").await.unwrap_err();
        match err {
            SupervisorError::CommandFailed { output } => assert_eq!(output, "boom"),
            other => panic!("expected CommandFailed, got {other:?}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn slow_command_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let bin = fake_supervisor(&dir, "sleep 5");
        let client = CliSupervisor::new(bin).with_timeout(Duration::from_millis(100));

        let err = client.stop("web").await.unwrap_err();
        assert!(matches!(err, SupervisorError::Timeout { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn list_parses_the_json_listing() {
        let listing = r#"[{"name":"web","pid":4242,"status":"online","cpu":1.5,"memory":104857600,"restarts":2,"started_at":1700000000000,"interpreter":"node","cwd":"/srv/web","script":"index.js","args":["--cluster"],"env":{"NODE_ENV":"production"}}]"#;
        let dir = tempfile::tempdir().unwrap();
        let bin = fake_supervisor(&dir, &format!("echo '{listing}'"));
        let client = CliSupervisor::new(bin);

        let processes = client.list().await.unwrap();
        assert_eq!(processes.len(), 1);
        let web = &processes[0];
        assert_eq!(web.name, "web");
        assert_eq!(web.pid, Some(4242));
        assert_eq!(web.status, ProcessState::Online);
        assert_eq!(web.restarts, 2);
        assert_eq!(web.env.get("NODE_ENV").map(String::as_str), Some("production"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn unknown_states_parse_as_unknown() {
        let listing = r#"[{"name":"web","status":"one-launch-status"}]"#;
        let dir = tempfile::tempdir().unwrap();
        let bin = fake_supervisor(&dir, &format!("echo '{listing}'"));
        let client = CliSupervisor::new(bin);

        let processes = client.list().await.unwrap();
        assert_eq!(processes[0].status, ProcessState::Unknown);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn malformed_listing_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let bin = fake_supervisor(&dir, "echo not-json");
        let client = CliSupervisor::new(bin);

        let err = client.list().await.unwrap_err();
        assert!(matches!(err, SupervisorError::Parse(_)));
    }
}
