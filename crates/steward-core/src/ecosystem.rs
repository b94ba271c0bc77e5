//! Ecosystem artifact generation.
//!
//! The artifact is the supervisor-facing configuration file regenerated on
//! every apply. Generation is deterministic: the same enabled intent snapshot
//! must produce byte-identical output, so applies are auditable by diffing
//! the file. Apps are sorted by name and env maps are ordered, which pins
//! the byte stream to the logical state.

use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;

use crate::service::{ExecMode, ServiceDefinition, ServiceKind};

/// Header prepended to every generated artifact.
pub const ARTIFACT_HEADER: &str =
    "# Managed by steward. Regenerated on every apply; manual edits are overwritten.\n";

/// Minimal valid artifact used when the configured path does not exist yet.
pub const ARTIFACT_PLACEHOLDER: &str = "apps = []\n";

/// Errors that can occur while rendering the artifact.
#[derive(Debug, Error)]
pub enum ArtifactError {
    /// TOML serialization failed.
    #[error("failed to serialize ecosystem artifact: {0}")]
    Serialize(#[from] toml::ser::Error),
}

#[derive(Serialize)]
struct Artifact<'a> {
    apps: Vec<ArtifactApp<'a>>,
}

/// One `[[apps]]` entry. Env is declared last so scalar keys precede the
/// `[apps.env]` sub-table in the rendered TOML.
#[derive(Serialize)]
struct ArtifactApp<'a> {
    name: &'a str,
    kind: ServiceKind,
    cwd: &'a str,
    script: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    args: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    interpreter: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    port: Option<u16>,
    exec_mode: ExecMode,
    watch: bool,
    autorestart: bool,
    env: &'a BTreeMap<String, String>,
}

/// Render the artifact contents for the enabled subset of `services`.
///
/// # Errors
///
/// Returns [`ArtifactError::Serialize`] if TOML serialization fails.
pub fn render_artifact(services: &[ServiceDefinition]) -> Result<String, ArtifactError> {
    let mut enabled: Vec<&ServiceDefinition> = services.iter().filter(|s| s.enabled).collect();
    enabled.sort_by(|a, b| a.name.cmp(&b.name));

    let artifact = Artifact {
        apps: enabled
            .iter()
            .map(|s| ArtifactApp {
                name: &s.name,
                kind: s.kind,
                cwd: &s.cwd,
                script: &s.script,
                args: s.args.as_deref(),
                interpreter: s.interpreter.as_deref(),
                port: s.port,
                exec_mode: s.exec_mode,
                watch: s.watch,
                autorestart: s.autorestart,
                env: &s.env,
            })
            .collect(),
    };

    let body = toml::to_string_pretty(&artifact)?;
    Ok(format!("{ARTIFACT_HEADER}{body}"))
}
