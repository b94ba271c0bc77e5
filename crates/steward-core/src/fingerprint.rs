//! Fingerprint engine for drift detection.
//!
//! The fingerprint is a SHA-256 digest over a canonical byte representation
//! of the enabled service set. Determinism is the load-bearing property:
//! identical logical intent must always hash identically regardless of the
//! order rows come back from the store, otherwise drift detection would
//! spuriously trigger.
//!
//! Canonical form: enabled services only, sorted by name ascending (names
//! are unique so the order is total), each projected to a fixed field tuple
//! and serialized as compact JSON. Struct field order pins the key order and
//! the env map is a `BTreeMap`, so the byte stream is fully determined by
//! the logical state. Volatile fields (timestamps, the enabled flag itself)
//! are deliberately excluded.

use std::collections::BTreeMap;

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::service::{ExecMode, ServiceDefinition};

/// Canonical projection of one service, in fingerprint field order.
#[derive(Serialize)]
struct CanonicalService<'a> {
    name: &'a str,
    cwd: &'a str,
    script: &'a str,
    args: Option<&'a str>,
    interpreter: Option<&'a str>,
    env: &'a BTreeMap<String, String>,
    port: Option<u16>,
    exec_mode: ExecMode,
    watch: bool,
    autorestart: bool,
}

impl<'a> CanonicalService<'a> {
    fn project(service: &'a ServiceDefinition) -> Self {
        Self {
            name: &service.name,
            cwd: &service.cwd,
            script: &service.script,
            args: service.args.as_deref(),
            interpreter: service.interpreter.as_deref(),
            env: &service.env,
            port: service.port,
            exec_mode: service.exec_mode,
            watch: service.watch,
            autorestart: service.autorestart,
        }
    }
}

/// Compute the fingerprint over the enabled subset of `services`.
///
/// Pure function: the same logical enabled set always yields the same
/// 64-character lowercase hex digest, independent of input order.
#[must_use]
pub fn fingerprint_services(services: &[ServiceDefinition]) -> String {
    let mut enabled: Vec<&ServiceDefinition> = services.iter().filter(|s| s.enabled).collect();
    enabled.sort_by(|a, b| a.name.cmp(&b.name));

    let canonical: Vec<CanonicalService<'_>> =
        enabled.iter().map(|s| CanonicalService::project(s)).collect();

    // The projection contains only strings, integers, bools and a
    // string-keyed map, so serialization cannot fail.
    let bytes = serde_json::to_vec(&canonical).expect("canonical projection serializes");

    hex::encode(Sha256::digest(&bytes))
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::service::ServiceKind;

    fn service(name: &str, port: Option<u16>) -> ServiceDefinition {
        ServiceDefinition {
            name: name.to_string(),
            kind: ServiceKind::Node,
            cwd: format!("/srv/{name}"),
            script: "index.js".to_string(),
            args: None,
            interpreter: None,
            env: BTreeMap::new(),
            port,
            exec_mode: ExecMode::Fork,
            watch: false,
            autorestart: true,
            enabled: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn identical_sets_hash_identically_in_any_order() {
        let a = service("alpha", Some(3000));
        let b = service("beta", Some(3001));
        let c = service("gamma", None);

        let forward = fingerprint_services(&[a.clone(), b.clone(), c.clone()]);
        let reversed = fingerprint_services(&[c, b, a]);
        assert_eq!(forward, reversed);
        assert_eq!(forward.len(), 64);
    }

    #[test]
    fn canonical_field_changes_move_the_hash() {
        let base = service("web", Some(3000));
        let original = fingerprint_services(std::slice::from_ref(&base));

        let mut changed = base.clone();
        changed.script = "server.js".to_string();
        assert_ne!(original, fingerprint_services(std::slice::from_ref(&changed)));

        let mut changed = base.clone();
        changed.args = Some("--verbose".to_string());
        assert_ne!(original, fingerprint_services(std::slice::from_ref(&changed)));

        let mut changed = base.clone();
        changed.env.insert("NODE_ENV".to_string(), "production".to_string());
        assert_ne!(original, fingerprint_services(std::slice::from_ref(&changed)));

        let mut changed = base.clone();
        changed.port = Some(3001);
        assert_ne!(original, fingerprint_services(std::slice::from_ref(&changed)));

        let mut changed = base.clone();
        changed.exec_mode = ExecMode::Cluster;
        assert_ne!(original, fingerprint_services(std::slice::from_ref(&changed)));
    }

    #[test]
    fn volatile_fields_do_not_move_the_hash() {
        let base = service("web", Some(3000));
        let original = fingerprint_services(std::slice::from_ref(&base));

        let mut touched = base.clone();
        touched.updated_at = Utc::now() + chrono::Duration::hours(1);
        touched.created_at = Utc::now() - chrono::Duration::days(30);
        assert_eq!(original, fingerprint_services(std::slice::from_ref(&touched)));
    }

    #[test]
    fn disabled_services_are_excluded() {
        let enabled = service("web", Some(3000));
        let mut disabled = service("worker", None);
        disabled.enabled = false;

        let with_disabled = fingerprint_services(&[enabled.clone(), disabled]);
        let without = fingerprint_services(&[enabled]);
        assert_eq!(with_disabled, without);
    }

    #[test]
    fn empty_set_has_a_stable_digest() {
        assert_eq!(fingerprint_services(&[]), fingerprint_services(&[]));
    }
}
