//! steward-core - Domain logic for the steward control plane.
//!
//! This crate holds everything that does not depend on the store or the HTTP
//! surface: the service intent model and its validation rules, the
//! fingerprint engine used for drift detection, the role/permission model,
//! deterministic ecosystem artifact generation, and the typed client for the
//! external process supervisor CLI.

pub mod ecosystem;
pub mod fingerprint;
pub mod rbac;
pub mod service;
pub mod supervisor;
