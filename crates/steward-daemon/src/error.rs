//! Request error taxonomy and HTTP status mapping.
//!
//! Every operation in the daemon returns [`ApiError`] on failure. Validation
//! and authorization failures are detected before any mutation and
//! short-circuit with no side effects; external command failures surface
//! their diagnostic text verbatim so the operator can act on it.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::path::PathBuf;
use thiserror::Error;

use steward_core::supervisor::SupervisorError;

use crate::store::StoreError;

/// Unified request error.
#[derive(Debug, Error)]
pub enum ApiError {
    /// No session, or the session is expired.
    #[error("Unauthorized")]
    Unauthorized,

    /// The caller lacks the required permission or service scope.
    #[error("Forbidden")]
    Forbidden,

    /// The global read-only lock rejected a mutating operation.
    #[error("Read-only mode enabled")]
    ReadOnly,

    /// A request failed shape or invariant validation.
    #[error("{0}")]
    Validation(String),

    /// The addressed service or user does not exist.
    #[error("{0}")]
    NotFound(String),

    /// A uniqueness or role invariant was violated.
    #[error("{0}")]
    Conflict(String),

    /// The external supervisor invocation failed.
    #[error(transparent)]
    Supervisor(#[from] SupervisorError),

    /// The ecosystem artifact could not be written.
    #[error("failed to write ecosystem artifact at {path}: {source}")]
    Artifact {
        /// Configured artifact path.
        path: PathBuf,
        /// Underlying I/O failure.
        source: std::io::Error,
    },

    /// Anything else: database failures, corrupt rows, poisoned locks.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// The HTTP status this error maps to.
    ///
    /// Port collisions deliberately land in the 400 validation family
    /// (named-conflict message, status 400); duplicate usernames and the
    /// last-admin invariant are 409 conflicts.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden | Self::ReadOnly => StatusCode::FORBIDDEN,
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Supervisor(_) | Self::Artifact { .. } | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::InvalidName(_) | StoreError::PortCollision { .. } => {
                Self::Validation(err.to_string())
            },
            StoreError::DuplicateService(_)
            | StoreError::DuplicateUsername(_)
            | StoreError::LastAdmin => Self::Conflict(err.to_string()),
            StoreError::ServiceNotFound(_) | StoreError::UserNotFound(_) => {
                Self::NotFound(err.to_string())
            },
            StoreError::Database(_) | StoreError::LockPoisoned | StoreError::Corrupt(_) => {
                Self::Internal(err.to_string())
            },
        }
    }
}
