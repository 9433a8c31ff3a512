//! Service error types.
//!
//! [`ServiceError`] is the unified error type for all service operations.
//! Lower-level errors are mapped onto four categories the way an API would
//! map them onto status codes; [`ErrorDetail`] is the structured form front
//! ends print.

use serde::Serialize;

use vartrace_check::CheckError;
use vartrace_core::CoreError;
use vartrace_instrument::InstrumentError;
use vartrace_runner::RunnerError;
use vartrace_storage::StorageError;

/// Structured error detail for machine-readable output.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "NOT_FOUND", "BAD_REQUEST").
    pub code: String,
    /// Human-readable error message.
    pub message: String,
}

/// Errors returned by [`TraceService`](crate::service::TraceService).
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// A program or artifact does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The request is invalid.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// The request clashes with existing state (duplicate id, run in progress).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Storage, process or other infrastructure failure.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::NotFound(_) => "NOT_FOUND",
            ServiceError::BadRequest(_) => "BAD_REQUEST",
            ServiceError::Conflict(_) => "CONFLICT",
            ServiceError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn detail(&self) -> ErrorDetail {
        let message = match self {
            ServiceError::NotFound(msg)
            | ServiceError::BadRequest(msg)
            | ServiceError::Conflict(msg)
            | ServiceError::Internal(msg) => msg.clone(),
        };
        ErrorDetail {
            code: self.code().to_string(),
            message,
        }
    }
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        match &err {
            StorageError::NotFound(_) => ServiceError::NotFound(err.to_string()),
            StorageError::InvalidKey { .. } => ServiceError::BadRequest(err.to_string()),
            StorageError::Io { .. } => ServiceError::Internal(err.to_string()),
        }
    }
}

impl From<InstrumentError> for ServiceError {
    fn from(err: InstrumentError) -> Self {
        ServiceError::BadRequest(err.to_string())
    }
}

impl From<CoreError> for ServiceError {
    fn from(err: CoreError) -> Self {
        ServiceError::BadRequest(err.to_string())
    }
}

impl From<RunnerError> for ServiceError {
    fn from(err: RunnerError) -> Self {
        ServiceError::Internal(err.to_string())
    }
}

impl From<CheckError> for ServiceError {
    fn from(err: CheckError) -> Self {
        match err {
            CheckError::Value(inner) => ServiceError::from(inner),
            other => ServiceError::Internal(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for ServiceError {
    fn from(err: serde_json::Error) -> Self {
        ServiceError::Internal(format!("serialization error: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vartrace_storage::{ArtifactKey, ArtifactKind};

    #[test]
    fn storage_errors_map_by_kind() {
        let missing = StorageError::NotFound(ArtifactKey::new("42", ArtifactKind::Source));
        assert!(matches!(ServiceError::from(missing), ServiceError::NotFound(_)));
        let io = StorageError::Io {
            path: "x".into(),
            source: std::io::Error::other("disk"),
        };
        assert_eq!(ServiceError::from(io).code(), "INTERNAL_ERROR");
    }

    #[test]
    fn instrumentation_errors_are_bad_requests() {
        let err = ServiceError::from(InstrumentError::EntryPointNotFound);
        let detail = err.detail();
        assert_eq!(detail.code, "BAD_REQUEST");
        assert!(detail.message.contains("entry point"));
    }
}
