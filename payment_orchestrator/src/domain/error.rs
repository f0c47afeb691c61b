//! The error taxonomy shared by every use case (spec §7). Grounded in
//! the teacher's per-service `TransactionError`/`WalletError` enums,
//! widened to a single shared kind set since this orchestrator has one
//! process instead of two services each with their own narrower error
//! type.

use thiserror::Error;

/// Kinds, not wire codes: every use case returns one of these, and the
/// API layer is the only place that knows how to turn a kind into a
/// status code or RPC error code.
#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("unauthenticated")]
    Unauthenticated,

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("failed precondition: {0}")]
    FailedPrecondition(String),

    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),

    #[error("deadline exceeded")]
    DeadlineExceeded,

    #[error("unavailable: {0}")]
    Unavailable(String),

    #[error("declined: {code} {text}")]
    Declined { code: String, text: String },

    #[error("internal error: {0}")]
    Internal(String),
}

impl OrchestratorError {
    pub fn repository(e: impl std::fmt::Display) -> Self {
        OrchestratorError::Internal(format!("repository error: {e}"))
    }
}

impl From<sqlx::Error> for OrchestratorError {
    fn from(e: sqlx::Error) -> Self {
        OrchestratorError::Internal(format!("database error: {e}"))
    }
}

impl From<crate::infrastructure::storage::StorageError> for OrchestratorError {
    fn from(e: crate::infrastructure::storage::StorageError) -> Self {
        match e {
            crate::infrastructure::storage::StorageError::Timeout(_) => {
                OrchestratorError::DeadlineExceeded
            }
            crate::infrastructure::storage::StorageError::Database(err) => err.into(),
        }
    }
}
