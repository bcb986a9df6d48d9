//! Backend error types

use std::time::Duration;
use thiserror::Error;

/// Errors raised by a backend or a record binding
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("Unknown model: {0}")]
    UnknownModel(String),

    #[error("Unknown procedure {procedure} on {model}")]
    UnknownProcedure { model: String, procedure: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Record binding closed")]
    BindingClosed,

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl BackendError {
    /// Whether the next poll may reasonably succeed
    pub fn is_transient(&self) -> bool {
        match self {
            BackendError::Transport(_) => true,
            BackendError::Timeout(_) => true,
            BackendError::UnknownModel(_) => false,
            BackendError::UnknownProcedure { .. } => false,
            BackendError::InvalidResponse(_) => false,
            BackendError::BindingClosed => false,
            BackendError::Json(_) => false,
        }
    }
}
