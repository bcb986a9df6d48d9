//! Synchronizer error types

use serde_json::Value;
use thiserror::Error;

use crate::backend::BackendError;

/// A failed fetch; never fatal, the next tick tries again
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("Unexpected value for field {field}: {value}")]
    InvalidField { field: &'static str, value: Value },

    #[error("Malformed procedure reply: {0}")]
    InvalidReply(#[from] serde_json::Error),
}

/// Why a manual refresh did not run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RefreshError {
    #[error("synchronizer is detached")]
    Detached,

    #[error("a tick is already in flight")]
    InFlight,
}
