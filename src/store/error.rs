use thiserror::Error;

use crate::model::{CheckId, DomainId, SessionId};

/// Errors raised by a [`SessionStore`](super::SessionStore) backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("session {id} not found")]
    SessionNotFound { id: SessionId },
    #[error("check record {id} not found")]
    CheckNotFound { id: CheckId },
    #[error("domain {id} not found")]
    DomainNotFound { id: DomainId },
    #[error("store unavailable during {operation}: {reason}")]
    Unavailable {
        operation: &'static str,
        reason: String,
    },
}

impl StoreError {
    pub fn unavailable(operation: &'static str, reason: impl Into<String>) -> Self {
        Self::Unavailable {
            operation,
            reason: reason.into(),
        }
    }
}
