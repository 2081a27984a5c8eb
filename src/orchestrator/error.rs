use thiserror::Error;

use crate::domain::DomainError;
use crate::model::{DomainId, SessionId};
use crate::store::StoreError;

/// Errors reported synchronously to the caller of a trigger, retry or read.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("invalid domain name: {source}")]
    InvalidDomain {
        #[source]
        source: DomainError,
    },
    #[error("no check kinds requested")]
    NoKinds,
    #[error("session {session_id} not found")]
    SessionNotFound { session_id: SessionId },
    #[error("domain {domain_id} not found")]
    DomainNotFound { domain_id: DomainId },
    #[error("session {session_id} belongs to another owner")]
    AccessDenied { session_id: SessionId },
    #[error("session {session_id} has no failed tests to retry")]
    NoFailedTests { session_id: SessionId },
    #[error("a run is already in progress for session {session_id}")]
    RunInProgress { session_id: SessionId },
    #[error("store error: {source}")]
    Store {
        #[source]
        source: StoreError,
    },
}

impl From<StoreError> for OrchestratorError {
    fn from(source: StoreError) -> Self {
        Self::Store { source }
    }
}

impl From<DomainError> for OrchestratorError {
    fn from(source: DomainError) -> Self {
        Self::InvalidDomain { source }
    }
}

/// Why a run did not complete. After `Store` the session is left `Failed`
/// and a `test_error` event has been emitted.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("a run is already in progress for session {session_id}")]
    AlreadyRunning { session_id: SessionId },
    #[error("run aborted: {source}")]
    Store {
        #[source]
        source: StoreError,
    },
}

impl From<StoreError> for RunError {
    fn from(source: StoreError) -> Self {
        Self::Store { source }
    }
}
