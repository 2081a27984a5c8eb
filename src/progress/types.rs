use serde::{Deserialize, Serialize};

use crate::model::{CheckKind, CheckRecord, CheckStatus, SessionId};

/// Live update about a run, addressed to the session owner.
///
/// Serialized as `{"type": "test_progress", "data": {...}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ProgressEvent {
    #[serde(rename = "test_progress")]
    Progress(TestProgress),
    #[serde(rename = "test_complete")]
    Complete(TestComplete),
    #[serde(rename = "test_error")]
    Error(TestError),
}

impl ProgressEvent {
    pub fn session_id(&self) -> SessionId {
        match self {
            Self::Progress(progress) => progress.session_id,
            Self::Complete(complete) => complete.session_id,
            Self::Error(error) => error.session_id,
        }
    }

    /// `true` for the last event of a run, completion or error.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Progress(_))
    }
}

/// Emitted right before a check starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestProgress {
    pub session_id: SessionId,
    pub domain_name: String,
    pub total_tests: usize,
    pub completed_tests: usize,
    pub current_test: CheckKind,
    pub status: CheckStatus,
    pub results: Vec<CheckRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestComplete {
    pub session_id: SessionId,
    pub domain_name: String,
    pub total_tests: usize,
    pub completed_tests: usize,
    pub overall_score: u8,
    pub status: CheckStatus,
    pub results: Vec<CheckRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestError {
    pub session_id: SessionId,
    pub error: String,
}
