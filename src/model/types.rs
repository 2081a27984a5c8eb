use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use super::ids::{CheckId, DomainId, OwnerId, SessionId};

/// The fixed battery of e-mail security checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CheckKind {
    Dmarc,
    Spf,
    Dkim,
    MailServer,
}

impl CheckKind {
    /// Every kind, in the default execution order.
    pub const ALL: [CheckKind; 4] = [
        CheckKind::Dmarc,
        CheckKind::Spf,
        CheckKind::Dkim,
        CheckKind::MailServer,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dmarc => "DMARC",
            Self::Spf => "SPF",
            Self::Dkim => "DKIM",
            Self::MailServer => "MAIL_SERVER",
        }
    }
}

impl fmt::Display for CheckKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown check kind '{input}', use: dmarc|spf|dkim|mail_server")]
pub struct ParseKindError {
    pub input: String,
}

impl FromStr for CheckKind {
    type Err = ParseKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        match normalized.as_str() {
            "dmarc" => Ok(Self::Dmarc),
            "spf" => Ok(Self::Spf),
            "dkim" => Ok(Self::Dkim),
            "mail_server" | "mx" => Ok(Self::MailServer),
            _ => Err(ParseKindError {
                input: s.to_string(),
            }),
        }
    }
}

/// Lifecycle shared by sessions and check records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CheckStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl CheckStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Running => "RUNNING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
        }
    }
}

impl fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Domain {
    pub id: DomainId,
    #[serde(rename = "userId")]
    pub owner_id: OwnerId,
    #[serde(rename = "domainName")]
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// One batch run of checks for one domain on behalf of one owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: SessionId,
    pub domain_id: DomainId,
    #[serde(rename = "userId")]
    pub owner_id: OwnerId,
    #[serde(rename = "sessionName")]
    pub name: String,
    pub status: CheckStatus,
    pub total_tests: usize,
    pub completed_tests: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overall_score: Option<u8>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One invocation of one check kind within a session.
///
/// A `Completed` record carries a score and a result payload and no error;
/// a `Failed` record carries an error message and neither score nor result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckRecord {
    pub id: CheckId,
    pub session_id: SessionId,
    pub domain_id: DomainId,
    #[serde(rename = "testType")]
    pub kind: CheckKind,
    pub status: CheckStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<u8>,
    pub recommendations: Vec<String>,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl CheckRecord {
    pub fn is_completed(&self) -> bool {
        self.status == CheckStatus::Completed
    }

    pub fn is_failed(&self) -> bool {
        self.status == CheckStatus::Failed
    }

    /// Applies the fields set in `update`, leaving the others untouched.
    pub fn apply(&mut self, update: CheckUpdate) {
        if let Some(status) = update.status {
            self.status = status;
        }
        if let Some(result_data) = update.result_data {
            self.result_data = Some(result_data);
        }
        if let Some(error_message) = update.error_message {
            self.error_message = Some(error_message);
        }
        if let Some(score) = update.score {
            self.score = Some(score);
        }
        if let Some(recommendations) = update.recommendations {
            self.recommendations = recommendations;
        }
        if let Some(completed_at) = update.completed_at {
            self.completed_at = Some(completed_at);
        }
    }
}

/// What a checker reports for a successful invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckOutcome {
    pub score: u8,
    #[serde(rename = "data")]
    pub result_data: Value,
    pub recommendations: Vec<String>,
}

impl CheckOutcome {
    pub fn new(score: u8, result_data: Value, recommendations: Vec<String>) -> Self {
        Self {
            score,
            result_data,
            recommendations,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSession {
    pub domain_id: DomainId,
    pub owner_id: OwnerId,
    pub name: String,
    pub total_tests: usize,
}

/// Partial update of a session; `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionUpdate {
    pub status: Option<CheckStatus>,
    pub completed_tests: Option<usize>,
    pub overall_score: Option<u8>,
}

impl SessionUpdate {
    pub fn status(status: CheckStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn completed(completed_tests: usize, overall_score: u8) -> Self {
        Self {
            status: Some(CheckStatus::Completed),
            completed_tests: Some(completed_tests),
            overall_score: Some(overall_score),
        }
    }
}

impl Session {
    pub fn apply(&mut self, update: SessionUpdate, now: DateTime<Utc>) {
        if let Some(status) = update.status {
            self.status = status;
        }
        if let Some(completed_tests) = update.completed_tests {
            self.completed_tests = completed_tests;
        }
        if let Some(overall_score) = update.overall_score {
            self.overall_score = Some(overall_score);
        }
        self.updated_at = now;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCheck {
    pub session_id: SessionId,
    pub domain_id: DomainId,
    pub kind: CheckKind,
}

/// Partial update of a check record; `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckUpdate {
    pub status: Option<CheckStatus>,
    pub result_data: Option<Value>,
    pub error_message: Option<String>,
    pub score: Option<u8>,
    pub recommendations: Option<Vec<String>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl CheckUpdate {
    pub fn running() -> Self {
        Self {
            status: Some(CheckStatus::Running),
            ..Self::default()
        }
    }

    pub fn completed(outcome: CheckOutcome, at: DateTime<Utc>) -> Self {
        Self {
            status: Some(CheckStatus::Completed),
            result_data: Some(outcome.result_data),
            score: Some(outcome.score),
            recommendations: Some(outcome.recommendations),
            completed_at: Some(at),
            ..Self::default()
        }
    }

    pub fn failed(error_message: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            status: Some(CheckStatus::Failed),
            error_message: Some(error_message.into()),
            completed_at: Some(at),
            ..Self::default()
        }
    }
}
