use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::CheckKind;

pub const DEFAULT_CHECK_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_SESSION_LIST_LIMIT: usize = 50;

/// Which records feed the aggregate score written at the end of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScoreScope {
    /// Only the records produced by the current run. A retry therefore
    /// scores only the kinds it re-ran.
    #[default]
    CurrentRun,
    /// The latest terminal record of every kind in the session history.
    LatestPerKind,
}

impl ScoreScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CurrentRun => "current-run",
            Self::LatestPerKind => "latest-per-kind",
        }
    }
}

impl fmt::Display for ScoreScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown score scope '{input}', use: current-run|latest-per-kind")]
pub struct ParseScoreScopeError {
    pub input: String,
}

impl FromStr for ScoreScope {
    type Err = ParseScoreScopeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "current-run" | "current" => Ok(Self::CurrentRun),
            "latest-per-kind" | "latest" => Ok(Self::LatestPerKind),
            _ => Err(ParseScoreScopeError {
                input: s.to_string(),
            }),
        }
    }
}

/// Which records make a kind eligible for [`retry`](super::Orchestrator::retry).
///
/// Records left unfinished by an aborted run are eligible under both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RetrySelection {
    /// Any `Failed` record of the kind in the session history.
    #[default]
    AnyFailed,
    /// Only kinds whose latest finished record is `Failed`.
    LatestFailed,
}

/// Configuration knobs for [`Orchestrator`](super::Orchestrator).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestratorOptions {
    check_timeout: Duration,
    default_kinds: Vec<CheckKind>,
    score_scope: ScoreScope,
    retry_selection: RetrySelection,
    session_list_limit: usize,
}

impl OrchestratorOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Upper bound for one checker invocation. The invocation is cancelled
    /// when it elapses.
    pub fn with_check_timeout(mut self, timeout: Duration) -> Self {
        self.check_timeout = timeout;
        self
    }

    /// Kinds run when a trigger does not list any. Duplicates are dropped;
    /// an empty list keeps the current defaults.
    pub fn with_default_kinds<I>(mut self, kinds: I) -> Self
    where
        I: IntoIterator<Item = CheckKind>,
    {
        let kinds = dedup_kinds(kinds);
        if !kinds.is_empty() {
            self.default_kinds = kinds;
        }
        self
    }

    pub fn with_score_scope(mut self, scope: ScoreScope) -> Self {
        self.score_scope = scope;
        self
    }

    pub fn with_retry_selection(mut self, selection: RetrySelection) -> Self {
        self.retry_selection = selection;
        self
    }

    pub fn with_session_list_limit(mut self, limit: usize) -> Self {
        self.session_list_limit = limit;
        self
    }

    pub fn check_timeout(&self) -> Duration {
        self.check_timeout
    }

    pub fn default_kinds(&self) -> &[CheckKind] {
        &self.default_kinds
    }

    pub fn score_scope(&self) -> ScoreScope {
        self.score_scope
    }

    pub fn retry_selection(&self) -> RetrySelection {
        self.retry_selection
    }

    pub fn session_list_limit(&self) -> usize {
        self.session_list_limit
    }
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        Self {
            check_timeout: DEFAULT_CHECK_TIMEOUT,
            default_kinds: CheckKind::ALL.to_vec(),
            score_scope: ScoreScope::default(),
            retry_selection: RetrySelection::default(),
            session_list_limit: DEFAULT_SESSION_LIST_LIMIT,
        }
    }
}

/// Removes repeated kinds, keeping the first occurrence.
pub(crate) fn dedup_kinds<I>(kinds: I) -> Vec<CheckKind>
where
    I: IntoIterator<Item = CheckKind>,
{
    let mut unique = Vec::new();
    for kind in kinds {
        if !unique.contains(&kind) {
            unique.push(kind);
        }
    }
    unique
}
