//! The session lifecycle.
//!
//! [`Orchestrator::start`] validates a trigger, records the domain and a
//! `Pending` session, then runs the requested checks on a spawned task, one
//! at a time, each under [`OrchestratorOptions::check_timeout`]. A failing or
//! timed-out check is recorded as `Failed` and the run moves on; only store
//! failures abort a run; its unfinished records are then marked `Failed`.
//! [`Orchestrator::retry`] re-runs the failed kinds against the same session,
//! selected per [`OrchestratorOptions::retry_selection`].
//!
//! At most one run per session is in flight; a second trigger is rejected
//! with [`OrchestratorError::RunInProgress`].

mod error;
mod guard;
mod options;
mod score;

pub use error::{OrchestratorError, RunError};
pub use options::{
    DEFAULT_CHECK_TIMEOUT, DEFAULT_SESSION_LIST_LIMIT, OrchestratorOptions, ParseScoreScopeError,
    RetrySelection, ScoreScope,
};
pub use score::overall_score;

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::checker::{CheckError, Checker};
use crate::domain::normalize_domain;
use crate::model::{
    CheckKind, CheckOutcome, CheckRecord, CheckStatus, CheckUpdate, DomainId, NewCheck,
    NewSession, OwnerId, Session, SessionId, SessionUpdate,
};
use crate::progress::{ProgressEvent, ProgressSink, TestComplete, TestError, TestProgress};
use crate::store::{DomainResults, SessionStore, StoreError};

use guard::{RunGuard, RunRegistry};
use options::dedup_kinds;

const INTERRUPTED_CHECK: &str = "run aborted before the check finished";

/// A request to test one domain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRequest {
    pub owner: OwnerId,
    pub domain_name: String,
    /// `None` runs the configured default kinds.
    pub kinds: Option<Vec<CheckKind>>,
    pub session_name: Option<String>,
}

impl RunRequest {
    pub fn new(owner: OwnerId, domain_name: impl Into<String>) -> Self {
        Self {
            owner,
            domain_name: domain_name.into(),
            kinds: None,
            session_name: None,
        }
    }

    pub fn with_kinds<I>(mut self, kinds: I) -> Self
    where
        I: IntoIterator<Item = CheckKind>,
    {
        self.kinds = Some(kinds.into_iter().collect());
        self
    }

    pub fn with_session_name(mut self, name: impl Into<String>) -> Self {
        self.session_name = Some(name.into());
        self
    }
}

/// Acknowledgement returned as soon as a run is scheduled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Accepted {
    pub session_id: SessionId,
    pub domain_id: DomainId,
    pub status: CheckStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryAccepted {
    pub session_id: SessionId,
    pub retried_count: usize,
    pub kinds: Vec<CheckKind>,
}

pub type RunHandle = JoinHandle<Result<RunSummary, RunError>>;

/// A scheduled run. Dropping `task` detaches it.
#[derive(Debug)]
pub struct Started {
    pub accepted: Accepted,
    pub task: RunHandle,
}

#[derive(Debug)]
pub struct RetryStarted {
    pub accepted: RetryAccepted,
    pub task: RunHandle,
}

/// Everything a run needs to know about its session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunPlan {
    pub session_id: SessionId,
    pub domain_id: DomainId,
    pub domain_name: String,
    pub kinds: Vec<CheckKind>,
    pub owner: OwnerId,
}

/// Final state of a completed run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub session: Session,
    pub results: Vec<CheckRecord>,
    pub overall_score: u8,
}

impl RunSummary {
    pub fn failed_count(&self) -> usize {
        self.results.iter().filter(|record| record.is_failed()).count()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResults {
    pub session: Session,
    pub results: Vec<CheckRecord>,
}

#[derive(Clone)]
pub struct Orchestrator {
    store: Arc<dyn SessionStore>,
    checker: Arc<dyn Checker>,
    sink: Arc<dyn ProgressSink>,
    options: OrchestratorOptions,
    runs: RunRegistry,
}

impl Orchestrator {
    pub fn new(
        store: Arc<dyn SessionStore>,
        checker: Arc<dyn Checker>,
        sink: Arc<dyn ProgressSink>,
    ) -> Self {
        Self::with_options(store, checker, sink, OrchestratorOptions::default())
    }

    pub fn with_options(
        store: Arc<dyn SessionStore>,
        checker: Arc<dyn Checker>,
        sink: Arc<dyn ProgressSink>,
        options: OrchestratorOptions,
    ) -> Self {
        Self {
            store,
            checker,
            sink,
            options,
            runs: RunRegistry::default(),
        }
    }

    pub fn options(&self) -> &OrchestratorOptions {
        &self.options
    }

    pub fn is_running(&self, session_id: SessionId) -> bool {
        self.runs.is_running(session_id)
    }

    /// Registers the domain and a new session, then schedules the run.
    pub async fn start(&self, request: RunRequest) -> Result<Started, OrchestratorError> {
        let kinds = match request.kinds {
            None => self.options.default_kinds().to_vec(),
            Some(kinds) => {
                let kinds = dedup_kinds(kinds);
                if kinds.is_empty() {
                    return Err(OrchestratorError::NoKinds);
                }
                kinds
            }
        };
        let domain_name = normalize_domain(&request.domain_name)?.into_string();

        let domain = self
            .store
            .create_domain(request.owner, &domain_name)
            .await?;
        let name = request
            .session_name
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| format!("Test session for {domain_name}"));
        let session = self
            .store
            .create_session(NewSession {
                domain_id: domain.id,
                owner_id: request.owner,
                name,
                total_tests: kinds.len(),
            })
            .await?;

        let guard = self
            .runs
            .try_acquire(session.id)
            .ok_or(OrchestratorError::RunInProgress {
                session_id: session.id,
            })?;
        info!(
            session_id = %session.id,
            owner = %request.owner,
            domain = %domain_name,
            kinds = kinds.len(),
            "run accepted"
        );

        let accepted = Accepted {
            session_id: session.id,
            domain_id: domain.id,
            status: session.status,
        };
        let plan = RunPlan {
            session_id: session.id,
            domain_id: domain.id,
            domain_name,
            kinds,
            owner: request.owner,
        };
        Ok(Started {
            accepted,
            task: self.spawn_run(plan, guard),
        })
    }

    /// Re-runs the failed kinds of `session_id`.
    ///
    /// Records an aborted run left unfinished are marked `Failed` first and
    /// their kinds re-run too. Nothing is written when no kind qualifies.
    pub async fn retry(
        &self,
        owner: OwnerId,
        session_id: SessionId,
    ) -> Result<RetryStarted, OrchestratorError> {
        let session = self.owned_session(owner, session_id).await?;
        let domain = self
            .store
            .domain(session.domain_id)
            .await?
            .ok_or(OrchestratorError::DomainNotFound {
                domain_id: session.domain_id,
            })?;
        let guard = self
            .runs
            .try_acquire(session_id)
            .ok_or(OrchestratorError::RunInProgress { session_id })?;

        let history = self.store.checks_for_session(session_id).await?;
        let kinds = score::retryable_kinds(&history, self.options.retry_selection());
        if kinds.is_empty() {
            return Err(OrchestratorError::NoFailedTests { session_id });
        }
        // the guard is held, so nothing else can still finish these
        for record in history.iter().filter(|record| !record.status.is_terminal()) {
            warn!(%session_id, check_id = %record.id, kind = %record.kind, "closing unfinished check");
            self.store
                .update_check(
                    record.id,
                    CheckUpdate::failed(INTERRUPTED_CHECK, Utc::now()),
                )
                .await?;
        }
        info!(%session_id, %owner, kinds = kinds.len(), "retry accepted");

        let accepted = RetryAccepted {
            session_id,
            retried_count: kinds.len(),
            kinds: kinds.clone(),
        };
        let plan = RunPlan {
            session_id,
            domain_id: domain.id,
            domain_name: domain.name,
            kinds,
            owner,
        };
        Ok(RetryStarted {
            accepted,
            task: self.spawn_run(plan, guard),
        })
    }

    /// Runs `plan` on the current task.
    pub async fn run_checks(&self, plan: RunPlan) -> Result<RunSummary, RunError> {
        let guard = self
            .runs
            .try_acquire(plan.session_id)
            .ok_or(RunError::AlreadyRunning {
                session_id: plan.session_id,
            })?;
        self.run_guarded(plan, guard).await
    }

    pub async fn session(
        &self,
        owner: OwnerId,
        session_id: SessionId,
    ) -> Result<Session, OrchestratorError> {
        self.owned_session(owner, session_id).await
    }

    /// The session with every check record, in creation order.
    pub async fn session_results(
        &self,
        owner: OwnerId,
        session_id: SessionId,
    ) -> Result<SessionResults, OrchestratorError> {
        let session = self.owned_session(owner, session_id).await?;
        let results = self.store.checks_for_session(session_id).await?;
        Ok(SessionResults { session, results })
    }

    /// Newest first; `limit` defaults to
    /// [`OrchestratorOptions::session_list_limit`].
    pub async fn sessions_for_owner(
        &self,
        owner: OwnerId,
        limit: Option<usize>,
    ) -> Result<Vec<Session>, OrchestratorError> {
        let limit = limit.unwrap_or(self.options.session_list_limit());
        Ok(self.store.sessions_for_owner(owner, limit).await?)
    }

    pub async fn latest_results_by_domain(
        &self,
        owner: OwnerId,
    ) -> Result<Vec<DomainResults>, OrchestratorError> {
        Ok(self.store.latest_completed_by_domain(owner).await?)
    }

    async fn owned_session(
        &self,
        owner: OwnerId,
        session_id: SessionId,
    ) -> Result<Session, OrchestratorError> {
        let session = self
            .store
            .session(session_id)
            .await?
            .ok_or(OrchestratorError::SessionNotFound { session_id })?;
        if session.owner_id != owner {
            return Err(OrchestratorError::AccessDenied { session_id });
        }
        Ok(session)
    }

    fn spawn_run(&self, plan: RunPlan, guard: RunGuard) -> RunHandle {
        let orchestrator = self.clone();
        tokio::spawn(async move { orchestrator.run_guarded(plan, guard).await })
    }

    async fn run_guarded(&self, plan: RunPlan, _guard: RunGuard) -> Result<RunSummary, RunError> {
        match self.execute(&plan).await {
            Ok(summary) => Ok(summary),
            Err(source) => {
                error!(
                    session_id = %plan.session_id,
                    owner = %plan.owner,
                    error = %source,
                    "run aborted"
                );
                if let Err(err) = self
                    .store
                    .update_session(plan.session_id, SessionUpdate::status(CheckStatus::Failed))
                    .await
                {
                    error!(session_id = %plan.session_id, error = %err, "could not mark session failed");
                }
                self.fail_unfinished(plan.session_id, &source.to_string())
                    .await;
                self.emit(
                    plan.owner,
                    ProgressEvent::Error(TestError {
                        session_id: plan.session_id,
                        error: source.to_string(),
                    }),
                )
                .await;
                Err(RunError::Store { source })
            }
        }
    }

    /// Best effort: marks every non-terminal record of the session `Failed`.
    async fn fail_unfinished(&self, session_id: SessionId, error: &str) {
        let history = match self.store.checks_for_session(session_id).await {
            Ok(history) => history,
            Err(err) => {
                error!(%session_id, error = %err, "could not list unfinished checks");
                return;
            }
        };
        for record in history.iter().filter(|record| !record.status.is_terminal()) {
            if let Err(err) = self
                .store
                .update_check(record.id, CheckUpdate::failed(error, Utc::now()))
                .await
            {
                error!(%session_id, check_id = %record.id, error = %err, "could not mark check failed");
            }
        }
    }

    async fn execute(&self, plan: &RunPlan) -> Result<RunSummary, StoreError> {
        let total = plan.kinds.len();
        let started = self
            .store
            .update_session(plan.session_id, SessionUpdate::status(CheckStatus::Running))
            .await?;
        // every event of a run reports the same total
        let event_total = match self.options.score_scope() {
            ScoreScope::CurrentRun => total,
            ScoreScope::LatestPerKind => started.total_tests,
        };

        let mut results: Vec<CheckRecord> = Vec::with_capacity(total);
        for (index, kind) in plan.kinds.iter().copied().enumerate() {
            let record = self
                .store
                .create_check(NewCheck {
                    session_id: plan.session_id,
                    domain_id: plan.domain_id,
                    kind,
                })
                .await?;
            let record = self
                .store
                .update_check(record.id, CheckUpdate::running())
                .await?;

            self.emit(
                plan.owner,
                ProgressEvent::Progress(TestProgress {
                    session_id: plan.session_id,
                    domain_name: plan.domain_name.clone(),
                    total_tests: event_total,
                    completed_tests: index,
                    current_test: kind,
                    status: CheckStatus::Running,
                    results: results.clone(),
                }),
            )
            .await;

            let update = match self.invoke(kind, &plan.domain_name).await {
                Ok(outcome) => {
                    debug!(session_id = %plan.session_id, %kind, score = outcome.score, "check completed");
                    CheckUpdate::completed(outcome, Utc::now())
                }
                Err(err) => {
                    warn!(session_id = %plan.session_id, %kind, error = %err, "check failed");
                    CheckUpdate::failed(err.to_string(), Utc::now())
                }
            };
            results.push(self.store.update_check(record.id, update).await?);
        }

        let (completed_tests, overall) = match self.options.score_scope() {
            ScoreScope::CurrentRun => (total.min(started.total_tests), overall_score(&results)),
            ScoreScope::LatestPerKind => {
                let history = self.store.checks_for_session(plan.session_id).await?;
                let latest = score::latest_terminal_per_kind(&history);
                (
                    latest.len().min(started.total_tests),
                    overall_score(latest.values().copied()),
                )
            }
        };

        let session = self
            .store
            .update_session(
                plan.session_id,
                SessionUpdate::completed(completed_tests, overall),
            )
            .await?;
        info!(
            session_id = %plan.session_id,
            owner = %plan.owner,
            score = overall,
            failed = results.iter().filter(|record| record.is_failed()).count(),
            "run completed"
        );

        self.emit(
            plan.owner,
            ProgressEvent::Complete(TestComplete {
                session_id: plan.session_id,
                domain_name: plan.domain_name.clone(),
                total_tests: event_total,
                completed_tests,
                overall_score: overall,
                status: session.status,
                results: results.clone(),
            }),
        )
        .await;

        Ok(RunSummary {
            session,
            results,
            overall_score: overall,
        })
    }

    /// Runs the checker on its own task so an expired timeout can abort it.
    async fn invoke(&self, kind: CheckKind, domain_name: &str) -> Result<CheckOutcome, CheckError> {
        let checker = Arc::clone(&self.checker);
        let domain_name = domain_name.to_string();
        let mut task = tokio::spawn(async move { checker.check(kind, &domain_name).await });

        let outcome = match tokio::time::timeout(self.options.check_timeout(), &mut task).await {
            Ok(Ok(result)) => result?,
            Ok(Err(join_err)) if join_err.is_panic() => {
                return Err(CheckError::Crashed("checker panicked".to_string()));
            }
            Ok(Err(join_err)) => return Err(CheckError::Crashed(join_err.to_string())),
            Err(_) => {
                task.abort();
                return Err(CheckError::Timeout);
            }
        };

        if outcome.score > 100 {
            return Err(CheckError::ScoreOutOfRange {
                score: outcome.score,
            });
        }
        Ok(outcome)
    }

    async fn emit(&self, owner: OwnerId, event: ProgressEvent) {
        let session_id = event.session_id();
        if let Err(err) = self.sink.publish(owner, event).await {
            warn!(%session_id, %owner, error = %err, "progress delivery failed");
        }
    }
}
