use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::model::{
    CheckId, CheckKind, CheckRecord, CheckStatus, CheckUpdate, Domain, DomainId, NewCheck,
    NewSession, OwnerId, Session, SessionId, SessionUpdate,
};

use super::{DomainResults, SessionStore, StoreError};

/// Write operations that can be made to fail on purpose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailPoint {
    CreateDomain,
    CreateSession,
    /// Any session update other than the final transition to `Completed`.
    UpdateSession,
    /// The session update that sets status `Completed`.
    CompleteSession,
    CreateCheck,
    /// Every check update.
    UpdateCheck,
    /// Only the check update that sets status `Completed`.
    CompleteCheck,
}

impl fmt::Display for FailPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::CreateDomain => "create_domain",
            Self::CreateSession => "create_session",
            Self::UpdateSession => "update_session",
            Self::CompleteSession => "complete_session",
            Self::CreateCheck => "create_check",
            Self::UpdateCheck => "update_check",
            Self::CompleteCheck => "complete_check",
        };
        f.write_str(name)
    }
}

#[derive(Default)]
struct State {
    domains: Vec<Domain>,
    sessions: Vec<Session>,
    checks: Vec<CheckRecord>,
    check_index: HashMap<CheckId, usize>,
}

impl State {
    fn session_mut(&mut self, id: SessionId) -> Option<&mut Session> {
        self.sessions.iter_mut().find(|session| session.id == id)
    }
}

/// [`SessionStore`] kept in process memory.
///
/// Every successful write bumps [`write_count`](Self::write_count), and
/// armed [`FailPoint`]s make the matching write fail with
/// [`StoreError::Unavailable`] until disarmed.
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<State>,
    writes: AtomicUsize,
    fail_points: Mutex<HashSet<FailPoint>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful writes since creation.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn fail_on(&self, point: FailPoint) {
        self.fail_points
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(point);
    }

    pub fn clear_failures(&self) {
        self.fail_points
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    fn check_fail_point(&self, point: FailPoint, operation: &'static str) -> Result<(), StoreError> {
        let armed = self
            .fail_points
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&point);
        if armed {
            return Err(StoreError::unavailable(
                operation,
                format!("injected failure at {point}"),
            ));
        }
        Ok(())
    }

    fn record_write(&self) {
        self.writes.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn create_domain(&self, owner: OwnerId, name: &str) -> Result<Domain, StoreError> {
        self.check_fail_point(FailPoint::CreateDomain, "create_domain")?;
        let domain = Domain {
            id: DomainId::new(),
            owner_id: owner,
            name: name.to_string(),
            created_at: Utc::now(),
        };
        self.state.write().await.domains.push(domain.clone());
        self.record_write();
        Ok(domain)
    }

    async fn domain(&self, id: DomainId) -> Result<Option<Domain>, StoreError> {
        let state = self.state.read().await;
        Ok(state.domains.iter().find(|domain| domain.id == id).cloned())
    }

    async fn create_session(&self, new: NewSession) -> Result<Session, StoreError> {
        self.check_fail_point(FailPoint::CreateSession, "create_session")?;
        let now = Utc::now();
        let session = Session {
            id: SessionId::new(),
            domain_id: new.domain_id,
            owner_id: new.owner_id,
            name: new.name,
            status: CheckStatus::Pending,
            total_tests: new.total_tests,
            completed_tests: 0,
            overall_score: None,
            created_at: now,
            updated_at: now,
        };
        self.state.write().await.sessions.push(session.clone());
        self.record_write();
        Ok(session)
    }

    async fn update_session(
        &self,
        id: SessionId,
        update: SessionUpdate,
    ) -> Result<Session, StoreError> {
        if update.status == Some(CheckStatus::Completed) {
            self.check_fail_point(FailPoint::CompleteSession, "update_session")?;
        } else {
            self.check_fail_point(FailPoint::UpdateSession, "update_session")?;
        }
        let mut state = self.state.write().await;
        let session = state
            .session_mut(id)
            .ok_or(StoreError::SessionNotFound { id })?;
        session.apply(update, Utc::now());
        let updated = session.clone();
        drop(state);
        self.record_write();
        Ok(updated)
    }

    async fn session(&self, id: SessionId) -> Result<Option<Session>, StoreError> {
        let state = self.state.read().await;
        Ok(state.sessions.iter().find(|session| session.id == id).cloned())
    }

    async fn sessions_for_owner(
        &self,
        owner: OwnerId,
        limit: usize,
    ) -> Result<Vec<Session>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .sessions
            .iter()
            .rev()
            .filter(|session| session.owner_id == owner)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn create_check(&self, new: NewCheck) -> Result<CheckRecord, StoreError> {
        self.check_fail_point(FailPoint::CreateCheck, "create_check")?;
        let now = Utc::now();
        let record = CheckRecord {
            id: CheckId::new(),
            session_id: new.session_id,
            domain_id: new.domain_id,
            kind: new.kind,
            status: CheckStatus::Pending,
            result_data: None,
            error_message: None,
            score: None,
            recommendations: Vec::new(),
            started_at: now,
            completed_at: None,
            created_at: now,
        };
        let mut state = self.state.write().await;
        let index = state.checks.len();
        state.checks.push(record.clone());
        state.check_index.insert(record.id, index);
        drop(state);
        self.record_write();
        Ok(record)
    }

    async fn update_check(
        &self,
        id: CheckId,
        update: CheckUpdate,
    ) -> Result<CheckRecord, StoreError> {
        if update.status == Some(CheckStatus::Completed) {
            self.check_fail_point(FailPoint::CompleteCheck, "update_check")?;
        }
        self.check_fail_point(FailPoint::UpdateCheck, "update_check")?;
        let mut state = self.state.write().await;
        let index = *state
            .check_index
            .get(&id)
            .ok_or(StoreError::CheckNotFound { id })?;
        let record = &mut state.checks[index];
        record.apply(update);
        let updated = record.clone();
        drop(state);
        self.record_write();
        Ok(updated)
    }

    async fn checks_for_session(&self, id: SessionId) -> Result<Vec<CheckRecord>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .checks
            .iter()
            .filter(|record| record.session_id == id)
            .cloned()
            .collect())
    }

    async fn latest_completed_by_domain(
        &self,
        owner: OwnerId,
    ) -> Result<Vec<DomainResults>, StoreError> {
        let state = self.state.read().await;
        let mut by_domain: HashMap<DomainId, BTreeMap<CheckKind, &CheckRecord>> = HashMap::new();
        for record in state.checks.iter().filter(|record| record.is_completed()) {
            by_domain
                .entry(record.domain_id)
                .or_default()
                .insert(record.kind, record);
        }

        Ok(state
            .domains
            .iter()
            .filter(|domain| domain.owner_id == owner)
            .filter_map(|domain| {
                let latest = by_domain.get(&domain.id)?;
                Some(DomainResults {
                    domain: domain.clone(),
                    results: latest.values().map(|record| (*record).clone()).collect(),
                })
            })
            .collect())
    }
}
