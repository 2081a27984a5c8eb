//! Persistence port for domains, sessions and check records.
//!
//! The orchestrator only talks to storage through [`SessionStore`]; the
//! in-process [`MemoryStore`] backs the CLI and the test suite.

mod error;
mod memory;

pub use error::StoreError;
pub use memory::{FailPoint, MemoryStore};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::model::{
    CheckId, CheckRecord, CheckUpdate, Domain, DomainId, NewCheck, NewSession, OwnerId, Session,
    SessionId, SessionUpdate,
};

/// Latest completed record of every kind for one domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainResults {
    pub domain: Domain,
    pub results: Vec<CheckRecord>,
}

/// Durable CRUD over domains, sessions and check records.
///
/// Identifiers and timestamps are assigned by the store. Updates are
/// partial: `None` fields of [`SessionUpdate`] / [`CheckUpdate`] are left as
/// they are.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn create_domain(&self, owner: OwnerId, name: &str) -> Result<Domain, StoreError>;

    async fn domain(&self, id: DomainId) -> Result<Option<Domain>, StoreError>;

    async fn create_session(&self, new: NewSession) -> Result<Session, StoreError>;

    async fn update_session(
        &self,
        id: SessionId,
        update: SessionUpdate,
    ) -> Result<Session, StoreError>;

    async fn session(&self, id: SessionId) -> Result<Option<Session>, StoreError>;

    /// Sessions of `owner`, newest first, at most `limit` of them.
    async fn sessions_for_owner(
        &self,
        owner: OwnerId,
        limit: usize,
    ) -> Result<Vec<Session>, StoreError>;

    /// Creates a `Pending` record stamped with the current time.
    async fn create_check(&self, new: NewCheck) -> Result<CheckRecord, StoreError>;

    async fn update_check(
        &self,
        id: CheckId,
        update: CheckUpdate,
    ) -> Result<CheckRecord, StoreError>;

    /// Every record of the session, in creation order.
    async fn checks_for_session(&self, id: SessionId) -> Result<Vec<CheckRecord>, StoreError>;

    /// For each domain of `owner` with at least one completed record, the
    /// latest completed record per kind.
    async fn latest_completed_by_domain(
        &self,
        owner: OwnerId,
    ) -> Result<Vec<DomainResults>, StoreError>;
}

#[cfg(test)]
mod tests;
