//! Progress reporting: the sink port the orchestrator publishes to, the
//! event payloads, and an in-process hub delivering them to subscribers.

mod error;
mod hub;
mod types;

pub use error::SinkError;
pub use hub::{DEFAULT_HUB_CAPACITY, ProgressHub, Subscriber};
pub use types::{ProgressEvent, TestComplete, TestError, TestProgress};

use async_trait::async_trait;

use crate::model::OwnerId;

/// Best-effort delivery of run events to the owner's observers.
#[async_trait]
pub trait ProgressSink: Send + Sync {
    async fn publish(&self, owner: OwnerId, event: ProgressEvent) -> Result<(), SinkError>;
}

#[cfg(test)]
mod tests;
