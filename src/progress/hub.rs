use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tracing::{debug, warn};

use crate::model::{OwnerId, SessionId};

use super::{ProgressEvent, ProgressSink, SinkError};

pub const DEFAULT_HUB_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
struct Envelope {
    owner: OwnerId,
    event: ProgressEvent,
}

type Connections = Arc<Mutex<BTreeMap<OwnerId, usize>>>;

/// In-process fan-out of progress events to per-owner connections.
///
/// Each [`Subscriber`] sees only its owner's events. A subscriber that has
/// not subscribed to any session receives every session of its owner.
#[derive(Clone)]
pub struct ProgressHub {
    sender: broadcast::Sender<Envelope>,
    connections: Connections,
    closed: Arc<AtomicBool>,
}

impl ProgressHub {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            connections: Arc::default(),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Opens a connection for `owner`.
    pub fn connect(&self, owner: OwnerId) -> Subscriber {
        let receiver = self.sender.subscribe();
        *lock(&self.connections).entry(owner).or_insert(0) += 1;
        debug!(%owner, "progress connection opened");
        Subscriber {
            owner,
            sessions: HashSet::new(),
            receiver,
            connections: Arc::clone(&self.connections),
        }
    }

    /// Owners with at least one open connection.
    pub fn connected_owners(&self) -> Vec<OwnerId> {
        lock(&self.connections).keys().copied().collect()
    }

    pub fn connection_count(&self, owner: OwnerId) -> usize {
        lock(&self.connections).get(&owner).copied().unwrap_or(0)
    }

    /// Rejects further events. Open subscribers still drain what was queued.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

impl Default for ProgressHub {
    fn default() -> Self {
        Self::new(DEFAULT_HUB_CAPACITY)
    }
}

#[async_trait]
impl ProgressSink for ProgressHub {
    async fn publish(&self, owner: OwnerId, event: ProgressEvent) -> Result<(), SinkError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(SinkError::Closed);
        }
        // No receiver means nobody is listening, which is not a failure.
        let _ = self.sender.send(Envelope { owner, event });
        Ok(())
    }
}

/// One live connection of an owner.
pub struct Subscriber {
    owner: OwnerId,
    sessions: HashSet<SessionId>,
    receiver: broadcast::Receiver<Envelope>,
    connections: Connections,
}

impl Subscriber {
    pub fn owner(&self) -> OwnerId {
        self.owner
    }

    pub fn subscribe_session(&mut self, session_id: SessionId) {
        self.sessions.insert(session_id);
    }

    pub fn unsubscribe_session(&mut self, session_id: SessionId) {
        self.sessions.remove(&session_id);
    }

    pub fn subscribed_sessions(&self) -> &HashSet<SessionId> {
        &self.sessions
    }

    /// Waits for the next event addressed to this connection. Returns `None`
    /// once the hub is gone.
    pub async fn recv(&mut self) -> Option<ProgressEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(envelope) => {
                    if self.accepts(&envelope) {
                        return Some(envelope.event);
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(owner = %self.owner, skipped, "progress subscriber lagged, events dropped");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Next already-queued event, if any.
    pub fn try_recv(&mut self) -> Option<ProgressEvent> {
        loop {
            match self.receiver.try_recv() {
                Ok(envelope) => {
                    if self.accepts(&envelope) {
                        return Some(envelope.event);
                    }
                }
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!(owner = %self.owner, skipped, "progress subscriber lagged, events dropped");
                }
                Err(TryRecvError::Empty | TryRecvError::Closed) => return None,
            }
        }
    }

    fn accepts(&self, envelope: &Envelope) -> bool {
        envelope.owner == self.owner
            && (self.sessions.is_empty() || self.sessions.contains(&envelope.event.session_id()))
    }
}

impl Drop for Subscriber {
    fn drop(&mut self) {
        let mut connections = lock(&self.connections);
        if let Some(count) = connections.get_mut(&self.owner) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                connections.remove(&self.owner);
            }
        }
        debug!(owner = %self.owner, "progress connection closed");
    }
}

fn lock(connections: &Connections) -> std::sync::MutexGuard<'_, BTreeMap<OwnerId, usize>> {
    connections.lock().unwrap_or_else(PoisonError::into_inner)
}
