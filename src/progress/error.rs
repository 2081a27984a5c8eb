use thiserror::Error;

/// Delivery failure reported by a [`ProgressSink`](super::ProgressSink).
///
/// The orchestrator logs these and carries on.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("progress sink is closed")]
    Closed,
    #[error("progress delivery failed: {reason}")]
    Delivery { reason: String },
}

impl SinkError {
    pub fn delivery(reason: impl Into<String>) -> Self {
        Self::Delivery {
            reason: reason.into(),
        }
    }
}
