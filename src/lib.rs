#![forbid(unsafe_code)]
//! mailaudit — orchestration of e-mail security checks (DMARC, SPF, DKIM, MX)

pub mod checker;
pub mod domain;
pub mod model;
pub mod orchestrator;
pub mod progress;
pub mod store;

pub use checker::{CheckError, Checker};
#[cfg(feature = "with-dns-checker")]
pub use checker::{DnsCheckOptions, DnsChecker};
pub use domain::{DomainError, DomainName, normalize_domain};
pub use model::{
    CheckId, CheckKind, CheckOutcome, CheckRecord, CheckStatus, Domain, DomainId, OwnerId,
    Session, SessionId,
};
pub use orchestrator::{
    Accepted, Orchestrator, OrchestratorError, OrchestratorOptions, RetryAccepted, RunError,
    RetrySelection, RunPlan, RunRequest, RunSummary, ScoreScope, SessionResults,
};
pub use progress::{ProgressEvent, ProgressHub, ProgressSink, SinkError, Subscriber};
pub use store::{DomainResults, MemoryStore, SessionStore, StoreError};
