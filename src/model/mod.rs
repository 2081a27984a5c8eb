//! Sessions, check records and the partial updates the store applies to them.

mod ids;
mod types;

pub use ids::{CheckId, DomainId, OwnerId, SessionId};
pub use types::{
    CheckKind, CheckOutcome, CheckRecord, CheckStatus, CheckUpdate, Domain, NewCheck, NewSession,
    ParseKindError, Session, SessionUpdate,
};
