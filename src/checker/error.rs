use thiserror::Error;

use crate::domain::DomainError;

/// Failure of one checker invocation. Always recorded on the check record,
/// never propagated past the per-kind boundary of a run.
#[derive(Debug, Error)]
pub enum CheckError {
    #[error("timeout")]
    Timeout,
    #[error("invalid domain: {source}")]
    InvalidDomain {
        #[source]
        source: DomainError,
    },
    #[error("score {score} out of range (0..=100)")]
    ScoreOutOfRange { score: u8 },
    #[error("checker crashed: {0}")]
    Crashed(String),
    #[error("{0}")]
    Failed(String),
    #[cfg(feature = "with-dns-checker")]
    #[error("resolver initialization failed: {source}")]
    ResolverInit {
        #[source]
        source: trust_dns_resolver::error::ResolveError,
    },
    #[cfg(feature = "with-dns-checker")]
    #[error("{record_type} lookup failed for {name}: {source}")]
    Lookup {
        record_type: &'static str,
        name: String,
        #[source]
        source: trust_dns_resolver::error::ResolveError,
    },
    #[error("TXT record {name} contains invalid UTF-8 data: {source}")]
    TxtDataUtf8 {
        name: String,
        #[source]
        source: std::str::Utf8Error,
    },
    #[error("result encoding failed: {source}")]
    Encode {
        #[source]
        source: serde_json::Error,
    },
}

impl CheckError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }

    #[cfg_attr(not(feature = "with-dns-checker"), allow(dead_code))]
    pub(crate) fn encode(source: serde_json::Error) -> Self {
        Self::Encode { source }
    }

    #[cfg(feature = "with-dns-checker")]
    pub(crate) fn resolver_init(source: trust_dns_resolver::error::ResolveError) -> Self {
        Self::ResolverInit { source }
    }

    #[cfg(feature = "with-dns-checker")]
    pub(crate) fn lookup(
        record_type: &'static str,
        name: impl Into<String>,
        source: trust_dns_resolver::error::ResolveError,
    ) -> Self {
        Self::Lookup {
            record_type,
            name: name.into(),
            source,
        }
    }

    #[cfg_attr(not(feature = "with-dns-checker"), allow(dead_code))]
    pub(crate) fn txt_data_utf8(name: impl Into<String>, source: std::str::Utf8Error) -> Self {
        Self::TxtDataUtf8 {
            name: name.into(),
            source,
        }
    }
}

impl From<DomainError> for CheckError {
    fn from(source: DomainError) -> Self {
        Self::InvalidDomain { source }
    }
}
