//! The checker capability: one check kind against one domain.
//!
//! [`Checker`] is the port the orchestrator invokes under a hard timeout. The
//! optional `with-dns-checker` feature provides [`DnsChecker`], which resolves
//! DMARC/SPF/DKIM TXT records and MX hosts through trust-dns and probes the
//! preferred mail server over TCP.

mod error;

#[cfg(feature = "with-dns-checker")]
mod dkim;
#[cfg(feature = "with-dns-checker")]
mod dmarc;
#[cfg(feature = "with-dns-checker")]
mod mail_server;
#[cfg(feature = "with-dns-checker")]
mod options;
#[cfg(feature = "with-dns-checker")]
mod resolver;
#[cfg(feature = "with-dns-checker")]
mod spf;

pub use error::CheckError;

#[cfg(feature = "with-dns-checker")]
pub use options::{DEFAULT_DKIM_SELECTORS, DnsCheckOptions};
#[cfg(feature = "with-dns-checker")]
pub use resolver::{LookupMx, LookupTxt, MxHost, ReachProbe, TcpProbe};

use async_trait::async_trait;

use crate::model::{CheckKind, CheckOutcome};

/// Runs one check kind against one domain.
///
/// Implementations must be cancellation safe: the orchestrator drops the
/// future when the per-check timeout expires.
#[async_trait]
pub trait Checker: Send + Sync {
    async fn check(&self, kind: CheckKind, domain: &str) -> Result<CheckOutcome, CheckError>;
}

#[cfg(feature = "with-dns-checker")]
pub use dns::DnsChecker;

#[cfg(feature = "with-dns-checker")]
mod dns {
    use async_trait::async_trait;
    use tracing::debug;
    use trust_dns_resolver::TokioAsyncResolver;

    use super::resolver::fqdn;
    use super::{
        CheckError, Checker, DnsCheckOptions, LookupMx, LookupTxt, ReachProbe, TcpProbe, dkim,
        dmarc, mail_server, spf,
    };
    use crate::domain::normalize_domain;
    use crate::model::{CheckKind, CheckOutcome};

    /// [`Checker`] backed by DNS lookups and a TCP reachability probe.
    pub struct DnsChecker<R = TokioAsyncResolver, P = TcpProbe> {
        resolver: R,
        probe: P,
        options: DnsCheckOptions,
    }

    impl DnsChecker {
        /// Builds a checker on the system resolver configuration.
        pub fn from_system_conf(options: DnsCheckOptions) -> Result<Self, CheckError> {
            let resolver =
                TokioAsyncResolver::tokio_from_system_conf().map_err(CheckError::resolver_init)?;
            Ok(Self::with_parts(resolver, TcpProbe, options))
        }
    }

    impl<R, P> DnsChecker<R, P> {
        pub fn with_parts(resolver: R, probe: P, options: DnsCheckOptions) -> Self {
            Self {
                resolver,
                probe,
                options,
            }
        }

        pub fn options(&self) -> &DnsCheckOptions {
            &self.options
        }
    }

    #[async_trait]
    impl<R, P> Checker for DnsChecker<R, P>
    where
        R: LookupTxt + LookupMx + 'static,
        P: ReachProbe + 'static,
    {
        async fn check(&self, kind: CheckKind, domain: &str) -> Result<CheckOutcome, CheckError> {
            let ascii = normalize_domain(domain)?;
            let ascii = ascii.as_str();
            debug!(%kind, domain = ascii, "running DNS check");

            match kind {
                CheckKind::Dmarc => {
                    let records = self.resolver.lookup_txt(&fqdn("_dmarc", ascii)).await?;
                    dmarc::evaluate(&records)
                }
                CheckKind::Spf => {
                    let records = self.resolver.lookup_txt(ascii).await?;
                    spf::evaluate(&records, self.options.spf_lookup_limit())
                }
                CheckKind::Dkim => {
                    dkim::check(&self.resolver, ascii, self.options.dkim_selectors()).await
                }
                CheckKind::MailServer => {
                    mail_server::check(
                        &self.resolver,
                        &self.probe,
                        ascii,
                        self.options.smtp_port(),
                        self.options.connect_timeout(),
                    )
                    .await
                }
            }
        }
    }
}

#[cfg(all(test, feature = "with-dns-checker"))]
mod tests;
