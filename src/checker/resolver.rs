use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Serialize;
use trust_dns_resolver::{
    TokioAsyncResolver,
    error::{ResolveError, ResolveErrorKind},
    lookup::TxtLookup,
};

use super::CheckError;

pub(crate) fn fqdn(label: &str, domain: &str) -> String {
    let trimmed = label.trim().trim_end_matches('.');
    if trimmed.is_empty() {
        domain.to_string()
    } else {
        format!("{}.{}", trimmed.to_ascii_lowercase(), domain)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct MxHost {
    pub preference: u16,
    pub exchange: String,
}

impl MxHost {
    pub fn new(preference: u16, exchange: impl Into<String>) -> Self {
        Self {
            preference,
            exchange: exchange.into(),
        }
    }
}

/// TXT lookups. A name without records resolves to an empty list.
#[async_trait]
pub trait LookupTxt: Send + Sync {
    async fn lookup_txt(&self, name: &str) -> Result<Vec<String>, CheckError>;
}

/// MX lookups. A domain without records resolves to an empty list.
#[async_trait]
pub trait LookupMx: Send + Sync {
    async fn lookup_mx(&self, domain: &str) -> Result<Vec<MxHost>, CheckError>;
}

/// Reachability probe for a mail host; returns the time to connect.
#[async_trait]
pub trait ReachProbe: Send + Sync {
    async fn connect(&self, host: &str, port: u16, timeout: Duration)
    -> std::io::Result<Duration>;
}

#[async_trait]
impl LookupTxt for TokioAsyncResolver {
    async fn lookup_txt(&self, name: &str) -> Result<Vec<String>, CheckError> {
        let lookup = match self.txt_lookup(name).await {
            Ok(lookup) => lookup,
            Err(err) => {
                if should_treat_as_empty(&err) {
                    return Ok(Vec::new());
                }
                return Err(CheckError::lookup("TXT", name, err));
            }
        };
        collect_txt_records(name, &lookup)
    }
}

#[async_trait]
impl LookupMx for TokioAsyncResolver {
    async fn lookup_mx(&self, domain: &str) -> Result<Vec<MxHost>, CheckError> {
        let lookup = match self.mx_lookup(domain).await {
            Ok(lookup) => lookup,
            Err(err) => {
                if should_treat_as_empty(&err) {
                    return Ok(Vec::new());
                }
                return Err(CheckError::lookup("MX", domain, err));
            }
        };
        let mut hosts = Vec::new();
        for mx in lookup.iter() {
            let exchange = normalize_exchange(mx.exchange().to_utf8());
            hosts.push(MxHost::new(mx.preference(), exchange));
        }
        Ok(hosts)
    }
}

/// Plain TCP connect, bounded by `timeout`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpProbe;

#[async_trait]
impl ReachProbe for TcpProbe {
    async fn connect(
        &self,
        host: &str,
        port: u16,
        timeout: Duration,
    ) -> std::io::Result<Duration> {
        let started = Instant::now();
        let stream = tokio::time::timeout(timeout, tokio::net::TcpStream::connect((host, port)))
            .await
            .map_err(|_| {
                std::io::Error::new(std::io::ErrorKind::TimedOut, "connect timed out")
            })??;
        drop(stream);
        Ok(started.elapsed())
    }
}

fn collect_txt_records(name: &str, lookup: &TxtLookup) -> Result<Vec<String>, CheckError> {
    let mut records = Vec::new();
    for txt in lookup.iter() {
        let mut record = String::new();
        for piece in txt.txt_data().iter() {
            let segment = std::str::from_utf8(piece.as_ref())
                .map_err(|err| CheckError::txt_data_utf8(name, err))?;
            record.push_str(segment);
        }
        records.push(record);
    }
    Ok(records)
}

pub(crate) fn normalize_exchange(exchange: String) -> String {
    let trimmed = exchange.trim_end_matches('.');
    trimmed.to_ascii_lowercase()
}

fn should_treat_as_empty(err: &ResolveError) -> bool {
    matches!(err.kind(), ResolveErrorKind::NoRecordsFound { .. })
}
