use std::time::Duration;

use serde::Serialize;
use tracing::debug;

use crate::model::CheckOutcome;

use super::CheckError;
use super::resolver::{LookupMx, MxHost, ReachProbe};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
struct EchoTest {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_time: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
struct MailServerFindings {
    mx_records: Vec<String>,
    echo_test: EchoTest,
}

/// Resolves MX hosts and opens a TCP connection to the preferred one.
pub(crate) async fn check<R, P>(
    resolver: &R,
    probe: &P,
    ascii_domain: &str,
    port: u16,
    connect_timeout: Duration,
) -> Result<CheckOutcome, CheckError>
where
    R: LookupMx + ?Sized,
    P: ReachProbe + ?Sized,
{
    let mut hosts = resolver.lookup_mx(ascii_domain).await?;
    hosts.sort();
    hosts.dedup();

    let mx_records: Vec<String> = hosts.iter().map(|host| host.exchange.clone()).collect();

    let Some(preferred) = hosts.first() else {
        return unreachable(
            mx_records,
            "No MX records found",
            0,
            "Configure MX records for email delivery.",
        );
    };

    if is_null_mx(&hosts) {
        return unreachable(
            mx_records,
            "Domain publishes a null MX record",
            0,
            "Domain declares it does not accept mail (null MX). Remove it if mail should be received.",
        );
    }

    match probe
        .connect(&preferred.exchange, port, connect_timeout)
        .await
    {
        Ok(elapsed) => {
            let findings = MailServerFindings {
                mx_records,
                echo_test: EchoTest {
                    success: true,
                    response_time: Some(elapsed.as_millis() as u64),
                    error_message: None,
                },
            };
            outcome(80, &findings, vec!["Mail server is accessible".to_string()])
        }
        Err(err) => {
            debug!(host = %preferred.exchange, port, error = %err, "mail server connect failed");
            unreachable(
                mx_records,
                "Cannot connect to mail server",
                30,
                "Mail server connectivity issues detected.",
            )
        }
    }
}

/// RFC 7505: a single MX with an empty exchange (".") means "no mail".
fn is_null_mx(hosts: &[MxHost]) -> bool {
    hosts.len() == 1 && hosts[0].exchange.is_empty()
}

fn unreachable(
    mx_records: Vec<String>,
    error_message: &str,
    score: u8,
    recommendation: &str,
) -> Result<CheckOutcome, CheckError> {
    let findings = MailServerFindings {
        mx_records,
        echo_test: EchoTest {
            success: false,
            response_time: None,
            error_message: Some(error_message.to_string()),
        },
    };
    outcome(score, &findings, vec![recommendation.to_string()])
}

fn outcome(
    score: u8,
    findings: &MailServerFindings,
    recommendations: Vec<String>,
) -> Result<CheckOutcome, CheckError> {
    let data = serde_json::to_value(findings).map_err(CheckError::encode)?;
    Ok(CheckOutcome::new(score, data, recommendations))
}
