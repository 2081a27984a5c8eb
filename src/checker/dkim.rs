use serde::Serialize;
use tracing::debug;

use crate::model::CheckOutcome;

use super::CheckError;
use super::resolver::{LookupTxt, fqdn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct DkimFindings {
    is_valid: bool,
    selector: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    record: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    key_type: Option<String>,
    testing: bool,
    selectors_checked: Vec<String>,
}

/// Probes `selectors` in order and scores the first one publishing a key.
///
/// Lookup failures on one selector do not stop the scan; they only surface
/// as an error when no selector yielded a key.
pub(crate) async fn check<R>(
    resolver: &R,
    ascii_domain: &str,
    selectors: &[String],
) -> Result<CheckOutcome, CheckError>
where
    R: LookupTxt + ?Sized,
{
    let mut last_error = None;
    for selector in selectors {
        let name = fqdn(&format!("{selector}._domainkey"), ascii_domain);
        let records = match resolver.lookup_txt(&name).await {
            Ok(records) => records,
            Err(err) => {
                debug!(selector = %selector, error = %err, "DKIM selector lookup failed");
                last_error = Some(err);
                continue;
            }
        };
        if let Some(key) = records.iter().find_map(|record| parse_key(record)) {
            return found(selector, key, selectors);
        }
    }

    if let Some(err) = last_error {
        return Err(err);
    }

    let findings = DkimFindings {
        is_valid: false,
        selector: None,
        record: None,
        key_type: None,
        testing: false,
        selectors_checked: selectors.to_vec(),
    };
    outcome(
        0,
        &findings,
        vec![
            "No DKIM record found. Implement DKIM signing for email authentication.".to_string(),
            "Configure your mail server to sign outgoing emails with DKIM.".to_string(),
            "Publish DKIM public key in DNS records.".to_string(),
        ],
    )
}

fn found(selector: &str, key: DkimKey, selectors: &[String]) -> Result<CheckOutcome, CheckError> {
    let mut recommendations = vec!["DKIM is configured".to_string()];
    if key.testing {
        recommendations.push(format!(
            "Selector '{selector}' is in testing mode (t=y). Remove the flag once signing is verified."
        ));
    }
    let findings = DkimFindings {
        is_valid: true,
        selector: Some(selector.to_string()),
        record: Some(key.record),
        key_type: Some(key.key_type),
        testing: key.testing,
        selectors_checked: selectors.to_vec(),
    };
    outcome(70, &findings, recommendations)
}

fn outcome(
    score: u8,
    findings: &DkimFindings,
    recommendations: Vec<String>,
) -> Result<CheckOutcome, CheckError> {
    let data = serde_json::to_value(findings).map_err(CheckError::encode)?;
    Ok(CheckOutcome::new(score, data, recommendations))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct DkimKey {
    record: String,
    key_type: String,
    testing: bool,
}

/// A key record carries a non-empty `p=` tag; `p=` empty means a revoked key.
pub(crate) fn parse_key(record: &str) -> Option<DkimKey> {
    let record = record.trim();
    let mut version_ok = true;
    let mut public_key = None;
    let mut key_type = "rsa".to_string();
    let mut testing = false;

    for part in record.split(';') {
        let trimmed = part.trim();
        if trimmed.is_empty() {
            continue;
        }
        let (key, value) = trimmed.split_once('=').unwrap_or((trimmed, ""));
        let key = key.trim().to_ascii_lowercase();
        let value = value.trim();

        match key.as_str() {
            "v" => version_ok = value.eq_ignore_ascii_case("dkim1"),
            "p" => public_key = Some(value.to_string()),
            "k" => key_type = value.to_ascii_lowercase(),
            "t" => {
                testing = value
                    .split(':')
                    .any(|flag| flag.trim().eq_ignore_ascii_case("y"))
            }
            _ => {}
        }
    }

    public_key.filter(|key| !key.is_empty())?;
    if !version_ok {
        return None;
    }
    Some(DkimKey {
        record: record.to_string(),
        key_type,
        testing,
    })
}
