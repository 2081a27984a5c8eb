use std::collections::HashMap;

use serde::Serialize;

use crate::model::CheckOutcome;

use super::CheckError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct DmarcFindings {
    is_configured: bool,
    policy: Option<String>,
    subdomain_policy: Option<String>,
    percentage: Option<u8>,
    reporting_emails: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    record: Option<String>,
}

pub(crate) fn evaluate(records: &[String]) -> Result<CheckOutcome, CheckError> {
    let dmarc_records: Vec<&str> = records
        .iter()
        .map(|record| record.trim())
        .filter(|trimmed| starts_with_ignore_ascii_case(trimmed, "v=dmarc1"))
        .collect();

    let Some(record) = dmarc_records.first() else {
        let findings = DmarcFindings {
            is_configured: false,
            policy: None,
            subdomain_policy: None,
            percentage: None,
            reporting_emails: Vec::new(),
            record: None,
        };
        return outcome(
            0,
            &findings,
            vec![
                "No DMARC record found. Implement DMARC policy to protect against email spoofing."
                    .to_string(),
                "Start with 'p=none' policy to monitor email authentication.".to_string(),
                "Add aggregate reporting (rua) to monitor DMARC compliance.".to_string(),
            ],
        );
    };

    let tags = parse_tags(record);
    let policy = tags.get("p").map(|p| p.to_ascii_lowercase());
    let subdomain_policy = tags.get("sp").map(|p| p.to_ascii_lowercase());
    let raw_pct = tags.get("pct");
    let percentage = match raw_pct {
        Some(raw) => raw.parse::<u8>().ok().filter(|pct| *pct <= 100),
        None => Some(100),
    };
    let reporting_emails: Vec<String> = tags
        .get("rua")
        .map(|rua| {
            rua.split(',')
                .map(str::trim)
                .filter(|email| !email.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    let mut score: u16 = 30;
    match policy.as_deref() {
        Some("quarantine") => score += 30,
        Some("reject") => score += 50,
        _ => {}
    }
    if !reporting_emails.is_empty() {
        score += 20;
    }

    let mut recommendations = Vec::new();
    if dmarc_records.len() > 1 {
        recommendations.push(
            "Multiple DMARC records published. Receivers ignore DMARC when more than one record exists."
                .to_string(),
        );
    }
    match policy.as_deref() {
        Some("none") => recommendations.push(
            "Consider upgrading DMARC policy from 'none' to 'quarantine' or 'reject'".to_string(),
        ),
        Some("quarantine") | Some("reject") => {}
        Some(other) => recommendations.push(format!(
            "Unknown DMARC policy '{other}'. Use 'none', 'quarantine' or 'reject'."
        )),
        None => recommendations.push("DMARC record has no policy (p=) tag".to_string()),
    }
    if reporting_emails.is_empty() {
        recommendations.push("Add aggregate reporting (rua) to monitor DMARC compliance".to_string());
    }
    match percentage {
        Some(pct) if pct < 100 => recommendations
            .push("Consider increasing DMARC percentage to 100% for full protection".to_string()),
        Some(_) => {}
        None => recommendations.push("DMARC pct tag is not a valid percentage".to_string()),
    }
    if recommendations.is_empty() {
        recommendations.push("DMARC is properly configured".to_string());
    }

    let findings = DmarcFindings {
        is_configured: true,
        policy,
        subdomain_policy,
        percentage,
        reporting_emails,
        record: Some(record.to_string()),
    };
    outcome(score.min(100) as u8, &findings, recommendations)
}

fn outcome(
    score: u8,
    findings: &DmarcFindings,
    recommendations: Vec<String>,
) -> Result<CheckOutcome, CheckError> {
    let data = serde_json::to_value(findings).map_err(CheckError::encode)?;
    Ok(CheckOutcome::new(score, data, recommendations))
}

pub(crate) fn starts_with_ignore_ascii_case(input: &str, prefix: &str) -> bool {
    input
        .get(..prefix.len())
        .map(|head| head.eq_ignore_ascii_case(prefix))
        .unwrap_or(false)
}

fn parse_tags(record: &str) -> HashMap<String, String> {
    let mut tags = HashMap::new();
    for part in record.split(';') {
        let trimmed = part.trim();
        if trimmed.is_empty() {
            continue;
        }
        let (key, value) = trimmed.split_once('=').unwrap_or((trimmed, ""));
        tags.insert(key.trim().to_ascii_lowercase(), value.trim().to_string());
    }
    tags
}
