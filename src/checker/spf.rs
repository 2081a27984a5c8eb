use serde::Serialize;

use crate::model::CheckOutcome;

use super::CheckError;
use super::dmarc::starts_with_ignore_ascii_case;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) enum SpfQualifier {
    Fail,
    SoftFail,
    Neutral,
    Pass,
}

impl SpfQualifier {
    fn bonus(self) -> u16 {
        match self {
            Self::Fail => 40,
            Self::SoftFail => 30,
            Self::Neutral => 10,
            Self::Pass => 0,
        }
    }

    fn is_strict(self) -> bool {
        matches!(self, Self::Fail | Self::SoftFail)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SpfFindings {
    is_valid: bool,
    record: Option<String>,
    mechanisms: Vec<String>,
    includes_count: usize,
    dns_lookup_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    qualifier: Option<SpfQualifier>,
    #[serde(skip_serializing_if = "Option::is_none")]
    redirect: Option<String>,
}

pub(crate) fn evaluate(records: &[String], lookup_limit: usize) -> Result<CheckOutcome, CheckError> {
    let spf_records: Vec<&str> = records
        .iter()
        .map(|record| record.trim())
        .filter(|trimmed| starts_with_ignore_ascii_case(trimmed, "v=spf1"))
        .collect();

    let Some(record) = spf_records.first() else {
        let findings = SpfFindings {
            is_valid: false,
            record: None,
            mechanisms: Vec::new(),
            includes_count: 0,
            dns_lookup_count: 0,
            qualifier: None,
            redirect: None,
        };
        return outcome(
            0,
            &findings,
            vec![
                "No SPF record found. Implement SPF to specify authorized mail servers.".to_string(),
                "Add SPF record starting with 'v=spf1' followed by authorized mechanisms."
                    .to_string(),
                "End SPF record with '-all' or '~all' to handle unauthorized senders.".to_string(),
            ],
        );
    };

    let mechanisms: Vec<String> = record
        .split_whitespace()
        .skip(1)
        .map(str::to_string)
        .collect();

    let mut qualifier = None;
    let mut redirect = None;
    let mut includes_count = 0;
    let mut dns_lookup_count = 0;

    for token in &mechanisms {
        let lower = token.to_ascii_lowercase();
        if qualifier.is_none() {
            qualifier = qualifier_from_token(&lower);
        }
        if redirect.is_none() && lower.starts_with("redirect=") {
            redirect = token
                .split_once('=')
                .map(|(_, value)| value.trim())
                .filter(|value| !value.is_empty())
                .map(str::to_string);
        }
        let term = lower.trim_start_matches(['+', '-', '~', '?']);
        if term.starts_with("include:") {
            includes_count += 1;
        }
        if costs_dns_lookup(term) {
            dns_lookup_count += 1;
        }
    }

    let mut score: u16 = 40;
    if let Some(qualifier) = qualifier {
        score += qualifier.bonus();
    }
    if dns_lookup_count <= lookup_limit {
        score += 20;
    }

    let mut recommendations = Vec::new();
    if spf_records.len() > 1 {
        recommendations.push(
            "Multiple SPF records published. Merge them into a single 'v=spf1' record."
                .to_string(),
        );
    }
    let strict = qualifier.map(SpfQualifier::is_strict).unwrap_or(false);
    if !strict && redirect.is_none() {
        recommendations.push(
            "End SPF record with '-all' or '~all' to handle unauthorized senders".to_string(),
        );
    }
    if dns_lookup_count > lookup_limit {
        recommendations.push(format!(
            "SPF record may exceed DNS lookup limit ({lookup_limit}). Consider consolidating mechanisms."
        ));
    }
    if includes_count > 5 {
        recommendations.push(
            "Consider reducing number of include mechanisms for better performance".to_string(),
        );
    }
    if recommendations.is_empty() {
        recommendations.push("SPF is properly configured".to_string());
    }

    let findings = SpfFindings {
        is_valid: true,
        record: Some(record.to_string()),
        mechanisms,
        includes_count,
        dns_lookup_count,
        qualifier,
        redirect,
    };
    outcome(score.min(100) as u8, &findings, recommendations)
}

fn outcome(
    score: u8,
    findings: &SpfFindings,
    recommendations: Vec<String>,
) -> Result<CheckOutcome, CheckError> {
    let data = serde_json::to_value(findings).map_err(CheckError::encode)?;
    Ok(CheckOutcome::new(score, data, recommendations))
}

fn qualifier_from_token(token: &str) -> Option<SpfQualifier> {
    match token {
        "-all" => Some(SpfQualifier::Fail),
        "~all" => Some(SpfQualifier::SoftFail),
        "?all" => Some(SpfQualifier::Neutral),
        "all" | "+all" => Some(SpfQualifier::Pass),
        _ => None,
    }
}

/// Terms that make the receiver issue a DNS query (RFC 7208 §4.6.4).
fn costs_dns_lookup(term: &str) -> bool {
    let name = term
        .split([':', '/', '='])
        .next()
        .unwrap_or_default();
    matches!(name, "include" | "a" | "mx" | "ptr" | "exists" | "redirect")
}
