use std::collections::BTreeMap;

use anyhow::Result;
use mailaudit::orchestrator::overall_score;
use mailaudit::{CheckKind, CheckRecord, ProgressEvent, Session, SessionResults};
use serde::Serialize;

use crate::args::OutputFormat;

/// Final report: the session plus the latest record of each kind.
///
/// `score` is computed over `results`; the session's stored score only
/// covers the records of its last run.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Report<'a> {
    pub session: &'a Session,
    pub results: Vec<&'a CheckRecord>,
    pub score: u8,
    pub history_len: usize,
}

impl<'a> Report<'a> {
    pub fn new(results: &'a SessionResults) -> Self {
        let mut latest: BTreeMap<CheckKind, &CheckRecord> = BTreeMap::new();
        for record in &results.results {
            latest.insert(record.kind, record);
        }
        let results_by_kind: Vec<&CheckRecord> = latest.into_values().collect();
        Self {
            session: &results.session,
            score: overall_score(results_by_kind.iter().copied()),
            results: results_by_kind,
            history_len: results.results.len(),
        }
    }

    pub fn has_failures(&self) -> bool {
        self.results.iter().any(|record| record.is_failed())
    }
}

/// Progress goes to stderr (human) or stdout as one JSON object per line.
pub fn print_event(event: &ProgressEvent, format: OutputFormat) -> Result<()> {
    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string(event)?);
        return Ok(());
    }
    match event {
        ProgressEvent::Progress(progress) => {
            eprintln!(
                "[{}/{}] {} ...",
                progress.completed_tests + 1,
                progress.total_tests,
                progress.current_test
            );
            if let Some(last) = progress.results.last() {
                eprintln!("        previous: {}", record_line(last));
            }
        }
        ProgressEvent::Complete(complete) => {
            if let Some(last) = complete.results.last() {
                eprintln!("        previous: {}", record_line(last));
            }
            eprintln!(
                "[done]  {} tests, score {}",
                complete.completed_tests, complete.overall_score
            );
        }
        ProgressEvent::Error(error) => {
            eprintln!("[error] {}", error.error);
        }
    }
    Ok(())
}

pub fn print_report(report: &Report<'_>, domain: &str, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            // last NDJSON line, after the events
            println!("{}", serde_json::to_string(report)?);
        }
        OutputFormat::Human => {
            let session = report.session;
            println!("{} ({})", domain, session.name);
            println!(
                "  session {} :: {} :: score {} (latest per kind)",
                session.id.short(),
                session.status,
                report.score
            );
            for record in &report.results {
                println!("  {}", record_line(record));
                for recommendation in &record.recommendations {
                    println!("      - {recommendation}");
                }
            }
        }
    }
    Ok(())
}

fn record_line(record: &CheckRecord) -> String {
    match (record.score, record.error_message.as_deref()) {
        (Some(score), _) => format!("[OK]     {:<12} {score:>3}", record.kind.to_string()),
        (None, Some(error)) => format!("[FAILED] {:<12} {error}", record.kind.to_string()),
        (None, None) => format!("[{}] {}", record.status, record.kind),
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use mailaudit::{CheckId, CheckStatus, DomainId, OwnerId, SessionId};
    use serde_json::json;

    use super::*;

    fn check(kind: CheckKind, score: Option<u8>) -> CheckRecord {
        let now = Utc::now();
        CheckRecord {
            id: CheckId::new(),
            session_id: SessionId::new(),
            domain_id: DomainId::new(),
            kind,
            status: if score.is_some() {
                CheckStatus::Completed
            } else {
                CheckStatus::Failed
            },
            result_data: score.map(|_| json!({})),
            error_message: score.is_none().then(|| "timeout".to_string()),
            score,
            recommendations: Vec::new(),
            started_at: now,
            completed_at: Some(now),
            created_at: now,
        }
    }

    #[test]
    fn report_scores_latest_record_of_every_kind() {
        let now = Utc::now();
        // a retry that only re-ran DKIM leaves the session scored on DKIM alone
        let results = SessionResults {
            session: Session {
                id: SessionId::new(),
                domain_id: DomainId::new(),
                owner_id: OwnerId::new(),
                name: "Test session for example.com".into(),
                status: CheckStatus::Completed,
                total_tests: 2,
                completed_tests: 1,
                overall_score: Some(70),
                created_at: now,
                updated_at: now,
            },
            results: vec![
                check(CheckKind::Dmarc, Some(90)),
                check(CheckKind::Dkim, None),
                check(CheckKind::Dkim, Some(70)),
            ],
        };

        let report = Report::new(&results);
        assert_eq!(report.results.len(), 2);
        assert_eq!(report.history_len, 3);
        assert_eq!(report.score, 80);
        assert!(!report.has_failures());

        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["score"], 80);
        assert_eq!(value["session"]["overallScore"], 70);
    }
}
