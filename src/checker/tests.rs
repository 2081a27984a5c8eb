use std::collections::HashMap;
use std::io;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use super::{
    CheckError, Checker, DnsCheckOptions, DnsChecker, LookupMx, LookupTxt, MxHost, ReachProbe,
    dkim, dmarc, spf,
};
use crate::model::CheckKind;

#[derive(Default)]
struct StubResolver {
    txt: HashMap<String, Vec<String>>,
    mx: HashMap<String, Vec<MxHost>>,
    broken: Vec<String>,
}

impl StubResolver {
    fn new() -> Self {
        Self::default()
    }

    fn insert_txt<I, S>(&mut self, name: &str, records: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let values = records.into_iter().map(Into::into).collect();
        self.txt.insert(normalize_name(name), values);
    }

    fn insert_mx(&mut self, domain: &str, hosts: Vec<MxHost>) {
        self.mx.insert(normalize_name(domain), hosts);
    }

    fn break_name(&mut self, name: &str) {
        self.broken.push(normalize_name(name));
    }
}

#[async_trait]
impl LookupTxt for StubResolver {
    async fn lookup_txt(&self, name: &str) -> Result<Vec<String>, CheckError> {
        let key = normalize_name(name);
        if self.broken.contains(&key) {
            return Err(CheckError::failed(format!("SERVFAIL for {key}")));
        }
        Ok(self.txt.get(&key).cloned().unwrap_or_default())
    }
}

#[async_trait]
impl LookupMx for StubResolver {
    async fn lookup_mx(&self, domain: &str) -> Result<Vec<MxHost>, CheckError> {
        Ok(self
            .mx
            .get(&normalize_name(domain))
            .cloned()
            .unwrap_or_default())
    }
}

struct StubProbe {
    reachable: bool,
}

#[async_trait]
impl ReachProbe for StubProbe {
    async fn connect(&self, host: &str, port: u16, _timeout: Duration) -> io::Result<Duration> {
        assert_eq!(port, 25);
        if self.reachable {
            assert_eq!(host, "mx1.example.com");
            Ok(Duration::from_millis(42))
        } else {
            Err(io::Error::new(io::ErrorKind::ConnectionRefused, "refused"))
        }
    }
}

fn normalize_name(name: &str) -> String {
    name.trim().trim_end_matches('.').to_ascii_lowercase()
}

fn checker(resolver: StubResolver, reachable: bool) -> DnsChecker<StubResolver, StubProbe> {
    DnsChecker::with_parts(
        resolver,
        StubProbe { reachable },
        DnsCheckOptions::default(),
    )
}

#[test]
fn dmarc_missing_scores_zero() {
    let outcome = dmarc::evaluate(&[]).expect("evaluation succeeds");
    assert_eq!(outcome.score, 0);
    assert_eq!(outcome.result_data["isConfigured"], json!(false));
    assert_eq!(outcome.recommendations.len(), 3);
}

#[test]
fn dmarc_reject_with_reporting_scores_full() {
    let input = vec!["v=DMARC1; p=reject; rua=mailto:d@example.com".to_string()];
    let outcome = dmarc::evaluate(&input).expect("evaluation succeeds");
    assert_eq!(outcome.score, 100);
    assert_eq!(outcome.result_data["policy"], json!("reject"));
    assert_eq!(
        outcome.result_data["reportingEmails"],
        json!(["mailto:d@example.com"])
    );
    assert_eq!(outcome.recommendations, vec!["DMARC is properly configured"]);
}

#[test]
fn dmarc_none_policy_without_reporting_is_weak() {
    let input = vec!["v=DMARC1; p=none; pct=50".to_string()];
    let outcome = dmarc::evaluate(&input).expect("evaluation succeeds");
    assert_eq!(outcome.score, 30);
    assert_eq!(outcome.result_data["percentage"], json!(50));
    assert_eq!(outcome.recommendations.len(), 3);
    assert!(outcome.recommendations[0].contains("'none'"));
}

#[test]
fn spf_softfail_scores_ninety() {
    let input = vec!["v=spf1 include:_spf.example.net ~all".to_string()];
    let outcome = spf::evaluate(&input, 10).expect("evaluation succeeds");
    assert_eq!(outcome.score, 90);
    assert_eq!(outcome.result_data["includesCount"], json!(1));
    assert_eq!(outcome.result_data["dnsLookupCount"], json!(1));
    assert_eq!(outcome.recommendations, vec!["SPF is properly configured"]);
}

#[test]
fn spf_pass_all_and_lookup_overflow_flagged() {
    let mut record = String::from("v=spf1");
    for i in 0..11 {
        record.push_str(&format!(" include:_spf{i}.example.net"));
    }
    record.push_str(" +all");
    let outcome = spf::evaluate(&[record], 10).expect("evaluation succeeds");
    assert_eq!(outcome.score, 40);
    assert_eq!(outcome.recommendations.len(), 3);
}

#[test]
fn spf_redirect_does_not_require_all() {
    let input = vec!["v=spf1 redirect=_spf.example.net".to_string()];
    let outcome = spf::evaluate(&input, 10).expect("evaluation succeeds");
    assert_eq!(outcome.result_data["redirect"], json!("_spf.example.net"));
    assert_eq!(outcome.recommendations, vec!["SPF is properly configured"]);
}

#[test]
fn dkim_key_parsing_handles_testing_and_revoked_keys() {
    assert!(dkim::parse_key("v=DKIM1; k=rsa; p=MIIBIjANBg; t=y").is_some());
    assert!(dkim::parse_key("v=DKIM1; p=").is_none());
    assert!(dkim::parse_key("v=spf1 -all").is_none());
}

#[tokio::test]
async fn dkim_reports_first_selector_with_key() {
    let mut stub = StubResolver::new();
    stub.insert_txt(
        "google._domainkey.example.com",
        vec!["v=DKIM1; k=rsa; p=MIIBIjANBgkqhkiG9w0BAQEFAAOCAQ8A; t=y"],
    );
    let selectors: Vec<String> = ["default", "google"].iter().map(|s| s.to_string()).collect();

    let outcome = dkim::check(&stub, "example.com", &selectors)
        .await
        .expect("check succeeds");
    assert_eq!(outcome.score, 70);
    assert_eq!(outcome.result_data["selector"], json!("google"));
    assert_eq!(outcome.result_data["testing"], json!(true));
    assert_eq!(outcome.recommendations.len(), 2);
}

#[tokio::test]
async fn dkim_surfaces_lookup_error_when_nothing_found() {
    let mut stub = StubResolver::new();
    stub.break_name("default._domainkey.example.com");
    let selectors = vec!["default".to_string(), "k1".to_string()];

    let err = dkim::check(&stub, "example.com", &selectors)
        .await
        .expect_err("broken lookup without key should fail");
    assert!(err.to_string().contains("SERVFAIL"));
}

#[tokio::test]
async fn checker_routes_kinds_to_records() {
    let mut stub = StubResolver::new();
    stub.insert_txt("example.com", vec!["v=spf1 ip4:192.0.2.1 -all"]);
    stub.insert_txt(
        "_dmarc.example.com",
        vec!["v=DMARC1; p=quarantine; rua=mailto:d@example.com"],
    );
    stub.insert_mx(
        "example.com",
        vec![
            MxHost::new(20, "mx2.example.com"),
            MxHost::new(10, "mx1.example.com"),
        ],
    );
    let checker = checker(stub, true);

    let spf = checker
        .check(CheckKind::Spf, "Example.com")
        .await
        .expect("SPF check");
    assert_eq!(spf.score, 100);

    let dmarc = checker
        .check(CheckKind::Dmarc, "example.com")
        .await
        .expect("DMARC check");
    assert_eq!(dmarc.score, 80);

    let dkim = checker
        .check(CheckKind::Dkim, "example.com")
        .await
        .expect("DKIM check");
    assert_eq!(dkim.score, 0);

    let mail = checker
        .check(CheckKind::MailServer, "example.com")
        .await
        .expect("mail server check");
    assert_eq!(mail.score, 80);
    assert_eq!(
        mail.result_data["mxRecords"],
        json!(["mx1.example.com", "mx2.example.com"])
    );
    assert_eq!(mail.result_data["echoTest"]["responseTime"], json!(42));
}

#[tokio::test]
async fn unreachable_mail_server_scores_thirty() {
    let mut stub = StubResolver::new();
    stub.insert_mx("example.com", vec![MxHost::new(10, "mx1.example.com")]);
    let outcome = checker(stub, false)
        .check(CheckKind::MailServer, "example.com")
        .await
        .expect("mail server check");
    assert_eq!(outcome.score, 30);
    assert_eq!(outcome.result_data["echoTest"]["success"], json!(false));
}

#[tokio::test]
async fn missing_mx_scores_zero() {
    let outcome = checker(StubResolver::new(), true)
        .check(CheckKind::MailServer, "example.com")
        .await
        .expect("mail server check");
    assert_eq!(outcome.score, 0);
    assert_eq!(
        outcome.result_data["echoTest"]["errorMessage"],
        json!("No MX records found")
    );
}

#[tokio::test]
async fn invalid_domain_is_a_check_error() {
    let err = checker(StubResolver::new(), true)
        .check(CheckKind::Dmarc, "   ")
        .await
        .expect_err("empty domain");
    assert!(matches!(err, CheckError::InvalidDomain { .. }));
}

#[test]
fn selector_options_normalize_and_dedup() {
    let options = DnsCheckOptions::without_dkim_selectors()
        .with_dkim_selectors(["S1", "s1.", " ", "google"]);
    assert_eq!(options.dkim_selectors(), ["s1", "google"]);
}
