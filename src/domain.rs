//! Domain name normalisation: IDNA conversion plus label checks.

use std::fmt;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("domain is empty")]
    Empty,
    #[error("domain IDNA conversion failed")]
    IdnaConversion {
        #[source]
        source: idna::Errors,
    },
    #[error("invalid domain '{domain}': {}", reasons.join("; "))]
    Invalid {
        domain: String,
        reasons: Vec<String>,
    },
}

/// A domain in its ASCII (punycode) form, lowercase, without trailing dot.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DomainName(String);

impl DomainName {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for DomainName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for DomainName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

pub fn normalize_domain(input: &str) -> Result<DomainName, DomainError> {
    let trimmed = input.trim().trim_end_matches('.');
    if trimmed.is_empty() {
        return Err(DomainError::Empty);
    }
    let ascii = idna::domain_to_ascii(trimmed)
        .map_err(|source| DomainError::IdnaConversion { source })?;
    if ascii.is_empty() {
        return Err(DomainError::Empty);
    }

    let mut reasons = Vec::new();
    check_labels(&ascii, &mut reasons);
    if reasons.is_empty() {
        Ok(DomainName(ascii))
    } else {
        Err(DomainError::Invalid {
            domain: ascii,
            reasons,
        })
    }
}

fn check_labels(domain_ascii: &str, reasons: &mut Vec<String>) {
    if domain_ascii.len() > 253 {
        reasons.push(format!("total length {} > 253", domain_ascii.len()));
    }

    // au moins un point
    if !domain_ascii.contains('.') {
        reasons.push("domain must contain at least one dot".to_string());
    }

    for label in domain_ascii.split('.') {
        if label.is_empty() {
            reasons.push("empty domain label".to_string());
            continue;
        }
        if label.len() > 63 {
            reasons.push(format!(
                "domain label '{}' length {} > 63",
                label,
                label.len()
            ));
        }
        if label.starts_with('-') || label.ends_with('-') {
            reasons.push(format!(
                "domain label '{}' cannot start/end with '-'",
                label
            ));
        }
        if !label
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            reasons.push(format!("domain label '{}' has invalid chars", label));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_domain_ok() {
        let name = normalize_domain("Example.COM.").expect("valid domain");
        assert_eq!(name.as_str(), "example.com");
    }

    #[test]
    fn unicode_domain_converted_to_punycode() {
        let name = normalize_domain("bücher.example").expect("valid IDN");
        assert_eq!(name.as_str(), "xn--bcher-kva.example");
    }

    #[test]
    fn empty_rejected() {
        assert!(matches!(normalize_domain("  "), Err(DomainError::Empty)));
    }

    #[test]
    fn label_too_long() {
        let long = "a".repeat(64);
        let err = normalize_domain(&format!("{}.com", long)).expect_err("label too long");
        assert!(matches!(err, DomainError::Invalid { .. }));
    }

    #[test]
    fn single_label_rejected() {
        match normalize_domain("localhost") {
            Err(DomainError::Invalid { reasons, .. }) => {
                assert!(reasons.iter().any(|r| r.contains("at least one dot")))
            }
            other => panic!("expected invalid domain, got {:?}", other),
        }
    }

    #[test]
    fn hyphen_edges_rejected() {
        assert!(normalize_domain("-bad.example.com").is_err());
    }
}
