use std::time::Duration;

/// DKIM selectors probed when the caller does not provide any.
pub const DEFAULT_DKIM_SELECTORS: [&str; 7] = [
    "default",
    "selector1",
    "selector2",
    "google",
    "k1",
    "dkim",
    "mail",
];

/// Configuration knobs for [`DnsChecker`](super::DnsChecker).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsCheckOptions {
    dkim_selectors: Vec<String>,
    smtp_port: u16,
    connect_timeout: Duration,
    spf_lookup_limit: usize,
}

impl DnsCheckOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Options with an empty selector list, to be filled with
    /// [`with_dkim_selector`](Self::with_dkim_selector).
    pub fn without_dkim_selectors() -> Self {
        Self {
            dkim_selectors: Vec::new(),
            ..Self::default()
        }
    }

    pub fn with_dkim_selector(mut self, selector: impl Into<String>) -> Self {
        if let Some(normalized) = normalize_selector(selector.into()) {
            if !self.dkim_selectors.contains(&normalized) {
                self.dkim_selectors.push(normalized);
            }
        }
        self
    }

    pub fn with_dkim_selectors<I, S>(mut self, selectors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for selector in selectors {
            self = self.with_dkim_selector(selector);
        }
        self
    }

    pub fn with_smtp_port(mut self, port: u16) -> Self {
        self.smtp_port = port;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_spf_lookup_limit(mut self, limit: usize) -> Self {
        self.spf_lookup_limit = limit;
        self
    }

    pub fn dkim_selectors(&self) -> &[String] {
        &self.dkim_selectors
    }

    pub fn smtp_port(&self) -> u16 {
        self.smtp_port
    }

    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    pub fn spf_lookup_limit(&self) -> usize {
        self.spf_lookup_limit
    }
}

impl Default for DnsCheckOptions {
    fn default() -> Self {
        Self {
            dkim_selectors: DEFAULT_DKIM_SELECTORS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            smtp_port: 25,
            connect_timeout: Duration::from_secs(10),
            spf_lookup_limit: 10,
        }
    }
}

fn normalize_selector(input: String) -> Option<String> {
    let trimmed = input.trim().trim_end_matches('.');
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.to_ascii_lowercase())
}
