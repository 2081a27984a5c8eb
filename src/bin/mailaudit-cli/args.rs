use std::time::Duration;

use anyhow::{Result, bail};
use clap::{Args, Parser, Subcommand};
use mailaudit::{CheckKind, DnsCheckOptions, OrchestratorOptions, ScoreScope};

#[derive(Parser)]
#[command(name = "mailaudit-cli", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub cmd: Option<Commands>,

    /// logs détaillés (niveau debug, sauf si RUST_LOG est défini)
    #[arg(long, short, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// lance la batterie de tests sur un domaine
    Run(RunArgs),
}

#[derive(Args)]
pub struct RunArgs {
    /// domaine à tester (IDN accepté)
    pub domain: String,

    /// type de test à exécuter (répétable) : dmarc|spf|dkim|mail_server
    #[arg(long = "kind", value_parser = clap::value_parser!(CheckKind))]
    pub kinds: Vec<CheckKind>,

    /// nom de la session (par défaut "Test session for <domaine>")
    #[arg(long)]
    pub name: Option<String>,

    /// durée maximale d'un test (secondes)
    #[arg(long = "timeout", default_value_t = 30)]
    pub timeout_secs: u64,

    /// ajoute un sélecteur DKIM à interroger (répétable, remplace la liste par défaut)
    #[arg(long = "dkim-selector")]
    pub dkim_selectors: Vec<String>,

    /// port SMTP utilisé pour le test de connexion
    #[arg(long = "smtp-port", default_value_t = 25)]
    pub smtp_port: u16,

    /// timeout de connexion au serveur de mail (ms)
    #[arg(long = "connect-timeout", default_value_t = 10_000)]
    pub connect_timeout_ms: u64,

    /// calcul du score : current-run|latest-per-kind
    #[arg(long = "score-scope", default_value = "current-run")]
    pub score_scope: String,

    /// relance une fois les tests en échec
    #[arg(long = "retry-failed")]
    pub retry_failed: bool,

    /// format: human|json
    #[arg(long, default_value = "human")]
    pub format: String,
}

#[derive(Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Human,
    Json,
}

impl Cli {
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }

    pub fn clap_command() -> clap::Command {
        <Self as clap::CommandFactory>::command()
    }
}

impl RunArgs {
    pub fn output_format(&self) -> Result<OutputFormat> {
        match self.format.as_str() {
            "human" => Ok(OutputFormat::Human),
            "json" => Ok(OutputFormat::Json),
            other => bail!("unknown --format '{other}', use: human|json"),
        }
    }

    /// `None` lets the orchestrator use its default kinds.
    pub fn requested_kinds(&self) -> Option<Vec<CheckKind>> {
        (!self.kinds.is_empty()).then(|| self.kinds.clone())
    }

    pub fn orchestrator_options(&self) -> Result<OrchestratorOptions> {
        if self.timeout_secs == 0 {
            bail!("--timeout must be greater than zero");
        }
        let scope: ScoreScope = self.score_scope.parse()?;
        Ok(OrchestratorOptions::default()
            .with_check_timeout(Duration::from_secs(self.timeout_secs))
            .with_score_scope(scope))
    }

    pub fn dns_options(&self) -> DnsCheckOptions {
        let options = if self.dkim_selectors.is_empty() {
            DnsCheckOptions::default()
        } else {
            DnsCheckOptions::without_dkim_selectors().with_dkim_selectors(&self.dkim_selectors)
        };
        options
            .with_smtp_port(self.smtp_port)
            .with_connect_timeout(Duration::from_millis(self.connect_timeout_ms))
    }
}
