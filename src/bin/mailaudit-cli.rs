#[path = "mailaudit-cli/args.rs"]
mod args;
#[path = "mailaudit-cli/output.rs"]
mod output;

use std::sync::Arc;

use anyhow::{Context, Result};
use mailaudit::orchestrator::RunHandle;
use mailaudit::{
    DnsChecker, MemoryStore, Orchestrator, OrchestratorError, OwnerId, ProgressHub, RunRequest,
    RunSummary, Subscriber,
};
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::args::{Cli, Commands, OutputFormat, RunArgs};
use crate::output::Report;

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "mailaudit=debug"
    } else {
        "mailaudit=info"
    };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let Some(Commands::Run(run_args)) = cli.cmd else {
        Cli::clap_command().print_help()?;
        println!();
        return Ok(());
    };

    // codes de sortie : 0 OK, 2 tests en échec, 1 fatal
    if run(run_args).await? {
        std::process::exit(2);
    }
    Ok(())
}

/// Returns `true` when some kind still ends up failed.
async fn run(args: RunArgs) -> Result<bool> {
    let format = args.output_format()?;
    let checker = DnsChecker::from_system_conf(args.dns_options()).context("init DNS resolver")?;
    let hub = ProgressHub::default();
    let orchestrator = Orchestrator::with_options(
        Arc::new(MemoryStore::new()),
        Arc::new(checker),
        Arc::new(hub.clone()),
        args.orchestrator_options()?,
    );

    let owner = OwnerId::new();
    let mut subscriber = hub.connect(owner);
    let mut request = RunRequest::new(owner, args.domain.as_str());
    request.kinds = args.requested_kinds();
    request.session_name = args.name.clone();

    let started = orchestrator
        .start(request)
        .await
        .with_context(|| format!("start checks for '{}'", args.domain))?;
    let session_id = started.accepted.session_id;
    subscriber.subscribe_session(session_id);
    info!(%session_id, domain = %args.domain, "checks started");

    let summary = follow(&mut subscriber, started.task, format).await?;

    if args.retry_failed && summary.failed_count() > 0 {
        match orchestrator.retry(owner, session_id).await {
            Ok(retry) => {
                info!(%session_id, retried = retry.accepted.retried_count, "retrying failed checks");
                follow(&mut subscriber, retry.task, format).await?;
            }
            Err(OrchestratorError::NoFailedTests { .. }) => {}
            Err(err) => return Err(err).context("retry failed checks"),
        }
    }
    hub.close();

    let results = orchestrator
        .session_results(owner, session_id)
        .await
        .context("load session results")?;
    let report = Report::new(&results);
    let domain = mailaudit::normalize_domain(&args.domain)?;
    output::print_report(&report, domain.as_str(), format)?;
    Ok(report.has_failures())
}

/// Prints events of the run until its terminal event, then joins the task.
async fn follow(
    subscriber: &mut Subscriber,
    task: RunHandle,
    format: OutputFormat,
) -> Result<RunSummary> {
    while let Some(event) = subscriber.recv().await {
        output::print_event(&event, format)?;
        if event.is_terminal() {
            break;
        }
    }
    let summary = task.await.context("run task crashed")??;
    Ok(summary)
}
