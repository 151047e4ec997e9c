mod cli;
mod ui;

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

use cli::{Cli, Command};
use faction_ops::api::{CircuitBreaker, HttpTransport, RateLimiter, ResilientClient};
use faction_ops::clock::{Clock, SystemClock, TokioSleeper};
use faction_ops::config::FactionOpsConfig;
use faction_ops::loader::{FactionLoader, Snapshot};
use faction_ops::optimizer::Matcher;
use faction_ops::sync::FactionSync;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .or_else(|_| EnvFilter::try_new(default_level))
                .unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let mut config = FactionOpsConfig::load(cli.config.as_deref())?;
    if let Some(max_retries) = cli.max_retries {
        config.resilience.max_retries = max_retries;
    }

    match cli.command {
        Command::Fetch { factions, out } => fetch(&config, &factions, &out).await,
        Command::Optimize { snapshot, json } => optimize(&config, &snapshot, json),
    }
}

async fn fetch(config: &FactionOpsConfig, factions: &[u64], out: &Path) -> Result<ExitCode> {
    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("ctrl-c received, cancelling pending waits");
            on_signal.cancel();
        }
    });

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let breaker = Arc::new(CircuitBreaker::new(
        config.resilience.breaker_config(),
        Arc::clone(&clock),
    ));
    let limiter = Arc::new(RateLimiter::new(
        config.resilience.min_interval(),
        Arc::clone(&clock),
    ));
    let transport = HttpTransport::new(config.api.timeout()).context("building HTTP client")?;
    let client = ResilientClient::new(
        transport,
        TokioSleeper::new(cancel),
        breaker,
        limiter,
        config.resilience.retry_policy(),
    );

    let loader = FactionLoader::new(&client, config.api.base_url.as_str(), config.api.api_key.as_str());
    let sync = FactionSync::new(loader, clock, config.api.faction_delay(), out);

    let progress = ui::SyncProgress::start(factions);
    let report = sync.run(factions).await;
    progress.complete(&report);

    debug!(breaker = ?client.circuit_breaker_status(), "sync finished");

    Ok(if report.is_clean() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn optimize(config: &FactionOpsConfig, path: &Path, json: bool) -> Result<ExitCode> {
    let snapshot = Snapshot::load(path).with_context(|| format!("loading {}", path.display()))?;
    let matcher = Matcher::new(config.optimizer.clone(), snapshot.generated_at);
    let result = matcher.optimize(&snapshot.actors, &snapshot.slots, &snapshot.observations);

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        ui::print_optimization(snapshot.faction_id, &result);
    }
    Ok(ExitCode::SUCCESS)
}
