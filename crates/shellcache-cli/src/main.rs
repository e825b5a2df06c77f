//! shellcache - command-line host for the offline cache coordinator.
//!
//! Each invocation plays the part of a freshly started worker: `upgrade`
//! runs install then activate, `get` intercepts a single request, and
//! `message` delivers a control message.

mod cli;

use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use shellcache_core::worker::{parse_origin, resolve_target, CacheStatus};
use shellcache_core::{
    ActivationOutcome, BuildManifest, CacheCoordinator, Config, FsStorage, HttpFetcher,
    Interception, MessageOutcome, Request, WorkerHost,
};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::{Args, Commands};

/// Log file name prefix inside the configured log directory
const LOG_FILE_PREFIX: &str = "shellcache.log";

/// Host for a single command-line invocation. There are no page clients to
/// claim, so lifecycle requests are only logged.
struct CliHost;

impl WorkerHost for CliHost {
    fn skip_waiting(&self) {
        info!("Skip-waiting requested");
    }

    fn claim_clients(&self) {
        info!("Clients claimed");
    }
}

/// Initialize the tracing subscriber for logging
fn init_tracing(verbose: bool, log_dir: Option<&Path>) -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(fmt::layer().with_ansi(false).with_writer(writer)), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

fn build_coordinator(config: &Config) -> Result<CacheCoordinator> {
    let origin = parse_origin(config.origin()?)?;
    let manifest_path = config.manifest_path()?;
    let manifest = BuildManifest::load(manifest_path)
        .with_context(|| format!("Failed to load manifest: {}", manifest_path.display()))?;

    let cache_dir = config.cache_dir()?;
    let storage = FsStorage::new(cache_dir.clone())
        .with_context(|| format!("Failed to open cache directory: {}", cache_dir.display()))?;
    let fetcher = HttpFetcher::new(config.request_timeout())?;

    info!(
        origin = %origin,
        resources = manifest.resources.len(),
        core = manifest.core.len(),
        cache_dir = %cache_dir.display(),
        "Coordinator ready"
    );

    Ok(CacheCoordinator::new(
        origin,
        manifest,
        Arc::new(storage),
        Arc::new(fetcher),
        Arc::new(CliHost),
    )
    .with_fill_concurrency(config.fill_concurrency))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    let mut config = match args.config {
        Some(ref path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    config.apply_env();
    args.apply_to(&mut config);

    let _log_guard = init_tracing(args.verbose, config.log_dir.as_deref());

    let coordinator = build_coordinator(&config)?;

    match args.command {
        Commands::Upgrade => upgrade(&coordinator).await,
        Commands::Get { ref target, ref output } => get(&coordinator, target, output.as_deref()).await,
        Commands::Message { ref name } => message(&coordinator, name).await,
        Commands::Status { json } => status(&coordinator, json).await,
    }
}

async fn upgrade(coordinator: &CacheCoordinator) -> Result<()> {
    coordinator.install().await.context("Install failed")?;

    match coordinator.activate().await? {
        ActivationOutcome::Activated(report) => {
            println!(
                "Activated: {} preserved, {} evicted, {} promoted{}",
                report.preserved,
                report.evicted,
                report.promoted,
                if report.first_install { " (first install)" } else { "" }
            );
        }
        ActivationOutcome::ResetAndDegraded { reason } => {
            warn!(reason = %reason, "Cache was reset");
            println!("Activated with an empty cache after reset: {}", reason);
        }
    }
    Ok(())
}

async fn get(coordinator: &CacheCoordinator, target: &str, output: Option<&Path>) -> Result<()> {
    let url = resolve_target(coordinator.origin(), target)?;
    let request = Request::get(url);

    let response = match coordinator.handle_fetch(&request).await? {
        Interception::Respond(response) => response,
        Interception::Passthrough => {
            info!(url = %request.url, "Not cached, fetching from network");
            coordinator.passthrough(&request).await?
        }
    };

    if !response.is_ok() {
        warn!(status = response.status, url = %request.url, "Non-success response");
    }

    match output {
        Some(path) => std::fs::write(path, &response.body)
            .with_context(|| format!("Failed to write {}", path.display()))?,
        None => io::stdout().write_all(&response.body)?,
    }
    Ok(())
}

async fn message(coordinator: &CacheCoordinator, name: &str) -> Result<()> {
    match coordinator.handle_message(name).await? {
        MessageOutcome::SkippedWaiting => println!("Skip-waiting signalled"),
        MessageOutcome::OfflineFill(report) => {
            println!(
                "Offline fill: {} fetched, {} already cached, {} failed",
                report.fetched.len(),
                report.already_cached,
                report.failed.len()
            );
            for failure in &report.failed {
                println!("  {}: {}", failure.key, failure.reason);
            }
        }
        MessageOutcome::Ignored => println!("Unknown message '{}' ignored", name),
    }
    Ok(())
}

async fn status(coordinator: &CacheCoordinator, json: bool) -> Result<()> {
    let status = coordinator.status().await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        print_status(coordinator, &status);
    }
    Ok(())
}

fn print_status(coordinator: &CacheCoordinator, status: &CacheStatus) {
    let record = match status.recorded_manifest {
        None => "none",
        Some(_) if status.record_is_current => "current",
        Some(_) => "outdated",
    };
    println!("Origin:         {}", coordinator.origin());
    println!("Version record: {}", record);
    println!("Staged:         {}", status.staged.len());
    println!(
        "Cached:         {} of {} resources",
        coordinator.manifest().resources.len() - status.missing.len(),
        coordinator.manifest().resources.len()
    );

    for entry in &status.entries {
        println!(
            "  {:<40} {:>4} {:>10} {:>10}{}",
            entry.key,
            entry.status,
            entry.bytes,
            entry.age,
            if entry.current { "" } else { "  (not in manifest)" }
        );
    }
    for key in &status.missing {
        println!("  {:<40} missing", key);
    }
}
