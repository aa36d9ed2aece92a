//! tuneloop - closed-loop coefficient tuning daemon
//!
//! Runs the tuning coordinator against the simulated plant and serves the
//! HTTP control surface.
//!
//! # Usage
//!
//! ```bash
//! # Built-in coefficient table, API on the default address
//! cargo run --release
//!
//! # Explicit config, reproducible plant, session log
//! ./tuneloop --config tuner_config.toml --seed 7 --log-dir ./sessions
//!
//! # Validate a config file and exit
//! ./tuneloop --config tuner_config.toml --check-config
//! ```
//!
//! # Environment Variables
//!
//! - `TUNELOOP_CONFIG`: Config path when `--config` is not given
//! - `TUNELOOP_CORS_ORIGINS`: Extra allowed CORS origins (comma-separated)
//! - `RUST_LOG`: Logging level (default: info)

use std::path::PathBuf;

use anyhow::{Context, Result};
use axum::Router;
use clap::Parser;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use tuneloop::api::{create_app, ApiState};
use tuneloop::config::TunerConfig;
use tuneloop::logging::{JsonlLogger, TracingLogger, TuningLogger};
use tuneloop::pipeline::{TuningCoordinator, TuningLoop};
use tuneloop::telemetry::{SimulatedPlant, SimulationOptions};

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "tuneloop")]
#[command(about = "Closed-loop coefficient tuning daemon")]
#[command(version)]
struct CliArgs {
    /// Path to tuner_config.toml (overrides TUNELOOP_CONFIG and ./tuner_config.toml)
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Override the HTTP server address (default from [server].addr)
    #[arg(short, long)]
    addr: Option<String>,

    /// Do not start the HTTP control surface
    #[arg(long)]
    no_api: bool,

    /// Seed for the simulated plant (random when omitted)
    #[arg(long)]
    seed: Option<u64>,

    /// Write a JSON-lines session log into this directory
    #[arg(long, value_name = "DIR")]
    log_dir: Option<PathBuf>,

    /// Validate the configuration and exit
    #[arg(long)]
    check_config: bool,
}

#[derive(Debug, Clone, Copy)]
enum TaskName {
    HttpServer,
    TuningLoop,
}

impl std::fmt::Display for TaskName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskName::HttpServer => write!(f, "HttpServer"),
            TaskName::TuningLoop => write!(f, "TuningLoop"),
        }
    }
}

// ============================================================================
// Task Spawning
// ============================================================================

/// Spawn the HTTP server task into the JoinSet.
fn spawn_http_server(
    task_set: &mut JoinSet<Result<TaskName>>,
    listener: tokio::net::TcpListener,
    app: Router,
    cancel_token: CancellationToken,
) {
    task_set.spawn(async move {
        info!("[HttpServer] Task starting");

        let result = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                cancel_token.cancelled().await;
                info!("[HttpServer] Received shutdown signal");
            })
            .await;

        match result {
            Ok(()) => {
                info!("[HttpServer] Graceful shutdown complete");
                Ok(TaskName::HttpServer)
            }
            Err(e) => {
                error!("[HttpServer] Server error: {}", e);
                Err(anyhow::anyhow!("HTTP server error: {}", e))
            }
        }
    });
}

/// Wait for every task. A failing task cancels the rest.
///
/// Cancellation does not end supervision early: the tuning loop still has to
/// flush telemetry and the session log.
async fn run_supervisor(
    task_set: &mut JoinSet<Result<TaskName>>,
    cancel_token: CancellationToken,
) -> Result<()> {
    info!("Supervisor: all tasks spawned, monitoring...");
    let mut failure = None;

    while let Some(result) = task_set.join_next().await {
        match result {
            Ok(Ok(task_name)) => {
                info!("Supervisor: task {} completed", task_name);
                // Either task finishing ends the session
                cancel_token.cancel();
            }
            Ok(Err(e)) => {
                error!("Supervisor: task failed with error: {}", e);
                cancel_token.cancel();
                failure.get_or_insert(e);
            }
            Err(e) => {
                error!("Supervisor: task panicked: {}", e);
                cancel_token.cancel();
                failure.get_or_insert(anyhow::anyhow!("Task panicked: {}", e));
            }
        }
    }

    failure.map_or(Ok(()), Err)
}

fn build_logger(log_dir: Option<&PathBuf>) -> Result<Vec<Box<dyn TuningLogger>>> {
    let mut loggers: Vec<Box<dyn TuningLogger>> = vec![Box::new(TracingLogger)];
    if let Some(dir) = log_dir {
        let jsonl = JsonlLogger::create(dir)
            .with_context(|| format!("Failed to create session log in {}", dir.display()))?;
        info!("Session log: {}", jsonl.path().display());
        loggers.push(Box::new(jsonl));
    }
    Ok(loggers)
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args = CliArgs::parse();

    let config = TunerConfig::load(args.config.as_deref()).context("Failed to load tuner configuration")?;
    let registry = config.registry().context("Invalid coefficient table")?;

    if args.check_config {
        info!(
            coefficients = registry.len(),
            sequence = registry.sequence_len(),
            "Configuration OK"
        );
        for (i, spec) in registry.tuning_sequence().iter().enumerate() {
            info!(
                "   {}. {} [{}, {}] start {} ({})",
                i + 1,
                spec.name,
                spec.min,
                spec.max,
                spec.initial,
                spec.reducer
            );
        }
        return Ok(());
    }

    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    info!("  tuneloop - closed-loop coefficient tuning");
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    info!(
        poll_rate_hz = config.tuner.poll_rate_hz,
        optimizer = %config.optimizer.kind,
        sequence = registry.sequence_len(),
        "Configuration loaded"
    );
    if !config.tuner.enabled {
        warn!("Tuning starts disabled; enable it via POST /api/v1/control/enable");
    }

    let plant = SimulatedPlant::new(SimulationOptions {
        seed: args.seed,
        ..SimulationOptions::default()
    });
    let logger = build_logger(args.log_dir.as_ref())?;
    let coordinator = TuningCoordinator::from_config(&config, plant)?.with_logger(logger);

    // Graceful shutdown via Ctrl+C
    let cancel_token = coordinator.cancel_token();
    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received Ctrl+C, initiating shutdown...");
        shutdown_token.cancel();
    });

    let mut task_set: JoinSet<Result<TaskName>> = JoinSet::new();

    // Task 1: HTTP Server
    if args.no_api {
        info!("HTTP control surface disabled (--no-api)");
    } else {
        let addr = args.addr.unwrap_or_else(|| config.server.addr.clone());
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .with_context(|| format!("Failed to bind to {}", addr))?;
        info!("HTTP control surface listening on http://{}", addr);
        let app = create_app(ApiState::new(coordinator.handle(), config.coefficients.clone()));
        spawn_http_server(&mut task_set, listener, app, cancel_token.clone());
    }

    // Task 2: Tuning loop
    task_set.spawn(async move {
        info!("[TuningLoop] Task starting");
        let _stats = TuningLoop::new(coordinator).run().await;
        Ok(TaskName::TuningLoop)
    });

    run_supervisor(&mut task_set, cancel_token).await?;

    info!("tuneloop shutdown complete");
    Ok(())
}
