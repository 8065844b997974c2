//! open-balancer - LLM brownout controller
//!
//! Serves the brownout console API and optionally drives the controller
//! from a background metrics source.
//!
//! # Usage
//!
//! ```bash
//! # API only; samples arrive via POST /api/metrics or webhooks
//! cargo run --release
//!
//! # Drive the controller with the synthetic generator
//! ./open-balancer --simulate --seed 42 --interval-secs 5
//!
//! # Replay a JSON-lines capture
//! ./open-balancer --replay samples.jsonl --interval-secs 1
//!
//! # Pipe live samples in
//! tail -f samples.jsonl | ./open-balancer --stdin
//!
//! # Validate a config file without starting
//! ./open-balancer check-config --config balancer.toml
//! ```
//!
//! # Environment Variables
//!
//! - `BALANCER_CONFIG`: path to the TOML config file
//! - `BALANCER_SERVER_ADDR`: override the bind address
//! - `BALANCER_CORS_ORIGINS`: comma-separated allowed origins
//! - `RUST_LOG`: logging level (default: info)

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use open_balancer::api::{create_app, ConsoleState};
use open_balancer::brownout::BrownoutController;
use open_balancer::config::{self, BalancerConfig, ConfigError, ConfigEvent, SamplerSource};
use open_balancer::pipeline::{
    MetricsHistory, MetricsSource, ReplaySource, SamplingLoop, StdinSource, SyntheticSource,
};

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "open-balancer")]
#[command(about = "Brownout controller for LLM-backed services")]
#[command(version)]
struct CliArgs {
    /// Config file (default search: $BALANCER_CONFIG, ./balancer.toml)
    #[arg(short, long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Override the server address (default: "0.0.0.0:8080")
    #[arg(short, long)]
    addr: Option<String>,

    /// Run the background sampler with synthetic metrics
    #[arg(long)]
    simulate: bool,

    /// Run the background sampler over a JSON-lines capture
    #[arg(long, value_name = "PATH", conflicts_with_all = ["stdin", "simulate"])]
    replay: Option<PathBuf>,

    /// Run the background sampler over JSON lines from stdin
    #[arg(long, conflicts_with = "simulate")]
    stdin: bool,

    /// Seed for the synthetic generator
    #[arg(long)]
    seed: Option<u64>,

    /// Seconds between sampled metrics (0 = no delay)
    #[arg(long)]
    interval_secs: Option<u64>,

    #[command(subcommand)]
    command: Option<SubCommand>,
}

#[derive(clap::Subcommand, Debug)]
enum SubCommand {
    /// Load and validate the config file, then exit
    CheckConfig,
    /// Print the built-in default config as TOML
    DefaultConfig,
}

// ============================================================================
// Supervised Tasks
// ============================================================================

#[derive(Debug, Clone, Copy)]
enum TaskName {
    HttpServer,
    Sampler,
    ConfigWatcher,
}

impl std::fmt::Display for TaskName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskName::HttpServer => write!(f, "HttpServer"),
            TaskName::Sampler => write!(f, "Sampler"),
            TaskName::ConfigWatcher => write!(f, "ConfigWatcher"),
        }
    }
}

/// Spawn the HTTP server task into the JoinSet.
fn spawn_http_server(
    task_set: &mut JoinSet<Result<TaskName>>,
    listener: tokio::net::TcpListener,
    app: axum::Router,
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

/// Spawn the background sampler. The server keeps running after the
/// source is exhausted.
fn spawn_sampler(
    task_set: &mut JoinSet<Result<TaskName>>,
    mut source: Box<dyn MetricsSource>,
    sampling: SamplingLoop,
) {
    task_set.spawn(async move {
        let stats = sampling.run(source.as_mut()).await;
        info!(
            applied = stats.samples_applied,
            transitions = stats.transitions,
            "[Sampler] Finished"
        );
        Ok(TaskName::Sampler)
    });
}

/// Spawn the config watcher and drain its events.
fn spawn_config_watcher(
    task_set: &mut JoinSet<Result<TaskName>>,
    path: PathBuf,
    controller: Arc<BrownoutController>,
    cancel_token: CancellationToken,
) {
    task_set.spawn(async move {
        let (tx, mut rx) = mpsc::channel(8);
        tokio::spawn(config::run_config_watcher(path, controller, tx, cancel_token));

        while let Some(event) = rx.recv().await {
            match event {
                ConfigEvent::Reloaded(thresholds) => info!(
                    soft = ?thresholds.soft,
                    hard = ?thresholds.hard,
                    emergency = ?thresholds.emergency,
                    "[ConfigWatcher] Thresholds applied"
                ),
                ConfigEvent::Error(msg) => warn!(error = %msg, "[ConfigWatcher] Reload rejected"),
            }
        }
        Ok(TaskName::ConfigWatcher)
    });
}

/// Run the supervisor loop: monitor tasks, cancel on failure.
async fn run_supervisor(
    task_set: &mut JoinSet<Result<TaskName>>,
    cancel_token: CancellationToken,
) -> Result<()> {
    info!("Supervisor: all tasks spawned, monitoring");

    loop {
        tokio::select! {
            _ = cancel_token.cancelled() => {
                info!("Supervisor: shutdown signal received");
                break;
            }
            result = task_set.join_next() => {
                match result {
                    Some(Ok(Ok(task_name))) => {
                        info!("Supervisor: task {} completed normally", task_name);
                    }
                    Some(Ok(Err(e))) => {
                        error!("Supervisor: task failed with error: {}", e);
                        cancel_token.cancel();
                        return Err(e);
                    }
                    Some(Err(e)) => {
                        error!("Supervisor: task panicked: {}", e);
                        cancel_token.cancel();
                        return Err(anyhow::anyhow!("Task panicked: {}", e));
                    }
                    None => {
                        info!("Supervisor: all tasks completed");
                        break;
                    }
                }
            }
        }
    }

    // Let the remaining tasks observe cancellation and wind down
    while let Some(result) = task_set.join_next().await {
        if let Ok(Ok(task_name)) = result {
            info!("Supervisor: task {} stopped", task_name);
        }
    }

    Ok(())
}

// ============================================================================
// Startup
// ============================================================================

/// Load config from `--config` or the standard search order.
fn load_config(explicit: Option<&PathBuf>) -> Result<(BalancerConfig, Option<PathBuf>)> {
    match explicit {
        Some(path) => {
            let config = BalancerConfig::load_from_file(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?;
            info!(path = %path.display(), "Loaded balancer config");
            Ok((config, Some(path.clone())))
        }
        None => Ok(BalancerConfig::load_with_path()),
    }
}

/// Pick the background source from CLI flags, falling back to `[sampler]`.
fn build_source(args: &CliArgs, config: &BalancerConfig) -> Result<Option<Box<dyn MetricsSource>>> {
    let interval = Duration::from_secs(args.interval_secs.unwrap_or(config.sampler.interval_secs));
    let seed = args.seed.or(config.sampler.seed);

    let source: Box<dyn MetricsSource> = if args.stdin {
        Box::new(StdinSource::new())
    } else if let Some(path) = &args.replay {
        Box::new(ReplaySource::from_json_lines(path, interval)?)
    } else if args.simulate || config.sampler.enabled {
        match config.sampler.source {
            SamplerSource::Synthetic => match seed {
                Some(seed) => Box::new(SyntheticSource::seeded(seed, interval)),
                None => Box::new(SyntheticSource::from_entropy(interval)),
            },
            SamplerSource::Replay => {
                let path = config
                    .sampler
                    .replay_path
                    .as_ref()
                    .context("sampler.replay_path is not set")?;
                Box::new(ReplaySource::from_json_lines(path, interval)?)
            }
            SamplerSource::Stdin => Box::new(StdinSource::new()),
        }
    } else {
        return Ok(None);
    };

    info!(
        source = source.source_name(),
        interval_secs = interval.as_secs(),
        "Background sampler enabled"
    );
    Ok(Some(source))
}

fn check_config(path: Option<&PathBuf>) -> Result<()> {
    let path = path
        .cloned()
        .or_else(|| std::env::var(config::CONFIG_ENV_VAR).ok().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(config::LOCAL_CONFIG_FILE));

    match BalancerConfig::load_from_file(&path) {
        Ok(_) => {
            println!("{}: OK", path.display());
            Ok(())
        }
        Err(ConfigError::Validation(errors)) => {
            for e in &errors {
                println!("  - {e}");
            }
            anyhow::bail!("{}: {} validation error(s)", path.display(), errors.len())
        }
        Err(e) => Err(e.into()),
    }
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

    // Subcommand dispatch
    match args.command {
        Some(SubCommand::CheckConfig) => return check_config(args.config.as_ref()),
        Some(SubCommand::DefaultConfig) => {
            print!("{}", BalancerConfig::default().to_toml()?);
            return Ok(());
        }
        None => {}
    }

    let (mut balancer_config, config_path) = load_config(args.config.as_ref())?;
    balancer_config.apply_env_overrides();
    let server_addr = args.addr.clone().unwrap_or_else(|| balancer_config.server.addr.clone());

    let controller = Arc::new(
        BrownoutController::from_config(&balancer_config)
            .context("Invalid brownout configuration")?,
    );
    let history = Arc::new(RwLock::new(MetricsHistory::new(balancer_config.history.capacity)));

    info!(
        mode = %controller.current_mode(),
        cooldown_secs = balancer_config.controller.cooldown_secs,
        "Brownout controller ready"
    );

    // Graceful shutdown via Ctrl+C
    let cancel_token = CancellationToken::new();
    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received Ctrl+C, initiating shutdown");
        shutdown_token.cancel();
    });

    let listener = tokio::net::TcpListener::bind(&server_addr)
        .await
        .with_context(|| format!("Failed to bind {server_addr}"))?;
    info!(addr = %server_addr, "API listening");

    let app = create_app(ConsoleState::new(Arc::clone(&controller), Arc::clone(&history)));

    let mut task_set: JoinSet<Result<TaskName>> = JoinSet::new();
    spawn_http_server(&mut task_set, listener, app, cancel_token.clone());

    if let Some(source) = build_source(&args, &balancer_config)? {
        let sampling = SamplingLoop::new(
            Arc::clone(&controller),
            Arc::clone(&history),
            cancel_token.clone(),
        );
        spawn_sampler(&mut task_set, source, sampling);
    }

    if let Some(path) = config_path {
        spawn_config_watcher(&mut task_set, path, Arc::clone(&controller), cancel_token.clone());
    }

    run_supervisor(&mut task_set, cancel_token).await?;

    info!("open-balancer shutdown complete");
    Ok(())
}
