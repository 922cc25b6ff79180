//! Shardwise Rebalancer Service
//!
//! Periodically evens out shard counts across the nodes of a search cluster
//! by toggling allocation and steering shards with node filters.

use clap::Parser;
use shardwise_core::HttpClusterClient;
use shardwise_rebalancer::{
    metrics, ConfigError, Controller, Planner, RebalancerConfig, ReliefStrategy, Scheduler,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "shardwise-rebalancer")]
#[command(about = "Shard distribution rebalancer for search clusters")]
struct Cli {
    /// TOML config file (flags and environment override it)
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// Cluster management endpoint
    #[arg(long, env = "SHARDWISE_CLUSTER_URL")]
    cluster_url: Option<String>,

    /// Basic auth username
    #[arg(long, env = "SHARDWISE_USERNAME")]
    username: Option<String>,

    /// Basic auth password
    #[arg(long, env = "SHARDWISE_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Per-request timeout in seconds
    #[arg(long, env = "SHARDWISE_REQUEST_TIMEOUT")]
    request_timeout: Option<u64>,

    /// Maximum allowed difference in shard count between nodes
    #[arg(long, env = "SHARDWISE_THRESHOLD")]
    threshold: Option<usize>,

    /// Interval between passes in seconds
    #[arg(long, env = "SHARDWISE_POLL_INTERVAL")]
    poll_interval: Option<u64>,

    /// Wait after each move in seconds
    #[arg(long, env = "SHARDWISE_MOVE_DELAY")]
    move_delay: Option<u64>,

    /// Relief target selection across moves
    #[arg(long, env = "SHARDWISE_RELIEF_STRATEGY", value_enum)]
    relief_strategy: Option<ReliefStrategy>,

    /// Poll the routing table to confirm each move. Allocation is disabled
    /// while moves run, so most clusters report moves as not confirmed and
    /// each one waits the full confirm timeout
    #[arg(long, env = "SHARDWISE_CONFIRM_MOVES")]
    confirm_moves: bool,

    /// Give up confirming a move after this many seconds
    #[arg(long, env = "SHARDWISE_CONFIRM_TIMEOUT")]
    confirm_timeout: Option<u64>,

    /// Routing table poll interval while confirming, in seconds
    #[arg(long)]
    confirm_poll_interval: Option<u64>,

    /// Clear exclude/include filters at the end of each pass
    #[arg(long, env = "SHARDWISE_CLEAR_FILTERS")]
    clear_filters: bool,

    /// Dry run mode (don't write any settings)
    #[arg(long, env = "SHARDWISE_DRY_RUN")]
    dry_run: bool,

    /// Serve Prometheus metrics on this port
    #[arg(long, env = "SHARDWISE_METRICS_PORT")]
    metrics_port: Option<u16>,

    /// Run a single pass and exit
    #[arg(long)]
    once: bool,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,
}

impl Cli {
    /// Defaults, then the config file, then flags/environment
    fn load_config(&self) -> Result<RebalancerConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => RebalancerConfig::from_file(path)?,
            None => RebalancerConfig::default(),
        };

        if let Some(url) = &self.cluster_url {
            config.cluster_url = url.clone();
        }
        if let Some(username) = &self.username {
            config.username = Some(username.clone());
        }
        if let Some(password) = &self.password {
            config.password = Some(password.clone());
        }
        if let Some(secs) = self.request_timeout {
            config.request_timeout_secs = secs;
        }
        if let Some(threshold) = self.threshold {
            config.threshold = threshold;
        }
        if let Some(secs) = self.poll_interval {
            config.poll_interval_secs = secs;
        }
        if let Some(secs) = self.move_delay {
            config.move_delay_secs = secs;
        }
        if let Some(strategy) = self.relief_strategy {
            config.relief_strategy = strategy;
        }
        if let Some(secs) = self.confirm_timeout {
            config.confirm_timeout_secs = secs;
        }
        if let Some(secs) = self.confirm_poll_interval {
            config.confirm_poll_interval_secs = secs;
        }
        if let Some(port) = self.metrics_port {
            config.metrics_port = Some(port);
        }
        config.confirm_moves |= self.confirm_moves;
        config.clear_filters_on_exit |= self.clear_filters;
        config.dry_run |= self.dry_run;

        config.validate()?;
        Ok(config)
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Cancel on Ctrl-C or SIGTERM
async fn shutdown_signal(cancel: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, finishing current pass");
    cancel.cancel();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let config = cli.load_config()?;

    info!(
        cluster_url = %config.cluster_url,
        threshold = config.threshold,
        poll_interval_secs = config.poll_interval_secs,
        move_delay_secs = config.move_delay_secs,
        relief_strategy = %config.relief_strategy,
        confirm_moves = config.confirm_moves,
        dry_run = config.dry_run,
        "Starting shardwise rebalancer"
    );

    if let Some(port) = config.metrics_port {
        metrics::init_metrics(port)
            .map_err(|e| anyhow::anyhow!("Failed to start metrics exporter: {}", e))?;
        info!(port, "Metrics exporter listening");
    }

    let client = Arc::new(HttpClusterClient::new(config.client_config())?);
    let controller = Controller::new(
        client,
        Planner::new(config.planner_config()),
        config.controller_config(),
    );

    let cancel = CancellationToken::new();
    tokio::spawn(shutdown_signal(cancel.clone()));

    let max_passes = cli.once.then_some(1);
    let scheduler = Scheduler::new(controller, config.scheduler_config(max_passes), cancel);
    scheduler.run().await;

    Ok(())
}
