//! Rebalancer configuration
//!
//! Defaults, optionally overridden by a TOML file, then by environment
//! variables and command-line flags (see `main.rs`).
//!
//! Config file format:
//! ```toml
//! cluster_url = "http://search-1:9200"
//! threshold = 10
//! poll_interval_secs = 60
//! move_delay_secs = 5
//! relief_strategy = "adjusted"
//! confirm_moves = true
//! ```

use serde::{Deserialize, Serialize};
use shardwise_core::ClientConfig;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::analyzer::DEFAULT_THRESHOLD;
use crate::controller::ControllerConfig;
use crate::planner::{PlannerConfig, ReliefStrategy};
use crate::scheduler::SchedulerConfig;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Rebalancer configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RebalancerConfig {
    /// Base URL of the cluster-management endpoint
    pub cluster_url: String,

    /// Basic auth username
    pub username: Option<String>,

    /// Basic auth password
    pub password: Option<String>,

    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,

    /// Maximum allowed difference in shard count between nodes
    pub threshold: usize,

    /// Interval between passes in seconds
    pub poll_interval_secs: u64,

    /// Wait after each move in seconds
    pub move_delay_secs: u64,

    /// How the relief target is picked across moves
    pub relief_strategy: ReliefStrategy,

    /// Poll the routing table after each move instead of waiting blindly.
    /// Allocation is still disabled at that point, so expect most moves to
    /// time out as not confirmed.
    pub confirm_moves: bool,

    /// Give up confirming a move after this many seconds
    pub confirm_timeout_secs: u64,

    /// Routing table poll interval while confirming, in seconds
    pub confirm_poll_interval_secs: u64,

    /// Clear the exclude/include filters when a pass ends
    pub clear_filters_on_exit: bool,

    /// Dry run mode (analyze and plan, never write settings)
    pub dry_run: bool,

    /// Port for the Prometheus metrics endpoint
    pub metrics_port: Option<u16>,
}

impl Default for RebalancerConfig {
    fn default() -> Self {
        Self {
            cluster_url: "http://localhost:9200".to_string(),
            username: None,
            password: None,
            request_timeout_secs: 30,
            threshold: DEFAULT_THRESHOLD,
            poll_interval_secs: 60,
            move_delay_secs: 5,
            relief_strategy: ReliefStrategy::Fixed,
            confirm_moves: false,
            confirm_timeout_secs: 30,
            confirm_poll_interval_secs: 2,
            clear_filters_on_exit: false,
            dry_run: false,
            metrics_port: None,
        }
    }
}

impl RebalancerConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: RebalancerConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.cluster_url.starts_with("http://") || self.cluster_url.starts_with("https://")) {
            return Err(ConfigError::InvalidValue(
                "cluster_url".to_string(),
                format!("expected an http(s) URL, got {:?}", self.cluster_url),
            ));
        }

        if self.poll_interval_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "poll_interval_secs".to_string(),
                "must be greater than 0".to_string(),
            ));
        }

        if self.confirm_poll_interval_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "confirm_poll_interval_secs".to_string(),
                "must be greater than 0".to_string(),
            ));
        }

        if self.password.is_some() && self.username.is_none() {
            return Err(ConfigError::InvalidValue(
                "password".to_string(),
                "set without a username".to_string(),
            ));
        }

        Ok(())
    }

    /// Get poll interval as Duration
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// Get move delay as Duration
    pub fn move_delay(&self) -> Duration {
        Duration::from_secs(self.move_delay_secs)
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            base_url: self.cluster_url.clone(),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            basic_auth: self
                .username
                .clone()
                .map(|user| (user, self.password.clone().unwrap_or_default())),
        }
    }

    pub fn planner_config(&self) -> PlannerConfig {
        PlannerConfig {
            threshold: self.threshold,
            relief_strategy: self.relief_strategy,
        }
    }

    pub fn controller_config(&self) -> ControllerConfig {
        ControllerConfig {
            move_delay: self.move_delay(),
            confirm_moves: self.confirm_moves,
            confirm_timeout: Duration::from_secs(self.confirm_timeout_secs),
            confirm_poll_interval: Duration::from_secs(self.confirm_poll_interval_secs),
            clear_filters_on_exit: self.clear_filters_on_exit,
            dry_run: self.dry_run,
        }
    }

    pub fn scheduler_config(&self, max_passes: Option<u64>) -> SchedulerConfig {
        SchedulerConfig {
            poll_interval: self.poll_interval(),
            max_passes,
        }
    }
}
