//! Shardwise Rebalancer Library
//!
//! Keeps shard counts even across the nodes of a search cluster.
//!
//! Each pass:
//! - Disables allocation
//! - Samples the routing table and counts shards per node
//! - Moves load off overloaded nodes with exclude/include filters
//! - Re-enables allocation
//!
//! The scheduler repeats passes at a fixed interval until cancelled.

pub mod analyzer;
pub mod config;
pub mod controller;
pub mod metrics;
pub mod planner;
pub mod scheduler;

#[cfg(test)]
mod mock;

// Re-export main types
pub use analyzer::{
    analyze, compute_distribution, is_balanced, spread, Analysis, DistributionSummary,
    ShardDistribution, DEFAULT_THRESHOLD,
};
pub use config::{ConfigError, RebalancerConfig};
pub use controller::{
    Controller, ControllerConfig, MoveOutcome, MoveResult, PassOutcome, PassReport, PassStage,
};
pub use planner::{
    pick_overloaded, pick_relief, Planner, PlannerConfig, RebalancePlan, ReliefStrategy, ShardMove,
};
pub use scheduler::{Scheduler, SchedulerConfig};
