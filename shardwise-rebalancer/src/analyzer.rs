//! Distribution Analyzer
//!
//! Turns a routing snapshot into per-node shard counts and decides whether the
//! spread between the busiest and the idlest node is within tolerance.
//!
//! The minimum is taken over the observed counts. An empty distribution and a
//! single-node distribution both have a spread of 0 and are balanced, and a
//! node holding zero shards is a legitimate minimum.

use shardwise_core::{NodeId, RoutingSnapshot};
use std::collections::BTreeMap;
use std::fmt;

/// Default maximum allowed difference in shard count between nodes
pub const DEFAULT_THRESHOLD: usize = 10;

/// Shard count per node; keys are exactly the nodes of the snapshot
pub type ShardDistribution = BTreeMap<NodeId, usize>;

/// Count routing entries per node
pub fn compute_distribution(snapshot: &RoutingSnapshot) -> ShardDistribution {
    snapshot
        .nodes
        .iter()
        .map(|(node, shards)| (node.clone(), shards.len()))
        .collect()
}

/// Difference between the largest and smallest count (0 when empty)
pub fn spread(distribution: &ShardDistribution) -> usize {
    let max = distribution.values().max().copied().unwrap_or(0);
    let min = distribution.values().min().copied().unwrap_or(0);
    max - min
}

/// `max - min <= threshold`
pub fn is_balanced(distribution: &ShardDistribution, threshold: usize) -> bool {
    spread(distribution) <= threshold
}

/// Aggregate view of a distribution for logging
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DistributionSummary {
    pub nodes: usize,
    pub total_shards: usize,
    pub min: usize,
    pub max: usize,
    pub spread: usize,
}

impl DistributionSummary {
    pub fn from_distribution(distribution: &ShardDistribution) -> Self {
        Self {
            nodes: distribution.len(),
            total_shards: distribution.values().sum(),
            min: distribution.values().min().copied().unwrap_or(0),
            max: distribution.values().max().copied().unwrap_or(0),
            spread: spread(distribution),
        }
    }
}

impl fmt::Display for DistributionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} shards on {} nodes (min {}, max {}, spread {})",
            self.total_shards, self.nodes, self.min, self.max, self.spread
        )
    }
}

/// Result of analyzing one snapshot
#[derive(Debug, Clone)]
pub struct Analysis {
    pub distribution: ShardDistribution,
    pub summary: DistributionSummary,
    pub threshold: usize,
    pub balanced: bool,
}

/// Compute the distribution and the balance verdict in one go
pub fn analyze(snapshot: &RoutingSnapshot, threshold: usize) -> Analysis {
    let distribution = compute_distribution(snapshot);
    let summary = DistributionSummary::from_distribution(&distribution);
    let balanced = summary.spread <= threshold;

    Analysis {
        distribution,
        summary,
        threshold,
        balanced,
    }
}
