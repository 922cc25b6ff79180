//! Rebalance Planner
//!
//! Picks the overloaded nodes and the relief target and turns them into a
//! list of shard moves. Each overloaded node gets exactly one move per pass.
//!
//! Two relief strategies are supported:
//! - `Fixed`: the least-loaded node is chosen once and receives every move
//! - `Adjusted`: counts are updated locally after each planned move and the
//!   relief target is re-picked

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use shardwise_core::NodeId;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info, instrument};

use crate::analyzer::{ShardDistribution, DEFAULT_THRESHOLD};

/// How the relief target is chosen across the moves of one pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ReliefStrategy {
    /// Pick the relief target once and reuse it for every move
    #[default]
    Fixed,
    /// Re-pick the relief target after locally applying each move
    Adjusted,
}

impl fmt::Display for ReliefStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReliefStrategy::Fixed => write!(f, "fixed"),
            ReliefStrategy::Adjusted => write!(f, "adjusted"),
        }
    }
}

impl FromStr for ReliefStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fixed" => Ok(ReliefStrategy::Fixed),
            "adjusted" => Ok(ReliefStrategy::Adjusted),
            other => Err(format!("unknown relief strategy: {}", other)),
        }
    }
}

/// A single planned relocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardMove {
    /// Node to exclude
    pub source: NodeId,
    /// Node to include
    pub target: NodeId,
    /// Shard count on the source when the move was planned
    pub source_shards: usize,
    /// Shard count on the target when the move was planned
    pub target_shards: usize,
}

/// Moves for one pass, in execution order
#[derive(Debug, Clone, Default)]
pub struct RebalancePlan {
    pub moves: Vec<ShardMove>,
    /// Nodes above the threshold
    pub overloaded: Vec<NodeId>,
    /// Overloaded nodes that got no move because they were the relief target
    pub skipped: Vec<NodeId>,
    pub strategy: ReliefStrategy,
}

impl RebalancePlan {
    pub fn is_empty(&self) -> bool {
        self.moves.is_empty()
    }

    /// Summary of the plan
    pub fn summary(&self) -> String {
        format!(
            "{} moves for {} overloaded nodes ({} skipped, {} relief)",
            self.moves.len(),
            self.overloaded.len(),
            self.skipped.len(),
            self.strategy
        )
    }
}

/// Planner configuration
#[derive(Debug, Clone)]
pub struct PlannerConfig {
    /// Nodes holding more shards than this are overloaded
    pub threshold: usize,
    pub relief_strategy: ReliefStrategy,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            relief_strategy: ReliefStrategy::Fixed,
        }
    }
}

/// Nodes whose count exceeds `threshold`, in distribution order
pub fn pick_overloaded(distribution: &ShardDistribution, threshold: usize) -> Vec<NodeId> {
    distribution
        .iter()
        .filter(|(_, count)| **count > threshold)
        .map(|(node, _)| node.clone())
        .collect()
}

/// Node with the fewest shards; ties go to the first one in distribution order
pub fn pick_relief(distribution: &ShardDistribution) -> Option<NodeId> {
    distribution
        .iter()
        .min_by_key(|(_, count)| **count)
        .map(|(node, _)| node.clone())
}

/// Rebalance planner
pub struct Planner {
    config: PlannerConfig,
}

impl Planner {
    /// Create a new planner
    pub fn new(config: PlannerConfig) -> Self {
        Self { config }
    }

    pub fn threshold(&self) -> usize {
        self.config.threshold
    }

    /// Create a plan moving load off every overloaded node
    #[instrument(skip(self, distribution), fields(strategy = %self.config.relief_strategy))]
    pub fn create_plan(&self, distribution: &ShardDistribution) -> RebalancePlan {
        let mut plan = RebalancePlan {
            overloaded: pick_overloaded(distribution, self.config.threshold),
            strategy: self.config.relief_strategy,
            ..Default::default()
        };

        match self.config.relief_strategy {
            ReliefStrategy::Fixed => self.plan_fixed(distribution, &mut plan),
            ReliefStrategy::Adjusted => self.plan_adjusted(distribution, &mut plan),
        }

        info!(summary = %plan.summary(), "Rebalance plan created");
        plan
    }

    fn plan_fixed(&self, distribution: &ShardDistribution, plan: &mut RebalancePlan) {
        let Some(target) = pick_relief(distribution) else {
            return;
        };
        let target_shards = distribution.get(&target).copied().unwrap_or(0);

        for source in &plan.overloaded {
            if *source == target {
                debug!(node = %source, "Overloaded node is also the relief target, skipping");
                plan.skipped.push(source.clone());
                continue;
            }

            plan.moves.push(ShardMove {
                source: source.clone(),
                target: target.clone(),
                source_shards: distribution.get(source).copied().unwrap_or(0),
                target_shards,
            });
        }
    }

    fn plan_adjusted(&self, distribution: &ShardDistribution, plan: &mut RebalancePlan) {
        let mut estimates = distribution.clone();

        for source in &plan.overloaded {
            let Some(target) = pick_relief(&estimates) else {
                return;
            };
            if *source == target {
                debug!(node = %source, "Overloaded node is also the relief target, skipping");
                plan.skipped.push(source.clone());
                continue;
            }

            let source_shards = estimates.get(source).copied().unwrap_or(0);
            let target_shards = estimates.get(&target).copied().unwrap_or(0);

            if let Some(count) = estimates.get_mut(source) {
                *count = count.saturating_sub(1);
            }
            if let Some(count) = estimates.get_mut(&target) {
                *count += 1;
            }

            plan.moves.push(ShardMove {
                source: source.clone(),
                target,
                source_shards,
                target_shards,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dist(counts: &[(&str, usize)]) -> ShardDistribution {
        counts.iter().map(|(n, c)| (n.to_string(), *c)).collect()
    }

    fn planner(strategy: ReliefStrategy) -> Planner {
        Planner::new(PlannerConfig {
            threshold: 10,
            relief_strategy: strategy,
        })
    }

    #[test]
    fn test_planner_config_default() {
        let config = PlannerConfig::default();
        assert_eq!(config.threshold, 10);
        assert_eq!(config.relief_strategy, ReliefStrategy::Fixed);
    }

    #[test]
    fn test_pick_overloaded() {
        let d = dist(&[("A", 12), ("B", 1), ("C", 11), ("D", 10)]);
        assert_eq!(pick_overloaded(&d, 10), vec!["A".to_string(), "C".to_string()]);
        assert!(pick_overloaded(&ShardDistribution::new(), 10).is_empty());
    }

    #[test]
    fn test_pick_relief_ties_to_first() {
        let d = dist(&[("A", 12), ("B", 1), ("C", 1)]);
        assert_eq!(pick_relief(&d), Some("B".to_string()));
        assert_eq!(pick_relief(&ShardDistribution::new()), None);
    }

    #[test]
    fn test_create_plan_basic() {
        let plan = planner(ReliefStrategy::Fixed).create_plan(&dist(&[("A", 12), ("B", 1)]));

        assert_eq!(plan.overloaded, vec!["A".to_string()]);
        assert_eq!(
            plan.moves,
            vec![ShardMove {
                source: "A".to_string(),
                target: "B".to_string(),
                source_shards: 12,
                target_shards: 1,
            }]
        );
    }

    #[test]
    fn test_fixed_strategy_reuses_relief_target() {
        let d = dist(&[("A", 30), ("B", 25), ("C", 2), ("D", 3)]);
        let plan = planner(ReliefStrategy::Fixed).create_plan(&d);

        let targets: Vec<_> = plan.moves.iter().map(|m| m.target.as_str()).collect();
        assert_eq!(targets, vec!["C", "C"]);
        assert!(plan.moves.iter().all(|m| m.target_shards == 2));
    }

    #[test]
    fn test_adjusted_strategy_repicks_relief_target() {
        let d = dist(&[("A", 30), ("B", 25), ("C", 2), ("D", 2)]);
        let plan = planner(ReliefStrategy::Adjusted).create_plan(&d);

        // C receives the first move and is then no longer the minimum
        let targets: Vec<_> = plan.moves.iter().map(|m| m.target.as_str()).collect();
        assert_eq!(targets, vec!["C", "D"]);
        assert_eq!(plan.moves[1].target_shards, 2);
    }

    #[test]
    fn test_relief_target_never_moves_to_itself() {
        // Every node is above the threshold, C is both overloaded and relief
        let d = dist(&[("A", 40), ("B", 25), ("C", 11)]);
        let plan = planner(ReliefStrategy::Fixed).create_plan(&d);

        assert_eq!(plan.overloaded.len(), 3);
        assert_eq!(plan.skipped, vec!["C".to_string()]);
        assert_eq!(plan.moves.len(), 2);
        assert!(plan.moves.iter().all(|m| m.source != m.target));
    }

    #[test]
    fn test_empty_distribution_plans_nothing() {
        let plan = planner(ReliefStrategy::Adjusted).create_plan(&ShardDistribution::new());
        assert!(plan.is_empty());
        assert!(plan.overloaded.is_empty());
    }

    #[test]
    fn test_relief_strategy_parse() {
        assert_eq!("fixed".parse::<ReliefStrategy>(), Ok(ReliefStrategy::Fixed));
        assert_eq!("Adjusted".parse::<ReliefStrategy>(), Ok(ReliefStrategy::Adjusted));
        assert!("greedy".parse::<ReliefStrategy>().is_err());
    }

    #[test]
    fn test_plan_summary() {
        let plan = planner(ReliefStrategy::Fixed).create_plan(&dist(&[("A", 12), ("B", 1)]));
        assert_eq!(plan.summary(), "1 moves for 1 overloaded nodes (0 skipped, fixed relief)");
    }
}
