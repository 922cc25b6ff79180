//! Rebalance Controller
//!
//! Runs one rebalancing pass:
//! 1. Disable allocation
//! 2. Fetch health and the routing table
//! 3. Analyze the distribution
//! 4. Apply one exclude/include move per overloaded node
//! 5. Re-enable allocation
//!
//! Step 5 runs at the end of every pass, whichever earlier step failed, so
//! each pass issues exactly one disable and one enable directive. Dry runs
//! issue neither.

use shardwise_core::{AllocationSettings, ClusterClient, ClusterError, NodeId, RoutingSnapshot};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info, instrument, warn};

use crate::analyzer::{analyze, ShardDistribution};
use crate::metrics;
use crate::planner::{Planner, ShardMove};

/// Controller configuration
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Wait after each move when moves are not confirmed
    pub move_delay: Duration,
    /// Poll the routing table until a move shows up. Allocation stays
    /// disabled while moves are issued, so most clusters will not relocate
    /// anything before the timeout and the move ends up `NotConfirmed`.
    pub confirm_moves: bool,
    /// Upper bound on confirming one move
    pub confirm_timeout: Duration,
    /// Routing table poll interval while confirming
    pub confirm_poll_interval: Duration,
    /// Clear node filters after re-enabling allocation
    pub clear_filters_on_exit: bool,
    /// Analyze and plan only
    pub dry_run: bool,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            move_delay: Duration::from_secs(5),
            confirm_moves: false,
            confirm_timeout: Duration::from_secs(30),
            confirm_poll_interval: Duration::from_secs(2),
            clear_filters_on_exit: false,
            dry_run: false,
        }
    }
}

/// Stage of a pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassStage {
    Disabling,
    Fetching,
    Analyzing,
    Moving,
    Reenabling,
    Done,
}

impl fmt::Display for PassStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PassStage::Disabling => "disabling",
            PassStage::Fetching => "fetching",
            PassStage::Analyzing => "analyzing",
            PassStage::Moving => "moving",
            PassStage::Reenabling => "re-enabling",
            PassStage::Done => "done",
        };
        write!(f, "{}", name)
    }
}

/// How a single move ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOutcome {
    /// Directive sent, fixed delay waited, nothing checked
    Unverified,
    /// Routing table showed the move within the timeout
    Confirmed,
    /// Routing table did not show the move within the timeout
    NotConfirmed,
    /// Dry run, nothing sent
    DryRun,
}

impl MoveOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            MoveOutcome::Unverified => "unverified",
            MoveOutcome::Confirmed => "confirmed",
            MoveOutcome::NotConfirmed => "not_confirmed",
            MoveOutcome::DryRun => "dry_run",
        }
    }
}

/// A move the controller acted on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveResult {
    pub source: NodeId,
    pub target: NodeId,
    pub outcome: MoveOutcome,
}

/// Result of the decision part of a pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PassOutcome {
    /// Spread within threshold, nothing moved
    Balanced { spread: usize },
    /// Moves were planned and issued
    Rebalanced { planned: usize },
    /// A step failed; the rest of the pass was skipped
    Aborted { stage: PassStage, error: String },
}

impl PassOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            PassOutcome::Balanced { .. } => "balanced",
            PassOutcome::Rebalanced { .. } => "rebalanced",
            PassOutcome::Aborted { .. } => "aborted",
        }
    }
}

/// Everything that happened in one pass
#[derive(Debug, Clone)]
pub struct PassReport {
    pub outcome: PassOutcome,
    pub moves: Vec<MoveResult>,
    /// Distribution seen in this pass, if the routing table was fetched
    pub distribution: Option<ShardDistribution>,
    /// Whether the closing enable directive succeeded. `None` on dry runs,
    /// where allocation is never touched.
    pub allocation_restored: Option<bool>,
    pub duration: Duration,
}

impl PassReport {
    /// Summary string
    pub fn summary(&self) -> String {
        let outcome = match &self.outcome {
            PassOutcome::Balanced { spread } => format!("balanced (spread {})", spread),
            PassOutcome::Rebalanced { planned } => format!("rebalanced ({} moves planned)", planned),
            PassOutcome::Aborted { stage, error } => format!("aborted while {}: {}", stage, error),
        };
        format!(
            "{}, {} moves issued, allocation {} in {:?}",
            outcome,
            self.moves.len(),
            match self.allocation_restored {
                Some(true) => "restored",
                Some(false) => "NOT restored",
                None => "untouched",
            },
            self.duration
        )
    }
}

/// Rebalance controller
pub struct Controller {
    client: Arc<dyn ClusterClient>,
    planner: Planner,
    config: ControllerConfig,
}

impl Controller {
    /// Create a new controller
    pub fn new(client: Arc<dyn ClusterClient>, planner: Planner, config: ControllerConfig) -> Self {
        Self {
            client,
            planner,
            config,
        }
    }

    /// Run one full pass. Never fails; errors end up in the report.
    #[instrument(skip(self), fields(dry_run = self.config.dry_run))]
    pub async fn run_pass(&self) -> PassReport {
        let start = Instant::now();
        let mut moves = Vec::new();
        let mut distribution = None;

        info!("Rebalancing shards");

        let (outcome, allocation_restored) = if self.config.dry_run {
            let outcome = self.rebalance(&mut moves, &mut distribution).await;
            (outcome, None)
        } else {
            info!("Disabling shard allocation");
            let outcome = match self.send(&AllocationSettings::disable_allocation()).await {
                Ok(()) => self.rebalance(&mut moves, &mut distribution).await,
                Err(e) => {
                    error!(error = %e, "Failed to disable shard allocation");
                    PassOutcome::Aborted {
                        stage: PassStage::Disabling,
                        error: e.to_string(),
                    }
                }
            };
            (outcome, Some(self.restore_allocation().await))
        };

        let report = PassReport {
            outcome,
            moves,
            distribution,
            allocation_restored,
            duration: start.elapsed(),
        };

        metrics::record_pass(report.outcome.as_str(), report.duration.as_secs_f64());
        info!(summary = %report.summary(), "Rebalance pass complete");

        report
    }

    /// Fetch, analyze and move. Allocation handling stays in `run_pass`.
    async fn rebalance(
        &self,
        moves: &mut Vec<MoveResult>,
        seen: &mut Option<ShardDistribution>,
    ) -> PassOutcome {
        match self.client.fetch_health().await {
            Ok(health) => info!(
                status = %health.status,
                nodes = health.number_of_nodes,
                relocating = health.relocating_shards,
                "Cluster health"
            ),
            Err(e) => warn!(error = %e, "Failed to fetch cluster health"),
        }

        let snapshot = match self.client.fetch_routing_state().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                error!(error = %e, "Error getting cluster state");
                return PassOutcome::Aborted {
                    stage: PassStage::Fetching,
                    error: e.to_string(),
                };
            }
        };

        let analysis = analyze(&snapshot, self.planner.threshold());
        metrics::set_distribution(analysis.summary.nodes, analysis.summary.spread);
        debug!(distribution = ?analysis.distribution, "Shard distribution");
        info!(summary = %analysis.summary, threshold = analysis.threshold, "Distribution analyzed");
        *seen = Some(analysis.distribution.clone());

        if analysis.balanced {
            info!("Cluster is already balanced");
            return PassOutcome::Balanced {
                spread: analysis.summary.spread,
            };
        }

        let plan = self.planner.create_plan(&analysis.distribution);

        for shard_move in &plan.moves {
            if self.config.dry_run {
                info!(source = %shard_move.source, target = %shard_move.target, "Would move shard");
                moves.push(MoveResult {
                    source: shard_move.source.clone(),
                    target: shard_move.target.clone(),
                    outcome: MoveOutcome::DryRun,
                });
                continue;
            }

            info!(source = %shard_move.source, target = %shard_move.target, "Moving shard");
            let directive = AllocationSettings::relocate(&shard_move.source, &shard_move.target);
            if let Err(e) = self.send(&directive).await {
                error!(
                    source = %shard_move.source,
                    target = %shard_move.target,
                    error = %e,
                    "Failed to move shard, aborting remaining moves"
                );
                return PassOutcome::Aborted {
                    stage: PassStage::Moving,
                    error: e.to_string(),
                };
            }

            let outcome = self.settle(shard_move).await;
            metrics::record_move(outcome.as_str());
            moves.push(MoveResult {
                source: shard_move.source.clone(),
                target: shard_move.target.clone(),
                outcome,
            });
        }

        PassOutcome::Rebalanced {
            planned: plan.moves.len(),
        }
    }

    /// Give the cluster time to start honoring a move
    async fn settle(&self, shard_move: &ShardMove) -> MoveOutcome {
        if !self.config.confirm_moves {
            tokio::time::sleep(self.config.move_delay).await;
            return MoveOutcome::Unverified;
        }

        let confirm = async {
            loop {
                tokio::time::sleep(self.config.confirm_poll_interval).await;
                match self.client.fetch_routing_state().await {
                    Ok(snapshot) if move_observed(&snapshot, shard_move) => break,
                    Ok(_) => {}
                    Err(e) => warn!(error = %e, "Failed to poll routing state"),
                }
            }
        };

        match tokio::time::timeout(self.config.confirm_timeout, confirm).await {
            Ok(()) => {
                info!(source = %shard_move.source, target = %shard_move.target, "Move confirmed");
                MoveOutcome::Confirmed
            }
            Err(_) => {
                warn!(
                    source = %shard_move.source,
                    target = %shard_move.target,
                    timeout = ?self.config.confirm_timeout,
                    "Move not confirmed"
                );
                MoveOutcome::NotConfirmed
            }
        }
    }

    /// Send the enable directive and optionally clear node filters
    async fn restore_allocation(&self) -> bool {
        info!("Enabling shard allocation");
        let restored = match self.send(&AllocationSettings::enable_allocation()).await {
            Ok(()) => true,
            Err(e) => {
                error!(error = %e, "Failed to re-enable shard allocation, allocation may remain disabled");
                false
            }
        };

        if self.config.clear_filters_on_exit {
            if let Err(e) = self.send(&AllocationSettings::clear_filters()).await {
                warn!(error = %e, "Failed to clear allocation filters");
            }
        }

        restored
    }

    async fn send(&self, settings: &AllocationSettings) -> Result<(), ClusterError> {
        let result = self.client.apply_settings(settings).await;
        metrics::record_directive(settings.kind(), result.is_ok());
        result
    }
}

/// Source holds fewer shards than at planning time.
///
/// Only the source counts: with a fixed relief target several moves share
/// one target, so a target gain says nothing about which move caused it.
fn move_observed(snapshot: &RoutingSnapshot, shard_move: &ShardMove) -> bool {
    snapshot
        .shard_count(&shard_move.source)
        .map_or(false, |count| count < shard_move.source_shards)
}
