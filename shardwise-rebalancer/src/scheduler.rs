//! Scheduler
//!
//! Runs the controller, sleeps for the poll interval, and repeats until the
//! cancellation token fires. A pass that has started always runs to
//! completion so allocation is re-enabled before shutdown.

use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::controller::{Controller, PassOutcome};

/// Scheduler configuration
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Wait between the end of one pass and the start of the next
    pub poll_interval: Duration,
    /// Stop after this many passes (None = run until cancelled)
    pub max_passes: Option<u64>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(60),
            max_passes: None,
        }
    }
}

/// Periodic pass runner
pub struct Scheduler {
    controller: Controller,
    config: SchedulerConfig,
    cancel: CancellationToken,
}

impl Scheduler {
    pub fn new(controller: Controller, config: SchedulerConfig, cancel: CancellationToken) -> Self {
        Self {
            controller,
            config,
            cancel,
        }
    }

    /// Run passes until cancelled. Returns the number of passes run.
    pub async fn run(&self) -> u64 {
        info!(
            poll_interval = ?self.config.poll_interval,
            max_passes = ?self.config.max_passes,
            "Rebalancer scheduler started"
        );

        let mut passes = 0u64;

        loop {
            if self.cancel.is_cancelled() {
                info!("Shutdown requested before pass");
                break;
            }

            let report = self.controller.run_pass().await;
            passes += 1;

            if report.allocation_restored == Some(false) {
                warn!("Allocation could not be re-enabled this pass; next pass will retry");
            }
            if let PassOutcome::Aborted { stage, error } = &report.outcome {
                warn!(stage = %stage, error = %error, "Pass aborted");
            }

            if self.config.max_passes.is_some_and(|max| passes >= max) {
                break;
            }

            tokio::select! {
                _ = tokio::time::sleep(self.config.poll_interval) => {},
                _ = self.cancel.cancelled() => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        info!(passes, "Rebalancer scheduler stopped");
        passes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::ControllerConfig;
    use crate::mock::MockCluster;
    use crate::planner::{Planner, PlannerConfig};
    use std::sync::Arc;

    fn scheduler(
        cluster: &Arc<MockCluster>,
        config: SchedulerConfig,
        cancel: CancellationToken,
    ) -> Scheduler {
        let controller = Controller::new(
            cluster.clone(),
            Planner::new(PlannerConfig::default()),
            ControllerConfig::default(),
        );
        Scheduler::new(controller, config, cancel)
    }

    #[test]
    fn test_scheduler_config_default() {
        let config = SchedulerConfig::default();
        assert_eq!(config.poll_interval, Duration::from_secs(60));
        assert!(config.max_passes.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_runs_max_passes() {
        let cluster = Arc::new(MockCluster::with_counts(&[("A", 5), ("B", 6)]));
        let sched = scheduler(
            &cluster,
            SchedulerConfig {
                poll_interval: Duration::from_secs(60),
                max_passes: Some(3),
            },
            CancellationToken::new(),
        );

        assert_eq!(sched.run().await, 3);
        assert_eq!(cluster.count("disable"), 3);
        assert_eq!(cluster.count("enable"), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_before_start_runs_nothing() {
        let cluster = Arc::new(MockCluster::with_counts(&[("A", 12), ("B", 1)]));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let sched = scheduler(&cluster, SchedulerConfig::default(), cancel);
        assert_eq!(sched.run().await, 0);
        assert!(cluster.applied().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_sleep_stops_promptly() {
        let cluster = Arc::new(MockCluster::with_counts(&[("A", 5), ("B", 6)]));
        let cancel = CancellationToken::new();
        let sched = scheduler(
            &cluster,
            SchedulerConfig {
                poll_interval: Duration::from_secs(3600),
                max_passes: None,
            },
            cancel.clone(),
        );

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(10)).await;
            trigger.cancel();
        });

        let start = tokio::time::Instant::now();
        assert_eq!(sched.run().await, 1);
        assert!(start.elapsed() < Duration::from_secs(3600));
        assert_eq!(cluster.count("enable"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_passes_do_not_stop_the_loop() {
        let cluster = Arc::new(MockCluster::failing_fetch());
        let sched = scheduler(
            &cluster,
            SchedulerConfig {
                poll_interval: Duration::from_secs(1),
                max_passes: Some(2),
            },
            CancellationToken::new(),
        );

        assert_eq!(sched.run().await, 2);
        assert_eq!(cluster.count("disable"), 2);
        assert_eq!(cluster.count("enable"), 2);
    }
}
