//! In-memory cluster for controller and scheduler tests

use async_trait::async_trait;
use serde_json::json;
use shardwise_core::{
    AllocationSettings, ClusterClient, ClusterError, ClusterHealth, HealthStatus, Result,
    RoutingSnapshot,
};
use std::collections::VecDeque;
use std::sync::Mutex;

/// Build a snapshot with `count` opaque entries per node
pub(crate) fn snapshot(counts: &[(&str, usize)]) -> RoutingSnapshot {
    RoutingSnapshot::from_nodes(counts.iter().map(|(node, count)| {
        let shards = (0..*count).map(|i| json!({ "shard": i })).collect();
        (node.to_string(), shards)
    }))
}

/// Scripted cluster that records every settings directive
///
/// Each routing fetch pops the next snapshot; the last one is returned forever.
pub(crate) struct MockCluster {
    snapshots: Mutex<VecDeque<RoutingSnapshot>>,
    fail_fetch: bool,
    fail_health: bool,
    fail_kinds: Vec<&'static str>,
    applied: Mutex<Vec<AllocationSettings>>,
    fetches: Mutex<usize>,
}

impl MockCluster {
    pub fn with_counts(counts: &[(&str, usize)]) -> Self {
        Self::with_snapshots(vec![snapshot(counts)])
    }

    pub fn with_snapshots(snapshots: Vec<RoutingSnapshot>) -> Self {
        Self {
            snapshots: Mutex::new(snapshots.into()),
            fail_fetch: false,
            fail_health: false,
            fail_kinds: Vec::new(),
            applied: Mutex::new(Vec::new()),
            fetches: Mutex::new(0),
        }
    }

    pub fn failing_fetch() -> Self {
        Self {
            fail_fetch: true,
            ..Self::with_snapshots(Vec::new())
        }
    }

    pub fn failing_health(mut self) -> Self {
        self.fail_health = true;
        self
    }

    /// Reject settings directives of the given kind
    pub fn fail_on(mut self, kind: &'static str) -> Self {
        self.fail_kinds.push(kind);
        self
    }

    pub fn applied(&self) -> Vec<AllocationSettings> {
        self.applied.lock().unwrap().clone()
    }

    pub fn count(&self, kind: &str) -> usize {
        self.applied
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.kind() == kind)
            .count()
    }

    pub fn fetches(&self) -> usize {
        *self.fetches.lock().unwrap()
    }
}

#[async_trait]
impl ClusterClient for MockCluster {
    async fn fetch_health(&self) -> Result<ClusterHealth> {
        if self.fail_health {
            return Err(ClusterError::Transport("connection refused".to_string()));
        }
        Ok(ClusterHealth {
            status: HealthStatus::Green,
            number_of_nodes: 0,
            relocating_shards: 0,
        })
    }

    async fn fetch_routing_state(&self) -> Result<RoutingSnapshot> {
        *self.fetches.lock().unwrap() += 1;
        if self.fail_fetch {
            return Err(ClusterError::Transport("connection refused".to_string()));
        }

        let mut snapshots = self.snapshots.lock().unwrap();
        let snapshot = if snapshots.len() > 1 {
            snapshots.pop_front()
        } else {
            snapshots.front().cloned()
        };
        Ok(snapshot.unwrap_or_default())
    }

    async fn apply_settings(&self, settings: &AllocationSettings) -> Result<()> {
        self.applied.lock().unwrap().push(settings.clone());
        if self.fail_kinds.contains(&settings.kind()) {
            return Err(ClusterError::SettingsApply {
                status: Some(500),
                message: "rejected".to_string(),
            });
        }
        Ok(())
    }
}
