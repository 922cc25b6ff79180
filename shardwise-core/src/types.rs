//! Cluster data model
//!
//! Wire types for the cluster-management endpoint: health, routing state and
//! transient allocation settings. Snapshots are created per poll and never
//! persisted.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Node identifier as reported by the routing table
pub type NodeId = String;

/// Setting that toggles shard allocation cluster-wide
pub const ALLOCATION_ENABLE: &str = "cluster.routing.allocation.enable";
/// Setting that excludes a node (by name) from allocation
pub const ALLOCATION_EXCLUDE_NAME: &str = "cluster.routing.allocation.exclude._name";
/// Setting that includes a node (by name) for allocation
pub const ALLOCATION_INCLUDE_NAME: &str = "cluster.routing.allocation.include._name";

/// Cluster health colour
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum HealthStatus {
    Green,
    Yellow,
    Red,
    /// Anything the endpoint reports that we do not recognise
    Unknown(String),
}

impl From<String> for HealthStatus {
    fn from(s: String) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "green" => HealthStatus::Green,
            "yellow" => HealthStatus::Yellow,
            "red" => HealthStatus::Red,
            _ => HealthStatus::Unknown(s),
        }
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HealthStatus::Green => write!(f, "green"),
            HealthStatus::Yellow => write!(f, "yellow"),
            HealthStatus::Red => write!(f, "red"),
            HealthStatus::Unknown(s) => write!(f, "{}", s),
        }
    }
}

/// Response of `GET /_cluster/health`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ClusterHealth {
    pub status: HealthStatus,
    #[serde(default)]
    pub number_of_nodes: u64,
    #[serde(default)]
    pub relocating_shards: u64,
}

/// Point-in-time view of which shards live on which node
///
/// Shard entries are kept opaque; only their count is used.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoutingSnapshot {
    pub nodes: BTreeMap<NodeId, Vec<Value>>,
}

impl RoutingSnapshot {
    /// Build a snapshot from `(node, entries)` pairs
    pub fn from_nodes<I, K>(nodes: I) -> Self
    where
        I: IntoIterator<Item = (K, Vec<Value>)>,
        K: Into<NodeId>,
    {
        Self {
            nodes: nodes.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of routing entries on `node`, `None` if the node is absent
    pub fn shard_count(&self, node: &str) -> Option<usize> {
        self.nodes.get(node).map(Vec::len)
    }
}

/// Response of `GET /_cluster/state/routing_nodes`
///
/// Some cluster versions omit empty objects, so both levels default.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ClusterStateResponse {
    #[serde(default)]
    pub routing_nodes: RoutingNodes,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct RoutingNodes {
    #[serde(default)]
    pub nodes: BTreeMap<NodeId, Vec<Value>>,
}

impl From<ClusterStateResponse> for RoutingSnapshot {
    fn from(resp: ClusterStateResponse) -> Self {
        Self {
            nodes: resp.routing_nodes.nodes,
        }
    }
}

/// Transient allocation directive sent with `PUT /_cluster/settings`
///
/// Each value is a complete, independent directive. A `null` value clears the
/// override and restores the cluster default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationSettings {
    transient: BTreeMap<String, Value>,
}

impl AllocationSettings {
    /// Stop the cluster from allocating any shards
    pub fn disable_allocation() -> Self {
        Self::single(ALLOCATION_ENABLE, Value::from("none"))
    }

    /// Clear the allocation override
    pub fn enable_allocation() -> Self {
        Self::single(ALLOCATION_ENABLE, Value::Null)
    }

    /// Exclude `source` and include `target` so shards drift from one to the other
    pub fn relocate(source: &str, target: &str) -> Self {
        let mut transient = BTreeMap::new();
        transient.insert(ALLOCATION_EXCLUDE_NAME.to_string(), Value::from(source));
        transient.insert(ALLOCATION_INCLUDE_NAME.to_string(), Value::from(target));
        Self { transient }
    }

    /// Remove both node filters
    pub fn clear_filters() -> Self {
        let mut transient = BTreeMap::new();
        transient.insert(ALLOCATION_EXCLUDE_NAME.to_string(), Value::Null);
        transient.insert(ALLOCATION_INCLUDE_NAME.to_string(), Value::Null);
        Self { transient }
    }

    fn single(key: &str, value: Value) -> Self {
        let mut transient = BTreeMap::new();
        transient.insert(key.to_string(), value);
        Self { transient }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.transient.get(key)
    }

    pub fn transient(&self) -> &BTreeMap<String, Value> {
        &self.transient
    }

    /// Label used in logs and metrics
    pub fn kind(&self) -> &'static str {
        if *self == Self::disable_allocation() {
            "disable"
        } else if *self == Self::enable_allocation() {
            "enable"
        } else if *self == Self::clear_filters() {
            "clear_filters"
        } else if self.transient.contains_key(ALLOCATION_EXCLUDE_NAME) {
            "relocate"
        } else {
            "custom"
        }
    }
}
