//! Shardwise Core Library
//!
//! Shared building blocks for the shardwise rebalancer:
//! - Cluster data model (health, routing snapshot, allocation settings)
//! - The `ClusterClient` trait and its HTTP implementation
//! - Common error handling

pub mod client;
pub mod error;
pub mod types;

pub use client::{ClientConfig, ClusterClient, HttpClusterClient};
pub use error::{ClusterError, Result};
pub use types::{
    AllocationSettings, ClusterHealth, HealthStatus, NodeId, RoutingSnapshot, ALLOCATION_ENABLE,
    ALLOCATION_EXCLUDE_NAME, ALLOCATION_INCLUDE_NAME,
};
