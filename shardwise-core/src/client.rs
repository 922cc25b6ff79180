//! Cluster Client
//!
//! HTTP client for the search cluster's management endpoint. Three
//! operations are needed by the rebalancer: read health, read the routing
//! table and write transient allocation settings. No retries are performed;
//! the next rebalance pass is the retry.

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, instrument};

use crate::error::{ClusterError, Result};
use crate::types::{AllocationSettings, ClusterHealth, ClusterStateResponse, RoutingSnapshot};

const HEALTH_PATH: &str = "/_cluster/health";
const ROUTING_STATE_PATH: &str = "/_cluster/state/routing_nodes";
const SETTINGS_PATH: &str = "/_cluster/settings";

/// Operations the rebalancer performs against the cluster
#[async_trait]
pub trait ClusterClient: Send + Sync {
    /// Fetch the current cluster health
    async fn fetch_health(&self) -> Result<ClusterHealth>;

    /// Fetch the per-node routing table
    async fn fetch_routing_state(&self) -> Result<RoutingSnapshot>;

    /// Send one transient settings directive
    async fn apply_settings(&self, settings: &AllocationSettings) -> Result<()>;
}

/// Connection settings for [`HttpClusterClient`]
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL, e.g. `http://localhost:9200`
    pub base_url: String,
    /// Per-request timeout
    pub request_timeout: Duration,
    /// Optional HTTP basic auth as (username, password)
    pub basic_auth: Option<(String, String)>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:9200".to_string(),
            request_timeout: Duration::from_secs(30),
            basic_auth: None,
        }
    }
}

/// reqwest-backed cluster client
pub struct HttpClusterClient {
    client: Client,
    base_url: String,
    basic_auth: Option<(String, String)>,
}

impl HttpClusterClient {
    /// Create a new client
    pub fn new(config: ClientConfig) -> Result<Self> {
        let base_url = config.base_url.trim_end_matches('/').to_string();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ClusterError::InvalidUrl(config.base_url));
        }

        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ClusterError::Transport(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url,
            basic_auth: config.basic_auth,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn with_auth(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.basic_auth {
            Some((user, password)) => req.basic_auth(user, Some(password)),
            None => req,
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self.with_auth(self.client.get(self.url(path))).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClusterError::Status {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }
}

#[async_trait]
impl ClusterClient for HttpClusterClient {
    #[instrument(skip(self))]
    async fn fetch_health(&self) -> Result<ClusterHealth> {
        self.get_json(HEALTH_PATH).await
    }

    #[instrument(skip(self))]
    async fn fetch_routing_state(&self) -> Result<RoutingSnapshot> {
        let state: ClusterStateResponse = self.get_json(ROUTING_STATE_PATH).await?;
        Ok(state.into())
    }

    #[instrument(skip(self, settings), fields(kind = settings.kind()))]
    async fn apply_settings(&self, settings: &AllocationSettings) -> Result<()> {
        let response = self
            .with_auth(self.client.put(self.url(SETTINGS_PATH)))
            .json(settings)
            .send()
            .await
            .map_err(|e| ClusterError::SettingsApply {
                status: None,
                message: e.to_string(),
            })?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if !status.is_success() {
            return Err(ClusterError::SettingsApply {
                status: Some(status.as_u16()),
                message: format!("HTTP {}: {}", status.as_u16(), body),
            });
        }

        debug!(response = %body, "Cluster settings applied");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_config_default() {
        let config = ClientConfig::default();
        assert_eq!(config.base_url, "http://localhost:9200");
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert!(config.basic_auth.is_none());
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client = HttpClusterClient::new(ClientConfig {
            base_url: "http://search:9200/".to_string(),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(client.base_url(), "http://search:9200");
        assert_eq!(client.url(HEALTH_PATH), "http://search:9200/_cluster/health");
    }

    #[test]
    fn test_invalid_url_rejected() {
        let result = HttpClusterClient::new(ClientConfig {
            base_url: "search:9200".to_string(),
            ..Default::default()
        });
        assert!(matches!(result, Err(ClusterError::InvalidUrl(_))));
    }
}
