//! Error types for shardwise
//!
//! Every failure talking to the cluster-management endpoint is surfaced as a
//! [`ClusterError`]. Callers treat all variants as "operation failed"; the
//! variants exist so logs and metrics can tell them apart.

use thiserror::Error;

/// Result type alias for cluster operations
pub type Result<T> = std::result::Result<T, ClusterError>;

/// Unified error type for cluster operations
#[derive(Error, Debug)]
pub enum ClusterError {
    // ===== Transport Errors =====
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Cluster returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    // ===== Decoding Errors =====
    #[error("Failed to decode response: {0}")]
    Decode(String),

    // ===== Settings Errors =====
    #[error("Failed to apply cluster settings: {message}")]
    SettingsApply {
        status: Option<u16>,
        message: String,
    },

    // ===== Configuration Errors =====
    #[error("Invalid cluster URL: {0}")]
    InvalidUrl(String),
}

impl ClusterError {
    /// Short, stable label for logs and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            ClusterError::Transport(_) => "transport",
            ClusterError::Status { .. } => "status",
            ClusterError::Decode(_) => "decode",
            ClusterError::SettingsApply { .. } => "settings_apply",
            ClusterError::InvalidUrl(_) => "invalid_url",
        }
    }
}

impl From<reqwest::Error> for ClusterError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ClusterError::Decode(err.to_string())
        } else {
            ClusterError::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ClusterError {
    fn from(err: serde_json::Error) -> Self {
        ClusterError::Decode(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ClusterError::Status {
            status: 503,
            body: "unavailable".to_string(),
        };
        assert_eq!(err.to_string(), "Cluster returned HTTP 503: unavailable");

        let err = ClusterError::SettingsApply {
            status: Some(400),
            message: "unknown setting".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Failed to apply cluster settings: unknown setting"
        );
    }

    #[test]
    fn test_error_from_serde_json() {
        let json_err = serde_json::from_str::<u32>("not json").unwrap_err();
        let err: ClusterError = json_err.into();
        assert!(matches!(err, ClusterError::Decode(_)));
        assert_eq!(err.kind(), "decode");
    }
}
