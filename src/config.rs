//! Client configuration
//!
//! Plain structs with sensible defaults. Durations are stored as integer
//! seconds/milliseconds so the config can be embedded in YAML or JSON.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::task::RetryPolicy;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("Invalid timeout: {0}")]
    InvalidTimeout(String),

    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

// =============================================================================
// Endpoint
// =============================================================================

/// Control plane address, fixed for the lifetime of a client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub scheme: String,
    pub host: String,
    pub port: u16,
}

impl Default for Endpoint {
    fn default() -> Self {
        Self {
            scheme: "http".to_string(),
            host: "storageos".to_string(),
            port: 5705,
        }
    }
}

impl Endpoint {
    pub fn new(scheme: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self {
            scheme: scheme.into(),
            host: host.into(),
            port,
        }
    }

    /// Base URL every API path is joined onto
    pub fn base_url(&self) -> Result<reqwest::Url, ConfigError> {
        self.validate()?;
        let raw = format!("{}://{}:{}/", self.scheme, self.host, self.port);
        reqwest::Url::parse(&raw).map_err(|e| ConfigError::InvalidEndpoint(format!("{}: {}", raw, e)))
    }

    fn validate(&self) -> Result<(), ConfigError> {
        match self.scheme.as_str() {
            "http" | "https" => {}
            other => {
                return Err(ConfigError::InvalidEndpoint(format!(
                    "unsupported scheme '{}', use 'http' or 'https'",
                    other
                )))
            }
        }
        if self.host.trim().is_empty() {
            return Err(ConfigError::InvalidEndpoint("host is empty".into()));
        }
        if self.port == 0 {
            return Err(ConfigError::InvalidEndpoint("port is 0".into()));
        }
        Ok(())
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}://{}:{}", self.scheme, self.host, self.port)
    }
}

// =============================================================================
// Client Configuration
// =============================================================================

/// Configuration for the control plane client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Control plane address
    pub endpoint: Endpoint,
    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,
    /// Login timeout in seconds, must be shorter than the retry deadline
    pub auth_timeout_secs: u64,
    /// Retry behaviour for callers wrapping operations in the task executor
    pub retry: RetryPolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: Endpoint::default(),
            request_timeout_secs: 10,
            auth_timeout_secs: 5,
            retry: RetryPolicy::default(),
        }
    }
}

impl ClientConfig {
    /// Parse and validate a YAML document
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a YAML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&raw)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn auth_timeout(&self) -> Duration {
        Duration::from_secs(self.auth_timeout_secs)
    }

    /// Check the endpoint and timeout invariants
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.endpoint.validate()?;

        if self.request_timeout_secs == 0 {
            return Err(ConfigError::InvalidTimeout("request timeout must be non-zero".into()));
        }
        if self.auth_timeout_secs == 0 {
            return Err(ConfigError::InvalidTimeout("auth timeout must be non-zero".into()));
        }
        // Logging in must never eat the whole retry budget
        if let Some(deadline) = self.retry.timeout() {
            if self.auth_timeout() >= deadline {
                return Err(ConfigError::InvalidTimeout(format!(
                    "auth timeout {:?} must be shorter than retry timeout {:?}",
                    self.auth_timeout(),
                    deadline
                )));
            }
        }
        Ok(())
    }

    /// Build an HTTP client honouring the request timeout
    pub fn http_client(&self) -> Result<reqwest::Client, ConfigError> {
        Ok(reqwest::Client::builder()
            .timeout(self.request_timeout())
            .build()?)
    }
}
