//! Configuration for the HTTP remote source

use crate::error::{RemoteError, RemoteResult};
use larder_core::config::RemoteSection;
use larder_core::retry::CircuitBreakerConfig;
use std::time::Duration;

/// Remote source configuration
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    /// Base URL of the service
    pub base_url: String,
    /// Collection resource path, relative to `base_url`
    pub resource_path: String,
    /// Name of the identifier field in each entry
    pub id_field: String,
    /// Request timeout
    pub timeout: Duration,
    /// Bearer token sent with every request
    pub auth_token: Option<String>,
    /// Circuit breaker settings
    pub circuit_breaker: CircuitBreakerConfig,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self::from(&RemoteSection::default())
    }
}

impl From<&RemoteSection> for RemoteConfig {
    fn from(section: &RemoteSection) -> Self {
        Self {
            base_url: section.base_url.clone(),
            resource_path: section.resource_path.clone(),
            id_field: section.id_field.clone(),
            timeout: section.timeout(),
            auth_token: section.auth_token.clone(),
            circuit_breaker: CircuitBreakerConfig::default(),
        }
    }
}

impl RemoteConfig {
    /// Configuration for `base_url` with default settings
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::default().with_base_url(base_url)
    }

    /// Builder-style method to set base URL
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Builder-style method to set the resource path
    #[must_use]
    pub fn with_resource_path(mut self, path: impl Into<String>) -> Self {
        self.resource_path = path.into();
        self
    }

    /// Builder-style method to set the identifier field
    #[must_use]
    pub fn with_id_field(mut self, field: impl Into<String>) -> Self {
        self.id_field = field.into();
        self
    }

    /// Builder-style method to set timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Builder-style method to set the bearer token
    #[must_use]
    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    /// Builder-style method to set circuit breaker config
    #[must_use]
    pub fn with_circuit_breaker(mut self, config: CircuitBreakerConfig) -> Self {
        self.circuit_breaker = config;
        self
    }

    /// Full URL of the collection resource
    #[must_use]
    pub fn resource_url(&self) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            self.resource_path.trim_start_matches('/')
        )
    }

    /// Validate the configuration
    pub fn validate(&self) -> RemoteResult<()> {
        if self.base_url.is_empty() {
            return Err(RemoteError::Config("base_url cannot be empty".into()));
        }

        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(RemoteError::Config(
                "base_url must start with http:// or https://".into(),
            ));
        }

        if self.id_field.is_empty() {
            return Err(RemoteError::Config("id_field cannot be empty".into()));
        }

        if self.timeout.is_zero() {
            return Err(RemoteError::Config("timeout cannot be zero".into()));
        }

        Ok(())
    }
}
