//! HTTP remote source

use crate::config::RemoteConfig;
use crate::decode::decode_entities;
use crate::error::{RemoteError, RemoteResult};
use crate::RemoteSource;
use chrono::Utc;
use larder_core::entity::Entity;
use larder_core::retry::{CircuitBreaker, CircuitState};
use larder_core::state::FetchResult;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::Client;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

/// Request correlation ID header
const X_REQUEST_ID: &str = "X-Request-ID";

/// Fetches a collection with a parameterless GET of one JSON endpoint
///
/// Each call makes a single attempt; retrying is left to the scheduler.
/// A circuit breaker short-circuits calls while the endpoint keeps failing.
#[derive(Clone)]
pub struct HttpRemoteSource {
    inner: Client,
    config: Arc<RemoteConfig>,
    url: Arc<str>,
    circuit_breaker: Arc<CircuitBreaker>,
}

impl HttpRemoteSource {
    /// Create a source with specific configuration
    pub fn new(config: RemoteConfig) -> RemoteResult<Self> {
        config.validate()?;

        let mut default_headers = HeaderMap::new();
        default_headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        default_headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("larder/", env!("CARGO_PKG_VERSION"))),
        );

        if let Some(ref token) = config.auth_token {
            let value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|_| RemoteError::Config("auth_token is not a valid header value".into()))?;
            default_headers.insert(AUTHORIZATION, value);
        }

        let inner = Client::builder()
            .timeout(config.timeout)
            .default_headers(default_headers)
            .build()?;

        let circuit_breaker = Arc::new(CircuitBreaker::new(config.circuit_breaker.clone()));
        let url = Arc::from(config.resource_url());

        Ok(Self {
            inner,
            config: Arc::new(config),
            url,
            circuit_breaker,
        })
    }

    /// Get the current configuration
    #[must_use]
    pub fn config(&self) -> &RemoteConfig {
        &self.config
    }

    /// Full URL being fetched
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Get circuit breaker state
    #[must_use]
    pub fn circuit_state(&self) -> CircuitState {
        self.circuit_breaker.state()
    }

    /// Reset the circuit breaker
    pub fn reset_circuit(&self) {
        self.circuit_breaker.reset();
    }

    /// Fetch and decode the collection
    #[instrument(skip(self), fields(url = %self.url, request_id))]
    pub async fn fetch_entities(&self) -> RemoteResult<Vec<Entity>> {
        let request_id = Uuid::new_v4().to_string();
        tracing::Span::current().record("request_id", request_id.as_str());

        if !self.circuit_breaker.can_execute() {
            warn!("Circuit breaker is open, skipping request");
            return Err(RemoteError::CircuitOpen);
        }

        let start = Instant::now();
        let result = self.execute(&request_id).await;
        let elapsed_ms = start.elapsed().as_millis();

        match &result {
            Ok(entities) => {
                self.circuit_breaker.record_success();
                debug!(count = entities.len(), elapsed_ms, "Fetch succeeded");
            }
            Err(e) if e.is_transient() => {
                self.circuit_breaker.record_failure();
                warn!(error = %e, elapsed_ms, "Fetch failed");
            }
            // The endpoint answered; a bad body says nothing about its health
            Err(e) => {
                self.circuit_breaker.record_success();
                warn!(error = %e, elapsed_ms, "Fetch returned an unusable body");
            }
        }

        result
    }

    async fn execute(&self, request_id: &str) -> RemoteResult<Vec<Entity>> {
        let response = self
            .inner
            .get(&*self.url)
            .header(X_REQUEST_ID, request_id)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RemoteError::status(status.as_u16(), &body));
        }

        let body = response.bytes().await?;
        decode_entities(&body, &self.config.id_field, Utc::now())
    }
}

impl std::fmt::Debug for HttpRemoteSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpRemoteSource")
            .field("url", &self.url)
            .field("circuit", &self.circuit_state())
            .finish()
    }
}

impl RemoteSource for HttpRemoteSource {
    async fn fetch(&self) -> FetchResult {
        self.fetch_entities().await.map_err(Into::into)
    }
}
