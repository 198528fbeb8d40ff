//! Retry with exponential backoff, and a circuit breaker
//!
//! - Exponential backoff with jitter for the refresh scheduler
//! - Circuit breaker guarding the remote endpoint
//!
//! # Example
//!
//! ```rust,no_run
//! use larder_core::retry::{retry_if, RetryConfig};
//!
//! # async fn example() {
//! let result = retry_if(
//!     &RetryConfig::default(),
//!     |err: &String| err.contains("timeout"),
//!     || async { Ok::<_, String>("fetched") },
//! )
//! .await;
//! # }
//! ```

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Backoff policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    /// Delay before the second attempt
    pub initial_delay: Duration,
    /// Upper bound for any single delay
    pub max_delay: Duration,
    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,
    /// Add up to 25% random jitter to delays
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(300),
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// Delay to wait before `attempt` (zero-based; attempt 0 runs at once)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let exponent = i32::try_from(attempt - 1).unwrap_or(i32::MAX);
        let base_delay = self.initial_delay.as_secs_f64() * self.backoff_multiplier.powi(exponent);
        let delay_secs = base_delay.min(self.max_delay.as_secs_f64());

        let final_delay = if self.jitter {
            delay_secs * (1.0 + rand_simple() * 0.25)
        } else {
            delay_secs
        };

        // Non-finite or negative products fall back to the cap
        Duration::try_from_secs_f64(final_delay).unwrap_or(self.max_delay)
    }
}

/// Pseudo-random number in `[0.0, 1.0)`
fn rand_simple() -> f64 {
    use std::collections::hash_map::RandomState;
    use std::hash::{BuildHasher, Hasher};

    let mut hasher = RandomState::new().build_hasher();
    hasher.write_u128(
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos(),
    );
    (hasher.finish() % 1000) as f64 / 1000.0
}

/// Successful outcome of [`retry_if`]
#[derive(Debug)]
pub struct RetryResult<T> {
    /// The successful value
    pub value: T,
    /// Number of attempts made
    pub attempts: u32,
    /// Total time spent, including delays
    pub total_duration: Duration,
}

/// Failed outcome of [`retry_if`]
#[derive(Debug)]
pub struct RetryFailure<E> {
    /// Error from the last attempt
    pub error: E,
    /// Number of attempts made
    pub attempts: u32,
}

/// Run an async operation, retrying errors that `should_retry` accepts
///
/// Errors the predicate rejects stop the loop immediately.
pub async fn retry_if<F, Fut, T, E, P>(
    config: &RetryConfig,
    should_retry: P,
    mut operation: F,
) -> Result<RetryResult<T>, RetryFailure<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
{
    let start = Instant::now();
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        if attempt > 0 {
            tokio::time::sleep(config.delay_for_attempt(attempt)).await;
        }

        match operation().await {
            Ok(value) => {
                return Ok(RetryResult {
                    value,
                    attempts: attempt + 1,
                    total_duration: start.elapsed(),
                });
            }
            Err(error) => {
                attempt += 1;
                if attempt >= max_attempts || !should_retry(&error) {
                    return Err(RetryFailure {
                        error,
                        attempts: attempt,
                    });
                }
                tracing::debug!(attempt, "Attempt failed, backing off");
            }
        }
    }
}

/// Circuit breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

/// Circuit breaker configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before the circuit opens
    pub failure_threshold: u32,
    /// Successes in half-open needed to close again
    pub success_threshold: u32,
    /// Time to wait before letting a probe through
    pub reset_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 1,
            reset_timeout: Duration::from_secs(30),
        }
    }
}

/// Stops calling an endpoint that keeps failing
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    state: RwLock<CircuitState>,
    failure_count: AtomicU32,
    success_count: AtomicU32,
    /// Milliseconds since `epoch` at the last failure
    last_failure_ms: AtomicU64,
    epoch: Instant,
}

impl CircuitBreaker {
    /// Create a closed circuit breaker
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            state: RwLock::new(CircuitState::Closed),
            failure_count: AtomicU32::new(0),
            success_count: AtomicU32::new(0),
            last_failure_ms: AtomicU64::new(0),
            epoch: Instant::now(),
        }
    }

    fn now_ms(&self) -> u64 {
        u64::try_from(self.epoch.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    fn set_state(&self, state: CircuitState) {
        *self.state.write().unwrap_or_else(PoisonError::into_inner) = state;
    }

    /// Current state
    pub fn state(&self) -> CircuitState {
        *self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether a call may go through; moves Open to HalfOpen after the reset timeout
    pub fn can_execute(&self) -> bool {
        match self.state() {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let elapsed = self
                    .now_ms()
                    .saturating_sub(self.last_failure_ms.load(Ordering::Relaxed));
                let timeout = u64::try_from(self.config.reset_timeout.as_millis()).unwrap_or(u64::MAX);
                if elapsed >= timeout {
                    self.success_count.store(0, Ordering::Relaxed);
                    self.set_state(CircuitState::HalfOpen);
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Record a successful call
    pub fn record_success(&self) {
        self.failure_count.store(0, Ordering::Relaxed);

        if self.state() == CircuitState::HalfOpen {
            let successes = self.success_count.fetch_add(1, Ordering::Relaxed) + 1;
            if successes >= self.config.success_threshold {
                self.set_state(CircuitState::Closed);
            }
        }
    }

    /// Record a failed call
    pub fn record_failure(&self) {
        let failures = self.failure_count.fetch_add(1, Ordering::Relaxed) + 1;
        self.last_failure_ms.store(self.now_ms(), Ordering::Relaxed);

        match self.state() {
            CircuitState::Closed if failures >= self.config.failure_threshold => {
                self.set_state(CircuitState::Open);
            }
            // A failed probe reopens the circuit
            CircuitState::HalfOpen => self.set_state(CircuitState::Open),
            _ => {}
        }
    }

    /// Force the circuit closed
    pub fn reset(&self) {
        self.failure_count.store(0, Ordering::Relaxed);
        self.success_count.store(0, Ordering::Relaxed);
        self.set_state(CircuitState::Closed);
    }
}

impl std::fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("state", &self.state())
            .field("failures", &self.failure_count.load(Ordering::Relaxed))
            .finish()
    }
}
