//! Configuration schema definitions
//!
//! Mirrors the sections of `larder.toml`. Every field has a default so an
//! empty file (or no file) is a valid configuration apart from the remote
//! URL, which validation requires.

use crate::collection::CollectionSchema;
use crate::retry::RetryConfig;
use crate::validation::Validator;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration schema
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ConfigSchema {
    #[serde(default)]
    pub remote: RemoteSection,

    #[serde(default)]
    pub store: StoreSection,

    #[serde(default)]
    pub scheduler: SchedulerSection,

    #[serde(default)]
    pub telemetry: TelemetrySection,
}

impl ConfigSchema {
    /// Validate all sections
    pub fn validate(&self) -> crate::Result<()> {
        let mut result = Validator::new()
            .required("remote.base_url", &self.remote.base_url)
            .prefix("remote.base_url", &self.remote.base_url, &["http://", "https://"])
            .required("remote.id_field", &self.remote.id_field)
            .range("remote.timeout_secs", self.remote.timeout_secs, 1, 600)
            .range(
                "scheduler.poll_interval_secs",
                self.scheduler.poll_interval_secs,
                1,
                86_400,
            )
            .range("scheduler.retry.max_attempts", self.scheduler.retry.max_attempts, 1, 100)
            .custom("scheduler.retry.max_delay_ms", || {
                (self.scheduler.retry.max_delay_ms < self.scheduler.retry.initial_delay_ms)
                    .then(|| "Must not be smaller than initial_delay_ms".to_string())
            })
            .custom("scheduler.retry.backoff_multiplier", || {
                let m = self.scheduler.retry.backoff_multiplier;
                (!m.is_finite() || m < 1.0)
                    .then(|| format!("Must be a finite number of at least 1.0, got {m}"))
            })
            .one_of(
                "telemetry.log_level",
                &self.telemetry.log_level,
                &["trace", "debug", "info", "warn", "error"],
            )
            .warn_if(
                "scheduler.period_secs",
                self.scheduler.period_secs.is_some_and(|p| p < 60),
                "Periods under a minute put load on the remote endpoint",
            )
            .validate();

        if let Err(e) = self.store.collection.validate() {
            result.add_error(crate::validation::ValidationError {
                field: "store.collection".to_string(),
                message: e.message,
                code: "COLLECTION".to_string(),
                expected: None,
                actual: None,
            });
        }

        result.to_result()
    }
}

/// `[remote]`: the HTTP endpoint entities are fetched from
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteSection {
    /// Base URL, e.g. `https://api.example.com`
    #[serde(default)]
    pub base_url: String,

    /// Path of the collection resource relative to `base_url`
    #[serde(default = "default_resource_path")]
    pub resource_path: String,

    /// Name of the identifier field in each entry
    #[serde(default = "default_id_field")]
    pub id_field: String,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Optional bearer token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,
}

impl Default for RemoteSection {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            resource_path: default_resource_path(),
            id_field: default_id_field(),
            timeout_secs: default_timeout_secs(),
            auth_token: None,
        }
    }
}

impl RemoteSection {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_resource_path() -> String {
    "/entities".to_string()
}

fn default_id_field() -> String {
    "id".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

/// `[store]`: where and how entities are persisted
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreSection {
    /// SQLite database file
    #[serde(default = "default_db_path")]
    pub path: PathBuf,

    /// Collection name and declared fields
    #[serde(default)]
    pub collection: CollectionSchema,
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            collection: CollectionSchema::default(),
        }
    }
}

fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .map(|d| d.join("larder"))
        .unwrap_or_else(|| PathBuf::from("."))
        .join("larder.db")
}

/// `[scheduler]`: background refresh policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerSection {
    /// Period between runs; absent means run once
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub period_secs: Option<u64>,

    #[serde(default = "default_true")]
    pub requires_network: bool,

    #[serde(default)]
    pub requires_battery_not_low: bool,

    /// How often unmet constraints are re-checked
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Work journal file; defaults to a file next to the database
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub journal_path: Option<PathBuf>,

    #[serde(default)]
    pub retry: RetrySection,
}

impl Default for SchedulerSection {
    fn default() -> Self {
        Self {
            period_secs: None,
            requires_network: true,
            requires_battery_not_low: false,
            poll_interval_secs: default_poll_interval_secs(),
            journal_path: None,
            retry: RetrySection::default(),
        }
    }
}

impl SchedulerSection {
    pub fn period(&self) -> Option<Duration> {
        self.period_secs.map(Duration::from_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// Journal path, falling back to `<db>.journal.json`
    pub fn journal_path_for(&self, db_path: &std::path::Path) -> PathBuf {
        self.journal_path
            .clone()
            .unwrap_or_else(|| db_path.with_extension("journal.json"))
    }
}

fn default_true() -> bool {
    true
}

fn default_poll_interval_secs() -> u64 {
    30
}

/// `[scheduler.retry]`: backoff for network failures, in milliseconds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySection {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    #[serde(default = "default_multiplier")]
    pub backoff_multiplier: f64,

    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for RetrySection {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            backoff_multiplier: default_multiplier(),
            jitter: true,
        }
    }
}

impl From<&RetrySection> for RetryConfig {
    fn from(section: &RetrySection) -> Self {
        Self {
            max_attempts: section.max_attempts,
            initial_delay: Duration::from_millis(section.initial_delay_ms),
            max_delay: Duration::from_millis(section.max_delay_ms),
            backoff_multiplier: section.backoff_multiplier,
            jitter: section.jitter,
        }
    }
}

fn default_max_attempts() -> u32 {
    5
}

fn default_initial_delay_ms() -> u64 {
    1_000
}

fn default_max_delay_ms() -> u64 {
    300_000
}

fn default_multiplier() -> f64 {
    2.0
}

/// `[telemetry]`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetrySection {
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for TelemetrySection {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> ConfigSchema {
        let mut schema = ConfigSchema::default();
        schema.remote.base_url = "https://api.example.com".to_string();
        schema
    }

    #[test]
    fn test_defaults() {
        let schema = ConfigSchema::default();
        assert_eq!(schema.remote.id_field, "id");
        assert_eq!(schema.remote.timeout_secs, 30);
        assert!(schema.scheduler.requires_network);
        assert!(schema.scheduler.period().is_none());
        assert_eq!(schema.telemetry.log_level, "info");
    }

    #[test]
    fn test_missing_base_url_is_invalid() {
        assert!(ConfigSchema::default().validate().is_err());
        assert!(valid().validate().is_ok());
    }

    #[test]
    fn test_bad_log_level_is_invalid() {
        let mut schema = valid();
        schema.telemetry.log_level = "loud".to_string();
        assert!(schema.validate().is_err());
    }

    #[test]
    fn test_bad_collection_is_invalid() {
        let mut schema = valid();
        schema.store.collection.name = "1bad".to_string();
        let err = schema.validate().unwrap_err();
        assert!(err.message.contains("store.collection"));
    }

    #[test]
    fn test_backoff_multiplier_must_grow() {
        for bad in [-2.0, 0.5, f64::NAN, f64::INFINITY] {
            let mut schema = valid();
            schema.scheduler.retry.backoff_multiplier = bad;
            let err = schema.validate().unwrap_err();
            assert!(err.message.contains("scheduler.retry.backoff_multiplier"), "{bad}");
        }

        let mut schema = valid();
        schema.scheduler.retry.backoff_multiplier = 1.0;
        assert!(schema.validate().is_ok());
    }

    #[test]
    fn test_retry_section_converts_to_config() {
        let section = RetrySection {
            max_attempts: 4,
            initial_delay_ms: 250,
            max_delay_ms: 1_000,
            backoff_multiplier: 3.0,
            jitter: false,
        };
        let config = RetryConfig::from(&section);
        assert_eq!(config.max_attempts, 4);
        assert_eq!(config.initial_delay, Duration::from_millis(250));
        assert_eq!(config.delay_for_attempt(2), Duration::from_millis(750));
    }

    #[test]
    fn test_journal_path_defaults_next_to_db() {
        let section = SchedulerSection::default();
        let path = section.journal_path_for(std::path::Path::new("/tmp/larder.db"));
        assert_eq!(path, PathBuf::from("/tmp/larder.journal.json"));
    }
}
