//! Refresh outcomes: fetch results, failure kinds and refresh state

use crate::entity::Entity;
use crate::error::ErrorCode;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Classification of a failed refresh
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureKind {
    /// Connectivity, timeout or non-success status; transient
    Network,
    /// Malformed response body; permanent until fixed upstream
    Parse,
    /// Local store could not apply the write; permanent within a session
    Storage,
}

impl FailureKind {
    /// Whether a scheduler may retry a refresh that failed this way
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network)
    }

    /// Matching error code
    #[must_use]
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::Network => ErrorCode::NetworkError,
            Self::Parse => ErrorCode::ParseError,
            Self::Storage => ErrorCode::StorageError,
        }
    }

    /// Lowercase name
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::Parse => "parse",
            Self::Storage => "storage",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a refresh failed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{kind} failure: {message}")]
pub struct RefreshFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl RefreshFailure {
    /// Create a failure of the given kind
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Network, message)
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Parse, message)
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Storage, message)
    }
}

/// Refresh state of one logical collection
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum RefreshState {
    /// No refresh running; the last one (if any) succeeded
    #[default]
    Idle,
    /// A remote fetch is in flight
    Refreshing,
    /// The last refresh failed; cached data is still served
    Failed(RefreshFailure),
}

impl RefreshState {
    #[must_use]
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    #[must_use]
    pub fn is_refreshing(&self) -> bool {
        matches!(self, Self::Refreshing)
    }

    #[must_use]
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    /// Failure details, if the state is `Failed`
    #[must_use]
    pub fn failure(&self) -> Option<&RefreshFailure> {
        match self {
            Self::Failed(failure) => Some(failure),
            _ => None,
        }
    }
}

impl fmt::Display for RefreshState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => f.write_str("idle"),
            Self::Refreshing => f.write_str("refreshing"),
            Self::Failed(failure) => write!(f, "failed ({failure})"),
        }
    }
}

/// Error returned by a remote fetch
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("network error: {0}")]
    Network(String),

    #[error("parse error: {0}")]
    Parse(String),
}

impl FetchError {
    /// Failure classification
    #[must_use]
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Network(_) => FailureKind::Network,
            Self::Parse(_) => FailureKind::Parse,
        }
    }
}

impl From<FetchError> for RefreshFailure {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::Network(message) => Self::network(message),
            FetchError::Parse(message) => Self::parse(message),
        }
    }
}

/// Outcome of a single remote fetch: `Ok` carries the fetched entities
pub type FetchResult = std::result::Result<Vec<Entity>, FetchError>;
