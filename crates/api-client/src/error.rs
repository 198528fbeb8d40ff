//! Error types for remote sources

use larder_core::state::FetchError;
use larder_core::ErrorCode;
use thiserror::Error;

/// Result type alias for remote operations
pub type RemoteResult<T> = Result<T, RemoteError>;

/// Remote source errors
#[derive(Error, Debug)]
pub enum RemoteError {
    /// Connection, timeout or body transfer failure
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Endpoint answered with a non-success status
    #[error("endpoint returned {status}: {message}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Response body, truncated
        message: String,
    },

    /// Circuit breaker is open
    #[error("circuit breaker is open; endpoint temporarily skipped")]
    CircuitOpen,

    /// Body is not valid JSON
    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Body is JSON but not a list of entity objects
    #[error("unexpected payload: {0}")]
    Payload(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),
}

impl RemoteError {
    /// Create a payload error
    pub fn payload(msg: impl Into<String>) -> Self {
        Self::Payload(msg.into())
    }

    /// Create a status error, keeping at most 200 characters of the body
    pub fn status(status: u16, body: &str) -> Self {
        Self::Status {
            status,
            message: body.chars().take(200).collect(),
        }
    }

    /// Matching error code
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Request(e) if e.is_timeout() => ErrorCode::Timeout,
            Self::Request(e) if e.is_connect() => ErrorCode::ConnectionFailed,
            Self::Request(_) | Self::CircuitOpen => ErrorCode::NetworkError,
            Self::Status { .. } => ErrorCode::BadStatus,
            Self::Json(_) => ErrorCode::ParseError,
            Self::Payload(_) => ErrorCode::MalformedPayload,
            Self::Config(_) => ErrorCode::ConfigError,
        }
    }

    /// Whether the failure is transient
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Request(_) | Self::Status { .. } | Self::CircuitOpen)
    }
}

impl From<RemoteError> for FetchError {
    fn from(err: RemoteError) -> Self {
        let message = err.to_string();
        if err.is_transient() {
            FetchError::Network(message)
        } else {
            FetchError::Parse(message)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert!(matches!(
            FetchError::from(RemoteError::status(503, "unavailable")),
            FetchError::Network(_)
        ));
        assert!(matches!(FetchError::from(RemoteError::CircuitOpen), FetchError::Network(_)));
        assert!(matches!(
            FetchError::from(RemoteError::payload("expected an array")),
            FetchError::Parse(_)
        ));
    }

    #[test]
    fn test_codes() {
        assert_eq!(RemoteError::status(404, "").code(), ErrorCode::BadStatus);
        assert_eq!(RemoteError::CircuitOpen.code(), ErrorCode::NetworkError);
        assert_eq!(RemoteError::payload("no id").code(), ErrorCode::MalformedPayload);
        assert_eq!(RemoteError::Config("empty".into()).code(), ErrorCode::ConfigError);

        let json = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        assert_eq!(RemoteError::from(json).code(), ErrorCode::ParseError);
    }

    #[test]
    fn test_status_body_is_truncated() {
        let long = "x".repeat(1000);
        match RemoteError::status(500, &long) {
            RemoteError::Status { message, .. } => assert_eq!(message.len(), 200),
            other => panic!("unexpected {other:?}"),
        }
    }
}
