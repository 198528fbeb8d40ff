//! Store error types

use larder_core::collection::FieldKind;
use larder_core::ErrorCode;
use thiserror::Error;

/// Result type for store operations
pub type Result<T> = std::result::Result<T, StoreError>;

/// Local store errors
#[derive(Error, Debug)]
pub enum StoreError {
    /// SQLite failure
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A payload value does not fit its declared column
    #[error("entity {id}: field {field:?} expects {expected:?}, got {actual}")]
    InvalidValue {
        id: String,
        field: String,
        expected: FieldKind,
        actual: String,
    },

    /// Collection schema rejected
    #[error("invalid collection schema: {0}")]
    Schema(String),

    /// A stored row could not be decoded
    #[error("corrupt row {id}: {message}")]
    CorruptRow { id: String, message: String },

    /// Overflow column (de)serialization failed
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A previous writer panicked while holding the connection
    #[error("store lock poisoned")]
    Poisoned,
}

impl StoreError {
    /// Matching error code
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidValue { .. } => ErrorCode::InvalidValue,
            Self::Schema(_) => ErrorCode::SchemaMismatch,
            _ => ErrorCode::StorageError,
        }
    }
}

impl From<larder_core::Error> for StoreError {
    fn from(err: larder_core::Error) -> Self {
        Self::Schema(err.message)
    }
}

impl From<StoreError> for larder_core::Error {
    fn from(err: StoreError) -> Self {
        larder_core::Error::new(err.code(), err.to_string())
    }
}
