//! Error types for the dwelling crate.

use thiserror::Error;

/// Result type alias for dwelling operations.
pub type Result<T> = std::result::Result<T, DwellingError>;

/// Errors that can occur when building or filling a dwelling.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DwellingError {
    /// A length, radius or floor count that is not positive and finite
    #[error("Invalid dimension {name}: {value}")]
    InvalidDimension {
        /// Dimension name
        name: &'static str,
        /// Rejected value
        value: f64,
    },

    /// More residents than the dwelling holds
    #[error("No room: {residents} residents, capacity {capacity}")]
    NoRoom {
        /// Residents already present
        residents: u32,
        /// Maximum residents
        capacity: u32,
    },
}
