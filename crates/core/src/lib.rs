//! Core types for the larder offline-first cache
//!
//! This crate provides the pieces shared by the store, remote and sync crates:
//!
//! - **Domain model**: entities, identifiers, snapshots and refresh state
//! - **Error handling**: errors with codes, context, and recovery suggestions
//! - **Configuration**: `larder.toml` with environment overrides and validation
//! - **Collections**: schema of declared payload fields
//! - **Retry**: exponential backoff and a circuit breaker
//!
//! # Example
//!
//! ```rust
//! use larder_core::prelude::*;
//! use serde_json::json;
//!
//! let entity = Entity::new(1i64, payload([("name", json!("A"))]));
//! assert_eq!(entity.id().as_str(), "1");
//! assert!(RefreshState::default().is_idle());
//! ```

#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod collection;
pub mod config;
pub mod entity;
pub mod error;
pub mod retry;
pub mod state;
pub mod validation;

pub use error::{Error, ErrorCode, Result, ResultExt};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::collection::{CollectionSchema, FieldDef, FieldKind};
    pub use crate::config::{Config, ConfigSchema};
    pub use crate::entity::{payload, Entity, EntityId, Payload, Snapshot};
    pub use crate::error::{exit_codes, Error, ErrorCode, Result, ResultExt};
    pub use crate::retry::{retry_if, CircuitBreaker, CircuitBreakerConfig, RetryConfig};
    pub use crate::state::{FailureKind, FetchError, FetchResult, RefreshFailure, RefreshState};
    pub use crate::validation::{ValidationResult, Validator};
}
