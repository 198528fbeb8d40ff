//! Remote entity sources for larder
//!
//! A [`RemoteSource`] fetches the current contents of a collection from
//! somewhere slow and fallible. It makes one attempt per call and never
//! writes anywhere; the repository decides what to do with the result.
//!
//! - [`HttpRemoteSource`]: GET of a JSON array from a fixed endpoint
//! - [`decode_entities`]: network entries to domain entities
//!
//! # Example
//!
//! ```rust,no_run
//! use larder_remote::{HttpRemoteSource, RemoteConfig, RemoteSource};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let source = HttpRemoteSource::new(
//!         RemoteConfig::new("https://android-kotlin-fun-mars-server.appspot.com")
//!             .with_resource_path("/realestate"),
//!     )?;
//!
//!     let entities = source.fetch().await?;
//!     println!("fetched {}", entities.len());
//!     Ok(())
//! }
//! ```

#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod client;
pub mod config;
pub mod decode;
pub mod error;

pub use client::HttpRemoteSource;
pub use config::RemoteConfig;
pub use decode::decode_entities;
pub use error::{RemoteError, RemoteResult};

use larder_core::state::FetchResult;
use std::future::Future;
use std::sync::Arc;

/// Source of the authoritative collection contents
///
/// Calls are idempotent: apart from connection-health bookkeeping, fetching
/// changes no shared state.
pub trait RemoteSource: Send + Sync + 'static {
    /// Fetch every entity of the collection in one attempt
    fn fetch(&self) -> impl Future<Output = FetchResult> + Send;
}

impl<R: RemoteSource> RemoteSource for Arc<R> {
    fn fetch(&self) -> impl Future<Output = FetchResult> + Send {
        (**self).fetch()
    }
}

/// Re-export commonly used types
pub mod prelude {
    pub use crate::client::HttpRemoteSource;
    pub use crate::config::RemoteConfig;
    pub use crate::error::{RemoteError, RemoteResult};
    pub use crate::RemoteSource;
}
