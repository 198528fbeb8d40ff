//! Offline-first repository and background refresh for larder
//!
//! - [`Repository`]: reads come from the local store; refreshes fetch from
//!   the remote source and merge by id, collapsing concurrent callers into
//!   one fetch
//! - [`RefreshScheduler`]: runs refreshes once or periodically under
//!   [`Constraints`], retrying network failures with backoff
//! - [`WorkJournal`]: keeps a scheduled run pending across restarts
//!
//! # Example
//!
//! ```rust,no_run
//! use larder_core::collection::CollectionSchema;
//! use larder_remote::{HttpRemoteSource, RemoteConfig};
//! use larder_store::SqliteStore;
//! use larder_sync::Repository;
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(SqliteStore::open("larder.db", CollectionSchema::default())?);
//! let remote = HttpRemoteSource::new(RemoteConfig::new("https://api.example.com"))?;
//! let repo = Repository::new("entities", remote, store);
//!
//! let view = repo.observe();
//! let state = repo.refresh().await;
//! println!("{} entities, {:?}", view.current().len(), state);
//! # Ok(())
//! # }
//! ```

#![warn(clippy::all)]

pub mod error;
pub mod journal;
pub mod repository;
pub mod scheduler;

pub use error::{SyncError, SyncResult};
pub use journal::{JournalEntry, WorkJournal};
pub use repository::Repository;
pub use scheduler::{
    AlwaysSatisfied, ConstraintProbe, Constraints, RefreshScheduler, RefreshTask, RunReport,
    SchedulerHandle,
};
