//! Sync error types

use larder_store::StoreError;
use thiserror::Error;

/// Result type for repository and scheduler operations
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors from local operations on the repository and from the scheduler
///
/// Refresh failures are not errors; they surface as
/// [`RefreshState::Failed`](larder_core::state::RefreshState::Failed).
#[derive(Error, Debug)]
pub enum SyncError {
    /// Local store failure
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Blocking store worker panicked or was cancelled
    #[error("store worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),

    /// Work journal could not be read or written
    #[error(transparent)]
    Journal(#[from] larder_core::Error),
}
