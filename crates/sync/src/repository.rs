//! Offline-first repository
//!
//! Callers read from the local store and never wait on the network.
//! A refresh fetches from the remote source and merges the result into the
//! store; observers see it through their live views. A failed refresh
//! leaves the cached entities in place.
//!
//! Concurrent refreshes collapse into one fetch. Once started, a refresh
//! runs to completion on its own task even if every caller goes away.

use crate::error::SyncResult;
use chrono::{DateTime, Utc};
use larder_core::entity::{Entity, EntityId};
use larder_core::state::{RefreshFailure, RefreshState};
use larder_remote::RemoteSource;
use larder_store::{LiveView, LocalStore};
use larder_telemetry::{metrics, names, Timer};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::watch;
use tracing::{debug, info, warn};

type Outcome = watch::Receiver<Option<RefreshState>>;

/// Single point of truth for one collection
pub struct Repository<R, S> {
    inner: Arc<Inner<R, S>>,
}

impl<R, S> Clone for Repository<R, S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct Inner<R, S> {
    name: String,
    remote: R,
    store: Arc<S>,
    state: watch::Sender<RefreshState>,
    /// Outcome channel of the refresh in flight, if any
    in_flight: Mutex<Option<Outcome>>,
    last_success: Mutex<Option<DateTime<Utc>>>,
}

impl<R: RemoteSource, S: LocalStore> Repository<R, S> {
    /// Create a repository over a shared store
    pub fn new(name: impl Into<String>, remote: R, store: Arc<S>) -> Self {
        let (state, _) = watch::channel(RefreshState::Idle);
        Self {
            inner: Arc::new(Inner {
                name: name.into(),
                remote,
                store,
                state,
                in_flight: Mutex::new(None),
                last_success: Mutex::new(None),
            }),
        }
    }

    /// Collection name used in logs
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// The underlying store
    pub fn store(&self) -> &Arc<S> {
        &self.inner.store
    }

    /// The remote source
    pub fn remote(&self) -> &R {
        &self.inner.remote
    }

    /// Live view of the collection; never touches the network
    pub fn observe(&self) -> LiveView {
        self.inner.store.observe_all()
    }

    /// Watch refresh state transitions
    pub fn refresh_state(&self) -> watch::Receiver<RefreshState> {
        self.inner.state.subscribe()
    }

    /// Current refresh state
    pub fn current_state(&self) -> RefreshState {
        self.inner.state.borrow().clone()
    }

    /// When the last refresh committed, if any did in this process
    pub fn last_success(&self) -> Option<DateTime<Utc>> {
        *self
            .inner
            .last_success
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Fetch from the remote source and merge into the store
    ///
    /// Returns `Idle` on success or `Failed` with the reason. Callers that
    /// arrive while a refresh is in flight join it and get the same outcome.
    pub async fn refresh(&self) -> RefreshState {
        let mut outcome = self.start_or_join();
        let result = match outcome.wait_for(Option::is_some).await {
            Ok(value) => value.clone(),
            Err(_) => None,
        };
        result.unwrap_or_else(|| {
            RefreshState::Failed(RefreshFailure::network(
                "refresh task ended without reporting an outcome",
            ))
        })
    }

    /// Start a refresh (or join the running one) without waiting for it
    pub fn refresh_in_background(&self) {
        drop(self.start_or_join());
    }

    fn start_or_join(&self) -> Outcome {
        let mut slot = self
            .inner
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if let Some(outcome) = slot.as_ref() {
            debug!(collection = %self.inner.name, "Joining refresh in flight");
            metrics().increment(names::REFRESH_JOINED);
            return outcome.clone();
        }

        let (tx, rx) = watch::channel(None);
        *slot = Some(rx.clone());
        self.inner.state.send_replace(RefreshState::Refreshing);
        drop(slot);

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            let mut guard = Completion {
                inner: &inner,
                tx,
                state: None,
            };
            guard.state = Some(inner.run_refresh().await);
        });

        rx
    }

    /// Look up one cached entity
    pub async fn get(&self, id: EntityId) -> SyncResult<Option<Entity>> {
        let store = Arc::clone(&self.inner.store);
        Ok(tokio::task::spawn_blocking(move || store.get(&id)).await??)
    }

    /// All cached entities
    pub async fn all(&self) -> SyncResult<Vec<Entity>> {
        let store = Arc::clone(&self.inner.store);
        Ok(tokio::task::spawn_blocking(move || store.all()).await??)
    }

    /// Write a local edit; a later refresh of the same id overwrites it
    pub async fn put(&self, entity: Entity) -> SyncResult<()> {
        let store = Arc::clone(&self.inner.store);
        Ok(tokio::task::spawn_blocking(move || store.put(entity)).await??)
    }

    /// Remove one cached entity
    pub async fn delete(&self, id: EntityId) -> SyncResult<bool> {
        let store = Arc::clone(&self.inner.store);
        Ok(tokio::task::spawn_blocking(move || store.delete(&id)).await??)
    }

    /// Drop every cached entity
    pub async fn clear(&self) -> SyncResult<()> {
        let store = Arc::clone(&self.inner.store);
        Ok(tokio::task::spawn_blocking(move || store.clear()).await??)
    }
}

impl<R: RemoteSource, S: LocalStore> Inner<R, S> {
    async fn run_refresh(&self) -> RefreshState {
        let timer = Timer::start(names::REFRESH_DURATION_MS);
        debug!(collection = %self.name, "Refresh started");

        let entities = match self.remote.fetch().await {
            Ok(entities) => entities,
            Err(e) => {
                warn!(collection = %self.name, error = %e, "Fetch failed, keeping cached data");
                return RefreshState::Failed(e.into());
            }
        };

        let count = entities.len();
        let store = Arc::clone(&self.store);
        let written = tokio::task::spawn_blocking(move || store.put_all(entities)).await;

        let state = match written {
            Ok(Ok(())) => {
                metrics().increment(names::STORE_WRITE);
                *self
                    .last_success
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner) = Some(Utc::now());
                RefreshState::Idle
            }
            Ok(Err(e)) => RefreshState::Failed(RefreshFailure::storage(e.to_string())),
            Err(e) => RefreshState::Failed(RefreshFailure::storage(format!(
                "store worker failed: {e}"
            ))),
        };

        let elapsed = timer.stop();
        match &state {
            RefreshState::Failed(f) => {
                warn!(collection = %self.name, error = %f, "Refresh could not be stored");
            }
            _ => info!(
                collection = %self.name,
                count,
                elapsed_ms = elapsed.as_millis(),
                "Refresh committed"
            ),
        }
        state
    }
}

/// Publishes the outcome when the refresh task ends, including by panic
struct Completion<'a, R, S> {
    inner: &'a Inner<R, S>,
    tx: watch::Sender<Option<RefreshState>>,
    state: Option<RefreshState>,
}

impl<R, S> Drop for Completion<'_, R, S> {
    fn drop(&mut self) {
        let state = self.state.take().unwrap_or_else(|| {
            RefreshState::Failed(RefreshFailure::network(
                "refresh task ended without reporting an outcome",
            ))
        });

        if state.is_failed() {
            metrics().increment(names::REFRESH_FAILURE);
        } else {
            metrics().increment(names::REFRESH_SUCCESS);
        }

        // Clear the slot and publish together so late callers either join
        // this refresh or start a new one
        let mut slot = self
            .inner
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *slot = None;
        self.inner.state.send_replace(state.clone());
        self.tx.send_replace(Some(state));
    }
}

impl<R, S> std::fmt::Debug for Repository<R, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository")
            .field("name", &self.inner.name)
            .field("state", &*self.inner.state.borrow())
            .finish()
    }
}
