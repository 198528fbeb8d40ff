//! Change notification: live views and observers
//!
//! A store owns one [`ChangeNotifier`]. Every applied mutation publishes a
//! full [`Snapshot`] through it; each [`LiveView`] sees the latest snapshot
//! and wakes when a newer one is published. Slow views skip intermediate
//! snapshots rather than queueing them, so delivery is at most once per
//! mutation and always in version order.

use larder_core::entity::{Entity, Snapshot};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Publishing side, owned by a store
#[derive(Debug)]
pub struct ChangeNotifier {
    tx: watch::Sender<Arc<Snapshot>>,
}

impl ChangeNotifier {
    /// Create a notifier seeded with the store's initial contents (version 0)
    pub fn new(initial: Vec<Entity>) -> Self {
        let (tx, _) = watch::channel(Arc::new(Snapshot::new(0, initial)));
        Self { tx }
    }

    /// Publish the contents after a mutation, returning the new version
    ///
    /// Callers must hold their write lock so versions follow mutation order.
    pub fn publish(&self, entities: Vec<Entity>) -> u64 {
        let version = self.tx.borrow().version + 1;
        self.tx.send_replace(Arc::new(Snapshot::new(version, entities)));
        tracing::trace!(version, "Published snapshot");
        version
    }

    /// Latest published snapshot
    pub fn latest(&self) -> Arc<Snapshot> {
        self.tx.borrow().clone()
    }

    /// Open a new live view
    pub fn subscribe(&self) -> LiveView {
        LiveView {
            rx: self.tx.subscribe(),
        }
    }

    /// Number of live views currently open
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

/// Live view of a collection
///
/// Holds the current snapshot from the moment it is created. Dropping the
/// view unsubscribes it.
#[derive(Debug, Clone)]
pub struct LiveView {
    rx: watch::Receiver<Arc<Snapshot>>,
}

impl LiveView {
    /// Snapshot the view currently holds
    pub fn current(&self) -> Arc<Snapshot> {
        self.rx.borrow().clone()
    }

    /// Wait for a snapshot newer than the last one seen through this view
    ///
    /// Returns `None` once the store has been dropped.
    pub async fn changed(&mut self) -> Option<Arc<Snapshot>> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }

    /// Current snapshot, marking it as seen
    pub fn latest(&mut self) -> Arc<Snapshot> {
        self.rx.borrow_and_update().clone()
    }

    /// Stop receiving notifications
    pub fn unsubscribe(self) {
        drop(self);
    }
}

/// Callback receiving every snapshot delivered to an observer task
pub trait ChangeObserver: Send + 'static {
    fn on_change(&mut self, snapshot: Arc<Snapshot>);
}

impl<F> ChangeObserver for F
where
    F: FnMut(Arc<Snapshot>) + Send + 'static,
{
    fn on_change(&mut self, snapshot: Arc<Snapshot>) {
        self(snapshot);
    }
}

/// Running observer; dropping it stops delivery
#[derive(Debug)]
pub struct ObserverHandle {
    task: JoinHandle<()>,
}

impl ObserverHandle {
    /// Whether the observer task is still delivering
    pub fn is_active(&self) -> bool {
        !self.task.is_finished()
    }

    /// Stop delivery explicitly
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for ObserverHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Deliver the current snapshot and every later one to `observer`
///
/// All callbacks run on one spawned task, one at a time. Must be called
/// from within a tokio runtime.
pub fn spawn_observer<O: ChangeObserver>(mut view: LiveView, mut observer: O) -> ObserverHandle {
    let task = tokio::spawn(async move {
        observer.on_change(view.latest());
        while let Some(snapshot) = view.changed().await {
            observer.on_change(snapshot);
        }
        tracing::debug!("Store dropped, observer finished");
    });
    ObserverHandle { task }
}
