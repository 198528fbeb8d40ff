//! Local entity stores for larder
//!
//! The local store is the single source of truth that callers observe.
//! Remote results only become visible once they are written here.
//!
//! - [`SqliteStore`]: durable store, one table per collection
//! - [`MemoryStore`]: in-process store with the same contract
//! - [`LiveView`] / [`spawn_observer`]: push-based change notification
//!
//! # Example
//!
//! ```rust
//! use larder_core::prelude::*;
//! use larder_store::{LocalStore, SqliteStore};
//! use serde_json::json;
//!
//! let store = SqliteStore::open_in_memory(CollectionSchema::new("properties")).unwrap();
//! let view = store.observe_all();
//!
//! store.put(Entity::new(1i64, payload([("name", json!("A"))]))).unwrap();
//!
//! assert_eq!(view.current().len(), 1);
//! ```

#![warn(clippy::all)]

pub mod error;
pub mod memory;
pub mod observe;
pub mod sqlite;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use observe::{spawn_observer, ChangeNotifier, ChangeObserver, LiveView, ObserverHandle};
pub use sqlite::SqliteStore;

use larder_core::entity::{Entity, EntityId};

/// Durable keyed storage for entities with change notification
///
/// Every mutation is atomic with respect to observers: a view never sees a
/// partially applied batch. Each applied mutation publishes one snapshot
/// with a strictly greater version; a mutation that changes nothing
/// publishes nothing.
///
/// Methods block; async callers should run them on a blocking worker.
pub trait LocalStore: Send + Sync + 'static {
    /// Upsert a single entity by id
    fn put(&self, entity: Entity) -> Result<()> {
        self.put_all(vec![entity])
    }

    /// Upsert a batch by id in one transaction; a later duplicate wins
    fn put_all(&self, entities: Vec<Entity>) -> Result<()>;

    /// Look up an entity
    fn get(&self, id: &EntityId) -> Result<Option<Entity>>;

    /// All entities in first-insertion order
    fn all(&self) -> Result<Vec<Entity>>;

    /// Live view of all entities, holding the current snapshot immediately
    fn observe_all(&self) -> LiveView;

    /// Remove one entity; returns whether it existed
    fn delete(&self, id: &EntityId) -> Result<bool>;

    /// Remove every entity
    fn clear(&self) -> Result<()>;

    /// Number of stored entities
    fn len(&self) -> Result<usize>;

    fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Number of open live views
    fn subscriber_count(&self) -> usize;
}

impl<S: LocalStore + ?Sized> LocalStore for std::sync::Arc<S> {
    fn put(&self, entity: Entity) -> Result<()> {
        (**self).put(entity)
    }

    fn put_all(&self, entities: Vec<Entity>) -> Result<()> {
        (**self).put_all(entities)
    }

    fn get(&self, id: &EntityId) -> Result<Option<Entity>> {
        (**self).get(id)
    }

    fn all(&self) -> Result<Vec<Entity>> {
        (**self).all()
    }

    fn observe_all(&self) -> LiveView {
        (**self).observe_all()
    }

    fn delete(&self, id: &EntityId) -> Result<bool> {
        (**self).delete(id)
    }

    fn clear(&self) -> Result<()> {
        (**self).clear()
    }

    fn len(&self) -> Result<usize> {
        (**self).len()
    }

    fn subscriber_count(&self) -> usize {
        (**self).subscriber_count()
    }
}
