//! In-process store
//!
//! Same contract as the SQLite store without persistence. Useful for tests
//! and for ephemeral caches.

use crate::error::{Result, StoreError};
use crate::observe::{ChangeNotifier, LiveView};
use crate::LocalStore;
use larder_core::entity::{Entity, EntityId};
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Debug, Default)]
struct Entries {
    /// Entities in first-insertion order
    ordered: Vec<Entity>,
    /// Position of each id in `ordered`
    index: HashMap<EntityId, usize>,
}

impl Entries {
    fn upsert(&mut self, entity: Entity) {
        match self.index.get(entity.id()) {
            Some(&pos) => self.ordered[pos] = entity,
            None => {
                self.index.insert(entity.id().clone(), self.ordered.len());
                self.ordered.push(entity);
            }
        }
    }

    fn remove(&mut self, id: &EntityId) -> bool {
        let Some(pos) = self.index.remove(id) else {
            return false;
        };
        self.ordered.remove(pos);
        for entity in &self.ordered[pos..] {
            if let Some(p) = self.index.get_mut(entity.id()) {
                *p -= 1;
            }
        }
        true
    }
}

/// In-memory [`LocalStore`]
#[derive(Debug)]
pub struct MemoryStore {
    entries: Mutex<Entries>,
    notifier: ChangeNotifier,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(Entries::default()),
            notifier: ChangeNotifier::new(Vec::new()),
        }
    }

    /// Create a store pre-filled with entities, without publishing
    pub fn with_entities(entities: Vec<Entity>) -> Self {
        let mut entries = Entries::default();
        for entity in entities {
            entries.upsert(entity);
        }
        let notifier = ChangeNotifier::new(entries.ordered.clone());
        Self {
            entries: Mutex::new(entries),
            notifier,
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Entries>> {
        self.entries.lock().map_err(|_| StoreError::Poisoned)
    }
}

impl LocalStore for MemoryStore {
    fn put_all(&self, entities: Vec<Entity>) -> Result<()> {
        if entities.is_empty() {
            return Ok(());
        }
        let mut entries = self.lock()?;
        for entity in entities {
            entries.upsert(entity);
        }
        self.notifier.publish(entries.ordered.clone());
        Ok(())
    }

    fn get(&self, id: &EntityId) -> Result<Option<Entity>> {
        let entries = self.lock()?;
        Ok(entries.index.get(id).map(|&pos| entries.ordered[pos].clone()))
    }

    fn all(&self) -> Result<Vec<Entity>> {
        Ok(self.lock()?.ordered.clone())
    }

    fn observe_all(&self) -> LiveView {
        self.notifier.subscribe()
    }

    fn delete(&self, id: &EntityId) -> Result<bool> {
        let mut entries = self.lock()?;
        let removed = entries.remove(id);
        if removed {
            self.notifier.publish(entries.ordered.clone());
        }
        Ok(removed)
    }

    fn clear(&self) -> Result<()> {
        let mut entries = self.lock()?;
        if entries.ordered.is_empty() {
            return Ok(());
        }
        *entries = Entries::default();
        self.notifier.publish(Vec::new());
        Ok(())
    }

    fn len(&self) -> Result<usize> {
        Ok(self.lock()?.ordered.len())
    }

    fn subscriber_count(&self) -> usize {
        self.notifier.subscriber_count()
    }
}
