//! Deferred, reference-counted entity destruction.
//!
//! [`World::destroy`] only marks an entity.
//! At the end of every tick, each marked entity without outstanding
//! [`DestroyDependency`] guards is destroyed:
//! its listeners are fired, then its components are detached,
//! it leaves every query and its slot is recycled.

use std::collections::BTreeSet;
use std::sync::Arc;

use parking_lot::Mutex;

use super::World;
use crate::entity::EntityId;
use crate::error::Error;

type Listener = Box<dyn FnOnce(&World, EntityId) + Send>;

/// The destruction state of an entity, created on first use.
#[derive(Default)]
pub(crate) struct DestroyDescriptor {
    destroying: bool,
    listeners:  Vec<Listener>,
    /// Tokens of the guards that are still alive.
    pending:    Arc<Mutex<BTreeSet<u64>>>,
}

impl DestroyDescriptor {
    fn ready(&self) -> bool { self.destroying && self.pending.lock().is_empty() }
}

/// Prevents an entity from being destroyed while it is alive.
///
/// Dropping the guard has the same effect as [`release`](Self::release).
#[must_use = "the dependency is released when the guard is dropped"]
pub struct DestroyDependency {
    pending: Arc<Mutex<BTreeSet<u64>>>,
    token:   u64,
}

impl DestroyDependency {
    /// Releases the dependency.
    pub fn release(self) {}
}

impl Drop for DestroyDependency {
    fn drop(&mut self) { self.pending.lock().remove(&self.token); }
}

impl World {
    fn descriptor(&mut self, id: EntityId) -> Result<&mut DestroyDescriptor, Error> {
        self.entity(id)?;
        Ok(self.destroy.entry(id).or_default())
    }

    /// Marks an entity for destruction at the end of the current or next tick.
    pub fn destroy(&mut self, id: EntityId) -> Result<(), Error> {
        let descriptor = self.descriptor(id)?;
        if !descriptor.destroying {
            descriptor.destroying = true;
            log::debug!("Entity {} is marked for destruction", id);
        }
        Ok(())
    }

    /// Whether an entity is marked for destruction.
    pub fn is_destroying(&self, id: EntityId) -> bool {
        self.destroy.get(&id).map_or(false, |descriptor| descriptor.destroying)
    }

    /// Delays the destruction of an entity until the returned guard is released.
    pub fn add_destroy_dependency(&mut self, id: EntityId) -> Result<DestroyDependency, Error> {
        let token = self.next_token;
        let descriptor = self.descriptor(id)?;
        descriptor.pending.lock().insert(token);
        let pending = Arc::clone(&descriptor.pending);
        self.next_token += 1;
        Ok(DestroyDependency { pending, token })
    }

    /// Registers a callback fired once when the entity is actually destroyed,
    /// while its components are still attached.
    pub fn add_destroy_listener(
        &mut self,
        id: EntityId,
        listener: impl FnOnce(&World, EntityId) + Send + 'static,
    ) -> Result<(), Error> {
        self.descriptor(id)?.listeners.push(Box::new(listener));
        Ok(())
    }

    /// Destroys every marked entity without pending dependencies, in id order.
    pub(super) fn sweep(&mut self) {
        let ready: Vec<EntityId> = self
            .destroy
            .iter()
            .filter(|(_, descriptor)| descriptor.ready())
            .map(|(&id, _)| id)
            .collect();

        for id in ready {
            let descriptor = self.destroy.remove(&id).expect("collected from the map");
            self.destroy_now(id, descriptor.listeners);
        }
    }

    fn destroy_now(&mut self, id: EntityId, listeners: Vec<Listener>) {
        for listener in listeners {
            listener(self, id);
        }

        let entity = self.entities.remove(&id).expect("descriptors belong to live entities");
        for query in &mut self.queries {
            query.deindex(id);
        }
        for comp in entity.components() {
            self.storages[comp.index()].destroy(id);
        }
        self.ealloc.release_slot(entity.slot);
        self.recycled.push(entity);

        self.dirty.remove(&id);
        self.destroyed.insert(id);
        log::debug!("Destroyed entity {}", id);
    }
}
