//! Raw access for foreign compiled modules.
//!
//! Foreign code is handed three things:
//! the [`ForeignMemory`] of the queries it walks,
//! the chunks of the packed storages it reads and writes,
//! and the module bytes bound to its system through [`World::instantiate_foreign`].
//! All of these borrow the world, so nothing can grow while foreign code holds them.

use super::World;
use crate::entity::EntityId;
use crate::error::Error;
use crate::query::{ForeignMemory, QueryId};
use crate::storage::Pool;

impl World {
    /// Binds foreign modules to the named systems.
    ///
    /// Returns once every module is bound.
    /// The first failure is returned with the name of its system;
    /// modules listed before it stay bound.
    pub fn instantiate_foreign<S, B>(
        &mut self,
        modules: impl IntoIterator<Item = (S, B)>,
    ) -> Result<(), Error>
    where
        S: AsRef<str>,
        B: AsRef<[u8]>,
    {
        for (name, module) in modules {
            self.scheduler.bind(name.as_ref(), module.as_ref())?;
        }
        Ok(())
    }

    /// The raw view of a query.
    pub fn foreign_query(&self, id: QueryId) -> ForeignMemory<'_> { self.query_ref(id).foreign() }

    /// The live entity occupying an entity slot, as found in the first word of query rows.
    pub fn slot_owner(&self, slot: u32) -> Option<EntityId> { self.ealloc.occupant(slot) }

    /// The pool of the component `name`, if it is packed.
    pub fn pool(&self, name: &str) -> Result<Option<&Pool>, Error> {
        let comp = self.resolve(name)?;
        Ok(self.storages[comp.index()].packed())
    }

    /// Mutable access to the pool of the component `name`, if it is packed.
    ///
    /// Writes through the pool chunks are not tracked;
    /// call [`mark_dirty`](Self::mark_dirty) for the records foreign code changed.
    pub fn pool_mut(&mut self, name: &str) -> Result<Option<&mut Pool>, Error> {
        let comp = self.resolve(name)?;
        Ok(self.storages[comp.index()].packed_mut())
    }

    /// Marks every field of a component dirty,
    /// so that the next diff carries the full component.
    pub fn mark_dirty(&mut self, id: EntityId, name: &str) -> Result<(), Error> {
        let comp = self.attached(id, name)?;
        let mut record =
            self.storages[comp.index()].write(id).expect("attached components have a record");
        record.mark_dirty();
        self.dirty.insert(id);
        Ok(())
    }
}
