//! A storage is the data structure where the instances of one component type are stored.
//!
//! Two backends implement [`Storage`]:
//! [`Pool`] keeps fixed-width scalar fields in chunked little-endian rows,
//! [`Simple`] keeps every field in its record.
//! Both hand out `u32` handles that are recycled through a free list,
//! and neither ever releases memory it has grown.

use std::sync::Arc;

use crate::comp::{Schema, StorageKind};
use crate::entity::EntityId;
use crate::prop::{Invalidate, ObjectMut, ObjectRef, ObjectState};

mod pool;
pub use pool::{Layout, Pool};

mod simple;
pub use simple::Simple;

#[cfg(test)]
mod tests;

/// Rows per pool chunk unless configured otherwise.
pub const DEFAULT_CHUNK_LEN: usize = 256;

/// A component instance.
#[derive(Debug)]
pub(crate) struct Record {
    /// The entity owning this record, or `None` if the record is free.
    owner: Option<EntityId>,
    state: ObjectState,
}

/// Write access to a record, before a hook is attached.
pub struct RecordMut<'a> {
    state: &'a mut ObjectState,
    row:   &'a mut [u8],
}

impl<'a> RecordMut<'a> {
    /// Attaches the hook notified of every effective write.
    pub fn with_hook<H: Invalidate>(self, hook: H) -> ObjectMut<'a, H> {
        ObjectMut::new(self.state, self.row, hook)
    }

    /// Forces every field dirty, so that the next diff carries the full record.
    pub fn mark_dirty(&mut self) { self.state.mark_dirty(); }
}

/// A storage for the instances of one component type.
///
/// Every live entity owns at most one record.
pub trait Storage: Send {
    /// The field table of the stored component type.
    fn schema(&self) -> &Arc<Schema>;

    /// Returns the handle of the record of `owner`,
    /// creating a record with every field at its default if there is none.
    fn create(&mut self, owner: EntityId) -> u32;

    /// Resets and frees the record of `owner`, returning whether there was one.
    fn destroy(&mut self, owner: EntityId) -> bool;

    /// The handle of the record of `owner`.
    fn handle(&self, owner: EntityId) -> Option<u32>;

    /// Read access to the record of `owner`.
    fn read(&self, owner: EntityId) -> Option<ObjectRef<'_>>;

    /// Write access to the record of `owner`.
    fn write(&mut self, owner: EntityId) -> Option<RecordMut<'_>>;

    /// Clears the dirty state of every record.
    fn mark_clean(&mut self);

    /// The number of live records.
    fn len(&self) -> usize;

    /// Whether there are no live records.
    fn is_empty(&self) -> bool { self.len() == 0 }

    /// The owners of live records in ascending id order.
    fn owners(&self) -> Box<dyn Iterator<Item = EntityId> + '_>;

    /// The pool if this storage is packed.
    fn packed(&self) -> Option<&Pool> { None }

    /// The pool if this storage is packed.
    fn packed_mut(&mut self) -> Option<&mut Pool> { None }
}

/// Constructs the storage backend for a component type.
pub(crate) fn build(schema: Arc<Schema>, kind: StorageKind, chunk_len: usize) -> Box<dyn Storage> {
    match kind {
        StorageKind::Packed => Box::new(Pool::new(schema, chunk_len)),
        StorageKind::Simple => Box::new(Simple::new(schema)),
    }
}
