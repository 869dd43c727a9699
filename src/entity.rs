//! An entity is an integer-identified owner of components.
//!
//! Entity ids start at 1; id 0 is reserved and cannot be represented.
//! Besides its id, each live entity occupies a dense slot
//! that is recycled when the entity is destroyed.

use std::fmt;
use std::num::NonZeroU32;

use bitvec::prelude::BitVec;

use crate::comp::ComponentId;

mod ealloc;
pub(crate) use ealloc::Ealloc;

#[cfg(test)]
mod tests;

/// Identifies an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntityId(NonZeroU32);

impl EntityId {
    /// Returns `None` for the reserved id 0.
    pub fn new(id: u32) -> Option<Self> { NonZeroU32::new(id).map(Self) }

    /// The numeric id.
    pub fn get(self) -> u32 { self.0.get() }
}

impl From<NonZeroU32> for EntityId {
    fn from(id: NonZeroU32) -> Self { Self(id) }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { self.0.fmt(f) }
}

/// The bookkeeping of a live entity.
#[derive(Debug)]
pub(crate) struct Entity {
    pub(crate) id:         EntityId,
    pub(crate) slot:       u32,
    /// One bit per registered component type.
    pub(crate) components: BitVec,
    /// Components detached since the last clean.
    pub(crate) removed:    BitVec,
    /// Components attached since the last clean.
    pub(crate) added:      BitVec,
    /// Whether the entity was created since the last clean.
    pub(crate) fresh:      bool,
}

impl Entity {
    pub(crate) fn new(id: EntityId, slot: u32, num_components: usize) -> Self {
        Self {
            id,
            slot,
            components: BitVec::repeat(false, num_components),
            removed: BitVec::repeat(false, num_components),
            added: BitVec::repeat(false, num_components),
            fresh: true,
        }
    }

    /// Reinitializes a recycled entity record.
    pub(crate) fn reuse(&mut self, id: EntityId, slot: u32) {
        self.id = id;
        self.slot = slot;
        self.components.fill(false);
        self.removed.fill(false);
        self.added.fill(false);
        self.fresh = true;
    }

    pub(crate) fn has(&self, comp: ComponentId) -> bool { self.components[comp.index()] }

    /// Iterates over the attached components in registration order.
    pub(crate) fn components(&self) -> impl Iterator<Item = ComponentId> + '_ {
        self.components.iter_ones().map(ComponentId)
    }

    pub(crate) fn mark_clean(&mut self) {
        self.removed.fill(false);
        self.added.fill(false);
        self.fresh = false;
    }
}
