//! Manages entity id and slot allocation.

use xias::Xias;

use super::EntityId;
use crate::error::Error;

/// Allocates entity ids from a monotonic gauge and recycles entity slots.
#[derive(Debug)]
pub(crate) struct Ealloc {
    /// The next automatic id.
    ///
    /// Always greater than every id issued or reserved so far.
    gauge: u64,
    /// The occupant of each slot.
    slots: Vec<Option<EntityId>>,
    /// Recycled slots, reused in LIFO order.
    free:  Vec<u32>,
}

impl Default for Ealloc {
    fn default() -> Self { Self { gauge: 1, slots: Vec::new(), free: Vec::new() } }
}

impl Ealloc {
    /// Allocates the next automatic id.
    ///
    /// Fails once the gauge has passed `u32::MAX`, e.g. after `u32::MAX` was reserved.
    pub(crate) fn allocate(&mut self) -> Result<EntityId, Error> {
        let id = u32::try_from(self.gauge).ok().and_then(EntityId::new).ok_or(Error::IdsExhausted)?;
        self.gauge += 1;
        Ok(id)
    }

    /// Records an explicitly supplied id so that automatic ids never collide with it.
    pub(crate) fn reserve(&mut self, id: EntityId) {
        self.gauge = self.gauge.max(u64::from(id.get()) + 1);
    }

    /// Assigns a slot to `id`.
    pub(crate) fn take_slot(&mut self, id: EntityId) -> u32 {
        match self.free.pop() {
            Some(slot) => {
                let occupant = &mut self.slots[slot.small_int::<usize>()];
                debug_assert!(occupant.is_none(), "free slot {slot} is occupied");
                *occupant = Some(id);
                slot
            }
            None => {
                self.slots.push(Some(id));
                (self.slots.len() - 1).small_int()
            }
        }
    }

    /// Returns a slot to the free list.
    pub(crate) fn release_slot(&mut self, slot: u32) {
        let occupant = self.slots.get_mut(slot.small_int::<usize>()).expect("slot was allocated");
        *occupant = None;
        self.free.push(slot);
    }

    /// The entity occupying `slot`.
    pub(crate) fn occupant(&self, slot: u32) -> Option<EntityId> {
        self.slots.get(slot.small_int::<usize>()).copied().flatten()
    }
}
