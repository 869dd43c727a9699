use std::sync::Arc;

use bitvec::prelude::BitVec;
use indexmap::{IndexMap, IndexSet};
use xias::Xias;

use super::{apply_tracked, Invalidate, Key, Notify, ObjectMut, Slot};
use crate::comp::schema::Kind;
use crate::error::PatchError;
use crate::value::Value;

/// The live state of a map field.
///
/// Values live in an arena owned by the map.
/// A key keeps its arena slot until it is removed,
/// so writing to an existing key patches the nested state in place.
/// Removed slots are reused in LIFO order.
///
/// A composite entry removed since the last clean is kept aside.
/// Inserting its key again rewrites the old entry with tracked writes,
/// so the diff patches the receiver's copy of the old entry into the new value.
#[derive(Debug, Clone)]
pub struct MapState {
    element: Arc<Kind>,
    keys:    IndexMap<String, u32>,
    arena:   Vec<Option<Slot>>,
    free:    Vec<u32>,
    /// One bit per arena slot.
    dirty:   BitVec,
    deleted: IndexSet<String>,
    graves:  IndexMap<String, Slot>,
}

impl MapState {
    /// Constructs an empty map.
    pub fn new(element: Arc<Kind>) -> Self {
        Self {
            element,
            keys: IndexMap::new(),
            arena: Vec::new(),
            free: Vec::new(),
            dirty: BitVec::new(),
            deleted: IndexSet::new(),
            graves: IndexMap::new(),
        }
    }

    /// The number of entries.
    pub fn len(&self) -> usize { self.keys.len() }

    /// Whether the map has no entries.
    pub fn is_empty(&self) -> bool { self.keys.is_empty() }

    /// Whether `key` has an entry.
    pub fn contains_key(&self, key: &str) -> bool { self.keys.contains_key(key) }

    /// The keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> + '_ { self.keys.keys().map(String::as_str) }

    /// The arena slot backing `key`.
    pub fn slot_of(&self, key: &str) -> Option<u32> { self.keys.get(key).copied() }

    fn slot(&self, index: u32) -> &Slot {
        self.arena[index.small_int::<usize>()].as_ref().expect("mapped arena slots are occupied")
    }

    /// The value of `key`.
    pub fn get(&self, key: &str) -> Option<Value> {
        let &index = self.keys.get(key)?;
        Some(self.slot(index).value(&self.element, &[]))
    }

    pub(crate) fn value(&self) -> Value {
        Value::Map(
            self.keys
                .iter()
                .map(|(key, &index)| {
                    (key.clone(), Some(self.slot(index).value(&self.element, &[])))
                })
                .collect(),
        )
    }

    pub(crate) fn diff(&self) -> Value {
        let changed = self
            .keys
            .iter()
            .filter(|&(_, &index)| self.dirty[index.small_int::<usize>()])
            .map(|(key, &index)| (key.clone(), Some(self.slot(index).diff(&self.element, &[]))));
        let deleted = self.deleted.iter().map(|key| (key.clone(), None));
        Value::Map(changed.chain(deleted).collect())
    }

    pub(crate) fn insert(
        &mut self,
        key: &str,
        value: &Value,
        hook: &mut dyn Invalidate,
    ) -> Result<bool, PatchError> {
        if let Some(&index) = self.keys.get(key) {
            let position = index.small_int::<usize>();
            let slot = self.arena[position].as_mut().expect("mapped arena slots are occupied");
            let (changed, _) = apply_tracked(
                slot,
                &self.element,
                value,
                &mut [],
                &mut self.dirty,
                position,
                Key::Entry(key),
                hook,
            )?;
            return Ok(changed);
        }

        let slot = match self.graves.shift_remove(key) {
            Some(mut slot) => {
                slot.rewrite(&self.element, value, &mut ())?;
                slot
            }
            None => Slot::inserted(&self.element, value)?,
        };
        let index = match self.free.pop() {
            Some(index) => {
                self.arena[index.small_int::<usize>()] = Some(slot);
                index
            }
            None => {
                self.arena.push(Some(slot));
                self.dirty.push(false);
                (self.arena.len() - 1).small_int()
            }
        };

        self.dirty.set(index.small_int(), true);
        self.keys.insert(key.to_string(), index);
        self.deleted.shift_remove(key);
        hook.invalidate(Key::Entry(key));
        Ok(true)
    }

    pub(crate) fn remove(&mut self, key: &str, hook: &mut dyn Invalidate) -> bool {
        let index = match self.keys.shift_remove(key) {
            Some(index) => index,
            None => return false,
        };

        let position = index.small_int::<usize>();
        let slot = self.arena[position].take().expect("mapped arena slots are occupied");
        if !matches!(slot, Slot::Scalar(_)) {
            self.graves.insert(key.to_string(), slot);
        }
        self.dirty.set(position, false);
        self.free.push(index);
        self.deleted.insert(key.to_string());
        hook.invalidate(Key::Entry(key));
        true
    }

    /// Applies a map patch: `Some` entries are written, `None` entries are removed.
    pub(crate) fn apply(
        &mut self,
        value: &Value,
        hook: &mut dyn Invalidate,
    ) -> Result<bool, PatchError> {
        let entries = match value {
            Value::Map(entries) => entries,
            _ => return Err(PatchError::Mismatch { expected: "map", found: value.variant_name() }),
        };

        let mut changed = false;
        for (key, value) in entries {
            changed |= match value {
                Some(value) => self.insert(key, value, hook)?,
                None => self.remove(key, hook),
            };
        }
        Ok(changed)
    }

    /// Removes every entry, tracking each removal.
    pub(crate) fn clear(&mut self, hook: &mut dyn Invalidate) {
        let keys: Vec<String> = self.keys.keys().cloned().collect();
        for key in keys {
            self.remove(&key, hook);
        }
    }

    pub(crate) fn mark_dirty(&mut self) {
        for &index in self.keys.values() {
            let position = index.small_int::<usize>();
            self.arena[position].as_mut().expect("mapped arena slots are occupied").mark_dirty();
            self.dirty.set(position, true);
        }
    }

    pub(crate) fn mark_clean(&mut self) {
        self.arena.iter_mut().flatten().for_each(Slot::mark_clean);
        self.dirty.fill(false);
        self.deleted.clear();
        self.graves.clear();
    }
}

/// Write access to a map field.
pub struct MapMut<'a, H: Invalidate> {
    state: &'a mut MapState,
    hook:  H,
}

impl<'a, H: Invalidate> MapMut<'a, H> {
    pub(crate) fn new(state: &'a mut MapState, hook: H) -> Self { Self { state, hook } }

    /// The number of entries.
    pub fn len(&self) -> usize { self.state.len() }

    /// Whether the map has no entries.
    pub fn is_empty(&self) -> bool { self.state.is_empty() }

    /// The value of `key`.
    pub fn get(&self, key: &str) -> Option<Value> { self.state.get(key) }

    /// Writes an entry, returning whether anything changed.
    pub fn insert(&mut self, key: &str, value: impl Into<Value>) -> Result<bool, PatchError> {
        let value = value.into();
        self.state.element.check(&value)?;
        self.state.insert(key, &value, &mut self.hook)
    }

    /// Removes an entry, returning whether it was present.
    pub fn remove(&mut self, key: &str) -> bool { self.state.remove(key, &mut self.hook) }

    /// Accesses an object entry.
    pub fn object(&mut self, key: &str) -> Result<ObjectMut<'_, Notify<'_>>, PatchError> {
        let MapState { keys, arena, dirty, .. } = &mut *self.state;
        let (stored, &index) =
            keys.get_key_value(key).ok_or_else(|| PatchError::NoElement(key.to_string()))?;
        let position = index.small_int::<usize>();
        match arena[position].as_mut().expect("mapped arena slots are occupied") {
            Slot::Object(state) => Ok(ObjectMut::new(
                state,
                Default::default(),
                Notify::new(dirty, position, Key::Entry(stored), &mut self.hook),
            )),
            slot => Err(PatchError::Mismatch { expected: "object", found: slot.name() }),
        }
    }
}
