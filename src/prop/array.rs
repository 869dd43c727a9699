use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use bitvec::prelude::BitVec;
use xias::Xias;

use super::{apply_tracked, Invalidate, Key, Notify, ObjectMut, Slot};
use crate::comp::schema::Kind;
use crate::error::PatchError;
use crate::value::{Sparse, Value};

/// Indices at or above this value are rejected.
pub const MAX_ARRAY_LEN: u32 = 1 << 24;

/// The live state of an array field.
///
/// Arrays may contain holes.
/// Removing the last element truncates the array together with any holes before it;
/// removing any other element leaves a hole.
/// The diff lists changed indices and removed indices, the latter from high to low.
/// A removed scalar element that is set again is no longer reported as removed;
/// a composite element keeps its removal,
/// so that the receiver replaces its old element instead of patching it.
#[derive(Debug, Clone)]
pub struct ArrayState {
    element: Arc<Kind>,
    items:   Vec<Option<Slot>>,
    dirty:   BitVec,
    deleted: BTreeSet<u32>,
    /// Set by a full resync, so that the next diff is the dense array.
    resync:  bool,
}

impl ArrayState {
    /// Constructs an empty array.
    pub fn new(element: Arc<Kind>) -> Self {
        Self {
            element,
            items: Vec::new(),
            dirty: BitVec::new(),
            deleted: BTreeSet::new(),
            resync: false,
        }
    }

    /// The element kind.
    pub fn element(&self) -> &Kind { &self.element }

    /// The length of the array, including holes.
    pub fn len(&self) -> u32 { self.items.len().small_int() }

    /// Whether the array has no elements or holes.
    pub fn is_empty(&self) -> bool { self.items.is_empty() }

    /// The value at `index`, or `None` for holes and out-of-range indices.
    pub fn get(&self, index: u32) -> Option<Value> {
        let slot = self.items.get(index.small_int::<usize>())?.as_ref()?;
        Some(slot.value(&self.element, &[]))
    }

    fn has_holes(&self) -> bool { self.items.iter().any(Option::is_none) }

    fn present(&self) -> impl Iterator<Item = (u32, &Slot)> + '_ {
        self.items
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| Some((index.small_int::<u32>(), slot.as_ref()?)))
    }

    pub(crate) fn value(&self) -> Value {
        if self.has_holes() {
            let set = self
                .present()
                .map(|(index, slot)| (index, slot.value(&self.element, &[])))
                .collect();
            Value::Sparse(Sparse { set, deleted: Vec::new() })
        } else {
            Value::Array(self.present().map(|(_, slot)| slot.value(&self.element, &[])).collect())
        }
    }

    pub(crate) fn diff(&self) -> Value {
        if self.resync && !self.has_holes() {
            return self.value();
        }

        let set: BTreeMap<u32, Value> = self
            .present()
            .filter(|&(index, _)| self.dirty[index.small_int::<usize>()])
            .map(|(index, slot)| (index, slot.diff(&self.element, &[])))
            .collect();
        let deleted = self.deleted.iter().rev().copied().collect();
        Value::Sparse(Sparse { set, deleted })
    }

    pub(crate) fn set(
        &mut self,
        index: u32,
        value: &Value,
        hook: &mut dyn Invalidate,
    ) -> Result<bool, PatchError> {
        if index >= MAX_ARRAY_LEN {
            return Err(PatchError::IndexTooLarge(index.into()));
        }
        let position = index.small_int::<usize>();

        if let Some(Some(slot)) = self.items.get_mut(position) {
            let (changed, _) = apply_tracked(
                slot,
                &self.element,
                value,
                &mut [],
                &mut self.dirty,
                position,
                Key::Index(index),
                hook,
            )?;
            return Ok(changed);
        }

        let slot = Slot::inserted(&self.element, value)?;
        if self.items.len() <= position {
            self.items.resize_with(position + 1, || None);
            self.dirty.resize(position + 1, false);
        }
        self.items[position] = Some(slot);
        if let Kind::Scalar(_) = *self.element {
            self.deleted.remove(&index);
        }
        self.dirty.set(position, true);
        hook.invalidate(Key::Index(index));
        Ok(true)
    }

    pub(crate) fn remove(&mut self, index: u32, hook: &mut dyn Invalidate) -> bool {
        let position = index.small_int::<usize>();
        match self.items.get_mut(position) {
            Some(item @ Some(_)) => *item = None,
            _ => return false,
        }

        self.dirty.set(position, false);
        self.deleted.insert(index);
        if position + 1 == self.items.len() {
            while let Some(None) = self.items.last() {
                self.items.pop();
            }
            self.dirty.truncate(self.items.len());
        }

        hook.invalidate(Key::Index(index));
        true
    }

    /// Removes every element from the end, tracking each removal.
    pub(crate) fn clear(&mut self, hook: &mut dyn Invalidate) {
        for index in (0..self.len()).rev() {
            self.remove(index, hook);
        }
    }

    /// Assigns a dense array or applies a sparse patch.
    ///
    /// A dense array is written element by element and excess elements are removed from the end.
    /// A sparse patch removes its deleted indices from high to low, then writes its set indices.
    pub(crate) fn apply(
        &mut self,
        value: &Value,
        hook: &mut dyn Invalidate,
    ) -> Result<bool, PatchError> {
        let mut changed = false;

        match value {
            Value::Array(values) => {
                for (position, value) in values.iter().enumerate() {
                    let index = u32::try_from(position)
                        .map_err(|_| PatchError::IndexTooLarge(position as u64))?;
                    changed |= self.set(index, value, hook)?;
                }
                for position in (values.len()..self.items.len()).rev() {
                    changed |= self.remove(position.small_int(), hook);
                }
            }
            Value::Sparse(sparse) => {
                let mut deleted = sparse.deleted.clone();
                deleted.sort_unstable_by(|a, b| b.cmp(a));
                for index in deleted {
                    changed |= self.remove(index, hook);
                }
                for (&index, value) in &sparse.set {
                    changed |= self.set(index, value, hook)?;
                }
            }
            _ => {
                let found = value.variant_name();
                return Err(PatchError::Mismatch { expected: "array", found });
            }
        }

        Ok(changed)
    }

    pub(crate) fn mark_dirty(&mut self) {
        for (position, item) in self.items.iter_mut().enumerate() {
            if let Some(slot) = item {
                slot.mark_dirty();
                self.dirty.set(position, true);
            }
        }
        self.resync = true;
    }

    pub(crate) fn mark_clean(&mut self) {
        self.items.iter_mut().flatten().for_each(Slot::mark_clean);
        self.dirty.fill(false);
        self.deleted.clear();
        self.resync = false;
    }
}

/// Write access to an array field.
pub struct ArrayMut<'a, H: Invalidate> {
    state: &'a mut ArrayState,
    hook:  H,
}

impl<'a, H: Invalidate> ArrayMut<'a, H> {
    pub(crate) fn new(state: &'a mut ArrayState, hook: H) -> Self { Self { state, hook } }

    /// The length of the array, including holes.
    pub fn len(&self) -> u32 { self.state.len() }

    /// Whether the array has no elements or holes.
    pub fn is_empty(&self) -> bool { self.state.is_empty() }

    /// The value at `index`.
    pub fn get(&self, index: u32) -> Option<Value> { self.state.get(index) }

    /// Writes an element, extending the array with holes if necessary.
    pub fn set(&mut self, index: u32, value: impl Into<Value>) -> Result<bool, PatchError> {
        let value = value.into();
        self.state.element.check(&value)?;
        self.state.set(index, &value, &mut self.hook)
    }

    /// Appends an element, returning its index.
    pub fn push(&mut self, value: impl Into<Value>) -> Result<u32, PatchError> {
        let index = self.state.len();
        self.set(index, value)?;
        Ok(index)
    }

    /// Removes an element, returning whether it was present.
    pub fn remove(&mut self, index: u32) -> bool { self.state.remove(index, &mut self.hook) }

    /// Replaces the contents with a dense array or applies a sparse patch.
    pub fn assign(&mut self, value: impl Into<Value>) -> Result<bool, PatchError> {
        let value = value.into();
        Kind::Array(self.state.element.clone()).check(&value)?;
        self.state.apply(&value, &mut self.hook)
    }

    /// Accesses an object element.
    pub fn object(&mut self, index: u32) -> Result<ObjectMut<'_, Notify<'_>>, PatchError> {
        let position = index.small_int::<usize>();
        let ArrayState { items, dirty, .. } = &mut *self.state;
        match items.get_mut(position) {
            Some(Some(Slot::Object(state))) => Ok(ObjectMut::new(
                state,
                Default::default(),
                Notify::new(dirty, position, Key::Index(index), &mut self.hook),
            )),
            Some(Some(slot)) => {
                Err(PatchError::Mismatch { expected: "object", found: slot.name() })
            }
            _ => Err(PatchError::NoElement(index.to_string())),
        }
    }
}
