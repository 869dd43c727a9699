//! The property model: live field state with dirty tracking.
//!
//! Every component instance is an [`ObjectState`].
//! Its fields are [`Slot`]s, which are either scalar values,
//! offsets into the packed row of the owning pool,
//! or nested [`ObjectState`]/[`ArrayState`]/[`MapState`] trees that keep their own dirty bits.
//!
//! Writes are equality gated: assigning the current value changes nothing.
//! An effective write sets the dirty bit of the written key
//! and calls the [`Invalidate`] hook of its container.
//! Nested containers propagate upwards through [`Notify`],
//! which sets the dirty bit of the owning field and forwards to the parent hook.

use std::mem;

use bitvec::prelude::BitVec;

use crate::comp::schema::Kind;
use crate::error::PatchError;
use crate::value::Value;

mod array;
pub use array::{ArrayMut, ArrayState, MAX_ARRAY_LEN};

mod map;
pub use map::{MapMut, MapState};

mod object;
pub use object::{ObjectMut, ObjectRef, ObjectState};


/// Identifies the key that changed within a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key<'a> {
    /// A named field of an object or component.
    Field(&'a str),
    /// An array index.
    Index(u32),
    /// A map key.
    Entry(&'a str),
}

/// Receives a notification for every effective write in a container.
pub trait Invalidate {
    /// Called once per effective write with the key that changed.
    fn invalidate(&mut self, key: Key<'_>);
}

impl Invalidate for () {
    fn invalidate(&mut self, _: Key<'_>) {}
}

impl<T: Invalidate + ?Sized> Invalidate for &mut T {
    fn invalidate(&mut self, key: Key<'_>) { (**self).invalidate(key) }
}

/// The hook handed to a nested container.
///
/// Any change in the nested container marks `bit` in the parent dirty set
/// and notifies the parent hook with the parent key.
pub struct Notify<'a> {
    dirty:  &'a mut BitVec,
    bit:    usize,
    key:    Key<'a>,
    parent: &'a mut dyn Invalidate,
}

impl<'a> Notify<'a> {
    pub(crate) fn new(
        dirty: &'a mut BitVec,
        bit: usize,
        key: Key<'a>,
        parent: &'a mut dyn Invalidate,
    ) -> Self {
        Self { dirty, bit, key, parent }
    }
}

impl Invalidate for Notify<'_> {
    fn invalidate(&mut self, _: Key<'_>) {
        self.dirty.set(self.bit, true);
        self.parent.invalidate(self.key);
    }
}

/// The live state of a single field or container element.
#[derive(Debug, Clone)]
pub enum Slot {
    /// An unpacked scalar value.
    Scalar(Value),
    /// A scalar stored in the packed row at the given byte offset.
    Packed(usize),
    /// A nested object.
    Object(ObjectState),
    /// A nested array.
    Array(ArrayState),
    /// A nested map.
    Map(MapState),
}

/// The outcome of applying a value onto a slot.
#[derive(Debug)]
pub(crate) enum Applied {
    /// The value was equal to the current state.
    Unchanged,
    /// A scalar was replaced; holds the previous value.
    ///
    /// The container is responsible for the dirty bit and the hook.
    Replaced(Value),
    /// A nested container changed and has already notified its hook.
    Patched,
}

impl Slot {
    /// The name of the slot variant, used in error messages.
    pub(crate) fn name(&self) -> &'static str {
        match self {
            Self::Scalar(_) | Self::Packed(_) => "scalar",
            Self::Object(_) => "object",
            Self::Array(_) => "array",
            Self::Map(_) => "map",
        }
    }

    /// Constructs a clean slot holding `value`.
    pub(crate) fn fresh(kind: &Kind, value: &Value) -> Result<Self, PatchError> {
        let mut slot = match kind {
            Kind::Scalar(scalar) => return Ok(Self::Scalar(scalar.normalize(value)?)),
            Kind::Object(schema) => Self::Object(ObjectState::new(schema.clone())),
            Kind::Array(element) => Self::Array(ArrayState::new(element.clone())),
            Kind::Map(element) => Self::Map(MapState::new(element.clone())),
        };
        slot.apply(kind, value, &mut [], &mut ())?;
        slot.mark_clean();
        Ok(slot)
    }

    /// Constructs a slot holding `value` with every descendant marked dirty.
    pub(crate) fn inserted(kind: &Kind, value: &Value) -> Result<Self, PatchError> {
        let mut slot = Self::fresh(kind, value)?;
        slot.mark_dirty();
        Ok(slot)
    }

    /// Rewrites a container slot to hold exactly `value`.
    ///
    /// Unlike [`apply`](Self::apply), fields and entries missing from `value` are reset,
    /// and every change is tracked in the container's own dirty state,
    /// so the resulting diff turns the previous contents into `value`.
    /// Scalar slots are replaced without tracking.
    pub(crate) fn rewrite(
        &mut self,
        kind: &Kind,
        value: &Value,
        hook: &mut dyn Invalidate,
    ) -> Result<(), PatchError> {
        match self {
            Self::Object(state) => state.clear(hook),
            Self::Array(state) => state.clear(hook),
            Self::Map(state) => state.clear(hook),
            Self::Scalar(_) | Self::Packed(_) => {}
        }
        self.apply(kind, value, &mut [], hook)?;
        Ok(())
    }

    /// The full value of the slot.
    pub(crate) fn value(&self, kind: &Kind, row: &[u8]) -> Value {
        match (self, kind) {
            (Self::Scalar(value), _) => value.clone(),
            (&Self::Packed(offset), &Kind::Scalar(scalar)) => {
                let width = scalar.width().expect("only fixed-width scalars are packed");
                scalar.read_le(&row[offset..offset + width])
            }
            (Self::Object(state), _) => Value::Object(state.value(&[])),
            (Self::Array(state), _) => state.value(),
            (Self::Map(state), _) => state.value(),
            (Self::Packed(_), _) => unreachable!("packed slot with a non-scalar kind"),
        }
    }

    /// The changes of the slot since the last [`mark_clean`](Self::mark_clean).
    ///
    /// Only meaningful if the owning dirty bit is set.
    pub(crate) fn diff(&self, kind: &Kind, row: &[u8]) -> Value {
        match self {
            Self::Object(state) => Value::Object(state.diff(&[]).unwrap_or_default()),
            Self::Array(state) => state.diff(),
            Self::Map(state) => state.diff(),
            Self::Scalar(_) | Self::Packed(_) => self.value(kind, row),
        }
    }

    /// Applies `value` onto the slot.
    ///
    /// Scalars are replaced if different.
    /// Containers are patched in place and report changes to `hook`.
    pub(crate) fn apply(
        &mut self,
        kind: &Kind,
        value: &Value,
        row: &mut [u8],
        hook: &mut dyn Invalidate,
    ) -> Result<Applied, PatchError> {
        let patched = |changed: bool| if changed { Applied::Patched } else { Applied::Unchanged };

        match (self, kind) {
            (Self::Scalar(current), &Kind::Scalar(scalar)) => {
                let value = scalar.normalize(value)?;
                Ok(if *current == value {
                    Applied::Unchanged
                } else {
                    Applied::Replaced(mem::replace(current, value))
                })
            }
            (&mut Self::Packed(offset), &Kind::Scalar(scalar)) => {
                let value = scalar.normalize(value)?;
                let width = scalar.width().expect("only fixed-width scalars are packed");
                let bytes = &mut row[offset..offset + width];
                let current = scalar.read_le(bytes);
                if current == value {
                    return Ok(Applied::Unchanged);
                }
                scalar.write_le(&value, bytes);
                Ok(Applied::Replaced(current))
            }
            (Self::Object(state), Kind::Object(_)) => {
                Ok(patched(state.apply(value, &mut [], hook)?))
            }
            (Self::Array(state), Kind::Array(_)) => Ok(patched(state.apply(value, hook)?)),
            (Self::Map(state), Kind::Map(_)) => Ok(patched(state.apply(value, hook)?)),
            _ => unreachable!("slot does not match its declared kind"),
        }
    }

    /// Recursively marks every descendant dirty.
    pub(crate) fn mark_dirty(&mut self) {
        match self {
            Self::Object(state) => state.mark_dirty(),
            Self::Array(state) => state.mark_dirty(),
            Self::Map(state) => state.mark_dirty(),
            Self::Scalar(_) | Self::Packed(_) => {}
        }
    }

    /// Recursively clears every descendant dirty state.
    pub(crate) fn mark_clean(&mut self) {
        match self {
            Self::Object(state) => state.mark_clean(),
            Self::Array(state) => state.mark_clean(),
            Self::Map(state) => state.mark_clean(),
            Self::Scalar(_) | Self::Packed(_) => {}
        }
    }
}

/// Applies `value` onto `slot` whose dirty bit is `bit` in `dirty`,
/// returning the previous value if a scalar was replaced.
#[allow(clippy::too_many_arguments)]
pub(crate) fn apply_tracked(
    slot: &mut Slot,
    kind: &Kind,
    value: &Value,
    row: &mut [u8],
    dirty: &mut BitVec,
    bit: usize,
    key: Key<'_>,
    hook: &mut dyn Invalidate,
) -> Result<(bool, Option<Value>), PatchError> {
    let applied = {
        let mut notify = Notify::new(dirty, bit, key, hook);
        slot.apply(kind, value, row, &mut notify)?
    };

    Ok(match applied {
        Applied::Unchanged => (false, None),
        Applied::Patched => (true, None),
        Applied::Replaced(previous) => {
            dirty.set(bit, true);
            hook.invalidate(key);
            (true, Some(previous))
        }
    })
}
