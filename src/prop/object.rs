use std::sync::Arc;

use bitvec::prelude::BitVec;

use super::{apply_tracked, ArrayMut, Invalidate, Key, MapMut, Notify, Slot};
use crate::comp::schema::{Field, Schema};
use crate::error::PatchError;
use crate::value::{Fields, Value};

/// The live state of an object or a component instance.
#[derive(Debug, Clone)]
pub struct ObjectState {
    schema:   Arc<Schema>,
    slots:    Vec<Slot>,
    dirty:    BitVec,
    previous: Vec<Option<Value>>,
}

impl ObjectState {
    /// Constructs an unpacked object with every field at its default.
    pub fn new(schema: Arc<Schema>) -> Self { Self::with_offsets(schema, &[]) }

    /// Constructs an object whose fields at `Some` offsets live in a packed row.
    ///
    /// The row itself is initialized by the owner of the bytes.
    pub(crate) fn with_offsets(schema: Arc<Schema>, offsets: &[Option<usize>]) -> Self {
        let slots = schema
            .fields()
            .map(|field| match offsets.get(field.index()).copied().flatten() {
                Some(offset) => Slot::Packed(offset),
                None => Slot::fresh(field.kind(), field.default_value())
                    .expect("defaults are validated at registration"),
            })
            .collect();
        let len = schema.len();

        Self { schema, slots, dirty: BitVec::repeat(false, len), previous: vec![None; len] }
    }

    /// The field table of this object.
    pub fn schema(&self) -> &Arc<Schema> { &self.schema }

    /// Whether any field changed since the last clean.
    pub fn is_dirty(&self) -> bool { self.dirty.any() }

    /// Whether the given field changed since the last clean.
    pub fn is_field_dirty(&self, field: &Field) -> bool {
        let bit = field.bit();
        self.dirty.as_raw_slice().get(bit.word).map_or(false, |&word| word & bit.mask != 0)
    }

    /// The raw dirty words, one bit per field in declaration order.
    pub fn dirty_words(&self) -> &[usize] { self.dirty.as_raw_slice() }

    pub(crate) fn index_of(&self, name: &str) -> Result<usize, PatchError> {
        self.schema
            .field(name)
            .map(Field::index)
            .ok_or_else(|| PatchError::UnknownField(name.to_string()))
    }

    pub(crate) fn get(&self, index: usize, row: &[u8]) -> Value {
        let field = self.schema.field_at(index).expect("index is within the schema");
        self.slots[index].value(field.kind(), row)
    }

    pub(crate) fn value(&self, row: &[u8]) -> Fields {
        self.schema
            .fields()
            .map(|field| (field.name().to_string(), self.get(field.index(), row)))
            .collect()
    }

    pub(crate) fn previous(&self, index: usize) -> Option<&Value> { self.previous[index].as_ref() }

    /// The dirty fields, or `None` if the object is clean.
    pub(crate) fn diff(&self, row: &[u8]) -> Option<Fields> {
        if !self.is_dirty() {
            return None;
        }

        let fields = self
            .dirty
            .iter_ones()
            .map(|index| {
                let field = self.schema.field_at(index).expect("dirty bits are within the schema");
                (field.name().to_string(), self.slots[index].diff(field.kind(), row))
            })
            .collect();
        Some(fields)
    }

    pub(crate) fn set(
        &mut self,
        index: usize,
        value: &Value,
        row: &mut [u8],
        hook: &mut dyn Invalidate,
    ) -> Result<bool, PatchError> {
        let Self { schema, slots, dirty, previous } = self;
        let field = schema.field_at(index).expect("index is within the schema");

        let (changed, replaced) = apply_tracked(
            &mut slots[index],
            field.kind(),
            value,
            row,
            dirty,
            index,
            Key::Field(field.name()),
            hook,
        )?;
        if let Some(replaced) = replaced {
            previous[index] = Some(replaced);
        }
        Ok(changed)
    }

    /// Validates every field of `fields` without changing anything.
    pub(crate) fn check(&self, fields: &Fields) -> Result<(), PatchError> {
        self.schema.check(fields)
    }

    pub(crate) fn patch(
        &mut self,
        fields: &Fields,
        row: &mut [u8],
        hook: &mut dyn Invalidate,
    ) -> Result<bool, PatchError> {
        let mut changed = false;
        for (name, value) in fields {
            let index = self.index_of(name)?;
            changed |= self.set(index, value, row, hook)?;
        }
        Ok(changed)
    }

    pub(crate) fn apply(
        &mut self,
        value: &Value,
        row: &mut [u8],
        hook: &mut dyn Invalidate,
    ) -> Result<bool, PatchError> {
        match value {
            Value::Object(fields) => self.patch(fields, row, hook),
            _ => Err(PatchError::Mismatch { expected: "object", found: value.variant_name() }),
        }
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.dirty.fill(true);
        self.slots.iter_mut().for_each(Slot::mark_dirty);
    }

    pub(crate) fn mark_clean(&mut self) {
        self.slots.iter_mut().for_each(Slot::mark_clean);
        self.dirty.fill(false);
    }

    /// Writes the default of every field, tracking each change.
    ///
    /// Only used on unpacked objects.
    pub(crate) fn clear(&mut self, hook: &mut dyn Invalidate) {
        let Self { schema, slots, dirty, previous } = self;
        for field in schema.fields() {
            let index = field.index();
            let key = Key::Field(field.name());
            let slot = &mut slots[index];

            if matches!(slot, Slot::Scalar(_) | Slot::Packed(_)) {
                let (_, replaced) = apply_tracked(
                    slot,
                    field.kind(),
                    field.default_value(),
                    &mut [],
                    dirty,
                    index,
                    key,
                    hook,
                )
                .expect("defaults are validated at registration");
                if let Some(replaced) = replaced {
                    previous[index] = Some(replaced);
                }
            } else {
                let mut notify = Notify::new(dirty, index, key, hook);
                slot.rewrite(field.kind(), field.default_value(), &mut notify)
                    .expect("defaults are validated at registration");
            }
        }
    }

    /// Restores every field to its default and forgets all history.
    pub(crate) fn reset(&mut self, row: &mut [u8]) {
        for field in self.schema.fields() {
            let slot = &mut self.slots[field.index()];
            if let Slot::Packed(offset) = *slot {
                let scalar = field.scalar().expect("only scalars are packed");
                let width = scalar.width().expect("only fixed-width scalars are packed");
                scalar.write_le(field.default_value(), &mut row[offset..offset + width]);
            } else {
                *slot = Slot::fresh(field.kind(), field.default_value())
                    .expect("defaults are validated at registration");
            }
        }
        self.dirty.fill(false);
        self.previous.fill(None);
    }
}

/// Read access to an object.
#[derive(Clone, Copy)]
pub struct ObjectRef<'a> {
    state: &'a ObjectState,
    row:   &'a [u8],
}

impl<'a> ObjectRef<'a> {
    pub(crate) fn new(state: &'a ObjectState, row: &'a [u8]) -> Self { Self { state, row } }

    /// The field table of the object.
    pub fn schema(&self) -> &'a Schema { &self.state.schema }

    /// The current value of a field.
    pub fn get(&self, name: &str) -> Option<Value> {
        let index = self.state.index_of(name).ok()?;
        Some(self.state.get(index, self.row))
    }

    /// The value of a scalar field before its last effective write.
    pub fn previous(&self, name: &str) -> Option<&'a Value> {
        let index = self.state.index_of(name).ok()?;
        self.state.previous(index)
    }

    /// Whether a field changed since the last clean.
    pub fn is_dirty(&self, name: &str) -> bool {
        self.state.schema.field(name).map_or(false, |field| self.state.is_field_dirty(field))
    }

    /// The full value of every field.
    pub fn value(&self) -> Fields { self.state.value(self.row) }

    /// The changed fields, or `None` if nothing changed.
    pub fn diff(&self) -> Option<Fields> { self.state.diff(self.row) }

    /// The underlying state.
    pub fn state(&self) -> &'a ObjectState { self.state }
}

/// Write access to an object.
///
/// Every effective write is reported to the hook `H`.
pub struct ObjectMut<'a, H: Invalidate> {
    state: &'a mut ObjectState,
    row:   &'a mut [u8],
    hook:  H,
}

impl<'a, H: Invalidate> ObjectMut<'a, H> {
    pub(crate) fn new(state: &'a mut ObjectState, row: &'a mut [u8], hook: H) -> Self {
        Self { state, row, hook }
    }

    /// Downgrades to read access.
    pub fn read(&self) -> ObjectRef<'_> { ObjectRef::new(&*self.state, &*self.row) }

    /// The current value of a field.
    pub fn get(&self, name: &str) -> Option<Value> { self.read().get(name) }

    /// Writes a field, returning whether the value changed.
    ///
    /// Object values patch the listed sub-fields,
    /// array and map values are applied as described in [`ArrayState`](super::ArrayState)
    /// and [`MapState`](super::MapState).
    /// The value is validated before anything is changed.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> Result<bool, PatchError> {
        let value = value.into();
        let index = self.state.index_of(name)?;
        let field = self.state.schema.field_at(index).expect("index_of returns a valid index");
        field.kind().check(&value)?;
        self.state.set(index, &value, self.row, &mut self.hook)
    }

    /// Writes every listed field, returning whether anything changed.
    pub fn patch(&mut self, fields: &Fields) -> Result<bool, PatchError> {
        self.state.check(fields)?;
        self.state.patch(fields, self.row, &mut self.hook)
    }

    fn nested(&mut self, name: &str) -> Result<(&mut Slot, Notify<'_>), PatchError> {
        let index = self.state.index_of(name)?;
        let ObjectState { schema, slots, dirty, .. } = &mut *self.state;
        let field = schema.field_at(index).expect("index_of returns a valid index");
        let notify = Notify::new(dirty, index, Key::Field(field.name()), &mut self.hook);
        Ok((&mut slots[index], notify))
    }

    /// Accesses a nested object field.
    pub fn object(&mut self, name: &str) -> Result<ObjectMut<'_, Notify<'_>>, PatchError> {
        match self.nested(name)? {
            (Slot::Object(state), notify) => Ok(ObjectMut::new(state, Default::default(), notify)),
            (slot, _) => Err(PatchError::Mismatch { expected: "object", found: slot.name() }),
        }
    }

    /// Accesses an array field.
    pub fn array(&mut self, name: &str) -> Result<ArrayMut<'_, Notify<'_>>, PatchError> {
        match self.nested(name)? {
            (Slot::Array(state), notify) => Ok(ArrayMut::new(state, notify)),
            (slot, _) => Err(PatchError::Mismatch { expected: "array", found: slot.name() }),
        }
    }

    /// Accesses a map field.
    pub fn map(&mut self, name: &str) -> Result<MapMut<'_, Notify<'_>>, PatchError> {
        match self.nested(name)? {
            (Slot::Map(state), notify) => Ok(MapMut::new(state, notify)),
            (slot, _) => Err(PatchError::Mismatch { expected: "map", found: slot.name() }),
        }
    }
}
