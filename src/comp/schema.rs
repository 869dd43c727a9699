//! Field descriptor tables.
//!
//! A [`Schema`] is fixed when its component type is registered.
//! Every field carries its kind, its default value and its dirty [`BitPos`];
//! packed byte offsets are added by the pool layout on top of this table.

use std::sync::Arc;

use indexmap::IndexMap;
use xias::Xias;

use crate::error::{PatchError, RegistrationError};
use crate::prop::MAX_ARRAY_LEN;
use crate::value::{Fields, Value};

#[cfg(test)]
mod tests;

/// Field names that collide with runtime-internal slots.
pub const RESERVED_NAMES: &[&str] = &["entity", "owner", "dirty", "previous"];

/// Field names starting with this prefix are reserved for the runtime.
pub const RESERVED_PREFIX: &str = "__";

/// Whether `name` cannot be used as a field name.
pub fn is_reserved(name: &str) -> bool {
    RESERVED_NAMES.contains(&name) || name.starts_with(RESERVED_PREFIX)
}

/// The primitive kinds a scalar field can be declared with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    /// A boolean, stored as one byte.
    Bool,
    /// An unsigned 8-bit integer.
    U8,
    /// A signed 8-bit integer.
    I8,
    /// An unsigned 16-bit integer.
    U16,
    /// A signed 16-bit integer.
    I16,
    /// An unsigned 32-bit integer.
    U32,
    /// A signed 32-bit integer.
    I32,
    /// A 32-bit float.
    F32,
    /// A 64-bit float.
    F64,
    /// A UTF-8 string. Strings are never packed.
    Str,
}

impl ScalarKind {
    /// The packed byte width, or `None` if the kind cannot be packed.
    pub const fn width(self) -> Option<usize> {
        match self {
            Self::Bool | Self::U8 | Self::I8 => Some(1),
            Self::U16 | Self::I16 => Some(2),
            Self::U32 | Self::I32 | Self::F32 => Some(4),
            Self::F64 => Some(8),
            Self::Str => None,
        }
    }

    /// The name of the kind, used in error messages.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::U8 => "u8",
            Self::I8 => "i8",
            Self::U16 => "u16",
            Self::I16 => "i16",
            Self::U32 => "u32",
            Self::I32 => "i32",
            Self::F32 => "f32",
            Self::F64 => "f64",
            Self::Str => "string",
        }
    }

    /// The zero value of the kind.
    pub fn zero(self) -> Value {
        match self {
            Self::Bool => Value::Bool(false),
            Self::F32 | Self::F64 => Value::Float(0.0),
            Self::Str => Value::Str(String::new()),
            _ => Value::Int(0),
        }
    }

    fn int_range(self) -> Option<(i64, i64)> {
        match self {
            Self::U8 => Some((u8::MIN.into(), u8::MAX.into())),
            Self::I8 => Some((i8::MIN.into(), i8::MAX.into())),
            Self::U16 => Some((u16::MIN.into(), u16::MAX.into())),
            Self::I16 => Some((i16::MIN.into(), i16::MAX.into())),
            Self::U32 => Some((u32::MIN.into(), u32::MAX.into())),
            Self::I32 => Some((i32::MIN.into(), i32::MAX.into())),
            _ => None,
        }
    }

    /// Converts `value` into the canonical representation of this kind.
    ///
    /// Integers are range checked, integers written to float kinds are widened,
    /// and `f32` values are rounded through `f32`
    /// so that packed, unpacked and decoded values compare equal.
    pub fn normalize(self, value: &Value) -> Result<Value, PatchError> {
        let mismatch =
            || PatchError::Mismatch { expected: self.name(), found: value.variant_name() };

        match self {
            Self::Bool => value.as_bool().map(Value::Bool).ok_or_else(mismatch),
            Self::Str => value.as_str().map(|s| Value::Str(s.to_string())).ok_or_else(mismatch),
            Self::F64 => value.as_float().map(Value::Float).ok_or_else(mismatch),
            Self::F32 => {
                let float = value.as_float().ok_or_else(mismatch)?;
                Ok(Value::Float(f64::from(float as f32)))
            }
            _ => {
                let int = value.as_int().ok_or_else(mismatch)?;
                let (min, max) = self.int_range().expect("non-integer kinds are matched above");
                if int < min || int > max {
                    return Err(PatchError::OutOfRange { value: int, kind: self.name() });
                }
                Ok(Value::Int(int))
            }
        }
    }

    /// Reads a packed value from little-endian bytes.
    ///
    /// `bytes` must be exactly [`width`](Self::width) bytes long.
    pub(crate) fn read_le(self, bytes: &[u8]) -> Value {
        fn array<const N: usize>(bytes: &[u8]) -> [u8; N] {
            bytes.try_into().expect("packed field slice has the declared width")
        }

        match self {
            Self::Bool => Value::Bool(bytes[0] != 0),
            Self::U8 => Value::Int(bytes[0].into()),
            Self::I8 => Value::Int(i8::from_le_bytes(array(bytes)).into()),
            Self::U16 => Value::Int(u16::from_le_bytes(array(bytes)).into()),
            Self::I16 => Value::Int(i16::from_le_bytes(array(bytes)).into()),
            Self::U32 => Value::Int(u32::from_le_bytes(array(bytes)).into()),
            Self::I32 => Value::Int(i32::from_le_bytes(array(bytes)).into()),
            Self::F32 => Value::Float(f32::from_le_bytes(array(bytes)).into()),
            Self::F64 => Value::Float(f64::from_le_bytes(array(bytes))),
            Self::Str => unreachable!("strings are never packed"),
        }
    }

    /// Writes a normalized value as little-endian bytes.
    ///
    /// `value` must have passed [`normalize`](Self::normalize) for this kind.
    pub(crate) fn write_le(self, value: &Value, bytes: &mut [u8]) {
        let int = || value.as_int().expect("value was normalized");
        let float = || value.as_float().expect("value was normalized");

        match self {
            Self::Bool => bytes[0] = u8::from(value.as_bool().expect("value was normalized")),
            Self::U8 => bytes.copy_from_slice(&(int() as u8).to_le_bytes()),
            Self::I8 => bytes.copy_from_slice(&(int() as i8).to_le_bytes()),
            Self::U16 => bytes.copy_from_slice(&(int() as u16).to_le_bytes()),
            Self::I16 => bytes.copy_from_slice(&(int() as i16).to_le_bytes()),
            Self::U32 => bytes.copy_from_slice(&(int() as u32).to_le_bytes()),
            Self::I32 => bytes.copy_from_slice(&(int() as i32).to_le_bytes()),
            Self::F32 => bytes.copy_from_slice(&(float() as f32).to_le_bytes()),
            Self::F64 => bytes.copy_from_slice(&float().to_le_bytes()),
            Self::Str => unreachable!("strings are never packed"),
        }
    }
}

/// The declared type of a field or of a container element.
#[derive(Debug, Clone)]
pub enum Kind {
    /// A primitive value.
    Scalar(ScalarKind),
    /// A nested object with its own schema.
    Object(Arc<Schema>),
    /// A sparse-capable array of elements of the given kind.
    Array(Arc<Kind>),
    /// A string-keyed map of values of the given kind.
    Map(Arc<Kind>),
}

impl Kind {
    /// Shorthand for [`Kind::Array`].
    pub fn array(element: Kind) -> Self { Self::Array(Arc::new(element)) }

    /// Shorthand for [`Kind::Map`].
    pub fn map(element: Kind) -> Self { Self::Map(Arc::new(element)) }

    /// Shorthand for [`Kind::Object`].
    pub fn object(schema: Schema) -> Self { Self::Object(Arc::new(schema)) }

    /// The name of the kind, used in error messages.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Scalar(scalar) => scalar.name(),
            Self::Object(_) => "object",
            Self::Array(_) => "array",
            Self::Map(_) => "map",
        }
    }

    /// The value of a freshly constructed element of this kind.
    pub fn zero(&self) -> Value {
        match self {
            Self::Scalar(scalar) => scalar.zero(),
            Self::Object(schema) => Value::Object(schema.defaults()),
            Self::Array(_) => Value::Array(Vec::new()),
            Self::Map(_) => Value::Map(IndexMap::new()),
        }
    }

    /// Checks that `value` can be applied onto a field of this kind.
    ///
    /// Composite kinds accept both full values and patches.
    pub fn check(&self, value: &Value) -> Result<(), PatchError> {
        let mismatch =
            || PatchError::Mismatch { expected: self.name(), found: value.variant_name() };

        match (self, value) {
            (Self::Scalar(scalar), _) => scalar.normalize(value).map(|_| ()),
            (Self::Object(schema), Value::Object(fields)) => schema.check(fields),
            (Self::Array(element), Value::Array(items)) => {
                if items.len() > MAX_ARRAY_LEN.small_int::<usize>() {
                    return Err(PatchError::IndexTooLarge(items.len() as u64 - 1));
                }
                items.iter().try_for_each(|item| element.check(item))
            }
            (Self::Array(element), Value::Sparse(sparse)) => {
                let mut indices = sparse.set.keys().chain(&sparse.deleted);
                if let Some(&index) = indices.find(|&&index| index >= MAX_ARRAY_LEN) {
                    return Err(PatchError::IndexTooLarge(index.into()));
                }
                sparse.set.values().try_for_each(|item| element.check(item))
            }
            (Self::Map(element), Value::Map(entries)) => {
                entries.values().flatten().try_for_each(|item| element.check(item))
            }
            _ => Err(mismatch()),
        }
    }
}

/// The dirty bit of a field: `bits[word] & mask` within word-sized storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitPos {
    /// The index of the machine word holding the bit.
    pub word: usize,
    /// The single-bit mask within that word.
    pub mask: usize,
}

impl BitPos {
    /// The position of the bit for the field at `index`.
    pub const fn of(index: usize) -> Self {
        Self { word: index / usize::BITS as usize, mask: 1 << (index % usize::BITS as usize) }
    }
}

/// A field descriptor.
#[derive(Debug, Clone)]
pub struct Field {
    name:    String,
    index:   usize,
    kind:    Kind,
    default: Value,
}

impl Field {
    /// The field name.
    pub fn name(&self) -> &str { &self.name }

    /// The position of the field in its schema.
    pub fn index(&self) -> usize { self.index }

    /// The declared kind.
    pub fn kind(&self) -> &Kind { &self.kind }

    /// The value the field holds in a fresh instance.
    pub fn default_value(&self) -> &Value { &self.default }

    /// The position of the dirty bit of this field.
    pub fn bit(&self) -> BitPos { BitPos::of(self.index) }

    /// The scalar kind if the field is a scalar.
    pub fn scalar(&self) -> Option<ScalarKind> {
        match self.kind {
            Kind::Scalar(scalar) => Some(scalar),
            _ => None,
        }
    }
}

/// An ordered table of field descriptors.
#[derive(Debug, Clone)]
pub struct Schema {
    name:   String,
    fields: IndexMap<String, Field>,
}

impl Schema {
    /// Starts declaring a schema for the component or object called `name`.
    pub fn builder(name: impl Into<String>) -> SchemaBuilder {
        SchemaBuilder { name: name.into(), fields: Vec::new() }
    }

    /// The name of the declaring component or object.
    pub fn name(&self) -> &str { &self.name }

    /// Looks up a field by name.
    pub fn field(&self, name: &str) -> Option<&Field> { self.fields.get(name) }

    /// Looks up a field by index.
    pub fn field_at(&self, index: usize) -> Option<&Field> {
        self.fields.get_index(index).map(|(_, field)| field)
    }

    /// Iterates over the fields in declaration order.
    pub fn fields(&self) -> impl Iterator<Item = &Field> + '_ { self.fields.values() }

    /// The number of fields.
    pub fn len(&self) -> usize { self.fields.len() }

    /// Whether the schema declares no fields.
    pub fn is_empty(&self) -> bool { self.fields.is_empty() }

    /// Validates a patch of named fields without applying it.
    pub fn check(&self, fields: &Fields) -> Result<(), PatchError> {
        for (name, value) in fields {
            let field = self.field(name).ok_or_else(|| PatchError::UnknownField(name.clone()))?;
            field.kind.check(value)?;
        }
        Ok(())
    }

    /// The default values of every field.
    pub fn defaults(&self) -> Fields {
        self.fields.values().map(|field| (field.name.clone(), field.default.clone())).collect()
    }
}

/// Declares the fields of a [`Schema`].
pub struct SchemaBuilder {
    name:   String,
    fields: Vec<(String, Kind, Option<Value>)>,
}

impl SchemaBuilder {
    /// Declares a field with the zero value of its kind as default.
    pub fn field(mut self, name: impl Into<String>, kind: Kind) -> Self {
        self.fields.push((name.into(), kind, None));
        self
    }

    /// Declares a scalar field.
    pub fn scalar(self, name: impl Into<String>, kind: ScalarKind) -> Self {
        self.field(name, Kind::Scalar(kind))
    }

    /// Declares a field with an explicit default value.
    pub fn field_with_default(
        mut self,
        name: impl Into<String>,
        kind: Kind,
        default: impl Into<Value>,
    ) -> Self {
        self.fields.push((name.into(), kind, Some(default.into())));
        self
    }

    /// Validates the declarations.
    ///
    /// Fails on reserved names, duplicate names and defaults that do not fit their kind.
    pub fn build(self) -> Result<Schema, RegistrationError> {
        let mut fields = IndexMap::with_capacity(self.fields.len());

        for (index, (name, kind, default)) in self.fields.into_iter().enumerate() {
            if is_reserved(&name) {
                return Err(RegistrationError::ReservedName { owner: self.name, field: name });
            }
            if fields.contains_key(&name) {
                return Err(RegistrationError::DuplicateField { owner: self.name, field: name });
            }

            let default = match default {
                None => kind.zero(),
                Some(value) => match canonical_default(&kind, &value) {
                    Ok(value) => value,
                    Err(source) => {
                        return Err(RegistrationError::InvalidDefault {
                            owner: self.name,
                            field: name,
                            source,
                        })
                    }
                },
            };

            fields.insert(name.clone(), Field { name, index, kind, default });
        }

        Ok(Schema { name: self.name, fields })
    }
}

/// Converts an explicit default into the full value a fresh instance holds.
fn canonical_default(kind: &Kind, value: &Value) -> Result<Value, PatchError> {
    match kind {
        Kind::Scalar(scalar) => scalar.normalize(value),
        Kind::Object(schema) => {
            kind.check(value)?;
            let mut full = schema.defaults();
            if let Value::Object(fields) = value {
                for (name, value) in fields {
                    let field = schema.field(name).expect("checked above");
                    full.insert(name.clone(), canonical_default(field.kind(), value)?);
                }
            }
            Ok(Value::Object(full))
        }
        Kind::Array(element) => match value {
            Value::Array(items) => {
                let items = items.iter().map(|item| canonical_default(element, item));
                Ok(Value::Array(items.collect::<Result<_, _>>()?))
            }
            _ => Err(PatchError::Mismatch { expected: "array", found: value.variant_name() }),
        },
        Kind::Map(element) => match value {
            Value::Map(entries) => Ok(Value::Map(
                entries
                    .iter()
                    .filter_map(|(key, value)| value.as_ref().map(|value| (key, value)))
                    .map(|(key, value)| Ok((key.clone(), Some(canonical_default(element, value)?))))
                    .collect::<Result<_, PatchError>>()?,
            )),
            _ => Err(PatchError::Mismatch { expected: "map", found: value.variant_name() }),
        },
    }
}
