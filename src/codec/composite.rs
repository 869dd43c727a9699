use std::collections::BTreeMap;

use indexmap::IndexMap;

use super::{Codec, Reader, ScalarCodec, Writer};
use crate::comp::{Kind, Schema};
use crate::error::CodecError;
use crate::prop::MAX_ARRAY_LEN;
use crate::value::{Fields, Sparse, Value};

fn mismatch(expected: &'static str, found: &Value) -> CodecError {
    CodecError::Mismatch { expected, found: found.variant_name() }
}

fn count(len: usize) -> Result<u32, CodecError> {
    u32::try_from(len).map_err(|_| CodecError::OutOfRange(len as u64))
}

fn index(reader: &mut Reader<'_>) -> Result<u32, CodecError> {
    let index = reader.varint()?;
    u32::try_from(index)
        .ok()
        .filter(|&index| index < MAX_ARRAY_LEN)
        .ok_or(CodecError::OutOfRange(index))
}

/// Encodes a value of any declared kind.
#[derive(Debug, Clone, Copy)]
pub struct KindCodec<'a>(pub &'a Kind);

impl Codec for KindCodec<'_> {
    type Item = Value;

    fn encode(&self, item: &Value, writer: &mut Writer) -> Result<(), CodecError> {
        match self.0 {
            &Kind::Scalar(scalar) => ScalarCodec(scalar).encode(item, writer),
            Kind::Object(schema) => match item {
                Value::Object(fields) => ObjectCodec(schema).encode(fields, writer),
                _ => Err(mismatch("object", item)),
            },
            Kind::Array(element) => ArrayCodec(element).encode(item, writer),
            Kind::Map(element) => MapCodec(element).encode(item, writer),
        }
    }

    fn decode(&self, reader: &mut Reader<'_>) -> Result<Value, CodecError> {
        match self.0 {
            &Kind::Scalar(scalar) => ScalarCodec(scalar).decode(reader),
            Kind::Object(schema) => Ok(Value::Object(ObjectCodec(schema).decode(reader)?)),
            Kind::Array(element) => ArrayCodec(element).decode(reader),
            Kind::Map(element) => MapCodec(element).decode(reader),
        }
    }
}

/// Encodes some or all fields of an object.
///
/// A presence bitmap in field declaration order is followed by the present fields.
#[derive(Debug, Clone, Copy)]
pub struct ObjectCodec<'a>(pub &'a Schema);

impl Codec for ObjectCodec<'_> {
    type Item = Fields;

    fn encode(&self, item: &Fields, writer: &mut Writer) -> Result<(), CodecError> {
        if let Some(name) = item.keys().find(|name| self.0.field(name).is_none()) {
            return Err(CodecError::UnknownField(name.clone()));
        }

        writer.bitmap(self.0.fields().map(|field| item.contains_key(field.name())));
        for field in self.0.fields() {
            if let Some(value) = item.get(field.name()) {
                KindCodec(field.kind()).encode(value, writer)?;
            }
        }
        Ok(())
    }

    fn decode(&self, reader: &mut Reader<'_>) -> Result<Fields, CodecError> {
        let present = reader.bitmap(self.0.len())?;

        let mut fields = Fields::new();
        for field in self.0.fields() {
            if present[field.index()] {
                let value = KindCodec(field.kind()).decode(reader)?;
                fields.insert(field.name().to_string(), value);
            }
        }
        Ok(fields)
    }
}

/// Encodes a dense array or a sparse array diff of one element kind.
///
/// A leading bool selects the form.
/// The dense form is a varint length followed by the elements.
/// The sparse form is a `u32` count, that many varint indices, that many elements,
/// then a varint count of deleted indices and the deleted indices.
#[derive(Debug, Clone, Copy)]
pub struct ArrayCodec<'a>(pub &'a Kind);

impl Codec for ArrayCodec<'_> {
    type Item = Value;

    fn encode(&self, item: &Value, writer: &mut Writer) -> Result<(), CodecError> {
        let element = KindCodec(self.0);
        match item {
            Value::Array(items) => {
                writer.bool(false);
                writer.varint(items.len() as u64);
                items.iter().try_for_each(|item| element.encode(item, writer))
            }
            Value::Sparse(sparse) => {
                writer.bool(true);
                writer.u32(count(sparse.set.len())?);
                for &index in sparse.set.keys() {
                    writer.varint(index.into());
                }
                for item in sparse.set.values() {
                    element.encode(item, writer)?;
                }
                writer.varint(sparse.deleted.len() as u64);
                for &index in &sparse.deleted {
                    writer.varint(index.into());
                }
                Ok(())
            }
            _ => Err(mismatch("array", item)),
        }
    }

    fn decode(&self, reader: &mut Reader<'_>) -> Result<Value, CodecError> {
        let element = KindCodec(self.0);

        if !reader.bool()? {
            let len = reader.length(MAX_ARRAY_LEN.into())?;
            let mut items = Vec::with_capacity(len.min(reader.remaining()));
            for _ in 0..len {
                items.push(element.decode(reader)?);
            }
            return Ok(Value::Array(items));
        }

        let len = reader.u32()?;
        let indices = (0..len).map(|_| index(reader)).collect::<Result<Vec<_>, _>>()?;
        let mut set = BTreeMap::new();
        for index in indices {
            set.insert(index, element.decode(reader)?);
        }

        let deleted_len = reader.length(MAX_ARRAY_LEN.into())?;
        let deleted = (0..deleted_len).map(|_| index(reader)).collect::<Result<_, _>>()?;
        Ok(Value::Sparse(Sparse { set, deleted }))
    }
}

/// Encodes a map whose entries can be deleted.
///
/// A varint count is followed by each key and an optional value:
/// a bool telling whether the entry is set, then the value if it is.
#[derive(Debug, Clone, Copy)]
pub struct MapCodec<'a>(pub &'a Kind);

impl Codec for MapCodec<'_> {
    type Item = Value;

    fn encode(&self, item: &Value, writer: &mut Writer) -> Result<(), CodecError> {
        let entries = match item {
            Value::Map(entries) => entries,
            _ => return Err(mismatch("map", item)),
        };

        writer.varint(entries.len() as u64);
        for (key, value) in entries {
            writer.str(key);
            writer.bool(value.is_some());
            if let Some(value) = value {
                KindCodec(self.0).encode(value, writer)?;
            }
        }
        Ok(())
    }

    fn decode(&self, reader: &mut Reader<'_>) -> Result<Value, CodecError> {
        let len = reader.length(u32::MAX.into())?;
        let mut entries = IndexMap::with_capacity(len.min(reader.remaining()));
        for _ in 0..len {
            let key = reader.str()?;
            let value = if reader.bool()? { Some(KindCodec(self.0).decode(reader)?) } else { None };
            entries.insert(key, value);
        }
        Ok(Value::Map(entries))
    }
}
