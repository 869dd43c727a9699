use super::{Codec, Reader, Writer};
use crate::comp::ScalarKind;
use crate::error::{CodecError, PatchError};
use crate::value::Value;

/// Encodes a scalar of a fixed kind.
///
/// Fixed-width kinds use their packed little-endian layout, `bool` being one byte.
/// Strings are length-prefixed.
#[derive(Debug, Clone, Copy)]
pub struct ScalarCodec(pub ScalarKind);

impl Codec for ScalarCodec {
    type Item = Value;

    fn encode(&self, item: &Value, writer: &mut Writer) -> Result<(), CodecError> {
        let kind = self.0;
        let value = kind.normalize(item).map_err(|err| match err {
            PatchError::Mismatch { expected, found } => CodecError::Mismatch { expected, found },
            _ => CodecError::Mismatch { expected: kind.name(), found: "out-of-range integer" },
        })?;

        match kind.width() {
            Some(width) => {
                let mut bytes = [0; 8];
                kind.write_le(&value, &mut bytes[..width]);
                writer.bytes(&bytes[..width]);
            }
            None => writer.str(value.as_str().expect("normalized strings are strings")),
        }
        Ok(())
    }

    fn decode(&self, reader: &mut Reader<'_>) -> Result<Value, CodecError> {
        let kind = self.0;
        match kind {
            ScalarKind::Bool => Ok(Value::Bool(reader.bool()?)),
            ScalarKind::Str => Ok(Value::Str(reader.str()?)),
            _ => {
                let width = kind.width().expect("non-string kinds have a width");
                Ok(kind.read_le(reader.bytes(width)?))
            }
        }
    }
}
