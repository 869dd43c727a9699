//! The binary wire format of diffs.
//!
//! Every codec is driven by the registered schemas:
//! a field is encoded according to its declared [`Kind`](crate::comp::Kind),
//! and composite values carry only what is present,
//! so the same codec serializes full values, partial diffs and patches.
//!
//! Fixed-width numbers are little-endian.
//! Lengths, counts, ids and array indices are unsigned LEB128 varints,
//! except the element count of a sparse array, which is a fixed `u32`.
//! Strings are a varint byte length followed by UTF-8 bytes.
//! Presence bitmaps take `ceil(n / 8)` bytes, least significant bit first.

use bitvec::prelude::{BitSlice, BitVec, Lsb0};

use crate::error::CodecError;

mod scalar;
pub use scalar::ScalarCodec;

mod composite;
pub use composite::{ArrayCodec, KindCodec, MapCodec, ObjectCodec};

mod wire;
pub use wire::{ComponentCodec, EntityCodec, WorldCodec};

#[cfg(test)]
mod tests;

/// The maximum number of bytes of a varint.
pub const MAX_VARINT_LEN: usize = 10;

/// Converts values of one wire type from and to bytes.
pub trait Codec {
    /// The decoded representation.
    type Item;

    /// Appends the encoding of `item`.
    fn encode(&self, item: &Self::Item, writer: &mut Writer) -> Result<(), CodecError>;

    /// Reads one item.
    fn decode(&self, reader: &mut Reader<'_>) -> Result<Self::Item, CodecError>;
}

/// Encodes a single item into a new buffer.
pub fn encode<C: Codec>(codec: &C, item: &C::Item) -> Result<Vec<u8>, CodecError> {
    let mut writer = Writer::default();
    codec.encode(item, &mut writer)?;
    Ok(writer.finish())
}

/// Decodes a single item, rejecting trailing bytes.
pub fn decode<C: Codec>(codec: &C, bytes: &[u8]) -> Result<C::Item, CodecError> {
    let mut reader = Reader::new(bytes);
    let item = codec.decode(&mut reader)?;
    match reader.remaining() {
        0 => Ok(item),
        trailing => Err(CodecError::TrailingBytes(trailing)),
    }
}

/// An append-only output buffer.
#[derive(Debug, Default)]
pub struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    /// The bytes written so far.
    pub fn as_bytes(&self) -> &[u8] { &self.buf }

    /// Consumes the writer, returning its buffer.
    pub fn finish(self) -> Vec<u8> { self.buf }

    /// Appends raw bytes.
    pub fn bytes(&mut self, bytes: &[u8]) { self.buf.extend_from_slice(bytes); }

    /// Appends a boolean as one byte.
    pub fn bool(&mut self, value: bool) { self.buf.push(u8::from(value)); }

    /// Appends a little-endian `u32`.
    pub fn u32(&mut self, value: u32) { self.bytes(&value.to_le_bytes()); }

    /// Appends an unsigned LEB128 varint.
    pub fn varint(&mut self, mut value: u64) {
        loop {
            let byte = (value & 0x7f) as u8;
            value >>= 7;
            if value == 0 {
                self.buf.push(byte);
                return;
            }
            self.buf.push(byte | 0x80);
        }
    }

    /// Appends a length-prefixed UTF-8 string.
    pub fn str(&mut self, value: &str) {
        self.varint(value.len() as u64);
        self.bytes(value.as_bytes());
    }

    /// Appends a presence bitmap.
    pub fn bitmap(&mut self, bits: impl IntoIterator<Item = bool>) {
        let bits: BitVec<u8, Lsb0> = bits.into_iter().collect();
        self.bytes(bits.as_raw_slice());
    }
}

/// A cursor over input bytes.
#[derive(Debug)]
pub struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    /// Starts reading at the beginning of `buf`.
    pub fn new(buf: &'a [u8]) -> Self { Self { buf, pos: 0 } }

    /// The position of the next byte.
    pub fn position(&self) -> usize { self.pos }

    /// The number of unread bytes.
    pub fn remaining(&self) -> usize { self.buf.len() - self.pos }

    /// Reads exactly `len` bytes.
    pub fn bytes(&mut self, len: usize) -> Result<&'a [u8], CodecError> {
        if self.remaining() < len {
            return Err(CodecError::UnexpectedEof(self.buf.len()));
        }
        let bytes = &self.buf[self.pos..self.pos + len];
        self.pos += len;
        Ok(bytes)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], CodecError> {
        Ok(self.bytes(N)?.try_into().expect("slice has the requested length"))
    }

    /// Reads a boolean byte, rejecting anything but 0 and 1.
    pub fn bool(&mut self) -> Result<bool, CodecError> {
        let offset = self.pos;
        match self.array::<1>()? {
            [0] => Ok(false),
            [1] => Ok(true),
            [byte] => Err(CodecError::InvalidBool { byte, offset }),
        }
    }

    /// Reads a little-endian `u32`.
    pub fn u32(&mut self) -> Result<u32, CodecError> { Ok(u32::from_le_bytes(self.array()?)) }

    /// Reads an unsigned LEB128 varint of at most [`MAX_VARINT_LEN`] bytes.
    pub fn varint(&mut self) -> Result<u64, CodecError> {
        let start = self.pos;
        let mut value = 0u64;
        for i in 0..MAX_VARINT_LEN {
            let [byte] = self.array::<1>()?;
            let bits = u64::from(byte & 0x7f);
            let shift = 7 * i as u32;
            if shift == 63 && bits > 1 {
                return Err(CodecError::VarintOverflow(start));
            }
            value |= bits << shift;
            if byte & 0x80 == 0 {
                return Ok(value);
            }
        }
        Err(CodecError::VarintOverflow(start))
    }

    /// Reads a varint that must fit in a `u32`.
    pub fn varint_u32(&mut self) -> Result<u32, CodecError> {
        let value = self.varint()?;
        u32::try_from(value).map_err(|_| CodecError::OutOfRange(value))
    }

    /// Reads a varint length or count of at most `max`.
    pub fn length(&mut self, max: u64) -> Result<usize, CodecError> {
        let len = self.varint()?;
        usize::try_from(len)
            .ok()
            .filter(|_| len <= max)
            .ok_or(CodecError::OutOfRange(len))
    }

    /// Reads a length-prefixed UTF-8 string.
    pub fn str(&mut self) -> Result<String, CodecError> {
        let len = self.length(u32::MAX.into())?;
        let offset = self.pos;
        let bytes = self.bytes(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| CodecError::InvalidUtf8(offset))
    }

    /// Reads a presence bitmap of `len` bits.
    pub fn bitmap(&mut self, len: usize) -> Result<&'a BitSlice<u8, Lsb0>, CodecError> {
        let bytes = self.bytes((len + 7) / 8)?;
        Ok(&BitSlice::from_slice(bytes)[..len])
    }
}
