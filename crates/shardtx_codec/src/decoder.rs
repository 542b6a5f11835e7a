//! Positional wire decoder.

use crate::encoder::{MAX_FIELD_BYTES, TAG_BYTES, TAG_INTEGER, TAG_NULL, TAG_TEXT};
use crate::error::{CodecError, CodecResult};
use crate::value::{RecordKey, Value};

/// A positional wire decoder.
///
/// Reads fields in the same fixed order the encoder wrote them. Every read
/// validates that enough input remains; length prefixes are bounded before
/// any allocation happens.
#[derive(Debug)]
pub struct WireDecoder<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> WireDecoder<'a> {
    /// Creates a decoder over the given bytes.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Returns the number of unconsumed bytes.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Returns true if all bytes have been consumed.
    pub fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    /// Fails unless the input is fully consumed.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::TrailingBytes`] if unconsumed bytes remain.
    pub fn finish(&self) -> CodecResult<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(CodecError::TrailingBytes {
                remaining: self.remaining(),
            })
        }
    }

    fn take(&mut self, len: usize) -> CodecResult<&'a [u8]> {
        if self.remaining() < len {
            return Err(CodecError::UnexpectedEof {
                needed: len - self.remaining(),
            });
        }
        let bytes = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(bytes)
    }

    /// Reads a single byte.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is exhausted.
    pub fn get_u8(&mut self) -> CodecResult<u8> {
        Ok(self.take(1)?[0])
    }

    /// Reads a little-endian `u32`.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is exhausted.
    pub fn get_u32(&mut self) -> CodecResult<u32> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Reads a little-endian `u64`.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is exhausted.
    pub fn get_u64(&mut self) -> CodecResult<u64> {
        let b = self.take(8)?;
        Ok(u64::from_le_bytes([
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
        ]))
    }

    /// Reads a little-endian `i32`.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is exhausted.
    pub fn get_i32(&mut self) -> CodecResult<i32> {
        let b = self.take(4)?;
        Ok(i32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Reads a little-endian `i64`.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is exhausted.
    pub fn get_i64(&mut self) -> CodecResult<i64> {
        let b = self.take(8)?;
        Ok(i64::from_le_bytes([
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
        ]))
    }

    /// Reads a length-prefixed byte field.
    ///
    /// # Errors
    ///
    /// Returns an error on exhausted input or an out-of-bounds length.
    pub fn get_bytes(&mut self) -> CodecResult<Vec<u8>> {
        let len = u64::from(self.get_u32()?);
        if len > MAX_FIELD_BYTES {
            return Err(CodecError::LengthOverflow {
                length: len,
                max: MAX_FIELD_BYTES,
            });
        }
        Ok(self.take(len as usize)?.to_vec())
    }

    /// Reads a length-prefixed UTF-8 text field.
    ///
    /// # Errors
    ///
    /// Returns an error on exhausted input, out-of-bounds length, or
    /// invalid UTF-8.
    pub fn get_text(&mut self) -> CodecResult<String> {
        let bytes = self.get_bytes()?;
        String::from_utf8(bytes).map_err(|_| CodecError::InvalidUtf8)
    }

    /// Reads a tagged value.
    ///
    /// # Errors
    ///
    /// Returns an error on exhausted input or an unknown tag.
    pub fn get_value(&mut self) -> CodecResult<Value> {
        let tag = self.get_u8()?;
        match tag {
            TAG_NULL => Ok(Value::Null),
            TAG_INTEGER => Ok(Value::Integer(self.get_i64()?)),
            TAG_TEXT => Ok(Value::Text(self.get_text()?)),
            TAG_BYTES => Ok(Value::Bytes(self.get_bytes()?)),
            tag => Err(CodecError::UnknownTag { tag }),
        }
    }

    /// Reads a record key: component count then each component value.
    ///
    /// # Errors
    ///
    /// Returns an error on exhausted input or a component count that the
    /// remaining input cannot possibly hold.
    pub fn get_record_key(&mut self) -> CodecResult<RecordKey> {
        let count = self.get_u32()? as usize;
        // each component is at least one tag byte
        if count > self.remaining() {
            return Err(CodecError::invalid_structure(
                "record key component count exceeds remaining input",
            ));
        }
        let mut values = Vec::with_capacity(count);
        for _ in 0..count {
            values.push(self.get_value()?);
        }
        Ok(RecordKey::from_values(values))
    }
}
