//! Positional wire encoder.

use crate::error::{CodecError, CodecResult};
use crate::value::{RecordKey, Value};
use bytes::{BufMut, Bytes, BytesMut};

/// Type tag for a null value.
pub(crate) const TAG_NULL: u8 = 0x00;
/// Type tag for an integer value.
pub(crate) const TAG_INTEGER: u8 = 0x01;
/// Type tag for a text value.
pub(crate) const TAG_TEXT: u8 = 0x02;
/// Type tag for a bytes value.
pub(crate) const TAG_BYTES: u8 = 0x03;

/// Maximum length of a single variable-length field (256 MiB).
/// This bounds allocation from untrusted input.
pub(crate) const MAX_FIELD_BYTES: u64 = 256 * 1024 * 1024;

/// A positional wire encoder.
///
/// Fields are written in a fixed order agreed with the decoder. Integers
/// are little-endian fixed width; variable-length fields carry a `u32`
/// length prefix.
#[derive(Debug, Default)]
pub struct WireEncoder {
    buf: BytesMut,
}

impl WireEncoder {
    /// Creates a new encoder.
    pub fn new() -> Self {
        Self {
            buf: BytesMut::new(),
        }
    }

    /// Creates a new encoder with the given capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(capacity),
        }
    }

    /// Consumes the encoder and returns the encoded bytes.
    pub fn into_bytes(self) -> Bytes {
        self.buf.freeze()
    }

    /// Returns the bytes encoded so far.
    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    /// Returns the number of bytes encoded so far.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Returns true if nothing has been encoded.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Writes a single byte.
    pub fn put_u8(&mut self, v: u8) {
        self.buf.put_u8(v);
    }

    /// Writes a `u32`, little-endian.
    pub fn put_u32(&mut self, v: u32) {
        self.buf.put_u32_le(v);
    }

    /// Writes a `u64`, little-endian.
    pub fn put_u64(&mut self, v: u64) {
        self.buf.put_u64_le(v);
    }

    /// Writes an `i32`, little-endian.
    pub fn put_i32(&mut self, v: i32) {
        self.buf.put_i32_le(v);
    }

    /// Writes an `i64`, little-endian.
    pub fn put_i64(&mut self, v: i64) {
        self.buf.put_i64_le(v);
    }

    /// Writes a length-prefixed byte field.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::LengthOverflow`] if the field exceeds the
    /// supported maximum.
    pub fn put_bytes(&mut self, v: &[u8]) -> CodecResult<()> {
        let len = v.len() as u64;
        if len > MAX_FIELD_BYTES {
            return Err(CodecError::LengthOverflow {
                length: len,
                max: MAX_FIELD_BYTES,
            });
        }
        self.buf.put_u32_le(len as u32);
        self.buf.put_slice(v);
        Ok(())
    }

    /// Writes a length-prefixed UTF-8 text field.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::LengthOverflow`] if the field exceeds the
    /// supported maximum.
    pub fn put_text(&mut self, v: &str) -> CodecResult<()> {
        self.put_bytes(v.as_bytes())
    }

    /// Writes a tagged value.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable-length payload exceeds the maximum.
    pub fn put_value(&mut self, v: &Value) -> CodecResult<()> {
        match v {
            Value::Null => {
                self.put_u8(TAG_NULL);
                Ok(())
            }
            Value::Integer(n) => {
                self.put_u8(TAG_INTEGER);
                self.put_i64(*n);
                Ok(())
            }
            Value::Text(s) => {
                self.put_u8(TAG_TEXT);
                self.put_text(s)
            }
            Value::Bytes(b) => {
                self.put_u8(TAG_BYTES);
                self.put_bytes(b)
            }
        }
    }

    /// Writes a record key: component count then each component value.
    ///
    /// # Errors
    ///
    /// Returns an error if a component exceeds the maximum field size.
    pub fn put_record_key(&mut self, key: &RecordKey) -> CodecResult<()> {
        self.put_u32(key.len() as u32);
        for v in key.values() {
            self.put_value(v)?;
        }
        Ok(())
    }
}
