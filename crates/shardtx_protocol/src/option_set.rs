//! Versioned write options for the option-based commit variant.
//!
//! An option set proposes a group of column writes against one record,
//! keyed by (transaction id, table, record key), at the versions the
//! proposer observed. A set's `accepted` flag transitions false to true
//! exactly once when a quorum accepts it and never reverts.
//!
//! The wire layout is fixed and must round-trip bit-exactly. Field order:
//! transaction id, table name, option sequence (each option: column id,
//! version, value, in that order), the accepted flag as a 4-byte integer
//! 0 or 1, then the record key.

use crate::types::{TxnId, Version};
use serde::{Deserialize, Serialize};
use shardtx_codec::{
    CodecError, CodecResult, RecordKey, Value, WireDecoder, WireEncoder,
};

/// A proposed write of one column at an observed version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteOption {
    /// Column being written.
    pub column: i32,
    /// Version the proposer observed.
    pub version: Version,
    /// Proposed value.
    pub value: Value,
}

impl WriteOption {
    /// Creates a new write option.
    pub fn new(column: i32, version: Version, value: impl Into<Value>) -> Self {
        Self {
            column,
            version,
            value: value.into(),
        }
    }
}

/// An ordered set of versioned write options against one record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionSet {
    txn_id: TxnId,
    table: String,
    options: Vec<WriteOption>,
    accepted: bool,
    key: RecordKey,
}

impl OptionSet {
    /// Creates a new, not-yet-accepted option set.
    pub fn new(txn_id: TxnId, table: impl Into<String>, key: RecordKey) -> Self {
        Self {
            txn_id,
            table: table.into(),
            options: Vec::new(),
            accepted: false,
            key,
        }
    }

    /// Appends an option; order is preserved on the wire.
    pub fn add(&mut self, option: WriteOption) {
        self.options.push(option);
    }

    /// Returns the owning transaction.
    pub fn txn_id(&self) -> TxnId {
        self.txn_id
    }

    /// Returns the table name.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Returns the record key.
    pub fn key(&self) -> &RecordKey {
        &self.key
    }

    /// Returns the options in proposal order.
    pub fn options(&self) -> &[WriteOption] {
        &self.options
    }

    /// Returns true once the set has been accepted.
    pub fn accepted(&self) -> bool {
        self.accepted
    }

    /// Marks the set accepted. The flag never reverts.
    pub fn accept(&mut self) {
        self.accepted = true;
    }

    /// Encodes the set in the fixed wire order.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable-length field exceeds the codec's
    /// maximum size.
    pub fn encode(&self) -> CodecResult<Vec<u8>> {
        let mut enc = WireEncoder::with_capacity(64);
        enc.put_u64(self.txn_id.as_u64());
        enc.put_text(&self.table)?;
        enc.put_u32(self.options.len() as u32);
        for option in &self.options {
            enc.put_i32(option.column);
            enc.put_u64(option.version);
            enc.put_value(&option.value)?;
        }
        // the accepted flag is a 4-byte integer on the wire, not one bit
        enc.put_u32(u32::from(self.accepted));
        enc.put_record_key(&self.key)?;
        Ok(enc.into_bytes().to_vec())
    }

    /// Decodes a set, reading fields in the identical order.
    ///
    /// # Errors
    ///
    /// Returns an error on truncated input, a malformed field, an
    /// accepted flag other than 0 or 1, or trailing bytes.
    pub fn decode(bytes: &[u8]) -> CodecResult<Self> {
        let mut dec = WireDecoder::new(bytes);
        let txn_id = TxnId::new(dec.get_u64()?);
        let table = dec.get_text()?;
        let count = dec.get_u32()? as usize;
        if count > dec.remaining() {
            return Err(CodecError::invalid_structure(
                "option count exceeds remaining input",
            ));
        }
        let mut options = Vec::with_capacity(count);
        for _ in 0..count {
            let column = dec.get_i32()?;
            let version = dec.get_u64()?;
            let value = dec.get_value()?;
            options.push(WriteOption {
                column,
                version,
                value,
            });
        }
        let accepted = match dec.get_u32()? {
            0 => false,
            1 => true,
            other => {
                return Err(CodecError::invalid_structure(format!(
                    "accepted flag must be 0 or 1, got {other}"
                )))
            }
        };
        let key = dec.get_record_key()?;
        dec.finish()?;
        Ok(Self {
            txn_id,
            table,
            options,
            accepted,
            key,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_key() -> RecordKey {
        RecordKey::from_values([Value::Integer(11), Value::Text("eu".into())])
    }

    #[test]
    fn accept_is_one_way() {
        let mut set = OptionSet::new(TxnId::new(1), "accounts", sample_key());
        assert!(!set.accepted());
        set.accept();
        set.accept();
        assert!(set.accepted());
    }

    #[test]
    fn round_trip_empty_sequence() {
        let set = OptionSet::new(TxnId::new(0xdead), "accounts", RecordKey::new());
        let decoded = OptionSet::decode(&set.encode().unwrap()).unwrap();
        assert_eq!(decoded, set);
        assert!(decoded.options().is_empty());
        assert!(!decoded.accepted());
    }

    #[test]
    fn round_trip_single_option() {
        let mut set = OptionSet::new(TxnId::new(7), "balances", sample_key());
        set.add(WriteOption::new(2, 31, Value::Integer(-500)));

        let decoded = OptionSet::decode(&set.encode().unwrap()).unwrap();
        assert_eq!(decoded, set);
        assert_eq!(decoded.options().len(), 1);
        assert_eq!(decoded.options()[0].column, 2);
        assert_eq!(decoded.options()[0].version, 31);
    }

    #[test]
    fn round_trip_accepted_set_with_options() {
        let mut set = OptionSet::new(TxnId::new(u64::MAX), "orders", sample_key());
        set.add(WriteOption::new(0, 1, Value::Text("pending".into())));
        set.add(WriteOption::new(1, 9, Value::Integer(250)));
        set.add(WriteOption::new(-3, 0, Value::Null));
        set.add(WriteOption::new(4, u64::MAX, Value::Bytes(vec![1, 2, 3])));
        set.accept();

        let decoded = OptionSet::decode(&set.encode().unwrap()).unwrap();
        assert_eq!(decoded, set);
        assert!(decoded.accepted());
        assert_eq!(decoded.options().len(), 4);
        // proposal order survives
        assert_eq!(decoded.options()[2].column, -3);
    }

    #[test]
    fn accepted_flag_is_four_bytes() {
        let set = OptionSet::new(TxnId::new(1), "t", RecordKey::new());
        let bytes = set.encode().unwrap();
        // u64 txn + (u32 len + 1 byte table) + u32 count + u32 accepted + u32 key count
        assert_eq!(bytes.len(), 8 + 4 + 1 + 4 + 4 + 4);
        // accepted occupies the four bytes before the key count
        assert_eq!(&bytes[17..21], &[0, 0, 0, 0]);
    }

    #[test]
    fn bad_accepted_flag_is_rejected() {
        let mut set = OptionSet::new(TxnId::new(1), "t", RecordKey::new());
        set.accept();
        let mut bytes = set.encode().unwrap();
        bytes[17] = 2;
        assert!(OptionSet::decode(&bytes).is_err());
    }

    #[test]
    fn trailing_bytes_are_rejected() {
        let set = OptionSet::new(TxnId::new(1), "t", RecordKey::new());
        let mut bytes = set.encode().unwrap();
        bytes.push(0x00);
        assert!(matches!(
            OptionSet::decode(&bytes),
            Err(CodecError::TrailingBytes { .. })
        ));
    }
}
