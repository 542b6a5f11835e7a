//! Fixture helpers for building transactions against the simulated cluster.

use shardtx_codec::Value;
use shardtx_coord::{CommandGraph, PieceSet, PieceSpec, TxnRegistry};
use shardtx_protocol::{PieceInput, RecordId, TxnType};

/// One operation inside a piece, as understood by the simulated backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TestOp {
    /// Read a record; its value lands in the piece output.
    Read(RecordId),
    /// Write a value to a record.
    Write(RecordId, Value),
}

/// Encodes operations into a piece input.
///
/// Slot `2k` holds the record ID of operation `k`; slot `2k + 1` holds
/// `Null` for a read or the value for a write. Writing `Null` is not
/// representable in this convention.
pub fn ops_to_input(ops: &[TestOp]) -> PieceInput {
    let mut input = PieceInput::new();
    for (k, op) in ops.iter().enumerate() {
        let slot = (k as u32) * 2;
        match op {
            TestOp::Read(record) => {
                input.insert(slot, Value::Integer(record.as_u64() as i64));
                input.insert(slot + 1, Value::Null);
            }
            TestOp::Write(record, value) => {
                input.insert(slot, Value::Integer(record.as_u64() as i64));
                input.insert(slot + 1, value.clone());
            }
        }
    }
    input
}

/// Decodes a piece input back into operations.
pub fn input_to_ops(input: &PieceInput) -> Vec<TestOp> {
    let mut ops = Vec::new();
    let mut k = 0u32;
    while let Some(record) = input.get(&(k * 2)) {
        let record = RecordId::new(record.as_integer().unwrap_or(0) as u64);
        match input.get(&(k * 2 + 1)) {
            Some(Value::Null) | None => ops.push(TestOp::Read(record)),
            Some(value) => ops.push(TestOp::Write(record, value.clone())),
        }
        k += 1;
    }
    ops
}

/// Registers a chopper that decomposes every request of `txn_type` into
/// the same fixed piece set.
pub fn register_static(
    registry: &mut TxnRegistry,
    txn_type: TxnType,
    read_only: bool,
    specs: Vec<PieceSpec>,
) {
    registry.register(txn_type, move |_req| {
        let set: Box<dyn CommandGraph> = if read_only {
            Box::new(PieceSet::read_only(specs.clone()))
        } else {
            Box::new(PieceSet::read_write(specs.clone()))
        };
        set
    });
}
