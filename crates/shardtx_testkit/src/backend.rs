//! A versioned in-memory store implementing the backend contract.

use crate::fixtures::{input_to_ops, TestOp};
use parking_lot::Mutex;
use shardtx_codec::Value;
use shardtx_protocol::{
    ConcurrencyControl, ExecStatus, Piece, PieceOutput, RecordId, TxnId, Version, VersionMap,
};
use std::collections::BTreeMap;

/// A partition-local versioned key-value store.
///
/// Reads see committed state only; writes buffer per transaction and
/// apply at commit, bumping each written record's version. This is the
/// minimum a concurrency-control backend needs to exercise the
/// coordinator end to end.
#[derive(Default)]
pub struct VersionedStore {
    records: Mutex<BTreeMap<RecordId, (Value, Version)>>,
    pending: Mutex<BTreeMap<TxnId, Vec<(RecordId, Value)>>>,
}

impl VersionedStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Preloads a record at version 1.
    pub fn seed(&self, record: RecordId, value: impl Into<Value>) {
        self.records.lock().insert(record, (value.into(), 1));
    }

    /// Returns the committed value of a record.
    pub fn value(&self, record: RecordId) -> Option<Value> {
        self.records.lock().get(&record).map(|(v, _)| v.clone())
    }

    /// Returns the committed version of a record (0 if absent).
    pub fn version(&self, record: RecordId) -> Version {
        self.records.lock().get(&record).map_or(0, |(_, v)| *v)
    }

    /// Returns the versions of every record a piece touches.
    pub fn observed_versions(&self, piece: &Piece) -> VersionMap {
        let records = self.records.lock();
        let mut versions = VersionMap::new();
        for op in input_to_ops(&piece.input) {
            let record = match op {
                TestOp::Read(r) | TestOp::Write(r, _) => r,
            };
            versions.insert(record, records.get(&record).map_or(0, |(_, v)| *v));
        }
        versions
    }

    /// Records touched by a piece, in operation order.
    pub fn touched_records(piece: &Piece) -> Vec<RecordId> {
        input_to_ops(&piece.input)
            .into_iter()
            .map(|op| match op {
                TestOp::Read(r) | TestOp::Write(r, _) => r,
            })
            .collect()
    }
}

impl ConcurrencyControl for VersionedStore {
    fn execute(&self, piece: &Piece) -> PieceOutput {
        let mut output = PieceOutput::new();
        for (k, op) in input_to_ops(&piece.input).into_iter().enumerate() {
            let slot = (k as u32) * 2;
            match op {
                TestOp::Read(record) => {
                    let value = self
                        .records
                        .lock()
                        .get(&record)
                        .map_or(Value::Null, |(v, _)| v.clone());
                    output.insert(slot, value);
                }
                TestOp::Write(record, value) => {
                    self.pending
                        .lock()
                        .entry(piece.root_id)
                        .or_default()
                        .push((record, value));
                }
            }
        }
        output
    }

    fn prepare(&self, _txn: TxnId) -> ExecStatus {
        ExecStatus::Success
    }

    fn commit(&self, txn: TxnId) {
        let writes = self.pending.lock().remove(&txn).unwrap_or_default();
        let mut records = self.records.lock();
        for (record, value) in writes {
            let version = records.get(&record).map_or(0, |(_, v)| *v) + 1;
            records.insert(record, (value, version));
        }
    }

    fn abort(&self, txn: TxnId) {
        self.pending.lock().remove(&txn);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::ops_to_input;
    use shardtx_protocol::{InnerId, PartitionId};

    fn piece(txn: u64, ops: &[TestOp]) -> Piece {
        let mut piece = Piece::new(
            TxnId::new(txn),
            InnerId::new(0),
            PartitionId::new(0),
            ops_to_input(ops),
        );
        piece.root_id = TxnId::new(txn);
        piece
    }

    #[test]
    fn writes_are_invisible_until_commit() {
        let store = VersionedStore::new();
        store.seed(RecordId::new(1), Value::Integer(10));

        let p = piece(7, &[TestOp::Write(RecordId::new(1), Value::Integer(20))]);
        store.execute(&p);
        assert_eq!(store.value(RecordId::new(1)), Some(Value::Integer(10)));
        assert_eq!(store.version(RecordId::new(1)), 1);

        store.commit(TxnId::new(7));
        assert_eq!(store.value(RecordId::new(1)), Some(Value::Integer(20)));
        assert_eq!(store.version(RecordId::new(1)), 2);
    }

    #[test]
    fn abort_discards_pending_writes() {
        let store = VersionedStore::new();
        let p = piece(3, &[TestOp::Write(RecordId::new(5), Value::Integer(1))]);
        store.execute(&p);
        store.abort(TxnId::new(3));
        store.commit(TxnId::new(3));
        assert_eq!(store.value(RecordId::new(5)), None);
    }

    #[test]
    fn reads_land_in_output_slots() {
        let store = VersionedStore::new();
        store.seed(RecordId::new(2), Value::Text("hi".into()));

        let p = piece(
            1,
            &[
                TestOp::Read(RecordId::new(2)),
                TestOp::Read(RecordId::new(99)),
            ],
        );
        let output = store.execute(&p);
        assert_eq!(output[&0], Value::Text("hi".into()));
        assert_eq!(output[&2], Value::Null);
    }

    #[test]
    fn observed_versions_cover_touched_records() {
        let store = VersionedStore::new();
        store.seed(RecordId::new(1), Value::Integer(1));

        let p = piece(
            1,
            &[
                TestOp::Read(RecordId::new(1)),
                TestOp::Read(RecordId::new(2)),
            ],
        );
        let versions = store.observed_versions(&p);
        assert_eq!(versions[&RecordId::new(1)], 1);
        assert_eq!(versions[&RecordId::new(2)], 0);
    }
}
