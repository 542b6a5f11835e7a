//! Concurrency-control backend contract.

use crate::messages::ExecStatus;
use crate::piece::{Piece, PieceOutput};
use crate::types::TxnId;

/// Partition-local concurrency-control backend.
///
/// A backend executes pieces against the partition's local store and
/// answers prepare/commit/abort for the owning transaction. It is invoked
/// at the partition via a deferred-reply continuation, never by the
/// coordinator directly; the coordinator only ever sees the ack payloads
/// built from these results.
pub trait ConcurrencyControl: Send + Sync {
    /// Executes a piece and returns its output mapping.
    fn execute(&self, piece: &Piece) -> PieceOutput;

    /// Asks whether the transaction can commit locally.
    fn prepare(&self, txn: TxnId) -> ExecStatus;

    /// Applies the transaction's effects.
    fn commit(&self, txn: TxnId);

    /// Discards the transaction's effects.
    fn abort(&self, txn: TxnId);
}
