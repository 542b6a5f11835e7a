//! Pieces: the unit of work dispatched to one partition.

use crate::types::{InnerId, PartitionId, PieceId, TxnId, VarId};
use serde::{Deserialize, Serialize};
use shardtx_codec::Value;
use std::collections::BTreeMap;

/// Input slots for a piece.
pub type PieceInput = BTreeMap<VarId, Value>;

/// Output slots produced by executing a piece.
pub type PieceOutput = BTreeMap<VarId, Value>;

/// A sub-command bound to exactly one partition.
///
/// A multi-partition transaction is decomposed into pieces by the chopper;
/// each piece is identified by `(root_id, inner_id, piece_id)`. The
/// `piece_id` is assigned fresh at dispatch time, so a redispatched piece
/// keeps its `inner_id` but changes its `piece_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Piece {
    /// Dependency-graph vertex key of the owning transaction.
    pub root_id: TxnId,
    /// Position of this piece within its transaction.
    pub inner_id: InnerId,
    /// Dispatch-time identity; fresh per send.
    pub piece_id: PieceId,
    /// The partition this piece executes on.
    pub partition: PartitionId,
    /// Input values.
    pub input: PieceInput,
    /// Output mapping, filled in by the backend.
    pub output: PieceOutput,
}

impl Piece {
    /// Creates a new piece with empty output.
    pub fn new(
        root_id: TxnId,
        inner_id: InnerId,
        partition: PartitionId,
        input: PieceInput,
    ) -> Self {
        Self {
            root_id,
            inner_id,
            piece_id: PieceId::new(0),
            partition,
            input,
            output: PieceOutput::new(),
        }
    }

    /// Stamps the dispatch-time piece ID.
    pub fn with_piece_id(mut self, piece_id: PieceId) -> Self {
        self.piece_id = piece_id;
        self
    }
}
