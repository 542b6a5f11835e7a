//! Ack payloads exchanged between partitions and the coordinator.

use crate::graph::DepGraph;
use crate::piece::{Piece, PieceOutput};
use crate::types::{InnerId, RecordId, Version};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Partition-local execution outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecStatus {
    /// The backend accepted the work.
    Success,
    /// The backend rejected the work; the transaction must abort.
    Reject,
}

impl ExecStatus {
    /// Returns true on success.
    pub fn is_success(self) -> bool {
        matches!(self, ExecStatus::Success)
    }
}

/// Record versions observed by a partition while serving a read-only piece.
///
/// Two consecutive equal snapshots signal that the read set is consistent.
pub type VersionMap = BTreeMap<RecordId, Version>;

/// Acknowledgement of a dispatched read-write piece.
///
/// Carries the executed piece (outputs filled in) and the partial
/// dependency graph the partition learned while executing it. The fragment
/// always contains at least the owning transaction's vertex.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandoutAck {
    /// Execution outcome.
    pub status: ExecStatus,
    /// The piece, with `output` populated by the backend.
    pub piece: Piece,
    /// Partial dependency graph learned at the partition.
    pub graph: DepGraph,
}

/// Acknowledgement of a dispatched read-only piece.
///
/// Read-only pieces do not participate in the dependency graph; the ack
/// instead reports the record versions the partition served.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandoutRoAck {
    /// Execution outcome.
    pub status: ExecStatus,
    /// The piece, with `output` populated by the backend.
    pub piece: Piece,
    /// Versions of the records read.
    pub versions: VersionMap,
}

/// Acknowledgement of a finish request from one partition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinishAck {
    /// Commit outcome at the partition.
    pub status: ExecStatus,
    /// Outputs of the pieces this partition executed, keyed by inner ID.
    pub outputs: BTreeMap<InnerId, PieceOutput>,
}
