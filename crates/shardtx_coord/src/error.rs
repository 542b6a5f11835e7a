//! Error types for the coordinator.

use shardtx_protocol::{InnerId, PartitionId, TxnId, TxnType};
use thiserror::Error;

/// Result type for coordinator operations.
pub type CoordResult<T> = Result<T, CoordError>;

/// Errors surfaced by the coordinator.
///
/// Protocol violations fail only the offending transaction; the
/// coordinator instance stays usable for the next request.
#[derive(Debug, Error)]
pub enum CoordError {
    /// No chopper is registered for the requested transaction type.
    #[error("unknown transaction type {txn_type}")]
    UnknownTxnType {
        /// The unregistered type.
        txn_type: TxnType,
    },

    /// A transaction is already in flight on this coordinator instance.
    #[error("coordinator busy: a transaction is already in flight")]
    Busy,

    /// A completion arrived for a phase the coordinator has left.
    #[error("stale callback: sent in phase {sent_in}, coordinator now in {current}")]
    StaleCallback {
        /// Phase the request was sent under.
        sent_in: String,
        /// Phase the coordinator is in now.
        current: String,
    },

    /// An ack referenced a piece that is not in the current round.
    #[error("ack for unknown piece {inner}")]
    UnknownPieceAck {
        /// The unexpected inner ID.
        inner: InnerId,
    },

    /// An ack arrived twice for the same piece in one round.
    #[error("duplicate ack for piece {inner}")]
    DuplicateAck {
        /// The duplicated inner ID.
        inner: InnerId,
    },

    /// A partition acknowledged the finish phase twice.
    #[error("duplicate finish ack from {partition}")]
    DuplicateFinishAck {
        /// The duplicated partition.
        partition: PartitionId,
    },

    /// A graph was empty where at least the root vertex is required.
    #[error("dependency graph unexpectedly empty")]
    EmptyGraph,

    /// A dispatch-ack fragment did not describe the acknowledging piece.
    #[error("graph fragment for {txn} does not record partition {partition}")]
    ForeignFragment {
        /// The transaction the fragment should describe.
        txn: TxnId,
        /// The partition whose ack carried the fragment.
        partition: PartitionId,
    },

    /// The aggregated vertex's partition set diverged from the command's.
    #[error("partition set mismatch: command has {expected}, graph has {actual}")]
    PartitionSetMismatch {
        /// Partitions recorded by the command.
        expected: usize,
        /// Partitions recorded by the graph vertex.
        actual: usize,
    },

    /// The read-only convergence loop hit its round bound.
    #[error("read-only snapshot did not converge within {rounds} rounds")]
    RoRoundsExhausted {
        /// Rounds executed before giving up.
        rounds: u32,
    },

    /// Wire encoding of a commit-log record failed.
    #[error("codec error: {0}")]
    Codec(#[from] shardtx_codec::CodecError),

    /// Internal consistency fault; the transaction is failed, not the process.
    #[error("internal error: {message}")]
    Internal {
        /// Description of the fault.
        message: String,
    },
}

impl CoordError {
    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns true if the caller may retry the transaction as-is.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CoordError::RoRoundsExhausted { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_classification() {
        assert!(CoordError::RoRoundsExhausted { rounds: 8 }.is_retryable());
        assert!(!CoordError::Busy.is_retryable());
        assert!(!CoordError::EmptyGraph.is_retryable());
    }

    #[test]
    fn error_display() {
        let err = CoordError::UnknownPieceAck {
            inner: InnerId::new(3),
        };
        assert!(err.to_string().contains("inn:3"));

        let err = CoordError::PartitionSetMismatch {
            expected: 2,
            actual: 1,
        };
        assert!(err.to_string().contains("2"));
        assert!(err.to_string().contains("1"));
    }
}
