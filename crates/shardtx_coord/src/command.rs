//! Client transaction requests, replies, and the command-graph contract.

use crate::error::CoordResult;
use shardtx_protocol::{
    InnerId, PartitionId, Piece, PieceInput, PieceOutput, TxnId, TxnType,
};
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

/// A client transaction request.
#[derive(Debug, Clone)]
pub struct TxnRequest {
    /// Registry key selecting the chopper for this transaction.
    pub txn_type: TxnType,
    /// Request-level input values, available to the chopper.
    pub input: PieceInput,
}

impl TxnRequest {
    /// Creates a request with empty input.
    pub fn new(txn_type: TxnType) -> Self {
        Self {
            txn_type,
            input: PieceInput::new(),
        }
    }

    /// Sets the request input.
    pub fn with_input(mut self, input: PieceInput) -> Self {
        self.input = input;
        self
    }
}

/// Final outcome of a transaction as reported to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyStatus {
    /// The transaction committed.
    Committed,
    /// A backend rejected the transaction; its effects were discarded.
    Aborted,
}

/// The reply delivered to the caller's completion.
#[derive(Debug, Clone)]
pub struct TxnReply {
    /// The transaction this reply describes.
    pub txn_id: TxnId,
    /// Commit or abort.
    pub status: ReplyStatus,
    /// Accumulated piece outputs, keyed by inner ID.
    pub outputs: BTreeMap<InnerId, PieceOutput>,
    /// Time from submission to this reply.
    pub latency: Duration,
}

/// The caller's completion handle. Invoked exactly once per transaction.
pub type TxnCallback = Box<dyn FnOnce(CoordResult<TxnReply>) + Send + 'static>;

/// The chopper's output: a per-transaction command graph.
///
/// Tracks which pieces are ready to dispatch (a piece is ready once its
/// local dependencies are satisfied) and absorbs outputs as acks arrive,
/// which may unblock dependent pieces.
pub trait CommandGraph: Send {
    /// True if every piece of this transaction is a read.
    fn is_read_only(&self) -> bool;

    /// Total number of pieces.
    fn piece_count(&self) -> usize;

    /// The set of partitions this transaction touches.
    fn partitions(&self) -> BTreeSet<PartitionId>;

    /// True if at least one piece is ready and not yet dispatched.
    fn has_more_ready(&self) -> bool;

    /// Extracts the next ready piece, marking it dispatched.
    fn next_ready(&mut self) -> Option<Piece>;

    /// Folds an acknowledged piece's outputs back in, possibly
    /// unblocking dependents.
    fn merge_output(&mut self, piece: &Piece);

    /// Forgets dispatch/ack progress so the whole round can be resent
    /// (read-only retry).
    fn reset_read_set(&mut self);
}

/// Template for one piece of a [`PieceSet`].
#[derive(Debug, Clone)]
pub struct PieceSpec {
    /// Position within the transaction.
    pub inner_id: InnerId,
    /// Partition the piece executes on.
    pub partition: PartitionId,
    /// Input values.
    pub input: PieceInput,
    /// Pieces that must be acknowledged before this one is ready.
    pub after: Vec<InnerId>,
}

impl PieceSpec {
    /// Creates a spec with no local dependencies.
    pub fn new(inner_id: InnerId, partition: PartitionId, input: PieceInput) -> Self {
        Self {
            inner_id,
            partition,
            input,
            after: Vec::new(),
        }
    }

    /// Adds local dependencies.
    pub fn after(mut self, deps: impl IntoIterator<Item = InnerId>) -> Self {
        self.after.extend(deps);
        self
    }
}

/// A [`CommandGraph`] built from piece templates with local dependencies.
#[derive(Debug)]
pub struct PieceSet {
    read_only: bool,
    specs: Vec<PieceSpec>,
    dispatched: BTreeSet<InnerId>,
    acked: BTreeSet<InnerId>,
}

impl PieceSet {
    /// Creates a read-write piece set.
    pub fn read_write(specs: Vec<PieceSpec>) -> Self {
        Self {
            read_only: false,
            specs,
            dispatched: BTreeSet::new(),
            acked: BTreeSet::new(),
        }
    }

    /// Creates a read-only piece set.
    pub fn read_only(specs: Vec<PieceSpec>) -> Self {
        Self {
            read_only: true,
            specs,
            dispatched: BTreeSet::new(),
            acked: BTreeSet::new(),
        }
    }

    fn is_ready(&self, spec: &PieceSpec) -> bool {
        !self.dispatched.contains(&spec.inner_id)
            && spec.after.iter().all(|dep| self.acked.contains(dep))
    }
}

impl CommandGraph for PieceSet {
    fn is_read_only(&self) -> bool {
        self.read_only
    }

    fn piece_count(&self) -> usize {
        self.specs.len()
    }

    fn partitions(&self) -> BTreeSet<PartitionId> {
        self.specs.iter().map(|s| s.partition).collect()
    }

    fn has_more_ready(&self) -> bool {
        self.specs.iter().any(|s| self.is_ready(s))
    }

    fn next_ready(&mut self) -> Option<Piece> {
        let spec = self.specs.iter().find(|s| self.is_ready(s))?.clone();
        self.dispatched.insert(spec.inner_id);
        // root id and piece id are stamped by the coordinator at dispatch
        Some(Piece::new(
            TxnId::new(0),
            spec.inner_id,
            spec.partition,
            spec.input,
        ))
    }

    fn merge_output(&mut self, piece: &Piece) {
        self.acked.insert(piece.inner_id);
    }

    fn reset_read_set(&mut self) {
        self.dispatched.clear();
        self.acked.clear();
    }
}

/// Chopper: builds a command graph from a request.
pub type ChopperFn = Box<dyn Fn(&TxnRequest) -> Box<dyn CommandGraph> + Send + Sync>;

/// Registry mapping transaction types to choppers.
///
/// A coordinator refuses requests whose type has no registered chopper.
#[derive(Default)]
pub struct TxnRegistry {
    choppers: BTreeMap<TxnType, ChopperFn>,
}

impl TxnRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a chopper for a transaction type, replacing any
    /// previous registration.
    pub fn register(
        &mut self,
        txn_type: TxnType,
        chopper: impl Fn(&TxnRequest) -> Box<dyn CommandGraph> + Send + Sync + 'static,
    ) {
        self.choppers.insert(txn_type, Box::new(chopper));
    }

    /// Looks up the chopper for a type.
    pub fn chopper(&self, txn_type: TxnType) -> Option<&ChopperFn> {
        self.choppers.get(&txn_type)
    }

    /// Returns the number of registered types.
    pub fn len(&self) -> usize {
        self.choppers.len()
    }

    /// Returns true if no types are registered.
    pub fn is_empty(&self) -> bool {
        self.choppers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn three_piece_set() -> PieceSet {
        PieceSet::read_write(vec![
            PieceSpec::new(InnerId::new(0), PartitionId::new(0), PieceInput::new()),
            PieceSpec::new(InnerId::new(1), PartitionId::new(1), PieceInput::new()),
            PieceSpec::new(InnerId::new(2), PartitionId::new(0), PieceInput::new())
                .after([InnerId::new(0), InnerId::new(1)]),
        ])
    }

    #[test]
    fn independent_pieces_are_ready_at_once() {
        let mut set = three_piece_set();
        assert!(set.has_more_ready());
        assert!(set.next_ready().is_some());
        assert!(set.next_ready().is_some());
        // piece 2 waits for acks of 0 and 1
        assert!(set.next_ready().is_none());
        assert!(!set.has_more_ready());
    }

    #[test]
    fn acks_unblock_dependents() {
        let mut set = three_piece_set();
        let a = set.next_ready().unwrap();
        let b = set.next_ready().unwrap();
        set.merge_output(&a);
        assert!(!set.has_more_ready());
        set.merge_output(&b);
        assert!(set.has_more_ready());
        let c = set.next_ready().unwrap();
        assert_eq!(c.inner_id, InnerId::new(2));
    }

    #[test]
    fn reset_forgets_progress() {
        let mut set = three_piece_set();
        let a = set.next_ready().unwrap();
        set.merge_output(&a);
        set.reset_read_set();
        // everything dispatchable again from scratch
        assert!(set.next_ready().is_some());
        assert!(set.next_ready().is_some());
        assert!(set.next_ready().is_none());
    }

    #[test]
    fn partitions_are_collected() {
        let set = three_piece_set();
        let partitions = set.partitions();
        assert_eq!(partitions.len(), 2);
        assert_eq!(set.piece_count(), 3);
    }

    #[test]
    fn registry_lookup() {
        let mut registry = TxnRegistry::new();
        registry.register(TxnType::new(1), |_req| {
            Box::new(PieceSet::read_write(Vec::new()))
        });
        assert!(registry.chopper(TxnType::new(1)).is_some());
        assert!(registry.chopper(TxnType::new(2)).is_none());
        assert_eq!(registry.len(), 1);
    }
}
