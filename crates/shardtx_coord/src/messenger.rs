//! Messaging collaborator: asynchronous sends with one-shot completions.

use parking_lot::Mutex;
use shardtx_protocol::{DepGraph, FinishAck, HandoutAck, HandoutRoAck, PartitionId, Piece, TxnId};

/// Completion for a dispatched read-write piece.
pub type HandoutCallback = Box<dyn FnOnce(HandoutAck) + Send + 'static>;

/// Completion for a dispatched read-only piece.
pub type HandoutRoCallback = Box<dyn FnOnce(HandoutRoAck) + Send + 'static>;

/// Completion for a finish request.
pub type FinishCallback = Box<dyn FnOnce(FinishAck) + Send + 'static>;

/// Messaging collaborator.
///
/// Every send returns immediately; the callback fires exactly once,
/// asynchronously, carrying partition-local results. Delivery is assumed
/// reliable: once a piece is dispatched its completion eventually arrives.
pub trait Messenger: Send + Sync + 'static {
    /// Sends a read-write piece to its partition.
    fn send_handout(&self, piece: Piece, on_ack: HandoutCallback);

    /// Sends a read-only piece to its partition.
    fn send_handout_readonly(&self, piece: Piece, on_ack: HandoutRoCallback);

    /// Sends the complete aggregated graph to one partition.
    fn send_finish(
        &self,
        partition: PartitionId,
        txn_id: TxnId,
        graph: DepGraph,
        on_ack: FinishCallback,
    );
}

/// A pending finish send captured by [`MockMessenger`].
pub struct PendingFinish {
    /// Destination partition.
    pub partition: PartitionId,
    /// The finishing transaction.
    pub txn_id: TxnId,
    /// The aggregated graph that was sent.
    pub graph: DepGraph,
    /// The completion to invoke.
    pub on_ack: FinishCallback,
}

/// A mock messenger for tests.
///
/// Records every send and hands the captured completions back to the
/// test, which drives them by hand in whatever order it wants.
#[derive(Default)]
pub struct MockMessenger {
    handouts: Mutex<Vec<(Piece, HandoutCallback)>>,
    ro_handouts: Mutex<Vec<(Piece, HandoutRoCallback)>>,
    finishes: Mutex<Vec<PendingFinish>>,
}

impl MockMessenger {
    /// Creates a new mock messenger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Drains the captured read-write handouts.
    pub fn take_handouts(&self) -> Vec<(Piece, HandoutCallback)> {
        std::mem::take(&mut *self.handouts.lock())
    }

    /// Drains the captured read-only handouts.
    pub fn take_ro_handouts(&self) -> Vec<(Piece, HandoutRoCallback)> {
        std::mem::take(&mut *self.ro_handouts.lock())
    }

    /// Drains the captured finish sends.
    pub fn take_finishes(&self) -> Vec<PendingFinish> {
        std::mem::take(&mut *self.finishes.lock())
    }

    /// Number of read-write handouts currently captured.
    pub fn handout_count(&self) -> usize {
        self.handouts.lock().len()
    }

    /// Number of read-only handouts currently captured.
    pub fn ro_handout_count(&self) -> usize {
        self.ro_handouts.lock().len()
    }

    /// Number of finish sends currently captured.
    pub fn finish_count(&self) -> usize {
        self.finishes.lock().len()
    }
}

impl Messenger for MockMessenger {
    fn send_handout(&self, piece: Piece, on_ack: HandoutCallback) {
        self.handouts.lock().push((piece, on_ack));
    }

    fn send_handout_readonly(&self, piece: Piece, on_ack: HandoutRoCallback) {
        self.ro_handouts.lock().push((piece, on_ack));
    }

    fn send_finish(
        &self,
        partition: PartitionId,
        txn_id: TxnId,
        graph: DepGraph,
        on_ack: FinishCallback,
    ) {
        self.finishes.lock().push(PendingFinish {
            partition,
            txn_id,
            graph,
            on_ack,
        });
    }
}
