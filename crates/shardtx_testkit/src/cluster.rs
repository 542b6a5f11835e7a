//! An in-process simulated cluster.
//!
//! Partitions execute pieces against a [`VersionedStore`], discover
//! dependencies through last-accessor tracking, and mirror the dependency
//! graph server-side. Message delivery is synchronous on the calling
//! thread; the coordinator performs sends outside its critical section,
//! so this is safe and keeps tests deterministic.

use crate::backend::VersionedStore;
use parking_lot::Mutex;
use shardtx_coord::{
    FinishCallback, HandoutCallback, HandoutRoCallback, Messenger,
};
use shardtx_protocol::{
    ConcurrencyControl, DepGraph, ExecStatus, FinishAck, HandoutAck, HandoutRoAck, InnerId,
    PartitionId, Piece, PieceOutput, RecordId, TxnId, TxnStatus, TxnVertex,
};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// One simulated partition.
pub struct SimPartition {
    id: PartitionId,
    store: VersionedStore,
    graph: Mutex<DepGraph>,
    last_touch: Mutex<BTreeMap<RecordId, TxnId>>,
    outputs: Mutex<BTreeMap<TxnId, BTreeMap<InnerId, PieceOutput>>>,
}

impl SimPartition {
    fn new(id: PartitionId) -> Self {
        Self {
            id,
            store: VersionedStore::new(),
            graph: Mutex::new(DepGraph::new()),
            last_touch: Mutex::new(BTreeMap::new()),
            outputs: Mutex::new(BTreeMap::new()),
        }
    }

    /// The partition's backing store.
    pub fn store(&self) -> &VersionedStore {
        &self.store
    }

    /// Size of the partition's mirrored dependency graph.
    pub fn graph_len(&self) -> usize {
        self.graph.lock().len()
    }

    /// Executes a read-write piece and builds its ack: outputs plus the
    /// partial dependency graph this partition learned.
    pub fn handle_handout(&self, mut piece: Piece) -> HandoutAck {
        let status = self.store.prepare(piece.root_id);
        piece.output = self.store.execute(&piece);

        // conflicts: whoever touched each record before us must be
        // ordered somewhere relative to this transaction
        let mut deps = BTreeSet::new();
        {
            let mut last = self.last_touch.lock();
            for record in VersionedStore::touched_records(&piece) {
                if let Some(prev) = last.insert(record, piece.root_id) {
                    if prev != piece.root_id {
                        deps.insert(prev);
                    }
                }
            }
        }

        let mut graph = self.graph.lock();
        let root_vertex = {
            let root = graph.ensure(piece.root_id);
            root.partitions.insert(self.id);
            root.deps.extend(deps.iter().copied());
            root.clone()
        };
        let mut fragment = DepGraph::new();
        fragment.insert(root_vertex);
        for dep in &deps {
            match graph.vertex(*dep) {
                Some(vertex) => fragment.insert(vertex.clone()),
                None => fragment.insert(TxnVertex::on_partition(*dep, self.id)),
            }
        }

        self.outputs
            .lock()
            .entry(piece.root_id)
            .or_default()
            .insert(piece.inner_id, piece.output.clone());

        HandoutAck {
            status,
            piece,
            graph: fragment,
        }
    }

    /// Executes a read-only piece: outputs plus the observed versions.
    /// Read-only pieces never touch the dependency graph.
    pub fn handle_handout_ro(&self, mut piece: Piece) -> HandoutRoAck {
        piece.output = self.store.execute(&piece);
        let versions = self.store.observed_versions(&piece);
        HandoutRoAck {
            status: ExecStatus::Success,
            piece,
            versions,
        }
    }

    /// Applies a finish: merges the aggregate graph, commits the
    /// transaction's buffered writes, and returns the outputs of the
    /// pieces this partition executed.
    ///
    /// The simulation applies commits in arrival order; real backends
    /// would linearize from the graph's edges before applying.
    pub fn handle_finish(&self, txn: TxnId, graph: &DepGraph) -> FinishAck {
        {
            let mut local = self.graph.lock();
            local.merge(graph);
            if let Some(vertex) = local.vertex_mut(txn) {
                vertex.advance_status(TxnStatus::Committed);
            }
        }
        self.store.commit(txn);
        let outputs = self.outputs.lock().remove(&txn).unwrap_or_default();
        FinishAck {
            status: ExecStatus::Success,
            outputs,
        }
    }
}

/// A set of simulated partitions reachable through the messenger seam.
pub struct SimCluster {
    partitions: BTreeMap<PartitionId, Arc<SimPartition>>,
}

impl SimCluster {
    /// Creates a cluster of `n` partitions with IDs `0..n`.
    pub fn new(n: u32) -> Self {
        let partitions = (0..n)
            .map(|id| {
                let id = PartitionId::new(id);
                (id, Arc::new(SimPartition::new(id)))
            })
            .collect();
        Self { partitions }
    }

    /// Returns one partition.
    ///
    /// # Panics
    ///
    /// Panics if the partition does not exist; the cluster size is fixed
    /// at construction.
    pub fn partition(&self, id: PartitionId) -> Arc<SimPartition> {
        Arc::clone(
            self.partitions
                .get(&id)
                .unwrap_or_else(|| panic!("no such partition: {id}")),
        )
    }
}

impl Messenger for SimCluster {
    fn send_handout(&self, piece: Piece, on_ack: HandoutCallback) {
        let ack = self.partition(piece.partition).handle_handout(piece);
        on_ack(ack);
    }

    fn send_handout_readonly(&self, piece: Piece, on_ack: HandoutRoCallback) {
        let ack = self.partition(piece.partition).handle_handout_ro(piece);
        on_ack(ack);
    }

    fn send_finish(
        &self,
        partition: PartitionId,
        txn_id: TxnId,
        graph: DepGraph,
        on_ack: FinishCallback,
    ) {
        let ack = self.partition(partition).handle_finish(txn_id, &graph);
        on_ack(ack);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{ops_to_input, TestOp};
    use shardtx_codec::Value;

    fn piece(txn: u64, partition: u32, ops: &[TestOp]) -> Piece {
        let mut piece = Piece::new(
            TxnId::new(txn),
            InnerId::new(0),
            PartitionId::new(partition),
            ops_to_input(ops),
        );
        piece.root_id = TxnId::new(txn);
        piece
    }

    #[test]
    fn first_touch_has_no_dependencies() {
        let cluster = SimCluster::new(1);
        let partition = cluster.partition(PartitionId::new(0));

        let ack = partition.handle_handout(piece(
            1,
            0,
            &[TestOp::Write(RecordId::new(7), Value::Integer(1))],
        ));
        assert_eq!(ack.status, ExecStatus::Success);
        assert_eq!(ack.graph.len(), 1);
        let vertex = ack.graph.vertex(TxnId::new(1)).unwrap();
        assert!(vertex.partitions.contains(&PartitionId::new(0)));
        assert!(vertex.deps.is_empty());
    }

    #[test]
    fn conflicting_access_is_discovered() {
        let cluster = SimCluster::new(1);
        let partition = cluster.partition(PartitionId::new(0));

        partition.handle_handout(piece(
            1,
            0,
            &[TestOp::Write(RecordId::new(7), Value::Integer(1))],
        ));
        let ack = partition.handle_handout(piece(
            3,
            0,
            &[TestOp::Write(RecordId::new(7), Value::Integer(2))],
        ));

        // the fragment names both transactions and the edge between them
        assert_eq!(ack.graph.len(), 2);
        let vertex = ack.graph.vertex(TxnId::new(3)).unwrap();
        assert!(vertex.deps.contains(&TxnId::new(1)));
    }

    #[test]
    fn finish_commits_and_returns_outputs() {
        let cluster = SimCluster::new(1);
        let partition = cluster.partition(PartitionId::new(0));
        partition.store().seed(RecordId::new(4), Value::Integer(5));

        let ack = partition.handle_handout(piece(
            1,
            0,
            &[
                TestOp::Read(RecordId::new(4)),
                TestOp::Write(RecordId::new(4), Value::Integer(6)),
            ],
        ));
        assert_eq!(ack.piece.output[&0], Value::Integer(5));

        let finish = partition.handle_finish(TxnId::new(1), &ack.graph);
        assert_eq!(finish.outputs[&InnerId::new(0)][&0], Value::Integer(5));
        assert_eq!(
            partition.store().value(RecordId::new(4)),
            Some(Value::Integer(6))
        );
        // the partition's mirror marks the transaction committed
        assert_eq!(
            partition
                .graph
                .lock()
                .vertex(TxnId::new(1))
                .unwrap()
                .status,
            TxnStatus::Committed
        );
    }
}
