//! Per-transaction dependency graph with lattice-merge semantics.
//!
//! Every partition that executes a piece learns a partial view of the
//! conflicts around the owning transaction. Those partial views are merged
//! into one aggregate at the coordinator and shipped back whole, so each
//! partition can linearize commit order locally without a cross-partition
//! vote. Merging is commutative, idempotent, and monotone: fragments may
//! arrive in any order, twice, or interleaved, and converge to the same
//! final view.

use crate::types::{PartitionId, TxnId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Commit status of a transaction as known by some observer.
///
/// Statuses form a small total order and only ever advance:
/// `Started < Committing < Committed`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum TxnStatus {
    /// The transaction has dispatched at least one piece.
    #[default]
    Started,
    /// The coordinator has begun the finish fan-out.
    Committing,
    /// A partition has applied the commit.
    Committed,
}

/// One vertex of the dependency graph.
///
/// Vertices are stored by value and addressed by transaction ID; merges
/// operate by lookup-and-update, never through shared references.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxnVertex {
    /// The transaction this vertex describes.
    pub txn: TxnId,
    /// Highest status observed so far.
    pub status: TxnStatus,
    /// Partitions known to be touched by the transaction.
    pub partitions: BTreeSet<PartitionId>,
    /// Transactions this one must be ordered after.
    pub deps: BTreeSet<TxnId>,
}

impl TxnVertex {
    /// Creates a vertex in the `Started` state.
    pub fn new(txn: TxnId) -> Self {
        Self {
            txn,
            status: TxnStatus::Started,
            partitions: BTreeSet::new(),
            deps: BTreeSet::new(),
        }
    }

    /// Creates a vertex known to touch one partition.
    pub fn on_partition(txn: TxnId, partition: PartitionId) -> Self {
        let mut vertex = Self::new(txn);
        vertex.partitions.insert(partition);
        vertex
    }

    /// Advances the status to `status` if it is higher; never downgrades.
    pub fn advance_status(&mut self, status: TxnStatus) {
        if status > self.status {
            self.status = status;
        }
    }

    /// Absorbs another view of the same vertex.
    fn absorb(&mut self, other: &TxnVertex) {
        debug_assert_eq!(self.txn, other.txn);
        self.advance_status(other.status);
        self.partitions.extend(other.partitions.iter().copied());
        self.deps.extend(other.deps.iter().copied());
    }
}

/// A dependency graph: transaction ID to vertex.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepGraph {
    vertices: BTreeMap<TxnId, TxnVertex>,
}

impl DepGraph {
    /// Creates an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up a vertex.
    pub fn vertex(&self, txn: TxnId) -> Option<&TxnVertex> {
        self.vertices.get(&txn)
    }

    /// Looks up a vertex for in-place update.
    pub fn vertex_mut(&mut self, txn: TxnId) -> Option<&mut TxnVertex> {
        self.vertices.get_mut(&txn)
    }

    /// Inserts or replaces a vertex.
    pub fn insert(&mut self, vertex: TxnVertex) {
        self.vertices.insert(vertex.txn, vertex);
    }

    /// Returns the vertex for `txn`, inserting a fresh one if absent.
    pub fn ensure(&mut self, txn: TxnId) -> &mut TxnVertex {
        self.vertices.entry(txn).or_insert_with(|| TxnVertex::new(txn))
    }

    /// Merges another (possibly partial) graph into this one.
    ///
    /// For each incoming vertex: absent locally, it is inserted by value;
    /// present, the local vertex's partition and dependency sets are
    /// unioned and its status advanced to the maximum of the two. Merge
    /// never removes an edge, never downgrades a status, and is idempotent
    /// and commutative.
    pub fn merge(&mut self, other: &DepGraph) {
        for (txn, vertex) in &other.vertices {
            match self.vertices.get_mut(txn) {
                Some(local) => local.absorb(vertex),
                None => {
                    self.vertices.insert(*txn, vertex.clone());
                }
            }
        }
    }

    /// Returns the number of vertices.
    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    /// Returns true if the graph has no vertices.
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Removes all vertices.
    pub fn clear(&mut self) {
        self.vertices.clear();
    }

    /// Iterates over vertices in transaction-ID order.
    pub fn iter(&self) -> impl Iterator<Item = &TxnVertex> {
        self.vertices.values()
    }
}
