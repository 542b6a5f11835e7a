//! # shardtx protocol
//!
//! Protocol data model shared by the coordinator and partitions.
//!
//! This crate provides:
//! - Identifier newtypes for transactions, pieces, and partitions
//! - [`Piece`], the unit of work dispatched to one partition
//! - [`DepGraph`], the per-transaction conflict record with lattice-merge
//!   semantics (commutative, idempotent, monotone)
//! - Ack payloads exchanged between partitions and the coordinator
//! - [`OptionSet`], the versioned-option wire structure used by the
//!   option-based commit variant
//! - The [`ConcurrencyControl`] contract implemented by partition-local
//!   execution backends

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod graph;
mod messages;
mod option_set;
mod piece;
mod types;

pub use backend::ConcurrencyControl;
pub use graph::{DepGraph, TxnStatus, TxnVertex};
pub use messages::{ExecStatus, FinishAck, HandoutAck, HandoutRoAck, VersionMap};
pub use option_set::{OptionSet, WriteOption};
pub use piece::{Piece, PieceInput, PieceOutput};
pub use types::{
    InnerId, PartitionId, PieceId, RecordId, TxnId, TxnType, VarId, Version,
};
