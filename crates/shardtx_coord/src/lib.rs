//! # shardtx coordinator
//!
//! A partition-aware distributed transaction coordinator built on a
//! dependency-graph commit protocol.
//!
//! A client transaction is decomposed by a registered chopper into
//! partition-bound pieces. The coordinator fans ready pieces out, merges
//! the partial dependency graphs returned by each ack into one aggregate,
//! and ships the aggregate to every touched partition so each linearizes
//! commit order locally; there is no leader and no cross-partition vote.
//! A transaction whose aggregate never grows beyond its own vertex may
//! reply to the caller before the commit/finish phases complete.
//!
//! This crate provides:
//! - [`Coordinator`], the phase/generation state machine
//! - [`Messenger`], the asynchronous messaging seam (plus a
//!   [`MockMessenger`] for tests)
//! - [`CommandGraph`] and [`PieceSet`], the chopper output contract
//! - [`CommitLog`], the optional durability gate for dispatch fan-out
//! - [`CoordStats`], atomic telemetry counters

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod command;
mod config;
mod coordinator;
mod error;
mod messenger;
mod recorder;
mod stats;

pub use command::{
    ChopperFn, CommandGraph, PieceSet, PieceSpec, ReplyStatus, TxnCallback, TxnRegistry,
    TxnReply, TxnRequest,
};
pub use config::CoordConfig;
pub use coordinator::{Coordinator, Phase};
pub use error::{CoordError, CoordResult};
pub use messenger::{
    FinishCallback, HandoutCallback, HandoutRoCallback, Messenger, MockMessenger, PendingFinish,
};
pub use recorder::{CommitLog, DurableCallback, MemoryCommitLog};
pub use stats::{CoordStats, StatsSnapshot};
