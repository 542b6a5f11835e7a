//! The coordinator state machine.
//!
//! One coordinator instance drives one client transaction at a time
//! through dispatch, commit, and finish: ready pieces fan out to their
//! partitions, each ack returns a partial dependency graph, the fragments
//! merge into one aggregate, and the aggregate is shipped back to every
//! touched partition so each can linearize commit order locally. A
//! transaction whose aggregate never grows past its own vertex may reply
//! to the caller before the finish phase completes.
//!
//! Entry points serialize on one mutex scoped to the whole mutation.
//! Outbound work (sends, replies) is queued under the lock and performed
//! after release, so a messenger that completes synchronously on the
//! calling thread cannot deadlock the coordinator.

use crate::command::{CommandGraph, ReplyStatus, TxnCallback, TxnRegistry, TxnReply, TxnRequest};
use crate::config::CoordConfig;
use crate::error::{CoordError, CoordResult};
use crate::messenger::Messenger;
use crate::recorder::CommitLog;
use crate::stats::{CoordStats, StatsSnapshot};
use parking_lot::Mutex;
use shardtx_codec::WireEncoder;
use shardtx_protocol::{
    DepGraph, FinishAck, HandoutAck, HandoutRoAck, InnerId, PartitionId, PieceId, PieceOutput,
    TxnId, TxnStatus, TxnType, VersionMap,
};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Instant;
use tracing::{debug, warn};

/// Protocol phase of the in-flight transaction.
///
/// The cycle is fixed: Init, one or more Dispatch rounds, Commit, and an
/// explicit end step wrapping back to Init. No phase may be skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No work dispatched yet.
    Init,
    /// Pieces are in flight; handout acks are being aggregated.
    Dispatch,
    /// The finish fan-out is draining.
    Commit,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Init => write!(f, "init"),
            Phase::Dispatch => write!(f, "dispatch"),
            Phase::Commit => write!(f, "commit"),
        }
    }
}

/// Identity of an outstanding completion.
///
/// Captured at send time; a completion whose generation no longer matches
/// is a harmless straggler and is dropped, while a matching generation
/// with a mismatched phase is a protocol violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CallbackToken {
    generation: u64,
    phase: Phase,
}

/// Read-write working state: the aggregate graph and round bookkeeping.
struct ReadWriteState {
    graph: DepGraph,
    /// Pending/acknowledged flag per piece of the current round.
    handout_acks: BTreeMap<InnerId, bool>,
    n_handout: u64,
    n_handout_ack: u64,
    /// Still eligible to reply before finish completes.
    early_return: bool,
    finish_acked: BTreeSet<PartitionId>,
}

impl ReadWriteState {
    fn new(early_return: bool) -> Self {
        Self {
            graph: DepGraph::new(),
            handout_acks: BTreeMap::new(),
            n_handout: 0,
            n_handout_ack: 0,
            early_return,
            finish_acked: BTreeSet::new(),
        }
    }
}

/// Read-only working state: version snapshots and round bookkeeping.
#[derive(Default)]
struct ReadOnlyState {
    handout_acks: BTreeMap<InnerId, bool>,
    n_handout: u64,
    n_handout_ack: u64,
    last_vers: VersionMap,
    curr_vers: VersionMap,
    rounds: u32,
}

/// Mode-specific state, chosen once at submit time.
enum TxnMode {
    ReadWrite(ReadWriteState),
    ReadOnly(ReadOnlyState),
}

/// Aggregate state for the in-flight transaction.
struct ActiveTxn {
    txn_id: TxnId,
    root_id: TxnId,
    txn_type: TxnType,
    started_at: Instant,
    cmd: Box<dyn CommandGraph>,
    partitions: BTreeSet<PartitionId>,
    outputs: BTreeMap<InnerId, PieceOutput>,
    callback: Option<TxnCallback>,
    replied: bool,
    mode: TxnMode,
}

struct CoordState {
    generation: u64,
    phase: Phase,
    active: Option<ActiveTxn>,
}

/// Work queued under the lock, performed after release.
enum Outbound {
    Reply {
        cb: TxnCallback,
        result: CoordResult<TxnReply>,
    },
    Handout {
        piece: shardtx_protocol::Piece,
        token: CallbackToken,
    },
    HandoutRo {
        piece: shardtx_protocol::Piece,
        token: CallbackToken,
    },
    Finish {
        partition: PartitionId,
        txn_id: TxnId,
        graph: DepGraph,
        token: CallbackToken,
    },
    Log {
        record: Vec<u8>,
        token: CallbackToken,
    },
}

/// Progress made by applying one ack.
enum AckProgress {
    /// More acks of this round are still outstanding.
    Pending,
    /// The ack unblocked further ready pieces.
    MoreReady,
    /// Every outstanding piece of the round is acknowledged.
    RoundComplete,
    /// The backend rejected the piece; the transaction aborts.
    Rejected,
}

/// The dependency-graph transaction coordinator.
///
/// Construct with [`Coordinator::new`] and call [`Coordinator::submit`].
/// Completions arriving from the messenger are routed back into the
/// instance automatically.
pub struct Coordinator<M: Messenger> {
    config: CoordConfig,
    messenger: Arc<M>,
    registry: Arc<TxnRegistry>,
    commit_log: Option<Arc<dyn CommitLog>>,
    stats: Arc<CoordStats>,
    next_txn_id: AtomicU64,
    next_piece_id: AtomicU64,
    state: Mutex<CoordState>,
    /// Handle to ourselves for binding completions at send time.
    self_ref: Weak<Coordinator<M>>,
}

impl<M: Messenger> Coordinator<M> {
    /// Creates a new coordinator.
    pub fn new(
        config: CoordConfig,
        messenger: Arc<M>,
        registry: Arc<TxnRegistry>,
    ) -> Arc<Self> {
        Self::build(config, messenger, registry, None)
    }

    /// Creates a coordinator whose dispatch fan-out is gated on durable
    /// acceptance of a begin record in the given log.
    pub fn with_commit_log(
        config: CoordConfig,
        messenger: Arc<M>,
        registry: Arc<TxnRegistry>,
        log: Arc<dyn CommitLog>,
    ) -> Arc<Self> {
        Self::build(config, messenger, registry, Some(log))
    }

    fn build(
        config: CoordConfig,
        messenger: Arc<M>,
        registry: Arc<TxnRegistry>,
        commit_log: Option<Arc<dyn CommitLog>>,
    ) -> Arc<Self> {
        let txn_id_base = config.txn_id_base;
        Arc::new_cyclic(|weak| Self {
            config,
            messenger,
            registry,
            commit_log,
            stats: Arc::new(CoordStats::new()),
            next_txn_id: AtomicU64::new(txn_id_base),
            next_piece_id: AtomicU64::new(1),
            state: Mutex::new(CoordState {
                generation: 0,
                phase: Phase::Init,
                active: None,
            }),
            self_ref: weak.clone(),
        })
    }

    /// Returns a snapshot of the coordinator counters.
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Returns the configuration.
    pub fn config(&self) -> &CoordConfig {
        &self.config
    }

    /// Submits a transaction.
    ///
    /// The chopper registered for the request's type decomposes it into
    /// pieces; the callback is invoked exactly once with the final
    /// outcome (possibly before the finish phase completes, if no
    /// cross-transaction dependency is discovered).
    ///
    /// # Errors
    ///
    /// Returns [`CoordError::Busy`] while a transaction is in flight and
    /// [`CoordError::UnknownTxnType`] for an unregistered type. Failures
    /// after acceptance are delivered through the callback.
    pub fn submit(&self, request: TxnRequest, callback: TxnCallback) -> CoordResult<TxnId> {
        let mut out = Vec::new();
        let txn_id;
        {
            let mut state = self.state.lock();
            if state.active.is_some() {
                return Err(CoordError::Busy);
            }
            let chopper =
                self.registry
                    .chopper(request.txn_type)
                    .ok_or(CoordError::UnknownTxnType {
                        txn_type: request.txn_type,
                    })?;
            let cmd = chopper(&request);

            txn_id = TxnId::new(self.next_txn_id.fetch_add(1, Ordering::SeqCst));
            let root_id = TxnId::new(self.next_txn_id.fetch_add(1, Ordering::SeqCst));

            state.generation += 1;
            state.phase = Phase::Init;
            self.stats.record_start();

            let read_only = cmd.is_read_only();
            let partitions = cmd.partitions();
            let mode = if read_only {
                TxnMode::ReadOnly(ReadOnlyState::default())
            } else {
                TxnMode::ReadWrite(ReadWriteState::new(self.config.early_return))
            };
            debug!(
                txn = %txn_id,
                ty = %request.txn_type,
                read_only,
                pieces = cmd.piece_count(),
                "transaction submitted"
            );
            state.active = Some(ActiveTxn {
                txn_id,
                root_id,
                txn_type: request.txn_type,
                started_at: Instant::now(),
                cmd,
                partitions,
                outputs: BTreeMap::new(),
                callback: Some(callback),
                replied: false,
                mode,
            });

            if let Err(err) = self.advance_phase(&mut state, &mut out) {
                self.fail_active(&mut state, err, &mut out);
            }
        }
        self.perform(out);
        Ok(txn_id)
    }

    // ---- phase machinery ----

    /// The transition function: Init -> Dispatch -> Commit -> Init, with
    /// pre-dispatch, finish, and end running at the corresponding edges.
    fn advance_phase(&self, state: &mut CoordState, out: &mut Vec<Outbound>) -> CoordResult<()> {
        match state.phase {
            Phase::Init => {
                state.phase = Phase::Dispatch;
                self.pre_dispatch(state, out)
            }
            Phase::Dispatch => {
                state.phase = Phase::Commit;
                self.finish(state, out)
            }
            Phase::Commit => {
                state.phase = Phase::Init;
                self.end(state, out)
            }
        }
    }

    fn token(&self, state: &CoordState) -> CallbackToken {
        CallbackToken {
            generation: state.generation,
            phase: state.phase,
        }
    }

    /// Validates a completion's token. Stragglers from a previous
    /// generation are dropped; a same-generation phase mismatch fails
    /// the transaction.
    fn check_token(
        &self,
        state: &mut CoordState,
        token: CallbackToken,
        out: &mut Vec<Outbound>,
    ) -> bool {
        if token.generation != state.generation {
            debug!(
                sent = token.generation,
                current = state.generation,
                "dropping completion from a previous generation"
            );
            return false;
        }
        if token.phase != state.phase {
            let err = CoordError::StaleCallback {
                sent_in: token.phase.to_string(),
                current: state.phase.to_string(),
            };
            self.fail_active(state, err, out);
            return false;
        }
        true
    }

    /// Chooses the dispatch path and, if a commit log is configured,
    /// gates it on durable acceptance of a begin record.
    fn pre_dispatch(&self, state: &mut CoordState, out: &mut Vec<Outbound>) -> CoordResult<()> {
        if self.commit_log.is_some() {
            let token = self.token(state);
            let active = state
                .active
                .as_ref()
                .ok_or_else(|| CoordError::internal("no active transaction"))?;
            let mut enc = WireEncoder::with_capacity(20);
            enc.put_u64(active.txn_id.as_u64());
            enc.put_u64(active.root_id.as_u64());
            enc.put_u32(active.txn_type.as_u32());
            debug!(txn = %active.txn_id, "submitting begin record before fan-out");
            out.push(Outbound::Log {
                record: enc.into_bytes().to_vec(),
                token,
            });
            Ok(())
        } else {
            self.dispatch_any(state, out)
        }
    }

    fn dispatch_any(&self, state: &mut CoordState, out: &mut Vec<Outbound>) -> CoordResult<()> {
        let read_only = match &state
            .active
            .as_ref()
            .ok_or_else(|| CoordError::internal("no active transaction"))?
            .mode
        {
            TxnMode::ReadOnly(_) => true,
            TxnMode::ReadWrite(_) => false,
        };
        if read_only {
            self.dispatch_ro(state, out)
        } else {
            self.dispatch(state, out)
        }
    }

    /// Sends every currently-ready, not-yet-dispatched piece. Reentrant:
    /// called again whenever an ack unblocks dependents.
    fn dispatch(&self, state: &mut CoordState, out: &mut Vec<Outbound>) -> CoordResult<()> {
        let token = self.token(state);
        let active = state
            .active
            .as_mut()
            .ok_or_else(|| CoordError::internal("no active transaction"))?;
        let ActiveTxn {
            txn_id,
            root_id,
            cmd,
            mode,
            ..
        } = active;
        let TxnMode::ReadWrite(rw) = mode else {
            return Err(CoordError::internal(
                "read-write dispatch on a read-only transaction",
            ));
        };
        while cmd.has_more_ready() {
            let Some(mut piece) = cmd.next_ready() else {
                break;
            };
            piece.root_id = *root_id;
            piece.piece_id = PieceId::new(self.next_piece_id.fetch_add(1, Ordering::SeqCst));
            rw.handout_acks.insert(piece.inner_id, false);
            rw.n_handout += 1;
            self.stats.record_piece_dispatched();
            debug!(
                txn = %txn_id,
                piece = %piece.piece_id,
                inner = %piece.inner_id,
                partition = %piece.partition,
                sent = rw.n_handout,
                "dispatching piece"
            );
            out.push(Outbound::Handout { piece, token });
        }
        Ok(())
    }

    /// Applies one read-write dispatch ack.
    fn apply_dispatch_ack(
        &self,
        state: &mut CoordState,
        ack: HandoutAck,
    ) -> CoordResult<AckProgress> {
        let active = state
            .active
            .as_mut()
            .ok_or_else(|| CoordError::internal("no active transaction"))?;
        let root = active.root_id;
        let ActiveTxn {
            txn_id,
            cmd,
            mode,
            outputs,
            ..
        } = active;
        let TxnMode::ReadWrite(rw) = mode else {
            return Err(CoordError::internal(
                "read-write ack for a read-only transaction",
            ));
        };

        let inner = ack.piece.inner_id;
        let acked = rw
            .handout_acks
            .get_mut(&inner)
            .ok_or(CoordError::UnknownPieceAck { inner })?;
        if *acked {
            return Err(CoordError::DuplicateAck { inner });
        }
        if ack.graph.is_empty() {
            return Err(CoordError::EmptyGraph);
        }
        let fragment_root =
            ack.graph
                .vertex(root)
                .ok_or(CoordError::ForeignFragment {
                    txn: root,
                    partition: ack.piece.partition,
                })?;
        if !fragment_root.partitions.contains(&ack.piece.partition) {
            return Err(CoordError::ForeignFragment {
                txn: root,
                partition: ack.piece.partition,
            });
        }

        *acked = true;
        rw.n_handout_ack += 1;
        debug!(
            txn = %txn_id,
            inner = %inner,
            acked = rw.n_handout_ack,
            sent = rw.n_handout,
            fragment = ack.graph.len(),
            "dispatch ack"
        );

        if !ack.status.is_success() {
            return Ok(AckProgress::Rejected);
        }

        rw.graph.merge(&ack.graph);
        if rw.graph.len() > 1 && rw.early_return {
            debug!(
                txn = %txn_id,
                size = rw.graph.len(),
                "cross-transaction dependency discovered; early return disabled"
            );
            rw.early_return = false;
        }

        cmd.merge_output(&ack.piece);
        outputs.insert(inner, ack.piece.output.clone());

        if cmd.has_more_ready() {
            Ok(AckProgress::MoreReady)
        } else if rw.n_handout_ack == rw.n_handout {
            Ok(AckProgress::RoundComplete)
        } else {
            Ok(AckProgress::Pending)
        }
    }

    fn on_dispatch_ack(&self, token: CallbackToken, ack: HandoutAck) {
        let mut out = Vec::new();
        {
            let mut state = self.state.lock();
            if self.check_token(&mut state, token, &mut out) {
                match self.apply_dispatch_ack(&mut state, ack) {
                    Err(err) => self.fail_active(&mut state, err, &mut out),
                    Ok(AckProgress::Rejected) => self.abort_active(&mut state, &mut out),
                    Ok(AckProgress::MoreReady) => {
                        if let Err(err) = self.dispatch(&mut state, &mut out) {
                            self.fail_active(&mut state, err, &mut out);
                        }
                    }
                    Ok(AckProgress::RoundComplete) => {
                        if let Err(err) = self.complete_dispatch_round(&mut state, &mut out) {
                            self.fail_active(&mut state, err, &mut out);
                        }
                    }
                    Ok(AckProgress::Pending) => {}
                }
            }
        }
        self.perform(out);
    }

    /// All outstanding pieces of the final round are acknowledged:
    /// advance into the commit phase and, if still eligible, reply to
    /// the caller before the finish sends go out.
    fn complete_dispatch_round(
        &self,
        state: &mut CoordState,
        out: &mut Vec<Outbound>,
    ) -> CoordResult<()> {
        let early = match &state
            .active
            .as_ref()
            .ok_or_else(|| CoordError::internal("no active transaction"))?
            .mode
        {
            TxnMode::ReadWrite(rw) => rw.early_return,
            TxnMode::ReadOnly(_) => false,
        };
        self.advance_phase(state, out)?;
        if early {
            let active = state
                .active
                .as_mut()
                .ok_or_else(|| CoordError::internal("no active transaction"))?;
            if !active.replied {
                active.replied = true;
                self.stats.record_early_return();
                let reply = Self::build_reply(active, ReplyStatus::Committed);
                if let Some(cb) = active.callback.take() {
                    debug!(txn = %active.txn_id, "early return: replying before finish completes");
                    // the reply must be observable before any finish ack
                    out.insert(0, Outbound::Reply {
                        cb,
                        result: Ok(reply),
                    });
                }
            }
        }
        Ok(())
    }

    /// Marks the root vertex committing and fans the aggregate graph out
    /// to every touched partition.
    fn finish(&self, state: &mut CoordState, out: &mut Vec<Outbound>) -> CoordResult<()> {
        let token = self.token(state);
        let active = state
            .active
            .as_mut()
            .ok_or_else(|| CoordError::internal("no active transaction"))?;
        let ActiveTxn {
            txn_id,
            root_id,
            partitions,
            mode,
            ..
        } = active;
        let TxnMode::ReadWrite(rw) = mode else {
            return Err(CoordError::internal(
                "read-only transaction entered the commit phase",
            ));
        };
        if rw.graph.is_empty() {
            return Err(CoordError::EmptyGraph);
        }
        let vertex = rw
            .graph
            .vertex_mut(*root_id)
            .ok_or_else(|| CoordError::internal("aggregate graph lost the root vertex"))?;
        vertex.advance_status(TxnStatus::Committing);
        if vertex.partitions != *partitions {
            return Err(CoordError::PartitionSetMismatch {
                expected: partitions.len(),
                actual: vertex.partitions.len(),
            });
        }
        debug!(
            txn = %txn_id,
            partitions = partitions.len(),
            size = rw.graph.len(),
            "finish fan-out"
        );
        for &partition in partitions.iter() {
            out.push(Outbound::Finish {
                partition,
                txn_id: *root_id,
                graph: rw.graph.clone(),
                token,
            });
        }
        Ok(())
    }

    fn on_finish_ack(&self, token: CallbackToken, partition: PartitionId, ack: FinishAck) {
        let mut out = Vec::new();
        {
            let mut state = self.state.lock();
            if self.check_token(&mut state, token, &mut out) {
                match self.apply_finish_ack(&mut state, partition, ack) {
                    Err(err) => self.fail_active(&mut state, err, &mut out),
                    Ok(false) => {}
                    Ok(true) => {
                        // all partitions acknowledged: end the cycle
                        if let Err(err) = self.advance_phase(&mut state, &mut out) {
                            self.fail_active(&mut state, err, &mut out);
                        } else {
                            self.clear_active(&mut state);
                        }
                    }
                }
            }
        }
        self.perform(out);
    }

    /// Applies one finish ack; returns true once every touched partition
    /// has acknowledged.
    fn apply_finish_ack(
        &self,
        state: &mut CoordState,
        partition: PartitionId,
        ack: FinishAck,
    ) -> CoordResult<bool> {
        let active = state
            .active
            .as_mut()
            .ok_or_else(|| CoordError::internal("no active transaction"))?;
        let ActiveTxn {
            txn_id,
            partitions,
            outputs,
            mode,
            ..
        } = active;
        let TxnMode::ReadWrite(rw) = mode else {
            return Err(CoordError::internal(
                "finish ack for a read-only transaction",
            ));
        };
        if !rw.finish_acked.insert(partition) {
            return Err(CoordError::DuplicateFinishAck { partition });
        }
        if !ack.status.is_success() {
            warn!(txn = %txn_id, %partition, "partition reported failure on finish");
        }
        outputs.extend(ack.outputs);
        debug!(
            txn = %txn_id,
            %partition,
            acked = rw.finish_acked.len(),
            total = partitions.len(),
            "finish ack"
        );
        Ok(rw.finish_acked.len() == partitions.len())
    }

    /// Builds the final reply, records latency, and invokes the caller's
    /// completion exactly once. After an early return this only records
    /// completion; the callback is already spent.
    fn end(&self, state: &mut CoordState, out: &mut Vec<Outbound>) -> CoordResult<()> {
        let active = state
            .active
            .as_mut()
            .ok_or_else(|| CoordError::internal("no active transaction"))?;
        let latency = active.started_at.elapsed();
        self.stats.record_commit(latency);
        if let Some(cb) = active.callback.take() {
            let reply = Self::build_reply(active, ReplyStatus::Committed);
            debug!(txn = %active.txn_id, ?latency, "transaction complete");
            out.push(Outbound::Reply {
                cb,
                result: Ok(reply),
            });
        } else {
            debug!(txn = %active.txn_id, ?latency, "finish drained after early return");
        }
        active.replied = true;
        Ok(())
    }

    // ---- read-only path ----

    /// Sends every ready read-only piece of the current round.
    fn dispatch_ro(&self, state: &mut CoordState, out: &mut Vec<Outbound>) -> CoordResult<()> {
        let token = self.token(state);
        let active = state
            .active
            .as_mut()
            .ok_or_else(|| CoordError::internal("no active transaction"))?;
        let ActiveTxn {
            txn_id,
            root_id,
            cmd,
            mode,
            ..
        } = active;
        let TxnMode::ReadOnly(ro) = mode else {
            return Err(CoordError::internal(
                "read-only dispatch on a read-write transaction",
            ));
        };
        while cmd.has_more_ready() {
            let Some(mut piece) = cmd.next_ready() else {
                break;
            };
            piece.root_id = *root_id;
            piece.piece_id = PieceId::new(self.next_piece_id.fetch_add(1, Ordering::SeqCst));
            ro.handout_acks.insert(piece.inner_id, false);
            ro.n_handout += 1;
            self.stats.record_piece_dispatched();
            debug!(
                txn = %txn_id,
                piece = %piece.piece_id,
                inner = %piece.inner_id,
                partition = %piece.partition,
                "dispatching read-only piece"
            );
            out.push(Outbound::HandoutRo { piece, token });
        }
        Ok(())
    }

    fn on_ro_ack(&self, token: CallbackToken, ack: HandoutRoAck) {
        let mut out = Vec::new();
        {
            let mut state = self.state.lock();
            if self.check_token(&mut state, token, &mut out) {
                match self.apply_ro_ack(&mut state, ack) {
                    Err(err) => self.fail_active(&mut state, err, &mut out),
                    Ok(AckProgress::Rejected) => self.abort_active(&mut state, &mut out),
                    Ok(AckProgress::MoreReady) => {
                        if let Err(err) = self.dispatch_ro(&mut state, &mut out) {
                            self.fail_active(&mut state, err, &mut out);
                        }
                    }
                    Ok(AckProgress::RoundComplete) => {
                        if let Err(err) = self.complete_ro_round(&mut state, &mut out) {
                            self.fail_active(&mut state, err, &mut out);
                        }
                    }
                    Ok(AckProgress::Pending) => {}
                }
            }
        }
        self.perform(out);
    }

    /// Applies one read-only ack: fold outputs, accumulate the observed
    /// version snapshot.
    fn apply_ro_ack(
        &self,
        state: &mut CoordState,
        ack: HandoutRoAck,
    ) -> CoordResult<AckProgress> {
        let active = state
            .active
            .as_mut()
            .ok_or_else(|| CoordError::internal("no active transaction"))?;
        let ActiveTxn {
            txn_id,
            cmd,
            mode,
            outputs,
            ..
        } = active;
        let TxnMode::ReadOnly(ro) = mode else {
            return Err(CoordError::internal(
                "read-only ack for a read-write transaction",
            ));
        };

        let inner = ack.piece.inner_id;
        let acked = ro
            .handout_acks
            .get_mut(&inner)
            .ok_or(CoordError::UnknownPieceAck { inner })?;
        if *acked {
            return Err(CoordError::DuplicateAck { inner });
        }
        *acked = true;
        ro.n_handout_ack += 1;
        debug!(
            txn = %txn_id,
            inner = %inner,
            acked = ro.n_handout_ack,
            sent = ro.n_handout,
            "read-only dispatch ack"
        );

        if !ack.status.is_success() {
            return Ok(AckProgress::Rejected);
        }

        cmd.merge_output(&ack.piece);
        outputs.insert(inner, ack.piece.output.clone());
        ro.curr_vers.extend(ack.versions);

        if cmd.has_more_ready() {
            Ok(AckProgress::MoreReady)
        } else if ro.n_handout_ack == ro.n_handout {
            Ok(AckProgress::RoundComplete)
        } else {
            Ok(AckProgress::Pending)
        }
    }

    /// A full read-only round is acknowledged: compare snapshots and
    /// either reply, redispatch, or give up at the round bound.
    fn complete_ro_round(&self, state: &mut CoordState, out: &mut Vec<Outbound>) -> CoordResult<()> {
        enum Next {
            Converged,
            Retry,
            Exhausted(u32),
        }
        let next = {
            let active = state
                .active
                .as_mut()
                .ok_or_else(|| CoordError::internal("no active transaction"))?;
            let ActiveTxn { txn_id, cmd, mode, .. } = active;
            let TxnMode::ReadOnly(ro) = mode else {
                return Err(CoordError::internal(
                    "read-only completion for a read-write transaction",
                ));
            };
            ro.rounds += 1;
            if ro.curr_vers == ro.last_vers {
                debug!(txn = %txn_id, rounds = ro.rounds, "read-only snapshot stable");
                Next::Converged
            } else if ro.rounds >= self.config.max_ro_rounds {
                Next::Exhausted(ro.rounds)
            } else {
                debug!(
                    txn = %txn_id,
                    round = ro.rounds,
                    "read-only snapshot changed; redispatching round"
                );
                cmd.reset_read_set();
                ro.last_vers = std::mem::take(&mut ro.curr_vers);
                ro.handout_acks.clear();
                ro.n_handout = 0;
                ro.n_handout_ack = 0;
                Next::Retry
            }
        };
        match next {
            Next::Converged => {
                self.end_readonly(state, out)?;
                self.clear_active(state);
                Ok(())
            }
            Next::Retry => {
                self.stats.record_ro_retry();
                // a redispatch is a reset boundary: stragglers from the
                // previous round must not land in the new one
                state.generation += 1;
                self.dispatch_ro(state, out)
            }
            Next::Exhausted(rounds) => Err(CoordError::RoRoundsExhausted { rounds }),
        }
    }

    /// Replies to a converged read-only transaction. The read-only path
    /// never enters the commit phase.
    fn end_readonly(&self, state: &mut CoordState, out: &mut Vec<Outbound>) -> CoordResult<()> {
        let active = state
            .active
            .as_mut()
            .ok_or_else(|| CoordError::internal("no active transaction"))?;
        let latency = active.started_at.elapsed();
        self.stats.record_commit(latency);
        active.replied = true;
        if let Some(cb) = active.callback.take() {
            let reply = Self::build_reply(active, ReplyStatus::Committed);
            debug!(txn = %active.txn_id, ?latency, "read-only transaction complete");
            out.push(Outbound::Reply {
                cb,
                result: Ok(reply),
            });
        }
        Ok(())
    }

    // ---- completion and failure ----

    fn build_reply(active: &ActiveTxn, status: ReplyStatus) -> TxnReply {
        TxnReply {
            txn_id: active.txn_id,
            status,
            outputs: active.outputs.clone(),
            latency: active.started_at.elapsed(),
        }
    }

    /// Aborts the in-flight transaction after a backend rejection. The
    /// caller receives an `Aborted` reply; this is an expected outcome,
    /// not an internal fault.
    fn abort_active(&self, state: &mut CoordState, out: &mut Vec<Outbound>) {
        if let Some(active) = state.active.as_mut() {
            debug!(txn = %active.txn_id, "backend rejected; aborting transaction");
            self.stats.record_abort();
            if let Some(cb) = active.callback.take() {
                let reply = Self::build_reply(active, ReplyStatus::Aborted);
                out.push(Outbound::Reply {
                    cb,
                    result: Ok(reply),
                });
            }
        }
        self.clear_active(state);
    }

    /// Fails the in-flight transaction with a structured error. The
    /// coordinator instance stays usable.
    fn fail_active(&self, state: &mut CoordState, err: CoordError, out: &mut Vec<Outbound>) {
        self.stats.record_failure();
        if let Some(active) = state.active.as_mut() {
            warn!(txn = %active.txn_id, error = %err, "transaction failed");
            if let Some(cb) = active.callback.take() {
                out.push(Outbound::Reply {
                    cb,
                    result: Err(err),
                });
            }
        } else {
            warn!(error = %err, "protocol violation with no transaction in flight");
        }
        self.clear_active(state);
    }

    /// Releases working state. Bumping the generation here guarantees
    /// that completions still in flight for the old transaction are
    /// dropped as stragglers.
    fn clear_active(&self, state: &mut CoordState) {
        state.active = None;
        state.generation += 1;
        state.phase = Phase::Init;
    }

    // ---- outbound ----

    /// Performs queued sends and replies outside the critical section.
    fn perform(&self, out: Vec<Outbound>) {
        if out.is_empty() {
            return;
        }
        let Some(this) = self.self_ref.upgrade() else {
            // the coordinator is being dropped; nothing left to notify
            return;
        };
        for action in out {
            match action {
                Outbound::Reply { cb, result } => cb(result),
                Outbound::Handout { piece, token } => {
                    let coord = Arc::clone(&this);
                    self.messenger.send_handout(
                        piece,
                        Box::new(move |ack| coord.on_dispatch_ack(token, ack)),
                    );
                }
                Outbound::HandoutRo { piece, token } => {
                    let coord = Arc::clone(&this);
                    self.messenger.send_handout_readonly(
                        piece,
                        Box::new(move |ack| coord.on_ro_ack(token, ack)),
                    );
                }
                Outbound::Finish {
                    partition,
                    txn_id,
                    graph,
                    token,
                } => {
                    let coord = Arc::clone(&this);
                    self.messenger.send_finish(
                        partition,
                        txn_id,
                        graph,
                        Box::new(move |ack| coord.on_finish_ack(token, partition, ack)),
                    );
                }
                Outbound::Log { record, token } => {
                    if let Some(log) = &self.commit_log {
                        let coord = Arc::clone(&this);
                        log.submit(&record, Box::new(move || coord.on_log_durable(token)));
                    }
                }
            }
        }
    }

    fn on_log_durable(&self, token: CallbackToken) {
        let mut out = Vec::new();
        {
            let mut state = self.state.lock();
            if self.check_token(&mut state, token, &mut out) {
                if let Err(err) = self.dispatch_any(&mut state, &mut out) {
                    self.fail_active(&mut state, err, &mut out);
                }
            }
        }
        self.perform(out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{PieceSet, PieceSpec};
    use crate::messenger::MockMessenger;
    use crate::recorder::MemoryCommitLog;
    use shardtx_codec::Value;
    use shardtx_protocol::{ExecStatus, Piece, PieceInput, TxnVertex};

    const TY_RW: TxnType = TxnType(1);
    const TY_RO: TxnType = TxnType(2);

    type ReplySlot = Arc<Mutex<Option<CoordResult<TxnReply>>>>;

    fn reply_slot() -> (ReplySlot, TxnCallback) {
        let slot: ReplySlot = Arc::new(Mutex::new(None));
        let clone = Arc::clone(&slot);
        (slot, Box::new(move |result| *clone.lock() = Some(result)))
    }

    /// Registry with a read-write type of `partitions` independent pieces
    /// and a single-piece read-only type on partition 0.
    fn registry(partitions: u32) -> Arc<TxnRegistry> {
        let mut reg = TxnRegistry::new();
        reg.register(TY_RW, move |_req| {
            let specs = (0..partitions)
                .map(|p| {
                    PieceSpec::new(InnerId::new(p), PartitionId::new(p), PieceInput::new())
                })
                .collect();
            Box::new(PieceSet::read_write(specs))
        });
        reg.register(TY_RO, |_req| {
            Box::new(PieceSet::read_only(vec![PieceSpec::new(
                InnerId::new(0),
                PartitionId::new(0),
                PieceInput::new(),
            )]))
        });
        Arc::new(reg)
    }

    fn coordinator(
        config: CoordConfig,
        partitions: u32,
    ) -> (Arc<Coordinator<MockMessenger>>, Arc<MockMessenger>) {
        let messenger = Arc::new(MockMessenger::new());
        let coord = Coordinator::new(config, Arc::clone(&messenger), registry(partitions));
        (coord, messenger)
    }

    /// A success ack whose fragment holds only the root vertex.
    fn plain_ack(piece: &Piece) -> HandoutAck {
        let mut graph = DepGraph::new();
        graph.insert(TxnVertex::on_partition(piece.root_id, piece.partition));
        let mut piece = piece.clone();
        let slot = piece.inner_id.as_u32();
        piece
            .output
            .insert(slot, Value::Integer(100 + i64::from(slot)));
        HandoutAck {
            status: ExecStatus::Success,
            piece,
            graph,
        }
    }

    /// An ack whose fragment records a conflict with another transaction.
    fn conflicting_ack(piece: &Piece, other: TxnId) -> HandoutAck {
        let mut ack = plain_ack(piece);
        let mut vertex = TxnVertex::on_partition(other, piece.partition);
        vertex.deps.insert(piece.root_id);
        ack.graph.insert(vertex);
        ack
    }

    fn finish_ack(inner: u32, var: u32, value: i64) -> FinishAck {
        let mut output = PieceOutput::new();
        output.insert(var, Value::Integer(value));
        let mut outputs = BTreeMap::new();
        outputs.insert(InnerId::new(inner), output);
        FinishAck {
            status: ExecStatus::Success,
            outputs,
        }
    }

    #[test]
    fn unknown_type_is_rejected() {
        let (coord, _messenger) = coordinator(CoordConfig::new(), 1);
        let (_slot, cb) = reply_slot();
        let err = coord.submit(TxnRequest::new(TxnType::new(99)), cb).unwrap_err();
        assert!(matches!(err, CoordError::UnknownTxnType { .. }));
    }

    #[test]
    fn busy_while_in_flight() {
        let (coord, _messenger) = coordinator(CoordConfig::new(), 1);
        let (_slot, cb) = reply_slot();
        coord.submit(TxnRequest::new(TY_RW), cb).unwrap();

        let (_slot2, cb2) = reply_slot();
        let err = coord.submit(TxnRequest::new(TY_RW), cb2).unwrap_err();
        assert!(matches!(err, CoordError::Busy));
    }

    #[test]
    fn single_partition_early_return() {
        let (coord, messenger) = coordinator(CoordConfig::new(), 1);
        let (slot, cb) = reply_slot();
        coord.submit(TxnRequest::new(TY_RW), cb).unwrap();

        let handouts = messenger.take_handouts();
        assert_eq!(handouts.len(), 1);
        assert_eq!(messenger.finish_count(), 0);

        for (piece, on_ack) in handouts {
            on_ack(plain_ack(&piece));
        }

        // reply delivered before any finish ack exists
        let reply = slot.lock().take().unwrap().unwrap();
        assert_eq!(reply.status, ReplyStatus::Committed);
        assert_eq!(coord.stats().early_returns, 1);

        // the finish fan-out still runs to complete the protocol
        let finishes = messenger.take_finishes();
        assert_eq!(finishes.len(), 1);
        // aggregated graph spans exactly this transaction
        assert_eq!(finishes[0].graph.len(), 1);

        for pending in finishes {
            (pending.on_ack)(finish_ack(0, 0, 1));
        }
        assert_eq!(coord.stats().committed, 1);

        // working state released: a new submission is accepted
        let (_slot2, cb2) = reply_slot();
        coord.submit(TxnRequest::new(TY_RW), cb2).unwrap();
    }

    #[test]
    fn two_partitions_no_dependency_replies_after_second_ack() {
        let (coord, messenger) = coordinator(CoordConfig::new(), 2);
        let (slot, cb) = reply_slot();
        coord.submit(TxnRequest::new(TY_RW), cb).unwrap();

        let mut handouts = messenger.take_handouts();
        assert_eq!(handouts.len(), 2);

        let (piece_b, ack_b) = handouts.pop().unwrap();
        let (piece_a, ack_a) = handouts.pop().unwrap();

        ack_a(plain_ack(&piece_a));
        // commit never starts before the round is fully acknowledged
        assert!(slot.lock().is_none());
        assert_eq!(messenger.finish_count(), 0);

        ack_b(plain_ack(&piece_b));
        let reply = slot.lock().take().unwrap().unwrap();
        assert_eq!(reply.status, ReplyStatus::Committed);
        // both partitions' dispatch outputs are present
        assert_eq!(reply.outputs.len(), 2);

        let finishes = messenger.take_finishes();
        assert_eq!(finishes.len(), 2);
        for pending in finishes {
            (pending.on_ack)(FinishAck {
                status: ExecStatus::Success,
                outputs: BTreeMap::new(),
            });
        }
        assert_eq!(coord.stats().committed, 1);
        assert_eq!(coord.stats().early_returns, 1);
    }

    #[test]
    fn discovered_dependency_disables_early_return() {
        let (coord, messenger) = coordinator(CoordConfig::new(), 2);
        let (slot, cb) = reply_slot();
        coord.submit(TxnRequest::new(TY_RW), cb).unwrap();

        let handouts = messenger.take_handouts();
        let other = TxnId::new(0xffff);
        for (piece, on_ack) in handouts {
            on_ack(conflicting_ack(&piece, other));
        }

        // a genuine cross-transaction dependency: no early reply
        assert!(slot.lock().is_none());
        assert_eq!(coord.stats().early_returns, 0);

        let finishes = messenger.take_finishes();
        assert_eq!(finishes.len(), 2);
        // the aggregate carries the conflicting vertex to every partition
        assert_eq!(finishes[0].graph.len(), 2);

        let mut n = 0u32;
        for pending in finishes {
            (pending.on_ack)(finish_ack(n, 10 + n, i64::from(n)));
            n += 1;
        }

        // reply only after every partition acknowledged the finish
        let reply = slot.lock().take().unwrap().unwrap();
        assert_eq!(reply.status, ReplyStatus::Committed);
        assert_eq!(coord.stats().committed, 1);
    }

    #[test]
    fn finish_waits_for_every_partition() {
        let (coord, messenger) = coordinator(CoordConfig::new().with_early_return(false), 2);
        let (slot, cb) = reply_slot();
        coord.submit(TxnRequest::new(TY_RW), cb).unwrap();

        for (piece, on_ack) in messenger.take_handouts() {
            on_ack(plain_ack(&piece));
        }
        // early return disabled by config
        assert!(slot.lock().is_none());

        let mut finishes = messenger.take_finishes();
        assert_eq!(finishes.len(), 2);

        let second = finishes.pop().unwrap();
        let first = finishes.pop().unwrap();

        (first.on_ack)(finish_ack(0, 40, 7));
        assert!(slot.lock().is_none());

        (second.on_ack)(finish_ack(1, 41, 8));
        let reply = slot.lock().take().unwrap().unwrap();

        // distinct outputs from both partitions appear in the reply
        assert!(reply.outputs[&InnerId::new(0)].contains_key(&40));
        assert!(reply.outputs[&InnerId::new(1)].contains_key(&41));
        assert_eq!(coord.stats().early_returns, 0);
        assert_eq!(coord.stats().committed, 1);
    }

    #[test]
    fn backend_reject_aborts_and_drops_stragglers() {
        let (coord, messenger) = coordinator(CoordConfig::new(), 2);
        let (slot, cb) = reply_slot();
        coord.submit(TxnRequest::new(TY_RW), cb).unwrap();

        let mut handouts = messenger.take_handouts();
        let (piece_b, ack_b) = handouts.pop().unwrap();
        let (piece_a, ack_a) = handouts.pop().unwrap();

        let mut rejected = plain_ack(&piece_a);
        rejected.status = ExecStatus::Reject;
        ack_a(rejected);

        let reply = slot.lock().take().unwrap().unwrap();
        assert_eq!(reply.status, ReplyStatus::Aborted);
        assert_eq!(coord.stats().aborted, 1);

        // the other piece's completion is now a straggler from a dead
        // generation and must be dropped silently
        ack_b(plain_ack(&piece_b));
        assert_eq!(coord.stats().failed, 0);
        assert!(slot.lock().is_none());
    }

    #[test]
    fn empty_fragment_fails_the_transaction() {
        let (coord, messenger) = coordinator(CoordConfig::new(), 1);
        let (slot, cb) = reply_slot();
        coord.submit(TxnRequest::new(TY_RW), cb).unwrap();

        for (piece, on_ack) in messenger.take_handouts() {
            let mut ack = plain_ack(&piece);
            ack.graph.clear();
            on_ack(ack);
        }

        let err = slot.lock().take().unwrap().unwrap_err();
        assert!(matches!(err, CoordError::EmptyGraph));
        assert_eq!(coord.stats().failed, 1);

        // the coordinator survives the violation
        let (_slot2, cb2) = reply_slot();
        coord.submit(TxnRequest::new(TY_RW), cb2).unwrap();
    }

    #[test]
    fn fragment_missing_the_acking_partition_fails() {
        let (coord, messenger) = coordinator(CoordConfig::new(), 1);
        let (slot, cb) = reply_slot();
        coord.submit(TxnRequest::new(TY_RW), cb).unwrap();

        for (piece, on_ack) in messenger.take_handouts() {
            let mut ack = plain_ack(&piece);
            // fragment names the root but not the partition that acked
            ack.graph = DepGraph::new();
            ack.graph.insert(TxnVertex::new(piece.root_id));
            on_ack(ack);
        }

        let err = slot.lock().take().unwrap().unwrap_err();
        assert!(matches!(err, CoordError::ForeignFragment { .. }));
    }

    #[test]
    fn unknown_piece_ack_fails() {
        let (coord, messenger) = coordinator(CoordConfig::new(), 1);
        let (slot, cb) = reply_slot();
        coord.submit(TxnRequest::new(TY_RW), cb).unwrap();

        for (piece, on_ack) in messenger.take_handouts() {
            let mut ack = plain_ack(&piece);
            ack.piece.inner_id = InnerId::new(42);
            on_ack(ack);
        }

        let err = slot.lock().take().unwrap().unwrap_err();
        assert!(matches!(
            err,
            CoordError::UnknownPieceAck { inner } if inner == InnerId::new(42)
        ));
    }

    #[test]
    fn duplicate_ack_fails() {
        let (coord, messenger) = coordinator(CoordConfig::new(), 2);
        let (slot, cb) = reply_slot();
        coord.submit(TxnRequest::new(TY_RW), cb).unwrap();

        let mut handouts = messenger.take_handouts();
        let (piece_a, ack_a) = handouts.remove(0);
        ack_a(plain_ack(&piece_a));

        // a duplicate delivery of the same inner id, same generation
        let token = CallbackToken {
            generation: coord.state.lock().generation,
            phase: Phase::Dispatch,
        };
        coord.on_dispatch_ack(token, plain_ack(&piece_a));

        let err = slot.lock().take().unwrap().unwrap_err();
        assert!(matches!(err, CoordError::DuplicateAck { .. }));
    }

    #[test]
    fn same_generation_phase_mismatch_is_a_violation() {
        let (coord, messenger) = coordinator(CoordConfig::new(), 1);
        let (slot, cb) = reply_slot();
        coord.submit(TxnRequest::new(TY_RW), cb).unwrap();
        let handouts = messenger.take_handouts();

        // forge a completion stamped with a phase the coordinator is not in
        let token = CallbackToken {
            generation: coord.state.lock().generation,
            phase: Phase::Commit,
        };
        coord.on_dispatch_ack(token, plain_ack(&handouts[0].0));

        let err = slot.lock().take().unwrap().unwrap_err();
        assert!(matches!(err, CoordError::StaleCallback { .. }));
        assert_eq!(coord.stats().failed, 1);
    }

    #[test]
    fn partition_set_mismatch_fails_at_finish() {
        let (coord, messenger) = coordinator(CoordConfig::new(), 1);
        let (slot, cb) = reply_slot();
        coord.submit(TxnRequest::new(TY_RW), cb).unwrap();

        for (piece, on_ack) in messenger.take_handouts() {
            let mut ack = plain_ack(&piece);
            // fragment claims the root also touched a partition the
            // command never recorded
            ack.graph
                .vertex_mut(piece.root_id)
                .unwrap()
                .partitions
                .insert(PartitionId::new(9));
            on_ack(ack);
        }

        let err = slot.lock().take().unwrap().unwrap_err();
        assert!(matches!(err, CoordError::PartitionSetMismatch { .. }));
        // no finish send went out for the failed transaction
        assert_eq!(messenger.finish_count(), 0);
    }

    #[test]
    fn commit_log_gates_dispatch() {
        let messenger = Arc::new(MockMessenger::new());
        let log = Arc::new(MemoryCommitLog::new());
        log.hold();
        let coord = Coordinator::with_commit_log(
            CoordConfig::new(),
            Arc::clone(&messenger),
            registry(1),
            Arc::clone(&log) as Arc<dyn CommitLog>,
        );

        let (_slot, cb) = reply_slot();
        coord.submit(TxnRequest::new(TY_RW), cb).unwrap();

        // nothing fans out until the begin record is durable
        assert_eq!(messenger.handout_count(), 0);
        assert_eq!(log.records().len(), 1);

        log.release_all();
        assert_eq!(messenger.handout_count(), 1);
    }

    #[test]
    fn read_only_converges_on_stable_snapshot() {
        let (coord, messenger) = coordinator(CoordConfig::new(), 1);
        let (slot, cb) = reply_slot();
        coord.submit(TxnRequest::new(TY_RO), cb).unwrap();

        let mut versions = VersionMap::new();
        versions.insert(shardtx_protocol::RecordId::new(7), 3);

        // round 1: baseline snapshot captured
        for (piece, on_ack) in messenger.take_ro_handouts() {
            let mut piece = piece.clone();
            piece.output.insert(0, Value::Integer(30));
            on_ack(HandoutRoAck {
                status: ExecStatus::Success,
                piece,
                versions: versions.clone(),
            });
        }
        assert!(slot.lock().is_none());
        assert_eq!(coord.stats().ro_retries, 1);

        // round 2: identical snapshot; converged
        for (piece, on_ack) in messenger.take_ro_handouts() {
            let mut piece = piece.clone();
            piece.output.insert(0, Value::Integer(30));
            on_ack(HandoutRoAck {
                status: ExecStatus::Success,
                piece,
                versions: versions.clone(),
            });
        }

        let reply = slot.lock().take().unwrap().unwrap();
        assert_eq!(reply.status, ReplyStatus::Committed);
        assert_eq!(reply.outputs[&InnerId::new(0)][&0], Value::Integer(30));
        // the read-only path never runs finish
        assert_eq!(messenger.finish_count(), 0);
        assert_eq!(coord.stats().committed, 1);
    }

    #[test]
    fn read_only_round_bound_surfaces_retryable_error() {
        let (coord, messenger) =
            coordinator(CoordConfig::new().with_max_ro_rounds(3), 1);
        let (slot, cb) = reply_slot();
        coord.submit(TxnRequest::new(TY_RO), cb).unwrap();

        // versions keep moving: every round observes something new
        for round in 0..3u64 {
            let mut versions = VersionMap::new();
            versions.insert(shardtx_protocol::RecordId::new(7), round);
            let handouts = messenger.take_ro_handouts();
            assert_eq!(handouts.len(), 1);
            for (piece, on_ack) in handouts {
                on_ack(HandoutRoAck {
                    status: ExecStatus::Success,
                    piece,
                    versions: versions.clone(),
                });
            }
        }

        let err = slot.lock().take().unwrap().unwrap_err();
        assert!(matches!(err, CoordError::RoRoundsExhausted { rounds: 3 }));
        assert!(err.is_retryable());
        // two redispatches happened before giving up
        assert_eq!(coord.stats().ro_retries, 2);
    }

    #[test]
    fn intra_transaction_dependencies_dispatch_in_waves() {
        let mut reg = TxnRegistry::new();
        reg.register(TY_RW, |_req| {
            Box::new(PieceSet::read_write(vec![
                PieceSpec::new(InnerId::new(0), PartitionId::new(0), PieceInput::new()),
                PieceSpec::new(InnerId::new(1), PartitionId::new(1), PieceInput::new())
                    .after([InnerId::new(0)]),
            ]))
        });
        let messenger = Arc::new(MockMessenger::new());
        let coord = Coordinator::new(CoordConfig::new(), Arc::clone(&messenger), Arc::new(reg));

        let (slot, cb) = reply_slot();
        coord.submit(TxnRequest::new(TY_RW), cb).unwrap();

        // only the independent piece goes out first
        let first = messenger.take_handouts();
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].0.inner_id, InnerId::new(0));

        for (piece, on_ack) in first {
            on_ack(plain_ack(&piece));
        }

        // its ack unblocked the dependent piece
        let second = messenger.take_handouts();
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].0.inner_id, InnerId::new(1));

        for (piece, on_ack) in second {
            on_ack(plain_ack(&piece));
        }

        let reply = slot.lock().take().unwrap().unwrap();
        assert_eq!(reply.status, ReplyStatus::Committed);
        assert_eq!(messenger.finish_count(), 2);
    }
}
