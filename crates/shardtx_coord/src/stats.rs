//! Coordinator statistics and telemetry.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Coordinator metrics.
///
/// All counters are atomic and can be read while transactions are in
/// flight. Counters are monotonically increasing.
#[derive(Debug, Default)]
pub struct CoordStats {
    /// Transactions submitted.
    started: AtomicU64,
    /// Transactions committed (including early-return commits).
    committed: AtomicU64,
    /// Transactions aborted by a backend rejection.
    aborted: AtomicU64,
    /// Transactions failed by a protocol violation or internal fault.
    failed: AtomicU64,
    /// Replies delivered before the finish phase completed.
    early_returns: AtomicU64,
    /// Read-only rounds redispatched after a snapshot mismatch.
    ro_retries: AtomicU64,
    /// Pieces sent to partitions.
    pieces_dispatched: AtomicU64,
    /// Cumulative commit latency in microseconds.
    latency_micros: AtomicU64,
    /// Number of latency samples.
    latency_samples: AtomicU64,
}

impl CoordStats {
    /// Creates a new stats instance.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_start(&self) {
        self.started.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_commit(&self, latency: Duration) {
        self.committed.fetch_add(1, Ordering::Relaxed);
        self.latency_micros
            .fetch_add(latency.as_micros() as u64, Ordering::Relaxed);
        self.latency_samples.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_abort(&self) {
        self.aborted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_failure(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_early_return(&self) {
        self.early_returns.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_ro_retry(&self) {
        self.ro_retries.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_piece_dispatched(&self) {
        self.pieces_dispatched.fetch_add(1, Ordering::Relaxed);
    }

    /// Takes a consistent-enough snapshot of all counters.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            started: self.started.load(Ordering::Relaxed),
            committed: self.committed.load(Ordering::Relaxed),
            aborted: self.aborted.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            early_returns: self.early_returns.load(Ordering::Relaxed),
            ro_retries: self.ro_retries.load(Ordering::Relaxed),
            pieces_dispatched: self.pieces_dispatched.load(Ordering::Relaxed),
            latency_micros: self.latency_micros.load(Ordering::Relaxed),
            latency_samples: self.latency_samples.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time copy of the coordinator counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Transactions submitted.
    pub started: u64,
    /// Transactions committed.
    pub committed: u64,
    /// Transactions aborted by backend rejection.
    pub aborted: u64,
    /// Transactions failed by protocol violation.
    pub failed: u64,
    /// Early-return replies delivered.
    pub early_returns: u64,
    /// Read-only redispatch rounds.
    pub ro_retries: u64,
    /// Pieces sent.
    pub pieces_dispatched: u64,
    /// Cumulative commit latency in microseconds.
    pub latency_micros: u64,
    /// Number of latency samples.
    pub latency_samples: u64,
}

impl StatsSnapshot {
    /// Mean commit latency, if any transaction completed.
    pub fn mean_latency(&self) -> Option<Duration> {
        if self.latency_samples == 0 {
            None
        } else {
            Some(Duration::from_micros(
                self.latency_micros / self.latency_samples,
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let stats = CoordStats::new();
        stats.record_start();
        stats.record_start();
        stats.record_commit(Duration::from_micros(300));
        stats.record_commit(Duration::from_micros(100));
        stats.record_early_return();

        let snap = stats.snapshot();
        assert_eq!(snap.started, 2);
        assert_eq!(snap.committed, 2);
        assert_eq!(snap.early_returns, 1);
        assert_eq!(snap.mean_latency(), Some(Duration::from_micros(200)));
    }

    #[test]
    fn empty_snapshot_has_no_latency() {
        assert_eq!(CoordStats::new().snapshot().mean_latency(), None);
    }
}
