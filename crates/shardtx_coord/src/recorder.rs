//! Durability-log hook gating dispatch fan-out.

use parking_lot::Mutex;

/// Callback invoked once a submitted record is durably accepted.
pub type DurableCallback = Box<dyn FnOnce() + Send + 'static>;

/// A local durability log.
///
/// When configured on a coordinator, the dispatch fan-out for a
/// transaction is submitted as a continuation of a log write: pieces go
/// out only after the log record is durably accepted. This decouples
/// logging/replication ordering from network fan-out. When unconfigured,
/// dispatch runs immediately.
pub trait CommitLog: Send + Sync {
    /// Submits a record; `on_durable` fires exactly once when it is
    /// durably accepted.
    fn submit(&self, record: &[u8], on_durable: DurableCallback);
}

/// An in-memory commit log for testing.
///
/// By default records are accepted immediately. With `hold()` the
/// durability callbacks are queued until `release_all()`, letting tests
/// observe that fan-out is gated on the log.
#[derive(Default)]
pub struct MemoryCommitLog {
    records: Mutex<Vec<Vec<u8>>>,
    held: Mutex<Option<Vec<DurableCallback>>>,
}

impl MemoryCommitLog {
    /// Creates a log that accepts records immediately.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues durability callbacks until `release_all()`.
    pub fn hold(&self) {
        let mut held = self.held.lock();
        if held.is_none() {
            *held = Some(Vec::new());
        }
    }

    /// Releases every queued durability callback, in submission order.
    pub fn release_all(&self) {
        let callbacks = self.held.lock().take().unwrap_or_default();
        for cb in callbacks {
            cb();
        }
    }

    /// Returns the records submitted so far.
    pub fn records(&self) -> Vec<Vec<u8>> {
        self.records.lock().clone()
    }
}

impl CommitLog for MemoryCommitLog {
    fn submit(&self, record: &[u8], on_durable: DurableCallback) {
        self.records.lock().push(record.to_vec());
        let mut held = self.held.lock();
        match held.as_mut() {
            Some(queue) => queue.push(on_durable),
            None => {
                drop(held);
                on_durable();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[test]
    fn immediate_mode_fires_inline() {
        let log = MemoryCommitLog::new();
        let fired = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&fired);
        log.submit(b"rec", Box::new(move || flag.store(true, Ordering::SeqCst)));
        assert!(fired.load(Ordering::SeqCst));
        assert_eq!(log.records(), vec![b"rec".to_vec()]);
    }

    #[test]
    fn held_mode_defers_until_release() {
        let log = MemoryCommitLog::new();
        log.hold();

        let fired = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&fired);
        log.submit(b"rec", Box::new(move || flag.store(true, Ordering::SeqCst)));
        assert!(!fired.load(Ordering::SeqCst));

        log.release_all();
        assert!(fired.load(Ordering::SeqCst));
    }
}
