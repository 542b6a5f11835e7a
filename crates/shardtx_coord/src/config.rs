//! Configuration for the coordinator.

/// Configuration for a coordinator instance.
#[derive(Debug, Clone)]
pub struct CoordConfig {
    /// Whether a transaction with no discovered cross-transaction
    /// dependency may reply to its caller before the finish phase
    /// completes.
    pub early_return: bool,
    /// Maximum read-only snapshot rounds before the transaction fails
    /// with a retryable error.
    pub max_ro_rounds: u32,
    /// First transaction ID this instance assigns. Coordinators sharing
    /// a set of partitions must use disjoint ID spaces.
    pub txn_id_base: u64,
}

impl CoordConfig {
    /// Creates the default configuration.
    pub fn new() -> Self {
        Self {
            early_return: true,
            max_ro_rounds: 8,
            txn_id_base: 1,
        }
    }

    /// Enables or disables early return.
    pub fn with_early_return(mut self, enabled: bool) -> Self {
        self.early_return = enabled;
        self
    }

    /// Sets the read-only round bound. Clamped to at least one round.
    pub fn with_max_ro_rounds(mut self, rounds: u32) -> Self {
        self.max_ro_rounds = rounds.max(1);
        self
    }

    /// Sets the first transaction ID this instance assigns.
    pub fn with_txn_id_base(mut self, base: u64) -> Self {
        self.txn_id_base = base.max(1);
        self
    }
}

impl Default for CoordConfig {
    fn default() -> Self {
        Self::new()
    }
}
