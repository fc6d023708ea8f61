//! Run statistics shared across consumer loops.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters updated by all consumer loops.
///
/// Counts are advisory (used for the end-of-run summary and progress
/// logging); they are not part of the delivery contract.
#[derive(Debug, Default)]
pub struct IngestStats {
    messages_received: AtomicU64,
    messages_deleted: AtomicU64,
    messages_poisoned: AtomicU64,
    records_completed: AtomicU64,
    records_failed: AtomicU64,
    records_aborted: AtomicU64,
}

impl IngestStats {
    /// Create zeroed statistics.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_message_received(&self) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_message_deleted(&self) {
        self.messages_deleted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_message_poisoned(&self) {
        self.messages_poisoned.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_completed(&self) {
        self.records_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed(&self) {
        self.records_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_aborted(&self) {
        self.records_aborted.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy of all counters.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            messages_received: self.messages_received.load(Ordering::Relaxed),
            messages_deleted: self.messages_deleted.load(Ordering::Relaxed),
            messages_poisoned: self.messages_poisoned.load(Ordering::Relaxed),
            records_completed: self.records_completed.load(Ordering::Relaxed),
            records_failed: self.records_failed.load(Ordering::Relaxed),
            records_aborted: self.records_aborted.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time view of [`IngestStats`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub messages_received: u64,
    pub messages_deleted: u64,
    pub messages_poisoned: u64,
    pub records_completed: u64,
    pub records_failed: u64,
    pub records_aborted: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_reflects_counters() {
        let stats = IngestStats::new();
        stats.record_message_received();
        stats.record_message_received();
        stats.record_completed();
        stats.record_failed();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.messages_received, 2);
        assert_eq!(snapshot.records_completed, 1);
        assert_eq!(snapshot.records_failed, 1);
        assert_eq!(snapshot.messages_poisoned, 0);
    }
}
