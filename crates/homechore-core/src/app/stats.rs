//! Counters for the completion pipeline.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Lock-free counters shared by the senders and the consumer.
#[derive(Debug, Default)]
pub struct ProcessorStats {
    enqueued: AtomicU64,
    rejected: AtomicU64,
    applied: AtomicU64,
    retried: AtomicU64,
    dropped: AtomicU64,
}

impl ProcessorStats {
    pub(crate) fn record_enqueued(&self) {
        self.enqueued.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_applied(&self) {
        self.applied.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_retry(&self) {
        self.retried.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            enqueued: self.enqueued.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            applied: self.applied.load(Ordering::Relaxed),
            retried: self.retried.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    /// Accepted by the channel.
    pub enqueued: u64,
    /// Refused by `enqueue` (full, stopped or cancelled).
    pub rejected: u64,
    /// Rewards applied.
    pub applied: u64,
    /// Backoff waits started (one per retried attempt).
    pub retried: u64,
    /// Events reported to the failure sink.
    pub dropped: u64,
}

impl StatsSnapshot {
    /// Events that reached a terminal outcome.
    pub fn settled(&self) -> u64 {
        self.applied + self.dropped
    }

    /// Accepted events not yet settled.
    pub fn in_flight(&self) -> u64 {
        self.enqueued.saturating_sub(self.settled())
    }
}
