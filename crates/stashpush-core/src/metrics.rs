//! Process-wide delivery counters.
//!
//! Reporters bump these as they go; [`Metrics::flush`] emits the totals as a
//! single `info!` event, typically once per CLI invocation.

use std::sync::atomic::{AtomicU64, Ordering};

/// Global metrics singleton.
pub static METRICS: Metrics = Metrics::new();

pub struct Metrics {
    statuses_sent: AtomicU64,
    comments_sent: AtomicU64,
    deliveries_failed: AtomicU64,
    revisions_unresolved: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            statuses_sent: AtomicU64::new(0),
            comments_sent: AtomicU64::new(0),
            deliveries_failed: AtomicU64::new(0),
            revisions_unresolved: AtomicU64::new(0),
        }
    }

    pub fn inc_statuses_sent(&self) {
        self.statuses_sent.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "statuses_sent", "counter incremented");
    }

    pub fn inc_comments_sent(&self) {
        self.comments_sent.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "comments_sent", "counter incremented");
    }

    /// Rejected, unreachable and skipped deliveries all count here.
    pub fn inc_deliveries_failed(&self) {
        self.deliveries_failed.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "deliveries_failed", "counter incremented");
    }

    pub fn inc_revisions_unresolved(&self) {
        self.revisions_unresolved.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "revisions_unresolved", "counter incremented");
    }

    /// Emit all current counter values as a single `info!` event.
    pub fn flush(&self) {
        tracing::info!(
            metric = "flush",
            statuses_sent = self.statuses_sent(),
            comments_sent = self.comments_sent(),
            deliveries_failed = self.deliveries_failed(),
            revisions_unresolved = self.revisions_unresolved(),
        );
    }

    pub fn statuses_sent(&self) -> u64 {
        self.statuses_sent.load(Ordering::Relaxed)
    }

    pub fn comments_sent(&self) -> u64 {
        self.comments_sent.load(Ordering::Relaxed)
    }

    pub fn deliveries_failed(&self) -> u64 {
        self.deliveries_failed.load(Ordering::Relaxed)
    }

    pub fn revisions_unresolved(&self) -> u64 {
        self.revisions_unresolved.load(Ordering::Relaxed)
    }

    /// Reset all counters to zero (useful in tests).
    pub fn reset(&self) {
        self.statuses_sent.store(0, Ordering::Relaxed);
        self.comments_sent.store(0, Ordering::Relaxed);
        self.deliveries_failed.store(0, Ordering::Relaxed);
        self.revisions_unresolved.store(0, Ordering::Relaxed);
    }
}
