//! Session statistics
//!
//! Lock-free counters updated on the retry and reconnect paths, with an
//! immutable [`StatsSnapshot`] for reporting.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for one client
#[derive(Debug, Default)]
pub struct SessionStats {
    operations: AtomicU64,
    logical_failures: AtomicU64,
    transport_failures: AtomicU64,
    retries: AtomicU64,
    reconnect_attempts: AtomicU64,
    reconnects: AtomicU64,
    reconnects_skipped: AtomicU64,
    reconnect_failures: AtomicU64,
}

impl SessionStats {
    #[inline]
    pub(crate) fn record_operation(&self) {
        self.operations.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_logical_failure(&self) {
        self.logical_failures.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_transport_failure(&self) {
        self.transport_failures.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_retry(&self) {
        self.retries.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_reconnect_attempt(&self) {
        self.reconnect_attempts.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_reconnect(&self) {
        self.reconnects.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_reconnect_skipped(&self) {
        self.reconnects_skipped.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_reconnect_failure(&self) {
        self.reconnect_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Number of new sessions swapped in since construction
    #[must_use]
    pub fn reconnects(&self) -> u64 {
        self.reconnects.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            operations: self.operations.load(Ordering::Relaxed),
            logical_failures: self.logical_failures.load(Ordering::Relaxed),
            transport_failures: self.transport_failures.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            reconnect_attempts: self.reconnect_attempts.load(Ordering::Relaxed),
            reconnects: self.reconnects.load(Ordering::Relaxed),
            reconnects_skipped: self.reconnects_skipped.load(Ordering::Relaxed),
            reconnect_failures: self.reconnect_failures.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`SessionStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    /// Caller-visible operations started
    pub operations: u64,
    /// Attempts refused by the server, including a refused retry
    pub logical_failures: u64,
    /// Attempts that failed with a transport error, first or retried
    pub transport_failures: u64,
    /// Second attempts made after a reconnect
    pub retries: u64,
    /// Times the reconnect procedure was entered
    pub reconnect_attempts: u64,
    /// New sessions swapped in
    pub reconnects: u64,
    /// Reconnects avoided because the probe found the session usable
    pub reconnects_skipped: u64,
    /// Reconnects that could not establish a new session
    pub reconnect_failures: u64,
}
