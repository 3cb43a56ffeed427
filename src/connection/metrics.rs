//! Per-connection counters.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters updated by the connection tasks.
#[derive(Debug, Default)]
pub struct ConnectionMetrics {
    dial_attempts: AtomicU64,
    dial_failures: AtomicU64,
    connects: AtomicU64,
    disconnects: AtomicU64,
    payloads_written: AtomicU64,
    bytes_written: AtomicU64,
    write_errors: AtomicU64,
    dropped_payloads: AtomicU64,
}

/// Point-in-time copy of [`ConnectionMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub dial_attempts: u64,
    pub dial_failures: u64,
    pub connects: u64,
    pub disconnects: u64,
    pub payloads_written: u64,
    pub bytes_written: u64,
    pub write_errors: u64,
    pub dropped_payloads: u64,
}

impl ConnectionMetrics {
    pub(crate) fn record_dial_attempt(&self) {
        self.dial_attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_dial_failure(&self) {
        self.dial_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_connect(&self) {
        self.connects.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_disconnect(&self) {
        self.disconnects.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_write(&self, bytes: usize) {
        self.payloads_written.fetch_add(1, Ordering::Relaxed);
        self.bytes_written.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_write_error(&self) {
        self.write_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_dropped(&self) {
        self.dropped_payloads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            dial_attempts: self.dial_attempts.load(Ordering::Relaxed),
            dial_failures: self.dial_failures.load(Ordering::Relaxed),
            connects: self.connects.load(Ordering::Relaxed),
            disconnects: self.disconnects.load(Ordering::Relaxed),
            payloads_written: self.payloads_written.load(Ordering::Relaxed),
            bytes_written: self.bytes_written.load(Ordering::Relaxed),
            write_errors: self.write_errors.load(Ordering::Relaxed),
            dropped_payloads: self.dropped_payloads.load(Ordering::Relaxed),
        }
    }
}
