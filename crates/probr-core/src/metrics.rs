//! Global atomic counters for probe execution.
//!
//! Counters are incremented silently at the call site. Call
//! [`Metrics::flush`] to emit current values as a single
//! `tracing::info!` event (e.g. at the end of a batch).

use std::sync::atomic::{AtomicU64, Ordering};

/// Global metrics singleton.
pub static METRICS: Metrics = Metrics::new();

/// Lightweight atomic counters; no allocations, no locking.
pub struct Metrics {
    probes_executed: AtomicU64,
    probes_failed: AtomicU64,
    probes_excluded: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            probes_executed: AtomicU64::new(0),
            probes_failed: AtomicU64::new(0),
            probes_excluded: AtomicU64::new(0),
        }
    }

    /// A probe was handed to the engine.
    pub fn inc_executed(&self) {
        self.probes_executed.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "probes_executed", "counter incremented");
    }

    /// A probe settled as `CompleteFail` or `Error`.
    pub fn inc_failed(&self) {
        self.probes_failed.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "probes_failed", "counter incremented");
    }

    pub fn inc_excluded(&self) {
        self.probes_excluded.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "probes_excluded", "counter incremented");
    }

    pub fn flush(&self) {
        tracing::info!(
            metric = "flush",
            probes_executed = self.probes_executed(),
            probes_failed = self.probes_failed(),
            probes_excluded = self.probes_excluded(),
        );
    }

    pub fn probes_executed(&self) -> u64 {
        self.probes_executed.load(Ordering::Relaxed)
    }

    pub fn probes_failed(&self) -> u64 {
        self.probes_failed.load(Ordering::Relaxed)
    }

    pub fn probes_excluded(&self) -> u64 {
        self.probes_excluded.load(Ordering::Relaxed)
    }

    /// Reset all counters to zero (useful in tests).
    pub fn reset(&self) {
        self.probes_executed.store(0, Ordering::Relaxed);
        self.probes_failed.store(0, Ordering::Relaxed);
        self.probes_excluded.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_increment() {
        let m = Metrics::new();
        m.inc_executed();
        m.inc_executed();
        m.inc_failed();
        m.inc_excluded();
        assert_eq!(m.probes_executed(), 2);
        assert_eq!(m.probes_failed(), 1);
        assert_eq!(m.probes_excluded(), 1);
    }

    #[test]
    fn reset_zeroes_all() {
        let m = Metrics::new();
        m.inc_executed();
        m.inc_failed();
        m.inc_excluded();
        m.reset();
        assert_eq!(m.probes_executed(), 0);
        assert_eq!(m.probes_failed(), 0);
        assert_eq!(m.probes_excluded(), 0);
    }
}
