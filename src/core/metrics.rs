//! Dispatcher counters for observability

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters maintained by the [`Dispatcher`](super::dispatcher::Dispatcher).
///
/// # Example
///
/// ```
/// use quill_logger::core::DispatcherMetrics;
///
/// let metrics = DispatcherMetrics::new();
/// metrics.record_dispatched();
/// metrics.record_lost();
///
/// assert_eq!(metrics.dispatched(), 1);
/// assert_eq!(metrics.lost(), 1);
/// ```
#[derive(Debug)]
pub struct DispatcherMetrics {
    /// Records handed to every sink
    dispatched: AtomicU64,

    /// Records that never reached the sinks
    lost: AtomicU64,

    /// Times a producer found the queue full and had to wait
    block_events: AtomicU64,

    /// `append` calls that returned an error
    sink_failures: AtomicU64,

    /// `append` calls that panicked
    sink_panics: AtomicU64,

    /// Records processed by the shutdown drain
    drained: AtomicU64,
}

impl DispatcherMetrics {
    pub const fn new() -> Self {
        Self {
            dispatched: AtomicU64::new(0),
            lost: AtomicU64::new(0),
            block_events: AtomicU64::new(0),
            sink_failures: AtomicU64::new(0),
            sink_panics: AtomicU64::new(0),
            drained: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn dispatched(&self) -> u64 {
        self.dispatched.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn lost(&self) -> u64 {
        self.lost.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn block_events(&self) -> u64 {
        self.block_events.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn sink_failures(&self) -> u64 {
        self.sink_failures.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn sink_panics(&self) -> u64 {
        self.sink_panics.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn drained(&self) -> u64 {
        self.drained.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn record_dispatched(&self) -> u64 {
        self.dispatched.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_lost(&self) -> u64 {
        self.lost.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_block(&self) -> u64 {
        self.block_events.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_sink_failure(&self) -> u64 {
        self.sink_failures.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_sink_panic(&self) -> u64 {
        self.sink_panics.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_drained(&self) -> u64 {
        self.drained.fetch_add(1, Ordering::Relaxed)
    }

    /// Lost records as a percentage of all records seen (0.0 - 100.0)
    pub fn loss_rate(&self) -> f64 {
        let lost = self.lost() as f64;
        let total = self.dispatched() as f64 + lost;
        if total == 0.0 {
            0.0
        } else {
            (lost / total) * 100.0
        }
    }
}

impl Default for DispatcherMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for DispatcherMetrics {
    /// Snapshot of the current values
    fn clone(&self) -> Self {
        Self {
            dispatched: AtomicU64::new(self.dispatched()),
            lost: AtomicU64::new(self.lost()),
            block_events: AtomicU64::new(self.block_events()),
            sink_failures: AtomicU64::new(self.sink_failures()),
            sink_panics: AtomicU64::new(self.sink_panics()),
            drained: AtomicU64::new(self.drained()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_start_at_zero() {
        let metrics = DispatcherMetrics::new();
        assert_eq!(metrics.dispatched(), 0);
        assert_eq!(metrics.lost(), 0);
        assert_eq!(metrics.block_events(), 0);
        assert_eq!(metrics.sink_failures(), 0);
        assert_eq!(metrics.sink_panics(), 0);
        assert_eq!(metrics.drained(), 0);
    }

    #[test]
    fn test_record_returns_previous_value() {
        let metrics = DispatcherMetrics::new();
        assert_eq!(metrics.record_lost(), 0);
        assert_eq!(metrics.record_lost(), 1);
        assert_eq!(metrics.lost(), 2);
    }

    #[test]
    fn test_loss_rate() {
        let metrics = DispatcherMetrics::new();
        assert_eq!(metrics.loss_rate(), 0.0);

        for _ in 0..90 {
            metrics.record_dispatched();
        }
        for _ in 0..10 {
            metrics.record_lost();
        }
        let rate = metrics.loss_rate();
        assert!((rate - 10.0).abs() < f64::EPSILON * 100.0, "Loss rate was {}", rate);
    }

    #[test]
    fn test_clone_is_a_snapshot() {
        let metrics = DispatcherMetrics::new();
        metrics.record_drained();

        let snapshot = metrics.clone();
        metrics.record_drained();
        assert_eq!(metrics.drained(), 2);
        assert_eq!(snapshot.drained(), 1);
    }
}
