//! Pipeline metrics for observability
//!
//! Counters for monitoring delivery health: backpressure eviction, queue
//! growth, rejected writes, throughput.

use std::sync::atomic::{AtomicU64, Ordering};

/// Metrics for delivery pipeline observability
///
/// High `dropped_count` or `queue_grow_events` values indicate that
/// producers outpace the wrapped target and the queue limit or batch size
/// needs tuning.
///
/// # Example
///
/// ```
/// use log_pipeline::PipelineMetrics;
///
/// let metrics = PipelineMetrics::new();
/// metrics.record_enqueued();
/// metrics.record_written();
/// assert_eq!(metrics.written_count(), 1);
/// ```
#[derive(Debug)]
pub struct PipelineMetrics {
    /// Events accepted into the queue
    enqueued_count: AtomicU64,

    /// Events handed to the wrapped target
    written_count: AtomicU64,

    /// Events evicted under the Discard overflow action or abandoned at close
    dropped_count: AtomicU64,

    /// Writes rejected because the pipeline was closed or uninitialized
    rejected_count: AtomicU64,

    /// Number of times the queue doubled its capacity under Grow
    queue_grow_events: AtomicU64,
}

impl PipelineMetrics {
    pub const fn new() -> Self {
        Self {
            enqueued_count: AtomicU64::new(0),
            written_count: AtomicU64::new(0),
            dropped_count: AtomicU64::new(0),
            rejected_count: AtomicU64::new(0),
            queue_grow_events: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn enqueued_count(&self) -> u64 {
        self.enqueued_count.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn written_count(&self) -> u64 {
        self.written_count.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn dropped_count(&self) -> u64 {
        self.dropped_count.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn rejected_count(&self) -> u64 {
        self.rejected_count.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn queue_grow_events(&self) -> u64 {
        self.queue_grow_events.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn record_enqueued(&self) -> u64 {
        self.enqueued_count.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_written(&self) -> u64 {
        self.written_count.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_written_batch(&self, count: u64) -> u64 {
        self.written_count.fetch_add(count, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_dropped(&self) -> u64 {
        self.dropped_count.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_dropped_batch(&self, count: u64) -> u64 {
        self.dropped_count.fetch_add(count, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_rejected(&self) -> u64 {
        self.rejected_count.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_queue_grow(&self) -> u64 {
        self.queue_grow_events.fetch_add(1, Ordering::Relaxed)
    }

    /// Share of accepted events that were lost to backpressure (0.0 - 100.0).
    ///
    /// Returns 0.0 if nothing has been enqueued.
    pub fn drop_rate(&self) -> f64 {
        let dropped = self.dropped_count() as f64;
        let total = self.enqueued_count() as f64;
        if total == 0.0 {
            0.0
        } else {
            (dropped / total) * 100.0
        }
    }

    /// Reset all counters to zero.
    pub fn reset(&self) {
        self.enqueued_count.store(0, Ordering::Relaxed);
        self.written_count.store(0, Ordering::Relaxed);
        self.dropped_count.store(0, Ordering::Relaxed);
        self.rejected_count.store(0, Ordering::Relaxed);
        self.queue_grow_events.store(0, Ordering::Relaxed);
    }
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for PipelineMetrics {
    /// Create a snapshot of the current counter values
    fn clone(&self) -> Self {
        Self {
            enqueued_count: AtomicU64::new(self.enqueued_count()),
            written_count: AtomicU64::new(self.written_count()),
            dropped_count: AtomicU64::new(self.dropped_count()),
            rejected_count: AtomicU64::new(self.rejected_count()),
            queue_grow_events: AtomicU64::new(self.queue_grow_events()),
        }
    }
}
