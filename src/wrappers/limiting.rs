//! Limiting target wrapper: caps events forwarded per time interval
//!
//! Once the interval's budget is spent, further events are accepted but not
//! written (continuation completes with success) until a new interval
//! starts. Capped events are counted so operators can observe the loss.

use crate::core::continuation::{AsyncLogEventInfo, Continuation};
use crate::core::error::{PipelineError, Result};
use crate::core::target::Target;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

pub struct LimitingTargetWrapper {
    name: String,
    inner: Box<dyn Target>,
    message_limit: usize,
    interval: Duration,
    window_start: Option<Instant>,
    written_in_window: usize,
    capped: AtomicU64,
    closed: bool,
}

impl LimitingTargetWrapper {
    pub fn new(inner: Box<dyn Target>, message_limit: usize, interval: Duration) -> Result<Self> {
        let name = format!("limited({})", inner.name());
        if message_limit == 0 {
            return Err(PipelineError::config(&name, "message_limit must be positive"));
        }
        if interval.is_zero() {
            return Err(PipelineError::config(&name, "interval must be positive"));
        }
        Ok(Self {
            name,
            inner,
            message_limit,
            interval,
            window_start: None,
            written_in_window: 0,
            capped: AtomicU64::new(0),
            closed: false,
        })
    }

    /// Total number of events discarded by the interval budget so far.
    pub fn capped_count(&self) -> u64 {
        self.capped.load(Ordering::Relaxed)
    }

    fn within_budget(&mut self, now: Instant) -> bool {
        let expired = match self.window_start {
            None => true,
            Some(start) => now.duration_since(start) >= self.interval,
        };
        if expired {
            self.window_start = Some(now);
            self.written_in_window = 0;
        }
        self.written_in_window < self.message_limit
    }
}

impl Target for LimitingTargetWrapper {
    fn name(&self) -> &str {
        &self.name
    }

    fn initialize(&mut self) -> Result<()> {
        self.inner.initialize()
    }

    fn write(&mut self, batch: Vec<AsyncLogEventInfo>) {
        let now = Instant::now();
        let mut forwarded = Vec::with_capacity(batch.len());
        for info in batch {
            if self.within_budget(now) {
                self.written_in_window += 1;
                forwarded.push(info);
            } else {
                self.capped.fetch_add(1, Ordering::Relaxed);
                info.continuation.done(None);
            }
        }
        if !forwarded.is_empty() {
            self.inner.write(forwarded);
        }
    }

    fn flush(&mut self, done: Continuation) {
        self.inner.flush(done);
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.inner.close();
    }
}
