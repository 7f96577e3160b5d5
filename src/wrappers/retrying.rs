//! Retrying target wrapper: transparently retries failed writes
//!
//! Each event gets up to `retry_count` attempts against the wrapped target,
//! separated by a constant delay. The delay wait is interruptible so a close
//! (or an owner holding the wrapper's [`CancelToken`]) never blocks shutdown
//! behind the remaining attempts; an interrupted event surfaces its last
//! error immediately.

use crate::core::continuation::{AsyncLogEventInfo, Continuation, COMPLETION_WAIT};
use crate::core::error::{PipelineError, Result};
use crate::core::target::Target;
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::time::Duration;

/// Default number of attempts per event.
pub const DEFAULT_RETRY_COUNT: usize = 3;

/// Default delay between attempts.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(100);

struct CancelState {
    cancelled: Mutex<bool>,
    signal: Condvar,
}

/// Cancellation signal for in-flight retry delays.
///
/// Cloneable so an owner on another thread can abort retries while the
/// delivery thread is inside a delay.
#[derive(Clone)]
pub struct CancelToken(Arc<CancelState>);

impl CancelToken {
    fn new() -> Self {
        Self(Arc::new(CancelState {
            cancelled: Mutex::new(false),
            signal: Condvar::new(),
        }))
    }

    pub fn cancel(&self) {
        let mut cancelled = self.0.cancelled.lock();
        *cancelled = true;
        drop(cancelled);
        self.0.signal.notify_all();
    }

    pub fn is_cancelled(&self) -> bool {
        *self.0.cancelled.lock()
    }

    /// Sleep up to `delay`; returns true when interrupted by cancellation.
    fn wait_for(&self, delay: Duration) -> bool {
        let mut cancelled = self.0.cancelled.lock();
        if *cancelled {
            return true;
        }
        self.0.signal.wait_for(&mut cancelled, delay);
        *cancelled
    }
}

/// Retries failed writes against the wrapped target.
pub struct RetryingTargetWrapper {
    name: String,
    inner: Box<dyn Target>,
    retry_count: usize,
    retry_delay: Duration,
    cancel: CancelToken,
    closed: bool,
}

impl RetryingTargetWrapper {
    pub fn new(inner: Box<dyn Target>, retry_count: usize, retry_delay: Duration) -> Result<Self> {
        let name = format!("retrying({})", inner.name());
        if retry_count == 0 {
            return Err(PipelineError::config(&name, "retry_count must be positive"));
        }
        Ok(Self {
            name,
            inner,
            retry_count,
            retry_delay,
            cancel: CancelToken::new(),
            closed: false,
        })
    }

    /// Token that aborts pending retry delays when cancelled.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    fn write_with_retries(&mut self, info: AsyncLogEventInfo) {
        let AsyncLogEventInfo {
            event,
            continuation,
        } = info;

        let mut last_error: Option<PipelineError> = None;
        let mut attempts = 0;

        for attempt in 1..=self.retry_count {
            if self.cancel.is_cancelled() {
                break;
            }
            attempts = attempt;

            let (probe, latch) = Continuation::latch();
            self.inner
                .write_event(AsyncLogEventInfo::new(event.clone(), probe));

            match latch.wait(COMPLETION_WAIT) {
                Some(None) => {
                    continuation.done(None);
                    return;
                }
                Some(Some(error)) => last_error = Some(error),
                None => {
                    last_error = Some(PipelineError::CompletionTimeout {
                        target: self.name.clone(),
                        waited_ms: COMPLETION_WAIT.as_millis() as u64,
                    })
                }
            }

            if attempt < self.retry_count && self.cancel.wait_for(self.retry_delay) {
                // Cancelled mid-delay; give up with the error we have.
                break;
            }
        }

        let last_error = last_error.unwrap_or_else(|| PipelineError::closed(&self.name));
        continuation.done(Some(PipelineError::retries_exhausted(attempts, last_error)));
    }
}

impl Target for RetryingTargetWrapper {
    fn name(&self) -> &str {
        &self.name
    }

    fn initialize(&mut self) -> Result<()> {
        self.inner.initialize()
    }

    fn write(&mut self, batch: Vec<AsyncLogEventInfo>) {
        for info in batch {
            self.write_with_retries(info);
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
        self.cancel.cancel();
        self.inner.close();
    }
}
