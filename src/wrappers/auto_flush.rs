//! Auto-flush decorators: flush the wrapped target when a condition fires
//!
//! [`AutoFlushTargetWrapper`] is the configurable form; [`FlushTriggerWrapper`]
//! is the trigger-only variant meant to sit above buffering layers.

use crate::core::condition::Condition;
use crate::core::continuation::{AsyncLogEventInfo, Continuation, COMPLETION_WAIT};
use crate::core::error::Result;
use crate::core::target::Target;

/// Flushes the wrapped target after forwarding, when the condition matches
/// (or after every write if no condition is set).
pub struct AutoFlushTargetWrapper {
    name: String,
    inner: Box<dyn Target>,
    condition: Option<Condition>,
    async_flush: bool,
    flush_on_condition_only: bool,
    closed: bool,
}

impl AutoFlushTargetWrapper {
    pub fn new(inner: Box<dyn Target>) -> Self {
        let name = format!("auto-flushed({})", inner.name());
        Self {
            name,
            inner,
            condition: None,
            async_flush: true,
            flush_on_condition_only: false,
            closed: false,
        }
    }

    /// Only flush when an event in the written batch matches the condition.
    #[must_use = "builder methods return a new value"]
    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.condition = Some(condition);
        self
    }

    /// When false, a triggered flush is waited on (bounded) before `write`
    /// returns; failures are reported, not raised.
    #[must_use = "builder methods return a new value"]
    pub fn with_async_flush(mut self, async_flush: bool) -> Self {
        self.async_flush = async_flush;
        self
    }

    /// When true, explicit `flush` calls are ignored; only condition-driven
    /// flushes reach the wrapped target.
    #[must_use = "builder methods return a new value"]
    pub fn with_flush_on_condition_only(mut self, flush_on_condition_only: bool) -> Self {
        self.flush_on_condition_only = flush_on_condition_only;
        self
    }

    fn trigger_flush(&mut self) {
        if self.async_flush {
            self.inner.flush(Continuation::none());
            return;
        }
        let (done, latch) = Continuation::latch();
        self.inner.flush(done);
        match latch.wait(COMPLETION_WAIT) {
            Some(Some(error)) => {
                eprintln!(
                    "[PIPELINE ERROR] Triggered flush of '{}' failed: {}",
                    self.name, error
                );
            }
            Some(None) => {}
            None => {
                eprintln!(
                    "[PIPELINE WARNING] Triggered flush of '{}' did not complete in time",
                    self.name
                );
            }
        }
    }
}

impl Target for AutoFlushTargetWrapper {
    fn name(&self) -> &str {
        &self.name
    }

    fn initialize(&mut self) -> Result<()> {
        self.inner.initialize()
    }

    fn write(&mut self, batch: Vec<AsyncLogEventInfo>) {
        let triggered = match &self.condition {
            None => true,
            Some(condition) => batch.iter().any(|info| condition(&info.event)),
        };
        self.inner.write(batch);
        if triggered {
            self.trigger_flush();
        }
    }

    fn flush(&mut self, done: Continuation) {
        if self.flush_on_condition_only {
            done.done(None);
            return;
        }
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

/// Trigger-only flush decorator for composition above buffering layers:
/// writes pass through untouched, and a matching event flushes the inner
/// target fire-and-forget.
pub struct FlushTriggerWrapper {
    name: String,
    inner: Box<dyn Target>,
    condition: Condition,
    closed: bool,
}

impl FlushTriggerWrapper {
    pub fn new(inner: Box<dyn Target>, condition: Condition) -> Self {
        let name = format!("flush-trigger({})", inner.name());
        Self {
            name,
            inner,
            condition,
            closed: false,
        }
    }
}

impl Target for FlushTriggerWrapper {
    fn name(&self) -> &str {
        &self.name
    }

    fn initialize(&mut self) -> Result<()> {
        self.inner.initialize()
    }

    fn write(&mut self, batch: Vec<AsyncLogEventInfo>) {
        let triggered = batch.iter().any(|info| (self.condition)(&info.event));
        self.inner.write(batch);
        if triggered {
            self.inner.flush(Continuation::none());
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
