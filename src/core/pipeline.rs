//! Pipeline facade: owns a composed target chain with an explicit lifecycle
//!
//! A [`Pipeline`] is the application-facing handle: it initializes the chain
//! on construction, serializes access to the outermost target, and closes
//! the chain on drop with the bounded shutdown each wrapper implements.
//! Multiple independent pipelines can coexist in one process; there is no
//! ambient global state.

use super::condition::Condition;
use super::continuation::{AsyncLogEventInfo, Continuation};
use super::error::{PipelineError, Result};
use super::log_event::LogEvent;
use super::queue::OverflowAction;
use super::target::Target;
use crate::wrappers::{
    AsyncTargetWrapper, AutoFlushTargetWrapper, BufferingTargetWrapper, FilteringTargetWrapper,
    LimitingTargetWrapper, RetryingTargetWrapper,
};
use parking_lot::Mutex;
use std::time::Duration;

struct PipelineInner {
    target: Box<dyn Target>,
    closed: bool,
}

/// Owns a composed target chain.
///
/// # Example
///
/// ```
/// use log_pipeline::targets::MemoryTarget;
/// use log_pipeline::{LogEvent, LogLevel, Pipeline};
/// use std::time::Duration;
///
/// let memory = MemoryTarget::new("memory");
/// let buffer = memory.buffer();
///
/// let pipeline = Pipeline::builder(Box::new(memory))
///     .buffered(100)
///     .unwrap()
///     .async_delivery()
///     .build()
///     .unwrap();
///
/// pipeline.write(LogEvent::new(LogLevel::Info, "service started"));
/// pipeline.flush_timeout(Duration::from_secs(5)).unwrap();
/// assert_eq!(buffer.lock().len(), 1);
/// ```
pub struct Pipeline {
    name: String,
    inner: Mutex<PipelineInner>,
}

impl Pipeline {
    /// Take ownership of a target chain and initialize it.
    pub fn new(mut target: Box<dyn Target>) -> Result<Self> {
        target.initialize()?;
        Ok(Self {
            name: target.name().to_string(),
            inner: Mutex::new(PipelineInner {
                target,
                closed: false,
            }),
        })
    }

    pub fn builder(target: Box<dyn Target>) -> PipelineBuilder {
        PipelineBuilder::new(target)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fire-and-forget write.
    pub fn write(&self, event: LogEvent) {
        self.write_with(event, Continuation::none());
    }

    /// Write with a completion continuation.
    pub fn write_with(&self, event: LogEvent, continuation: Continuation) {
        let mut inner = self.inner.lock();
        if inner.closed {
            continuation.done(Some(PipelineError::closed(&self.name)));
            return;
        }
        inner
            .target
            .write_event(AsyncLogEventInfo::new(event, continuation));
    }

    /// Flush with a completion continuation.
    pub fn flush(&self, done: Continuation) {
        let mut inner = self.inner.lock();
        if inner.closed {
            done.done(Some(PipelineError::closed(&self.name)));
            return;
        }
        inner.target.flush(done);
    }

    /// Flush and wait for completion, up to `timeout`.
    pub fn flush_timeout(&self, timeout: Duration) -> Result<()> {
        let (done, latch) = Continuation::latch();
        self.flush(done);
        match latch.wait(timeout) {
            Some(None) => Ok(()),
            Some(Some(error)) => Err(error),
            None => Err(PipelineError::CompletionTimeout {
                target: self.name.clone(),
                waited_ms: timeout.as_millis() as u64,
            }),
        }
    }

    /// Close the chain. Idempotent; further writes fail their continuations.
    pub fn close(&self) {
        let mut inner = self.inner.lock();
        if inner.closed {
            return;
        }
        inner.closed = true;
        inner.target.close();
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        self.close();
    }
}

/// Builds a target chain by stacking decorators, innermost first.
///
/// # Example
///
/// ```
/// use log_pipeline::targets::MemoryTarget;
/// use log_pipeline::{level_at_least, LogLevel, OverflowAction, Pipeline};
/// use std::time::Duration;
///
/// let pipeline = Pipeline::builder(Box::new(MemoryTarget::new("memory")))
///     .retrying(3, Duration::from_millis(100))
///     .unwrap()
///     .filtered(level_at_least(LogLevel::Info))
///     .async_delivery_with(10_000, OverflowAction::Block)
///     .build()
///     .unwrap();
/// # drop(pipeline);
/// ```
pub struct PipelineBuilder {
    target: Box<dyn Target>,
}

impl PipelineBuilder {
    pub fn new(target: Box<dyn Target>) -> Self {
        Self { target }
    }

    /// Batch events before they reach the current chain.
    pub fn buffered(self, buffer_size: usize) -> Result<Self> {
        Ok(Self {
            target: Box::new(BufferingTargetWrapper::new(self.target, buffer_size)?),
        })
    }

    /// Batch events with a flush timeout for quiet periods.
    pub fn buffered_with_timeout(self, buffer_size: usize, flush_timeout: Duration) -> Result<Self> {
        Ok(Self {
            target: Box::new(
                BufferingTargetWrapper::new(self.target, buffer_size)?
                    .with_flush_timeout(flush_timeout),
            ),
        })
    }

    /// Retry failed writes against the current chain.
    pub fn retrying(self, retry_count: usize, retry_delay: Duration) -> Result<Self> {
        Ok(Self {
            target: Box::new(RetryingTargetWrapper::new(
                self.target,
                retry_count,
                retry_delay,
            )?),
        })
    }

    /// Cap events forwarded per interval.
    pub fn limited(self, message_limit: usize, interval: Duration) -> Result<Self> {
        Ok(Self {
            target: Box::new(LimitingTargetWrapper::new(
                self.target,
                message_limit,
                interval,
            )?),
        })
    }

    /// Forward only events matching the condition.
    pub fn filtered(self, condition: Condition) -> Self {
        Self {
            target: Box::new(FilteringTargetWrapper::new(self.target, condition)),
        }
    }

    /// Flush the chain whenever a written event matches the condition.
    pub fn auto_flushed(self, condition: Condition) -> Self {
        Self {
            target: Box::new(AutoFlushTargetWrapper::new(self.target).with_condition(condition)),
        }
    }

    /// Decouple producers from the chain with the default queue settings.
    pub fn async_delivery(self) -> Self {
        Self {
            target: Box::new(AsyncTargetWrapper::new(self.target)),
        }
    }

    /// Decouple producers with an explicit queue limit and overflow action.
    pub fn async_delivery_with(self, queue_limit: usize, overflow_action: OverflowAction) -> Self {
        Self {
            target: Box::new(
                AsyncTargetWrapper::new(self.target)
                    .with_queue_limit(queue_limit)
                    .with_overflow_action(overflow_action),
            ),
        }
    }

    /// Initialize the chain and hand back the pipeline.
    pub fn build(self) -> Result<Pipeline> {
        Pipeline::new(self.target)
    }
}
