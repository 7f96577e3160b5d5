//! Repeating target wrapper: forwards N copies of each event
//!
//! Copies are written sequentially and fail fast: once copy K fails, copies
//! K+1..N are not attempted and the event's continuation carries that single
//! failure.

use crate::core::continuation::{AsyncLogEventInfo, Continuation, COMPLETION_WAIT};
use crate::core::error::{PipelineError, Result};
use crate::core::target::Target;

pub struct RepeatingTargetWrapper {
    name: String,
    inner: Box<dyn Target>,
    repeat_count: usize,
    closed: bool,
}

impl RepeatingTargetWrapper {
    pub fn new(inner: Box<dyn Target>, repeat_count: usize) -> Result<Self> {
        let name = format!("repeating({})", inner.name());
        if repeat_count == 0 {
            return Err(PipelineError::config(&name, "repeat_count must be positive"));
        }
        Ok(Self {
            name,
            inner,
            repeat_count,
            closed: false,
        })
    }

    fn write_copies(&mut self, info: AsyncLogEventInfo) {
        let AsyncLogEventInfo {
            event,
            continuation,
        } = info;

        for _ in 0..self.repeat_count {
            let (probe, latch) = Continuation::latch();
            self.inner
                .write_event(AsyncLogEventInfo::new(event.clone(), probe));

            match latch.wait(COMPLETION_WAIT) {
                Some(None) => {}
                Some(Some(error)) => {
                    continuation.done(Some(error));
                    return;
                }
                None => {
                    continuation.done(Some(PipelineError::CompletionTimeout {
                        target: self.name.clone(),
                        waited_ms: COMPLETION_WAIT.as_millis() as u64,
                    }));
                    return;
                }
            }
        }
        continuation.done(None);
    }
}

impl Target for RepeatingTargetWrapper {
    fn name(&self) -> &str {
        &self.name
    }

    fn initialize(&mut self) -> Result<()> {
        self.inner.initialize()
    }

    fn write(&mut self, batch: Vec<AsyncLogEventInfo>) {
        for info in batch {
            self.write_copies(info);
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
