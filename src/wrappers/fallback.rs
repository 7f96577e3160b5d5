//! Fallback group target: ordered failover across sinks
//!
//! Keeps a cursor on the sink currently believed healthy. A failed write
//! advances the cursor and retries the same event against the next sink;
//! only after every sink rejected the event does its continuation see the
//! terminal error.

use crate::core::continuation::{AsyncLogEventInfo, Continuation, COMPLETION_WAIT};
use crate::core::error::{PipelineError, Result};
use crate::core::target::Target;

/// Tries an ordered list of sinks, advancing on failure.
pub struct FallbackGroupTarget {
    name: String,
    sinks: Vec<Box<dyn Target>>,
    cursor: usize,
    return_to_first_on_success: bool,
    closed: bool,
}

impl FallbackGroupTarget {
    pub fn new(name: impl Into<String>, sinks: Vec<Box<dyn Target>>) -> Result<Self> {
        let name = name.into();
        if sinks.is_empty() {
            return Err(PipelineError::config(&name, "fallback group needs at least one sink"));
        }
        Ok(Self {
            name,
            sinks,
            cursor: 0,
            return_to_first_on_success: false,
            closed: false,
        })
    }

    /// When true, a success on any non-first sink resets the cursor so the
    /// primary sink gets another chance on the next event.
    #[must_use = "builder methods return a new value"]
    pub fn with_return_to_first_on_success(mut self, return_to_first: bool) -> Self {
        self.return_to_first_on_success = return_to_first;
        self
    }

    /// Index of the sink the next event will be tried against first.
    pub fn current_sink(&self) -> usize {
        self.cursor
    }

    fn write_with_failover(&mut self, info: AsyncLogEventInfo) {
        let AsyncLogEventInfo {
            event,
            continuation,
        } = info;

        let sink_count = self.sinks.len();
        let mut last_error: Option<PipelineError> = None;

        for _ in 0..sink_count {
            let index = self.cursor;
            let (probe, latch) = Continuation::latch();
            self.sinks[index].write_event(AsyncLogEventInfo::new(event.clone(), probe));

            match latch.wait(COMPLETION_WAIT) {
                Some(None) => {
                    if index != 0 && self.return_to_first_on_success {
                        self.cursor = 0;
                    }
                    continuation.done(None);
                    return;
                }
                Some(Some(error)) => last_error = Some(error),
                None => {
                    last_error = Some(PipelineError::CompletionTimeout {
                        target: self.sinks[index].name().to_string(),
                        waited_ms: COMPLETION_WAIT.as_millis() as u64,
                    })
                }
            }

            self.cursor = (self.cursor + 1) % sink_count;
        }

        let last_error = last_error.unwrap_or_else(|| PipelineError::closed(&self.name));
        continuation.done(Some(PipelineError::all_targets_failed(sink_count, last_error)));
    }
}

impl Target for FallbackGroupTarget {
    fn name(&self) -> &str {
        &self.name
    }

    fn initialize(&mut self) -> Result<()> {
        for sink in &mut self.sinks {
            sink.initialize()?;
        }
        Ok(())
    }

    fn write(&mut self, batch: Vec<AsyncLogEventInfo>) {
        for info in batch {
            self.write_with_failover(info);
        }
    }

    fn flush(&mut self, done: Continuation) {
        // Every sink is flushed, even after one fails; the aggregate carries
        // the first error encountered.
        let children = done.fan_out(self.sinks.len());
        for (sink, child) in self.sinks.iter_mut().zip(children) {
            sink.flush(child);
        }
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        for sink in &mut self.sinks {
            sink.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{event, CollectingTarget, FlakyTarget};
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    #[test]
    fn test_failover_order_and_sticky_cursor() {
        // sink1 fails once then works; without return-to-first the cursor
        // sticks on sink2, so 10 writes land 1/9/0.
        let (sink1, calls1, _) = FlakyTarget::new("sink1", 1);
        let (sink2, calls2, probe2) = FlakyTarget::new("sink2", 0);
        let (sink3, calls3, _) = FlakyTarget::new("sink3", 0);

        let mut group = FallbackGroupTarget::new(
            "fallback",
            vec![Box::new(sink1), Box::new(sink2), Box::new(sink3)],
        )
        .unwrap();
        group.initialize().unwrap();

        for n in 0..10 {
            group.write_event(AsyncLogEventInfo::fire_and_forget(event(&format!("msg {}", n))));
        }

        assert_eq!(calls1.load(Ordering::SeqCst), 1);
        assert_eq!(calls2.load(Ordering::SeqCst), 9);
        assert_eq!(calls3.load(Ordering::SeqCst), 0);
        assert_eq!(probe2.messages().len(), 9);
    }

    #[test]
    fn test_return_to_first_on_success() {
        let (sink1, calls1, _) = FlakyTarget::new("sink1", 1);
        let (sink2, calls2, _) = FlakyTarget::new("sink2", 0);

        let mut group = FallbackGroupTarget::new("fallback", vec![Box::new(sink1), Box::new(sink2)])
            .unwrap()
            .with_return_to_first_on_success(true);
        group.initialize().unwrap();

        for n in 0..10 {
            group.write_event(AsyncLogEventInfo::fire_and_forget(event(&format!("msg {}", n))));
        }

        // Event 1 fails over to sink2, which resets the cursor; events 2-10
        // go straight to the recovered sink1.
        assert_eq!(calls1.load(Ordering::SeqCst), 10);
        assert_eq!(calls2.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_exhaustion_reports_last_error() {
        let (sink1, _, _) = FlakyTarget::new("sink1", usize::MAX);
        let (sink2, _, _) = FlakyTarget::new("sink2", usize::MAX);

        let mut group =
            FallbackGroupTarget::new("fallback", vec![Box::new(sink1), Box::new(sink2)]).unwrap();
        group.initialize().unwrap();

        let (continuation, latch) = Continuation::latch();
        group.write_event(AsyncLogEventInfo::new(event("doomed"), continuation));

        let outcome = latch.wait(Duration::from_secs(5)).expect("completed");
        assert!(matches!(
            outcome,
            Some(PipelineError::AllTargetsFailed { sink_count: 2, .. })
        ));
    }

    #[test]
    fn test_flush_reaches_every_sink() {
        let (sink1, probe1) = CollectingTarget::new("sink1");
        let (sink2, probe2) = CollectingTarget::new("sink2");

        let mut group =
            FallbackGroupTarget::new("fallback", vec![Box::new(sink1), Box::new(sink2)]).unwrap();
        group.initialize().unwrap();

        let (done, latch) = Continuation::latch();
        group.flush(done);
        assert!(latch.wait(Duration::from_secs(1)).is_some());
        assert_eq!(probe1.flush_calls(), 1);
        assert_eq!(probe2.flush_calls(), 1);
    }

    #[test]
    fn test_empty_group_rejected() {
        assert!(matches!(
            FallbackGroupTarget::new("fallback", Vec::new()),
            Err(PipelineError::InvalidConfiguration { .. })
        ));
    }
}
