//! Split group target: broadcasts every event to every sink
//!
//! Each event's continuation fires exactly once, after all legs have
//! completed, carrying the first error any leg reported. Per-sink batches
//! preserve input order; ordering between independently draining legs is
//! not guaranteed.

use crate::core::continuation::{complete_all, AsyncLogEventInfo, Continuation};
use crate::core::error::Result;
use crate::core::target::Target;

pub struct SplitGroupTarget {
    name: String,
    sinks: Vec<Box<dyn Target>>,
    closed: bool,
}

impl SplitGroupTarget {
    pub fn new(name: impl Into<String>, sinks: Vec<Box<dyn Target>>) -> Self {
        Self {
            name: name.into(),
            sinks,
            closed: false,
        }
    }
}

impl Target for SplitGroupTarget {
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
        let sink_count = self.sinks.len();
        if sink_count == 0 {
            complete_all(batch, None);
            return;
        }

        let mut per_sink: Vec<Vec<AsyncLogEventInfo>> = (0..sink_count)
            .map(|_| Vec::with_capacity(batch.len()))
            .collect();

        for info in batch {
            let AsyncLogEventInfo {
                event,
                continuation,
            } = info;
            let children = continuation.fan_out(sink_count);
            for (leg, child) in per_sink.iter_mut().zip(children) {
                leg.push(AsyncLogEventInfo::new(event.clone(), child));
            }
        }

        for (sink, leg) in self.sinks.iter_mut().zip(per_sink) {
            sink.write(leg);
        }
    }

    fn flush(&mut self, done: Continuation) {
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
