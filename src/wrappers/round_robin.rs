//! Round-robin group target: distributes events across sinks one at a time

use crate::core::continuation::{AsyncLogEventInfo, Continuation};
use crate::core::error::Result;
use crate::core::target::Target;

/// Routes each successive event to exactly one sink, cycling in order.
///
/// An empty group accepts events trivially: every continuation completes
/// with success and no sink is invoked.
pub struct RoundRobinGroupTarget {
    name: String,
    sinks: Vec<Box<dyn Target>>,
    cursor: usize,
    closed: bool,
}

impl RoundRobinGroupTarget {
    pub fn new(name: impl Into<String>, sinks: Vec<Box<dyn Target>>) -> Self {
        Self {
            name: name.into(),
            sinks,
            cursor: 0,
            closed: false,
        }
    }
}

impl Target for RoundRobinGroupTarget {
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
        if self.sinks.is_empty() {
            for info in batch {
                info.continuation.done(None);
            }
            return;
        }

        for info in batch {
            let index = self.cursor;
            self.cursor = (self.cursor + 1) % self.sinks.len();
            self.sinks[index].write_event(info);
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
