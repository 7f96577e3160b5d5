//! Filtering wrappers: per-event and batch-level conditions
//!
//! A filtered-out event is accepted but not written: its continuation
//! completes with success. This is deliberately distinct from backpressure
//! loss, where the queue evicts events and abandons their continuations.

use crate::core::condition::Condition;
use crate::core::continuation::{AsyncLogEventInfo, Continuation};
use crate::core::error::Result;
use crate::core::target::Target;

/// Forwards only the events matching a condition.
pub struct FilteringTargetWrapper {
    name: String,
    inner: Box<dyn Target>,
    condition: Condition,
    closed: bool,
}

impl FilteringTargetWrapper {
    pub fn new(inner: Box<dyn Target>, condition: Condition) -> Self {
        let name = format!("filtered({})", inner.name());
        Self {
            name,
            inner,
            condition,
            closed: false,
        }
    }
}

impl Target for FilteringTargetWrapper {
    fn name(&self) -> &str {
        &self.name
    }

    fn initialize(&mut self) -> Result<()> {
        self.inner.initialize()
    }

    fn write(&mut self, batch: Vec<AsyncLogEventInfo>) {
        let mut forwarded = Vec::with_capacity(batch.len());
        for info in batch {
            if (self.condition)(&info.event) {
                forwarded.push(info);
            } else {
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

/// Rule for [`PostFilteringTargetWrapper`]: when `exists` matches any event
/// in a batch, `apply` becomes the filter for the whole batch.
pub struct FilterRule {
    pub exists: Condition,
    pub apply: Condition,
}

impl FilterRule {
    pub fn new(exists: Condition, apply: Condition) -> Self {
        Self { exists, apply }
    }
}

/// Picks one condition per batch, then applies it to every event.
///
/// Rules are evaluated in order against the whole batch; the first rule
/// whose `exists` condition matches some event wins. With no matching rule
/// the default condition applies. The decision is batch-level by design: a
/// single alarming event changes what the entire batch keeps.
pub struct PostFilteringTargetWrapper {
    name: String,
    inner: Box<dyn Target>,
    default_condition: Condition,
    rules: Vec<FilterRule>,
    closed: bool,
}

impl PostFilteringTargetWrapper {
    pub fn new(inner: Box<dyn Target>, default_condition: Condition, rules: Vec<FilterRule>) -> Self {
        let name = format!("post-filtered({})", inner.name());
        Self {
            name,
            inner,
            default_condition,
            rules,
            closed: false,
        }
    }

    fn select_condition(&self, batch: &[AsyncLogEventInfo]) -> Condition {
        for rule in &self.rules {
            if batch.iter().any(|info| (rule.exists)(&info.event)) {
                return Condition::clone(&rule.apply);
            }
        }
        Condition::clone(&self.default_condition)
    }
}

impl Target for PostFilteringTargetWrapper {
    fn name(&self) -> &str {
        &self.name
    }

    fn initialize(&mut self) -> Result<()> {
        self.inner.initialize()
    }

    fn write(&mut self, batch: Vec<AsyncLogEventInfo>) {
        let condition = self.select_condition(&batch);
        let mut forwarded = Vec::with_capacity(batch.len());
        for info in batch {
            if condition(&info.event) {
                forwarded.push(info);
            } else {
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
