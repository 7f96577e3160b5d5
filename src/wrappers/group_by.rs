//! Group-by target wrapper: one independent inner target per computed key
//!
//! Group targets are created lazily through the supplied factory and are
//! never merged. Key cardinality is unbounded here; callers are expected to
//! bound the key space externally.

use crate::core::continuation::{complete_all, AsyncLogEventInfo, Continuation};
use crate::core::error::Result;
use crate::core::log_event::LogEvent;
use crate::core::target::Target;
use std::collections::HashMap;
use std::sync::Arc;

/// Computes the partition key for an event.
pub type KeySelector = Arc<dyn Fn(&LogEvent) -> String + Send + Sync>;

/// Creates the inner target for a newly seen key.
pub type TargetFactory = Box<dyn Fn(&str) -> Box<dyn Target> + Send>;

pub struct GroupByTargetWrapper {
    name: String,
    key_selector: KeySelector,
    factory: TargetFactory,
    groups: HashMap<String, Box<dyn Target>>,
    closed: bool,
}

impl GroupByTargetWrapper {
    pub fn new(name: impl Into<String>, key_selector: KeySelector, factory: TargetFactory) -> Self {
        Self {
            name: name.into(),
            key_selector,
            factory,
            groups: HashMap::new(),
            closed: false,
        }
    }

    /// Number of group targets created so far.
    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    fn partition(&self, batch: Vec<AsyncLogEventInfo>) -> Vec<(String, Vec<AsyncLogEventInfo>)> {
        // Order is preserved within each key's sub-batch; partitions are
        // emitted in first-seen order.
        let mut order: Vec<String> = Vec::new();
        let mut by_key: HashMap<String, Vec<AsyncLogEventInfo>> = HashMap::new();
        for info in batch {
            let key = (self.key_selector)(&info.event);
            let slot = by_key.entry(key.clone()).or_insert_with(|| {
                order.push(key);
                Vec::new()
            });
            slot.push(info);
        }
        order
            .into_iter()
            .map(|key| {
                let sub_batch = by_key.remove(&key).unwrap_or_default();
                (key, sub_batch)
            })
            .collect()
    }
}

impl Target for GroupByTargetWrapper {
    fn name(&self) -> &str {
        &self.name
    }

    fn initialize(&mut self) -> Result<()> {
        // Group targets are initialized as they are created.
        Ok(())
    }

    fn write(&mut self, batch: Vec<AsyncLogEventInfo>) {
        for (key, sub_batch) in self.partition(batch) {
            if !self.groups.contains_key(&key) {
                let mut created = (self.factory)(&key);
                if let Err(error) = created.initialize() {
                    complete_all(sub_batch, Some(error));
                    continue;
                }
                self.groups.insert(key.clone(), created);
            }
            if let Some(group) = self.groups.get_mut(&key) {
                group.write(sub_batch);
            }
        }
    }

    fn flush(&mut self, done: Continuation) {
        let children = done.fan_out(self.groups.len());
        for (group, child) in self.groups.values_mut().zip(children) {
            group.flush(child);
        }
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        for group in self.groups.values_mut() {
            group.close();
        }
    }
}
