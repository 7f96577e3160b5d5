//! In-memory target: collects rendered events in a shared buffer
//!
//! The one concrete sink the crate ships; everything I/O-bound (files,
//! console, network) lives outside the pipeline behind the same [`Target`]
//! capability. Mostly useful for tests, examples, and capturing recent
//! events for diagnostics endpoints.

use crate::core::continuation::{complete_all, AsyncLogEventInfo, Continuation};
use crate::core::error::{PipelineError, Result};
use crate::core::log_event::LogEvent;
use crate::core::target::Target;
use parking_lot::Mutex;
use std::sync::Arc;

/// Rendering applied to stored events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderFormat {
    /// `[timestamp] [LEVEL] logger - message key=value`
    #[default]
    Text,
    /// One JSON object per entry
    Json,
}

/// Shared view over a [`MemoryTarget`]'s collected entries.
pub type MemoryBuffer = Arc<Mutex<Vec<String>>>;

pub struct MemoryTarget {
    name: String,
    entries: MemoryBuffer,
    format: RenderFormat,
    max_entries: Option<usize>,
    initialized: bool,
    closed: bool,
}

impl MemoryTarget {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: Arc::new(Mutex::new(Vec::new())),
            format: RenderFormat::default(),
            max_entries: None,
            initialized: false,
            closed: false,
        }
    }

    #[must_use = "builder methods return a new value"]
    pub fn with_format(mut self, format: RenderFormat) -> Self {
        self.format = format;
        self
    }

    /// Cap the buffer; the oldest entries are discarded beyond the cap.
    #[must_use = "builder methods return a new value"]
    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = Some(max_entries.max(1));
        self
    }

    /// Handle to the collected entries, usable after the target is boxed
    /// into a pipeline.
    pub fn buffer(&self) -> MemoryBuffer {
        Arc::clone(&self.entries)
    }

    /// Snapshot of the collected entries.
    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().clone()
    }

    fn render(&self, event: &LogEvent) -> String {
        match self.format {
            RenderFormat::Text => {
                let mut line = format!(
                    "[{}] [{:5}] {} - {}",
                    event.timestamp.format("%Y-%m-%d %H:%M:%S%.3f"),
                    event.level.to_str(),
                    event.logger,
                    event.message
                );
                if !event.properties.is_empty() {
                    line.push(' ');
                    line.push_str(&event.format_properties());
                }
                if let Some(ref exception) = event.exception {
                    line.push_str(&format!(" | {}", exception));
                }
                line
            }
            RenderFormat::Json => serde_json::to_string(event)
                .unwrap_or_else(|_| format!("{{\"message\":\"{}\"}}", event.message)),
        }
    }
}

impl Target for MemoryTarget {
    fn name(&self) -> &str {
        &self.name
    }

    fn initialize(&mut self) -> Result<()> {
        if self.closed {
            return Err(PipelineError::closed(&self.name));
        }
        self.initialized = true;
        Ok(())
    }

    fn write(&mut self, batch: Vec<AsyncLogEventInfo>) {
        if !self.initialized || self.closed {
            let error = if self.closed {
                PipelineError::closed(&self.name)
            } else {
                PipelineError::not_initialized(&self.name)
            };
            complete_all(batch, Some(error));
            return;
        }

        let mut entries = self.entries.lock();
        for info in batch {
            entries.push(self.render(&info.event));
            if let Some(max) = self.max_entries {
                if entries.len() > max {
                    let overflow = entries.len() - max;
                    entries.drain(..overflow);
                }
            }
            info.continuation.done(None);
        }
    }

    fn flush(&mut self, done: Continuation) {
        done.done(None);
    }

    fn close(&mut self) {
        self.closed = true;
    }
}
