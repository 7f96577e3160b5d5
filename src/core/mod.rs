//! Core pipeline types: events, continuations, queue, and the facade

pub mod condition;
pub mod continuation;
pub mod error;
pub mod log_event;
pub mod log_level;
pub mod metrics;
pub mod pipeline;
pub mod queue;
pub mod target;

pub use condition::{always, level_at_least, logger_equals, Condition};
pub use continuation::{complete_all, AsyncLogEventInfo, CompletionLatch, Continuation};
pub use error::{PipelineError, Result};
pub use log_event::{FieldValue, LogEvent};
pub use log_level::LogLevel;
pub use metrics::PipelineMetrics;
pub use pipeline::{Pipeline, PipelineBuilder};
pub use queue::{
    AsyncRequestQueue, OverflowAction, QueueEvent, QueueEventCallback, DEFAULT_QUEUE_LIMIT,
};
pub use target::Target;
