//! # Log Pipeline
//!
//! Asynchronous log event delivery pipeline with composable wrapper targets.
//!
//! ## Features
//!
//! - **Non-blocking producers**: a bounded queue with Discard / Grow / Block
//!   overflow actions decouples application threads from slow sinks
//! - **Exactly-once completion**: every event carries a single-shot
//!   continuation that fires once, across retries, failover, and fan-out
//! - **Composable policies**: buffering, retry, fallback, round-robin,
//!   broadcast, filtering, auto-flush, rate limiting, and key partitioning
//!   all decorate the same target capability
//! - **Observable backpressure**: dropped-event and queue-grow notifications
//!   plus atomic delivery metrics

pub mod core;
pub mod targets;
pub mod wrappers;

#[cfg(test)]
pub(crate) mod test_util;

pub mod prelude {
    pub use crate::core::{
        always, complete_all, level_at_least, logger_equals, AsyncLogEventInfo, AsyncRequestQueue,
        CompletionLatch, Condition, Continuation, FieldValue, LogEvent, LogLevel,
        OverflowAction, Pipeline, PipelineBuilder, PipelineError, PipelineMetrics, QueueEvent,
        QueueEventCallback, Result, Target, DEFAULT_QUEUE_LIMIT,
    };
    pub use crate::targets::MemoryTarget;
    pub use crate::wrappers::{
        AsyncTargetWrapper, AutoFlushTargetWrapper, BufferingTargetWrapper, FallbackGroupTarget,
        FilterRule, FilteringTargetWrapper, FlushTriggerWrapper, GroupByTargetWrapper,
        LimitingTargetWrapper, PostFilteringTargetWrapper, RepeatingTargetWrapper,
        RetryingTargetWrapper, RoundRobinGroupTarget, SplitGroupTarget,
    };
}

pub use crate::core::{
    always, complete_all, level_at_least, logger_equals, AsyncLogEventInfo, AsyncRequestQueue,
    CompletionLatch, Condition, Continuation, FieldValue, LogEvent, LogLevel,
    OverflowAction, Pipeline, PipelineBuilder, PipelineError, PipelineMetrics, QueueEvent,
    QueueEventCallback, Result, Target, DEFAULT_QUEUE_LIMIT,
};
