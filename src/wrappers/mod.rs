//! Wrapper targets: composable delivery policies
//!
//! Every wrapper implements the same [`Target`](crate::core::Target)
//! capability and owns its inner target(s), so policies stack in arbitrary
//! order: `async(retrying(buffered(fallback(...))))` and the like.

pub mod async_wrapper;
pub mod auto_flush;
pub mod buffering;
pub mod fallback;
pub mod filtering;
pub mod group_by;
pub mod limiting;
pub mod repeating;
pub mod retrying;
pub mod round_robin;
pub mod split;

pub use async_wrapper::{
    AsyncTargetWrapper, DEFAULT_BATCH_SIZE, DEFAULT_FULL_BATCH_WRITE_LIMIT, DEFAULT_SHUTDOWN_TIMEOUT,
    DEFAULT_TIME_TO_SLEEP,
};
pub use auto_flush::{AutoFlushTargetWrapper, FlushTriggerWrapper};
pub use buffering::{BufferingTargetWrapper, DEFAULT_BUFFER_SIZE};
pub use fallback::FallbackGroupTarget;
pub use filtering::{FilterRule, FilteringTargetWrapper, PostFilteringTargetWrapper};
pub use group_by::{GroupByTargetWrapper, KeySelector, TargetFactory};
pub use limiting::LimitingTargetWrapper;
pub use repeating::RepeatingTargetWrapper;
pub use retrying::{CancelToken, RetryingTargetWrapper, DEFAULT_RETRY_COUNT, DEFAULT_RETRY_DELAY};
pub use round_robin::RoundRobinGroupTarget;
pub use split::SplitGroupTarget;
