//! Target capability: the single seam between the pipeline and anything that
//! can deliver log events
//!
//! Wrapper targets and concrete sinks implement the same trait, so policies
//! compose by decoration: each wrapper owns exactly one (or a list of) inner
//! `Box<dyn Target>`.
//!
//! Contract:
//! - `initialize` runs once before the first write; configuration problems
//!   surface here (or in the constructor), never as a silent no-op.
//! - `write` must not panic and has no return value: per-event outcome is
//!   reported exclusively through each event's continuation, which the
//!   receiving target (or whichever layer finally fails the event) fires
//!   exactly once.
//! - `flush` completes its continuation once all previously written events
//!   are delivered as far as this target can push them.
//! - `close` is idempotent, releases any blocked producers, and leaves no
//!   thread waiting indefinitely.

use super::continuation::{AsyncLogEventInfo, Continuation};
use super::error::Result;

pub trait Target: Send {
    /// Diagnostic name used in error messages and internal reporting.
    fn name(&self) -> &str;

    /// Prepare the target for writes. Called once before the first write.
    fn initialize(&mut self) -> Result<()>;

    /// Deliver a batch, firing each event's continuation exactly once,
    /// synchronously or asynchronously.
    fn write(&mut self, batch: Vec<AsyncLogEventInfo>);

    /// Push everything written so far through, then complete `done`.
    fn flush(&mut self, done: Continuation);

    /// Stop accepting work and release resources. Idempotent.
    fn close(&mut self);

    /// Convenience for single-event writes.
    fn write_event(&mut self, info: AsyncLogEventInfo) {
        self.write(vec![info]);
    }
}
