//! Single-shot completion continuations
//!
//! Every log event entering the pipeline carries a [`Continuation`] that is
//! invoked exactly once with the event's final outcome, no matter how many
//! wrapper hops, retries, or fan-out copies the event goes through.
//! `done` consumes the continuation, so the single holder cannot invoke it
//! twice; a continuation that is dropped without being invoked is abandoned
//! (only the queue's Discard eviction is allowed to do that).

use super::error::PipelineError;
use super::log_event::LogEvent;
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Bounded wait used by wrappers that observe a wrapped target's outcome
/// before deciding their next step (retry, failover, repeat).
pub(crate) const COMPLETION_WAIT: Duration = Duration::from_secs(30);

/// Single-shot completion callback: `None` means success, `Some(err)` the
/// final failure for this event.
pub struct Continuation(Option<Box<dyn FnOnce(Option<PipelineError>) + Send>>);

impl Continuation {
    pub fn new(f: impl FnOnce(Option<PipelineError>) + Send + 'static) -> Self {
        Self(Some(Box::new(f)))
    }

    /// A continuation that does nothing (fire-and-forget writes).
    pub fn none() -> Self {
        Self(None)
    }

    /// Invoke the continuation with the event's final outcome.
    pub fn done(self, error: Option<PipelineError>) {
        if let Some(f) = self.0 {
            f(error);
        }
    }

    /// Create a continuation paired with a latch the caller can wait on.
    pub fn latch() -> (Continuation, CompletionLatch) {
        let state = Arc::new(LatchState {
            result: Mutex::new(None),
            completed: Condvar::new(),
        });
        let signal = Arc::clone(&state);
        let continuation = Continuation::new(move |error| {
            *signal.result.lock() = Some(error);
            signal.completed.notify_all();
        });
        (continuation, CompletionLatch { state })
    }

    /// Split into `count` child continuations whose aggregate fires this
    /// continuation exactly once, after every child has completed, with the
    /// first error any child reported (or `None` if all succeeded).
    ///
    /// `count == 0` completes immediately with success.
    pub fn fan_out(self, count: usize) -> Vec<Continuation> {
        if count == 0 {
            self.done(None);
            return Vec::new();
        }

        let aggregate = Arc::new(Mutex::new(FanOutState {
            remaining: count,
            first_error: None,
            parent: Some(self),
        }));

        (0..count)
            .map(|_| {
                let state = Arc::clone(&aggregate);
                Continuation::new(move |error| {
                    let finished = {
                        let mut guard = state.lock();
                        guard.remaining -= 1;
                        if guard.first_error.is_none() {
                            guard.first_error = error;
                        }
                        if guard.remaining == 0 {
                            Some((guard.parent.take(), guard.first_error.take()))
                        } else {
                            None
                        }
                    };
                    if let Some((Some(parent), first_error)) = finished {
                        parent.done(first_error);
                    }
                })
            })
            .collect()
    }

    /// Merge several continuations into one that completes all of them.
    pub fn join(continuations: Vec<Continuation>) -> Continuation {
        if continuations.is_empty() {
            return Continuation::none();
        }
        Continuation::new(move |error| {
            for continuation in continuations {
                continuation.done(error.clone());
            }
        })
    }
}

struct FanOutState {
    remaining: usize,
    first_error: Option<PipelineError>,
    parent: Option<Continuation>,
}

struct LatchState {
    result: Mutex<Option<Option<PipelineError>>>,
    completed: Condvar,
}

/// Waits for the outcome signaled by a latch continuation.
pub struct CompletionLatch {
    state: Arc<LatchState>,
}

impl CompletionLatch {
    /// Wait up to `timeout` for the paired continuation to fire.
    ///
    /// Returns `None` on timeout, `Some(outcome)` once completed. Waiting
    /// again after completion returns the same outcome.
    pub fn wait(&self, timeout: Duration) -> Option<Option<PipelineError>> {
        let deadline = Instant::now() + timeout;
        let mut result = self.state.result.lock();
        while result.is_none() {
            if self
                .state
                .completed
                .wait_until(&mut result, deadline)
                .timed_out()
            {
                break;
            }
        }
        result.clone()
    }

    /// Whether the paired continuation has fired.
    pub fn is_complete(&self) -> bool {
        self.state.result.lock().is_some()
    }
}

/// A log event paired with its completion continuation: the unit the queue
/// and every wrapper target operate on.
pub struct AsyncLogEventInfo {
    pub event: LogEvent,
    pub continuation: Continuation,
}

impl AsyncLogEventInfo {
    pub fn new(event: LogEvent, continuation: Continuation) -> Self {
        Self {
            event,
            continuation,
        }
    }

    /// Pair an event with a no-op continuation (fire-and-forget).
    pub fn fire_and_forget(event: LogEvent) -> Self {
        Self::new(event, Continuation::none())
    }
}

/// Complete every continuation in a batch with the same outcome.
pub fn complete_all(batch: Vec<AsyncLogEventInfo>, error: Option<PipelineError>) {
    for info in batch {
        info.continuation.done(error.clone());
    }
}
