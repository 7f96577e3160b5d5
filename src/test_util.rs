//! Test doubles shared by the unit tests

use crate::core::continuation::{AsyncLogEventInfo, Continuation};
use crate::core::error::{PipelineError, Result};
use crate::core::log_event::LogEvent;
use crate::core::log_level::LogLevel;
use crate::core::target::Target;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

pub fn event(message: &str) -> LogEvent {
    LogEvent::new(LogLevel::Info, message)
}

pub fn info(message: &str) -> AsyncLogEventInfo {
    AsyncLogEventInfo::fire_and_forget(event(message))
}

/// Shared observation state for [`CollectingTarget`].
#[derive(Default)]
pub struct TargetProbe {
    pub messages: Mutex<Vec<String>>,
    pub write_calls: AtomicUsize,
    pub flush_calls: AtomicUsize,
    pub initialized: AtomicBool,
    pub closed: AtomicBool,
}

impl TargetProbe {
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().clone()
    }

    pub fn write_calls(&self) -> usize {
        self.write_calls.load(Ordering::SeqCst)
    }

    pub fn flush_calls(&self) -> usize {
        self.flush_calls.load(Ordering::SeqCst)
    }
}

/// Records every delivered message and succeeds all continuations.
pub struct CollectingTarget {
    name: String,
    pub probe: Arc<TargetProbe>,
}

impl CollectingTarget {
    pub fn new(name: &str) -> (Self, Arc<TargetProbe>) {
        let probe = Arc::new(TargetProbe::default());
        (
            Self {
                name: name.to_string(),
                probe: Arc::clone(&probe),
            },
            probe,
        )
    }
}

impl Target for CollectingTarget {
    fn name(&self) -> &str {
        &self.name
    }

    fn initialize(&mut self) -> Result<()> {
        self.probe.initialized.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn write(&mut self, batch: Vec<AsyncLogEventInfo>) {
        self.probe.write_calls.fetch_add(1, Ordering::SeqCst);
        let mut messages = self.probe.messages.lock();
        for info in batch {
            messages.push(info.event.message.clone());
            info.continuation.done(None);
        }
    }

    fn flush(&mut self, done: Continuation) {
        self.probe.flush_calls.fetch_add(1, Ordering::SeqCst);
        done.done(None);
    }

    fn close(&mut self) {
        self.probe.closed.store(true, Ordering::SeqCst);
    }
}

/// Fails the first `failures` write calls (each event in the batch gets the
/// error), then behaves like [`CollectingTarget`]. `failures == usize::MAX`
/// fails forever.
pub struct FlakyTarget {
    name: String,
    failures: usize,
    pub calls: Arc<AtomicUsize>,
    pub probe: Arc<TargetProbe>,
}

impl FlakyTarget {
    pub fn new(name: &str, failures: usize) -> (Self, Arc<AtomicUsize>, Arc<TargetProbe>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let probe = Arc::new(TargetProbe::default());
        (
            Self {
                name: name.to_string(),
                failures,
                calls: Arc::clone(&calls),
                probe: Arc::clone(&probe),
            },
            calls,
            probe,
        )
    }
}

impl Target for FlakyTarget {
    fn name(&self) -> &str {
        &self.name
    }

    fn initialize(&mut self) -> Result<()> {
        self.probe.initialized.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn write(&mut self, batch: Vec<AsyncLogEventInfo>) {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            let error = PipelineError::write_failed(&self.name, format!("injected failure {}", call + 1));
            for info in batch {
                info.continuation.done(Some(error.clone()));
            }
            return;
        }
        let mut messages = self.probe.messages.lock();
        for info in batch {
            messages.push(info.event.message.clone());
            info.continuation.done(None);
        }
    }

    fn flush(&mut self, done: Continuation) {
        self.probe.flush_calls.fetch_add(1, Ordering::SeqCst);
        done.done(None);
    }

    fn close(&mut self) {
        self.probe.closed.store(true, Ordering::SeqCst);
    }
}
