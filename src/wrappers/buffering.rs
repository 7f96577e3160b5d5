//! Buffering target wrapper: coalesces events into size- or time-bounded
//! batches
//!
//! A full buffer is written to the wrapped target synchronously on the
//! calling thread. An optional flush timeout arms a single timer thread for
//! the wrapper's whole lifetime; sliding mode re-arms the deadline on every
//! appended event instead of spawning new timers.

use crate::core::continuation::{complete_all, AsyncLogEventInfo, Continuation};
use crate::core::error::{PipelineError, Result};
use crate::core::target::Target;
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

/// Default number of events collected before a batch write.
pub const DEFAULT_BUFFER_SIZE: usize = 100;

struct BufferState {
    events: Vec<AsyncLogEventInfo>,
    deadline: Option<Instant>,
    closed: bool,
}

struct BufferShared {
    inner: Mutex<Box<dyn Target>>,
    state: Mutex<BufferState>,
    timer_signal: Condvar,
}

/// Accumulates events and forwards them in batches.
///
/// # Example
///
/// ```
/// use log_pipeline::targets::MemoryTarget;
/// use log_pipeline::wrappers::BufferingTargetWrapper;
/// use log_pipeline::Target;
/// use std::time::Duration;
///
/// let memory = MemoryTarget::new("memory");
/// let mut wrapper = BufferingTargetWrapper::new(Box::new(memory), 50)
///     .unwrap()
///     .with_flush_timeout(Duration::from_secs(5));
/// wrapper.initialize().unwrap();
/// ```
pub struct BufferingTargetWrapper {
    name: String,
    shared: Arc<BufferShared>,
    timer: Option<thread::JoinHandle<()>>,
    buffer_size: usize,
    flush_timeout: Option<std::time::Duration>,
    sliding_timeout: bool,
    initialized: bool,
    closed: bool,
}

impl BufferingTargetWrapper {
    pub fn new(inner: Box<dyn Target>, buffer_size: usize) -> Result<Self> {
        let name = format!("buffered({})", inner.name());
        if buffer_size == 0 {
            return Err(PipelineError::config(&name, "buffer_size must be positive"));
        }
        Ok(Self {
            name,
            shared: Arc::new(BufferShared {
                inner: Mutex::new(inner),
                state: Mutex::new(BufferState {
                    events: Vec::with_capacity(buffer_size),
                    deadline: None,
                    closed: false,
                }),
                timer_signal: Condvar::new(),
            }),
            timer: None,
            buffer_size,
            flush_timeout: None,
            sliding_timeout: true,
            initialized: false,
            closed: false,
        })
    }

    /// Flush a non-full buffer once this much time has passed since the
    /// first buffered event (or since the most recent one in sliding mode).
    #[must_use = "builder methods return a new value"]
    pub fn with_flush_timeout(mut self, timeout: std::time::Duration) -> Self {
        self.flush_timeout = Some(timeout);
        self
    }

    /// Sliding mode (the default) restarts the timeout on every event;
    /// non-sliding counts from the first buffered event.
    #[must_use = "builder methods return a new value"]
    pub fn with_sliding_timeout(mut self, sliding: bool) -> Self {
        self.sliding_timeout = sliding;
        self
    }

    /// Number of events currently buffered.
    pub fn buffered(&self) -> usize {
        self.shared.state.lock().events.len()
    }

    fn take_buffer(&self) -> Vec<AsyncLogEventInfo> {
        let mut state = self.shared.state.lock();
        state.deadline = None;
        std::mem::take(&mut state.events)
    }
}

impl Target for BufferingTargetWrapper {
    fn name(&self) -> &str {
        &self.name
    }

    fn initialize(&mut self) -> Result<()> {
        if self.initialized {
            return Ok(());
        }
        if self.closed {
            return Err(PipelineError::closed(&self.name));
        }
        if let Some(timeout) = self.flush_timeout {
            if timeout.is_zero() {
                return Err(PipelineError::config(&self.name, "flush_timeout must be positive"));
            }
        }
        self.shared.inner.lock().initialize()?;

        if self.flush_timeout.is_some() {
            let shared = Arc::clone(&self.shared);
            self.timer = Some(thread::spawn(move || run_timer(shared)));
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

        let mut full_buffers = Vec::new();
        {
            let mut state = self.shared.state.lock();
            for info in batch {
                state.events.push(info);
                if state.events.len() >= self.buffer_size {
                    state.deadline = None;
                    full_buffers.push(std::mem::take(&mut state.events));
                } else if let Some(timeout) = self.flush_timeout {
                    if self.sliding_timeout || state.deadline.is_none() {
                        state.deadline = Some(Instant::now() + timeout);
                        self.shared.timer_signal.notify_all();
                    }
                }
            }
        }

        // Full buffers are written on the calling thread, outside the
        // buffer lock so the timer thread is never held up by slow sinks.
        for events in full_buffers {
            self.shared.inner.lock().write(events);
        }
    }

    fn flush(&mut self, done: Continuation) {
        let events = self.take_buffer();
        let mut inner = self.shared.inner.lock();
        if !events.is_empty() {
            inner.write(events);
        }
        inner.flush(done);
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        {
            let mut state = self.shared.state.lock();
            state.closed = true;
        }
        self.shared.timer_signal.notify_all();
        if let Some(timer) = self.timer.take() {
            let _ = timer.join();
        }

        let events = self.take_buffer();
        let mut inner = self.shared.inner.lock();
        if !events.is_empty() {
            inner.write(events);
        }
        inner.close();
    }
}

fn run_timer(shared: Arc<BufferShared>) {
    loop {
        let expired = {
            let mut state = shared.state.lock();
            loop {
                if state.closed {
                    return;
                }
                match state.deadline {
                    None => {
                        shared.timer_signal.wait(&mut state);
                    }
                    Some(deadline) => {
                        if Instant::now() >= deadline {
                            state.deadline = None;
                            break std::mem::take(&mut state.events);
                        }
                        shared.timer_signal.wait_until(&mut state, deadline);
                    }
                }
            }
        };
        if !expired.is_empty() {
            shared.inner.lock().write(expired);
        }
    }
}
