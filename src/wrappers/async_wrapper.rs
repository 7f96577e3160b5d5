//! Asynchronous target wrapper: decouples producer threads from slow sinks
//!
//! Producers enqueue into an [`AsyncRequestQueue`] and return immediately; a
//! single background worker drains the queue in batches and forwards them to
//! the wrapped target. The worker is the only thread that ever touches the
//! wrapped target, so targets below this wrapper do not need to tolerate
//! concurrent calls.

use crate::core::continuation::{AsyncLogEventInfo, Continuation};
use crate::core::error::{PipelineError, Result};
use crate::core::log_event::LogEvent;
use crate::core::metrics::PipelineMetrics;
use crate::core::queue::{
    AsyncRequestQueue, OverflowAction, QueueEvent, QueueEventCallback, DEFAULT_QUEUE_LIMIT,
};
use crate::core::target::Target;
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender, TryRecvError};
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Default number of events the worker forwards per batch.
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Default worker idle time between batches.
pub const DEFAULT_TIME_TO_SLEEP: Duration = Duration::from_millis(50);

/// Default cap on consecutive full batches written without sleeping.
pub const DEFAULT_FULL_BATCH_WRITE_LIMIT: usize = 5;

/// Bounded wait for the worker thread to finish during close.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Budget for the worker's final drain once shutdown is signaled.
const SHUTDOWN_DRAIN_BUDGET: Duration = Duration::from_secs(3);

enum WorkerCommand {
    Flush(Continuation),
    Shutdown,
}

/// Wraps any target with a bounded queue and a background delivery loop.
///
/// # Example
///
/// ```
/// use log_pipeline::targets::MemoryTarget;
/// use log_pipeline::wrappers::AsyncTargetWrapper;
/// use log_pipeline::{Continuation, LogEvent, LogLevel, OverflowAction, Target};
///
/// let memory = MemoryTarget::new("memory");
/// let mut wrapper = AsyncTargetWrapper::new(Box::new(memory))
///     .with_queue_limit(1000)
///     .with_overflow_action(OverflowAction::Block);
/// wrapper.initialize().unwrap();
///
/// wrapper.write_async(LogEvent::new(LogLevel::Info, "hello"), Continuation::none());
/// wrapper.close();
/// ```
pub struct AsyncTargetWrapper {
    name: String,
    inner: Arc<Mutex<Box<dyn Target>>>,
    queue: Option<Arc<AsyncRequestQueue>>,
    control: Option<Sender<WorkerCommand>>,
    worker: Option<thread::JoinHandle<()>>,
    metrics: Arc<PipelineMetrics>,
    queue_limit: usize,
    overflow_action: OverflowAction,
    batch_size: usize,
    time_to_sleep_between_batches: Duration,
    full_batch_size_write_limit: usize,
    on_queue_event: Option<QueueEventCallback>,
    closed: bool,
}

impl AsyncTargetWrapper {
    pub fn new(inner: Box<dyn Target>) -> Self {
        let name = format!("async({})", inner.name());
        Self {
            name,
            inner: Arc::new(Mutex::new(inner)),
            queue: None,
            control: None,
            worker: None,
            metrics: Arc::new(PipelineMetrics::new()),
            queue_limit: DEFAULT_QUEUE_LIMIT,
            overflow_action: OverflowAction::default(),
            batch_size: DEFAULT_BATCH_SIZE,
            time_to_sleep_between_batches: DEFAULT_TIME_TO_SLEEP,
            full_batch_size_write_limit: DEFAULT_FULL_BATCH_WRITE_LIMIT,
            on_queue_event: None,
            closed: false,
        }
    }

    /// Maximum number of pending events before the overflow action applies.
    #[must_use = "builder methods return a new value"]
    pub fn with_queue_limit(mut self, queue_limit: usize) -> Self {
        self.queue_limit = queue_limit;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn with_overflow_action(mut self, overflow_action: OverflowAction) -> Self {
        self.overflow_action = overflow_action;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Worker idle time between drain cycles. Zero means "poll continuously,
    /// yielding between batches".
    #[must_use = "builder methods return a new value"]
    pub fn with_time_to_sleep_between_batches(mut self, interval: Duration) -> Self {
        self.time_to_sleep_between_batches = interval;
        self
    }

    /// How many consecutive full batches may be written without sleeping
    /// when producers outpace the idle interval.
    #[must_use = "builder methods return a new value"]
    pub fn with_full_batch_size_write_limit(mut self, limit: usize) -> Self {
        self.full_batch_size_write_limit = limit;
        self
    }

    /// Register a callback for queue backpressure notifications
    /// (event-dropped, queue-grow).
    #[must_use = "builder methods return a new value"]
    pub fn with_queue_event_callback(mut self, callback: QueueEventCallback) -> Self {
        self.on_queue_event = Some(callback);
        self
    }

    pub fn metrics(&self) -> &PipelineMetrics {
        &self.metrics
    }

    /// Number of events currently pending in the queue.
    pub fn pending(&self) -> usize {
        self.queue.as_ref().map_or(0, |q| q.len())
    }

    /// Producer-side write: enqueues and returns immediately.
    ///
    /// Never blocks on I/O and never panics; before `initialize` or after
    /// `close` the continuation is failed with a descriptive error.
    pub fn write_async(&self, event: LogEvent, continuation: Continuation) {
        let Some(queue) = self.queue.as_ref() else {
            self.metrics.record_rejected();
            continuation.done(Some(PipelineError::not_initialized(&self.name)));
            return;
        };

        match queue.enqueue(AsyncLogEventInfo::new(event, continuation)) {
            Ok(_) => {
                self.metrics.record_enqueued();
            }
            Err(rejected) => {
                // Queue is closed; the queue itself never fires
                // continuations, so report the rejection here.
                self.metrics.record_rejected();
                rejected
                    .continuation
                    .done(Some(PipelineError::closed(&self.name)));
            }
        }
    }

    /// Ask the worker to drain everything currently queued, flush the
    /// wrapped target, then complete `done`. Concurrent requests coalesce.
    pub fn flush_async(&self, done: Continuation) {
        let Some(control) = self.control.as_ref() else {
            let error = if self.closed {
                PipelineError::closed(&self.name)
            } else {
                PipelineError::not_initialized(&self.name)
            };
            done.done(Some(error));
            return;
        };
        if let Err(send_error) = control.send(WorkerCommand::Flush(done)) {
            if let WorkerCommand::Flush(done) = send_error.0 {
                done.done(Some(PipelineError::closed(&self.name)));
            }
        }
    }

    fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(PipelineError::config(&self.name, "batch_size must be positive"));
        }
        if self.queue_limit == 0 {
            return Err(PipelineError::config(&self.name, "queue_limit must be positive"));
        }
        if self.full_batch_size_write_limit == 0 {
            return Err(PipelineError::config(
                &self.name,
                "full_batch_size_write_limit must be positive",
            ));
        }
        Ok(())
    }

    fn shutdown(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        // Release any Block-policy producers before waiting on the worker.
        if let Some(queue) = self.queue.as_ref() {
            queue.close();
        }

        if let Some(control) = self.control.take() {
            let _ = control.send(WorkerCommand::Shutdown);
        }

        if let Some(handle) = self.worker.take() {
            let start = Instant::now();
            loop {
                if handle.is_finished() {
                    if let Err(panic) = handle.join() {
                        eprintln!(
                            "[PIPELINE ERROR] Worker thread of '{}' panicked during shutdown: {:?}",
                            self.name, panic
                        );
                    }
                    break;
                }
                if start.elapsed() >= DEFAULT_SHUTDOWN_TIMEOUT {
                    eprintln!(
                        "[PIPELINE WARNING] Worker thread of '{}' did not finish within {:?}. \
                         Some events may be lost.",
                        self.name, DEFAULT_SHUTDOWN_TIMEOUT
                    );
                    break;
                }
                thread::sleep(Duration::from_millis(10));
            }
        } else {
            // Never initialized; close the wrapped target directly.
            self.inner.lock().close();
        }
    }
}

impl Target for AsyncTargetWrapper {
    fn name(&self) -> &str {
        &self.name
    }

    fn initialize(&mut self) -> Result<()> {
        if self.worker.is_some() {
            return Ok(());
        }
        if self.closed {
            return Err(PipelineError::closed(&self.name));
        }
        self.validate()?;
        self.inner.lock().initialize()?;

        let metrics = Arc::clone(&self.metrics);
        let user_callback = self.on_queue_event.clone();
        let queue_callback: QueueEventCallback = Arc::new(move |event: &QueueEvent| {
            match event {
                QueueEvent::Dropped { .. } => {
                    metrics.record_dropped();
                }
                QueueEvent::Grow { .. } => {
                    metrics.record_queue_grow();
                }
            }
            if let Some(ref callback) = user_callback {
                callback(event);
            }
        });

        let queue = Arc::new(AsyncRequestQueue::with_callback(
            self.queue_limit,
            self.overflow_action,
            Some(queue_callback),
        ));
        let (control_tx, control_rx) = unbounded();

        let worker = WorkerLoop {
            name: self.name.clone(),
            queue: Arc::clone(&queue),
            inner: Arc::clone(&self.inner),
            metrics: Arc::clone(&self.metrics),
            control: control_rx,
            batch_size: self.batch_size,
            sleep: self.time_to_sleep_between_batches,
            full_batch_limit: self.full_batch_size_write_limit,
        };
        self.worker = Some(thread::spawn(move || worker.run()));
        self.queue = Some(queue);
        self.control = Some(control_tx);
        Ok(())
    }

    fn write(&mut self, batch: Vec<AsyncLogEventInfo>) {
        for info in batch {
            self.write_async(info.event, info.continuation);
        }
    }

    fn flush(&mut self, done: Continuation) {
        self.flush_async(done);
    }

    fn close(&mut self) {
        self.shutdown();
    }
}

impl Drop for AsyncTargetWrapper {
    fn drop(&mut self) {
        self.shutdown();
    }
}

struct WorkerLoop {
    name: String,
    queue: Arc<AsyncRequestQueue>,
    inner: Arc<Mutex<Box<dyn Target>>>,
    metrics: Arc<PipelineMetrics>,
    control: Receiver<WorkerCommand>,
    batch_size: usize,
    sleep: Duration,
    full_batch_limit: usize,
}

impl WorkerLoop {
    fn run(self) {
        loop {
            let command = if self.sleep.is_zero() {
                match self.control.try_recv() {
                    Ok(command) => Some(command),
                    Err(TryRecvError::Empty) => None,
                    Err(TryRecvError::Disconnected) => Some(WorkerCommand::Shutdown),
                }
            } else {
                match self.control.recv_timeout(self.sleep) {
                    Ok(command) => Some(command),
                    Err(RecvTimeoutError::Timeout) => None,
                    Err(RecvTimeoutError::Disconnected) => Some(WorkerCommand::Shutdown),
                }
            };

            match command {
                Some(WorkerCommand::Flush(done)) => {
                    if self.handle_flush(done) {
                        return;
                    }
                }
                Some(WorkerCommand::Shutdown) => {
                    self.final_drain();
                    return;
                }
                None => {
                    self.drain_cycle();
                    if self.sleep.is_zero() {
                        thread::yield_now();
                    }
                }
            }
        }
    }

    /// One drain cycle: up to `full_batch_limit` consecutive full batches,
    /// stopping early once the queue runs dry (adaptive draining).
    fn drain_cycle(&self) {
        for _ in 0..self.full_batch_limit {
            let batch = self.queue.dequeue_batch(self.batch_size);
            if batch.is_empty() {
                return;
            }
            let was_full = batch.len() == self.batch_size;
            self.forward(batch);
            if !was_full {
                return;
            }
        }
    }

    fn drain_all(&self) {
        loop {
            let batch = self.queue.dequeue_batch(self.batch_size);
            if batch.is_empty() {
                return;
            }
            self.forward(batch);
        }
    }

    /// Returns true when a shutdown command was folded into the flush.
    fn handle_flush(&self, first: Continuation) -> bool {
        // Coalesce every flush request that is already pending into one
        // drain; they all complete together.
        let mut continuations = vec![first];
        let mut shutdown = false;
        while let Ok(command) = self.control.try_recv() {
            match command {
                WorkerCommand::Flush(done) => continuations.push(done),
                WorkerCommand::Shutdown => {
                    shutdown = true;
                    break;
                }
            }
        }

        self.drain_all();
        self.inner.lock().flush(Continuation::join(continuations));

        if shutdown {
            self.final_drain();
        }
        shutdown
    }

    fn forward(&self, batch: Vec<AsyncLogEventInfo>) {
        self.metrics.record_written_batch(batch.len() as u64);
        self.inner.lock().write(batch);
    }

    fn final_drain(&self) {
        let deadline = Instant::now() + SHUTDOWN_DRAIN_BUDGET;
        loop {
            let batch = self.queue.dequeue_batch(self.batch_size);
            if batch.is_empty() {
                break;
            }
            self.forward(batch);
            if Instant::now() >= deadline {
                break;
            }
        }

        let abandoned = self.queue.clear();
        if abandoned > 0 {
            self.metrics.record_dropped_batch(abandoned as u64);
            eprintln!(
                "[PIPELINE WARNING] '{}' closed with {} undelivered events",
                self.name, abandoned
            );
        }
        self.inner.lock().close();
    }
}
