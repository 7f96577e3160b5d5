//! Bounded FIFO request queue feeding the asynchronous delivery loop
//!
//! When the queue is full, the configured [`OverflowAction`] decides what
//! happens to new requests. Backpressure is observable: eviction and growth
//! raise [`QueueEvent`] notifications through a registered callback.

use super::continuation::AsyncLogEventInfo;
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Default capacity for the request queue.
pub const DEFAULT_QUEUE_LIMIT: usize = 10_000;

/// Blocked producers re-check the queue at this interval so a concurrent
/// clear or close can never leave them waiting on a missed wakeup.
const BLOCK_RECHECK_INTERVAL: Duration = Duration::from_millis(100);

/// Behavior of the bounded queue when it is at capacity.
///
/// # Example
///
/// ```
/// use log_pipeline::OverflowAction;
///
/// // Default behavior: evict the oldest pending event
/// let action = OverflowAction::default();
/// assert_eq!(action, OverflowAction::Discard);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[derive(Default)]
pub enum OverflowAction {
    /// Evict the oldest pending event to make room for the new one.
    ///
    /// The evicted event's continuation is abandoned, never fired; loss is
    /// reported through [`QueueEvent::Dropped`].
    #[default]
    Discard,

    /// Double the capacity and keep everything.
    ///
    /// Growth is unbounded unless the owner imposes a limit; each growth
    /// raises [`QueueEvent::Grow`].
    Grow,

    /// Block the producer until space frees or the queue closes.
    ///
    /// This causes backpressure in the application. A producer released by
    /// close returns without enqueuing.
    Block,
}

impl fmt::Display for OverflowAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OverflowAction::Discard => write!(f, "Discard"),
            OverflowAction::Grow => write!(f, "Grow"),
            OverflowAction::Block => write!(f, "Block"),
        }
    }
}

/// Backpressure notification raised by the queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueEvent {
    /// The oldest pending event was evicted under [`OverflowAction::Discard`].
    Dropped { pending: usize },
    /// Capacity doubled under [`OverflowAction::Grow`].
    Grow { new_capacity: usize, pending: usize },
}

/// Callback type for queue backpressure notifications.
pub type QueueEventCallback = Arc<dyn Fn(&QueueEvent) + Send + Sync>;

struct QueueState {
    items: VecDeque<AsyncLogEventInfo>,
    capacity: usize,
    closed: bool,
}

/// Thread-safe bounded FIFO of pending log events.
///
/// Single lock-protected deque plus a condvar for Block-policy producers:
/// the portable strategy. One consumer (the delivery loop) and any number of
/// producers.
pub struct AsyncRequestQueue {
    state: Mutex<QueueState>,
    space_freed: Condvar,
    overflow_action: OverflowAction,
    on_event: Option<QueueEventCallback>,
}

impl AsyncRequestQueue {
    pub fn new(capacity: usize, overflow_action: OverflowAction) -> Self {
        Self::with_callback(capacity, overflow_action, None)
    }

    pub fn with_callback(
        capacity: usize,
        overflow_action: OverflowAction,
        on_event: Option<QueueEventCallback>,
    ) -> Self {
        let capacity = capacity.max(1);
        Self {
            state: Mutex::new(QueueState {
                items: VecDeque::with_capacity(capacity.min(DEFAULT_QUEUE_LIMIT)),
                capacity,
                closed: false,
            }),
            space_freed: Condvar::new(),
            overflow_action,
            on_event,
        }
    }

    /// Enqueue a request per the configured overflow action.
    ///
    /// When the queue is closed (also when close happens while a
    /// Block-policy producer is waiting) the untouched info is handed back
    /// as `Err`; the queue never fires continuations itself.
    pub fn enqueue(&self, info: AsyncLogEventInfo) -> std::result::Result<(), AsyncLogEventInfo> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(info);
        }

        if state.items.len() < state.capacity {
            state.items.push_back(info);
            return Ok(());
        }

        match self.overflow_action {
            OverflowAction::Discard => {
                // Oldest-in-queue is evicted; its continuation is abandoned
                // by contract, not failed.
                let evicted = state.items.pop_front();
                state.items.push_back(info);
                let notification = QueueEvent::Dropped {
                    pending: state.items.len(),
                };
                drop(state);
                drop(evicted);
                self.notify(&notification);
                Ok(())
            }
            OverflowAction::Grow => {
                state.capacity = state.capacity.saturating_mul(2);
                state.items.push_back(info);
                let notification = QueueEvent::Grow {
                    new_capacity: state.capacity,
                    pending: state.items.len(),
                };
                drop(state);
                self.notify(&notification);
                Ok(())
            }
            OverflowAction::Block => {
                loop {
                    if state.closed {
                        return Err(info);
                    }
                    if state.items.len() < state.capacity {
                        state.items.push_back(info);
                        return Ok(());
                    }
                    // Bounded wait: re-check periodically even without a
                    // wakeup, so a racing clear/close cannot strand us.
                    self.space_freed
                        .wait_for(&mut state, BLOCK_RECHECK_INTERVAL);
                }
            }
        }
    }

    /// Remove up to `max_count` oldest requests, preserving FIFO order.
    pub fn dequeue_batch(&self, max_count: usize) -> Vec<AsyncLogEventInfo> {
        let mut state = self.state.lock();
        let take = max_count.min(state.items.len());
        let batch: Vec<_> = state.items.drain(..take).collect();
        drop(state);
        if !batch.is_empty() {
            self.space_freed.notify_all();
        }
        batch
    }

    /// Empty the queue without firing continuations.
    ///
    /// Last-resort data loss used on hard shutdown only; returns the number
    /// of abandoned requests so the caller can report them.
    pub fn clear(&self) -> usize {
        let drained: Vec<_> = {
            let mut state = self.state.lock();
            state.items.drain(..).collect()
        };
        self.space_freed.notify_all();
        drained.len()
    }

    /// Close the queue: reject new work and release blocked producers.
    pub fn close(&self) {
        let mut state = self.state.lock();
        state.closed = true;
        drop(state);
        self.space_freed.notify_all();
    }

    pub fn len(&self) -> usize {
        self.state.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.state.lock().capacity
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    fn notify(&self, event: &QueueEvent) {
        if let Some(ref callback) = self.on_event {
            callback(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::log_event::LogEvent;
    use crate::core::log_level::LogLevel;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    fn request(n: usize) -> AsyncLogEventInfo {
        AsyncLogEventInfo::fire_and_forget(LogEvent::new(LogLevel::Info, format!("msg {}", n)))
    }

    fn messages(batch: &[AsyncLogEventInfo]) -> Vec<String> {
        batch.iter().map(|i| i.event.message.clone()).collect()
    }

    #[test]
    fn test_fifo_order() {
        let queue = AsyncRequestQueue::new(10, OverflowAction::Grow);
        for n in 0..5 {
            queue.enqueue(request(n)).ok().unwrap();
        }
        let batch = queue.dequeue_batch(5);
        assert_eq!(messages(&batch), vec!["msg 0", "msg 1", "msg 2", "msg 3", "msg 4"]);
    }

    #[test]
    fn test_dequeue_returns_fewer_when_short() {
        let queue = AsyncRequestQueue::new(10, OverflowAction::Discard);
        queue.enqueue(request(1)).ok().unwrap();
        assert_eq!(queue.dequeue_batch(100).len(), 1);
        assert!(queue.dequeue_batch(100).is_empty());
    }

    #[test]
    fn test_discard_evicts_oldest() {
        let dropped = Arc::new(AtomicUsize::new(0));
        let dropped_clone = Arc::clone(&dropped);
        let queue = AsyncRequestQueue::with_callback(
            3,
            OverflowAction::Discard,
            Some(Arc::new(move |event| {
                if matches!(event, QueueEvent::Dropped { .. }) {
                    dropped_clone.fetch_add(1, Ordering::SeqCst);
                }
            })),
        );

        for n in 0..4 {
            queue.enqueue(request(n)).ok().unwrap();
        }

        let batch = queue.dequeue_batch(10);
        assert_eq!(messages(&batch), vec!["msg 1", "msg 2", "msg 3"]);
        assert_eq!(dropped.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_grow_doubles_capacity_and_keeps_order() {
        let grew = Arc::new(AtomicUsize::new(0));
        let grew_clone = Arc::clone(&grew);
        let queue = AsyncRequestQueue::with_callback(
            3,
            OverflowAction::Grow,
            Some(Arc::new(move |event| {
                if let QueueEvent::Grow { new_capacity, .. } = event {
                    assert_eq!(*new_capacity, 6);
                    grew_clone.fetch_add(1, Ordering::SeqCst);
                }
            })),
        );

        for n in 0..4 {
            queue.enqueue(request(n)).ok().unwrap();
        }

        assert_eq!(queue.capacity(), 6);
        assert_eq!(grew.load(Ordering::SeqCst), 1);
        let batch = queue.dequeue_batch(10);
        assert_eq!(messages(&batch), vec!["msg 0", "msg 1", "msg 2", "msg 3"]);
    }

    #[test]
    fn test_block_waits_for_consumer() {
        let queue = Arc::new(AsyncRequestQueue::new(1, OverflowAction::Block));
        queue.enqueue(request(0)).ok().unwrap();

        let producer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.enqueue(request(1)).is_ok())
        };

        // The producer is stuck until we drain.
        thread::sleep(Duration::from_millis(50));
        assert_eq!(queue.len(), 1);
        let drained = queue.dequeue_batch(1);
        assert_eq!(messages(&drained), vec!["msg 0"]);

        assert!(producer.join().unwrap());
        assert_eq!(messages(&queue.dequeue_batch(1)), vec!["msg 1"]);
    }

    #[test]
    fn test_block_released_by_close_without_enqueue() {
        let queue = Arc::new(AsyncRequestQueue::new(1, OverflowAction::Block));
        queue.enqueue(request(0)).ok().unwrap();

        let producer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.enqueue(request(1)))
        };

        thread::sleep(Duration::from_millis(50));
        queue.close();

        let result = producer.join().unwrap();
        assert!(result.is_err(), "blocked producer must be released unenqueued");
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_enqueue_after_close_rejected() {
        let queue = AsyncRequestQueue::new(4, OverflowAction::Discard);
        queue.close();
        assert!(queue.enqueue(request(0)).is_err());
    }

    #[test]
    fn test_clear_abandons_pending() {
        let queue = AsyncRequestQueue::new(4, OverflowAction::Discard);
        for n in 0..3 {
            queue.enqueue(request(n)).ok().unwrap();
        }
        assert_eq!(queue.clear(), 3);
        assert!(queue.is_empty());
    }
}
