//! Integration tests for the delivery pipeline
//!
//! These tests verify:
//! - End-to-end delivery through composed wrapper chains
//! - Failover, round-robin, and broadcast distribution counts
//! - Buffering flush-on-size behavior
//! - Retry budgets across consecutive events
//! - Continuation exactly-once across composed failure paths
//! - Idempotent close

use log_pipeline::prelude::*;
use log_pipeline::targets::RenderFormat;
use log_pipeline::wrappers::CancelToken;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Counts write calls and fails the first `failures` of them.
struct CountingTarget {
    name: String,
    failures: usize,
    calls: Arc<AtomicUsize>,
    delivered: Arc<AtomicUsize>,
}

impl CountingTarget {
    fn new(name: &str, failures: usize) -> (Self, Arc<AtomicUsize>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let delivered = Arc::new(AtomicUsize::new(0));
        (
            Self {
                name: name.to_string(),
                failures,
                calls: Arc::clone(&calls),
                delivered: Arc::clone(&delivered),
            },
            calls,
            delivered,
        )
    }
}

impl Target for CountingTarget {
    fn name(&self) -> &str {
        &self.name
    }

    fn initialize(&mut self) -> Result<()> {
        Ok(())
    }

    fn write(&mut self, batch: Vec<AsyncLogEventInfo>) {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            let error = PipelineError::write_failed(&self.name, "injected failure");
            for info in batch {
                info.continuation.done(Some(error.clone()));
            }
            return;
        }
        for info in batch {
            self.delivered.fetch_add(1, Ordering::SeqCst);
            info.continuation.done(None);
        }
    }

    fn flush(&mut self, done: Continuation) {
        done.done(None);
    }

    fn close(&mut self) {}
}

#[test]
fn test_async_pipeline_delivers_everything() {
    let memory = MemoryTarget::new("memory");
    let buffer = memory.buffer();

    let pipeline = Pipeline::builder(Box::new(memory))
        .async_delivery()
        .build()
        .expect("pipeline builds");

    for i in 0..50 {
        pipeline.write(LogEvent::new(LogLevel::Info, format!("Message {}", i)));
    }
    pipeline.flush_timeout(Duration::from_secs(5)).expect("flush");

    let entries = buffer.lock().clone();
    assert_eq!(entries.len(), 50, "Should have 50 delivered events");
    assert!(entries[0].contains("Message 0"));
    assert!(entries[49].contains("Message 49"));
}

#[test]
fn test_fallback_failover_counts() {
    // sink1 fails once then works: 10 writes land 1/9/0 with a sticky
    // cursor.
    let (sink1, calls1, _) = CountingTarget::new("sink1", 1);
    let (sink2, calls2, delivered2) = CountingTarget::new("sink2", 0);
    let (sink3, calls3, _) = CountingTarget::new("sink3", 0);

    let mut group = FallbackGroupTarget::new(
        "fallback",
        vec![Box::new(sink1), Box::new(sink2), Box::new(sink3)],
    )
    .expect("group builds");
    group.initialize().expect("initializes");

    for i in 0..10 {
        group.write_event(AsyncLogEventInfo::fire_and_forget(LogEvent::new(
            LogLevel::Info,
            format!("Message {}", i),
        )));
    }

    assert_eq!(calls1.load(Ordering::SeqCst), 1);
    assert_eq!(calls2.load(Ordering::SeqCst), 9);
    assert_eq!(calls3.load(Ordering::SeqCst), 0);
    assert_eq!(delivered2.load(Ordering::SeqCst), 9);
}

#[test]
fn test_round_robin_distribution_counts() {
    let (sink1, _, delivered1) = CountingTarget::new("sink1", 0);
    let (sink2, _, delivered2) = CountingTarget::new("sink2", 0);
    let (sink3, _, delivered3) = CountingTarget::new("sink3", 0);

    let mut group = RoundRobinGroupTarget::new(
        "round-robin",
        vec![Box::new(sink1), Box::new(sink2), Box::new(sink3)],
    );
    group.initialize().expect("initializes");

    for i in 0..10 {
        group.write_event(AsyncLogEventInfo::fire_and_forget(LogEvent::new(
            LogLevel::Info,
            format!("Message {}", i),
        )));
    }

    assert_eq!(delivered1.load(Ordering::SeqCst), 4);
    assert_eq!(delivered2.load(Ordering::SeqCst), 3);
    assert_eq!(delivered3.load(Ordering::SeqCst), 3);
}

#[test]
fn test_split_group_broadcasts_with_aggregate_continuation() {
    let (sink1, _, delivered1) = CountingTarget::new("sink1", 0);
    let (sink2, _, delivered2) = CountingTarget::new("sink2", 0);

    let mut group = SplitGroupTarget::new("split", vec![Box::new(sink1), Box::new(sink2)]);
    group.initialize().expect("initializes");

    let completions = Arc::new(AtomicUsize::new(0));
    let completions_clone = Arc::clone(&completions);
    group.write_event(AsyncLogEventInfo::new(
        LogEvent::new(LogLevel::Info, "broadcast"),
        Continuation::new(move |error| {
            assert!(error.is_none());
            completions_clone.fetch_add(1, Ordering::SeqCst);
        }),
    ));

    assert_eq!(delivered1.load(Ordering::SeqCst), 1);
    assert_eq!(delivered2.load(Ordering::SeqCst), 1);
    assert_eq!(
        completions.load(Ordering::SeqCst),
        1,
        "aggregate continuation fires exactly once"
    );
}

#[test]
fn test_buffering_flush_on_size() {
    let (sink, calls, delivered) = CountingTarget::new("sink", 0);
    let mut wrapper = BufferingTargetWrapper::new(Box::new(sink), 10).expect("builds");
    wrapper.initialize().expect("initializes");

    for i in 0..9 {
        wrapper.write_event(AsyncLogEventInfo::fire_and_forget(LogEvent::new(
            LogLevel::Info,
            format!("Message {}", i),
        )));
    }
    assert_eq!(calls.load(Ordering::SeqCst), 0, "nothing written below buffer size");

    wrapper.write_event(AsyncLogEventInfo::fire_and_forget(LogEvent::new(
        LogLevel::Info,
        "Message 9",
    )));
    assert_eq!(calls.load(Ordering::SeqCst), 1, "one batched write");
    assert_eq!(delivered.load(Ordering::SeqCst), 10, "batch carries all 10 events");
}

#[test]
fn test_retry_budget_across_events() {
    // Sink fails calls 1-6 then succeeds. RetryCount=4: event A exhausts its
    // budget on calls 1-4; event B fails on 5-6 and succeeds on call 7.
    let (sink, calls, _) = CountingTarget::new("sink", 6);
    let mut wrapper =
        RetryingTargetWrapper::new(Box::new(sink), 4, Duration::from_millis(1)).expect("builds");
    wrapper.initialize().expect("initializes");

    let (continuation_a, latch_a) = Continuation::latch();
    wrapper.write_event(AsyncLogEventInfo::new(
        LogEvent::new(LogLevel::Info, "event A"),
        continuation_a,
    ));
    let outcome_a = latch_a.wait(Duration::from_secs(5)).expect("A completed");
    assert!(
        matches!(outcome_a, Some(PipelineError::RetriesExhausted { attempts: 4, .. })),
        "event A must report terminal exhaustion, got {:?}",
        outcome_a
    );

    let (continuation_b, latch_b) = Continuation::latch();
    wrapper.write_event(AsyncLogEventInfo::new(
        LogEvent::new(LogLevel::Info, "event B"),
        continuation_b,
    ));
    let outcome_b = latch_b.wait(Duration::from_secs(5)).expect("B completed");
    assert!(outcome_b.is_none(), "event B succeeds within its own budget");
    assert_eq!(calls.load(Ordering::SeqCst), 7);
}

#[test]
fn test_continuation_exactly_once_through_retry_and_fallback() {
    // A chain that exercises both recovery layers: retry wraps a fallback
    // group whose primary sink always fails.
    let (primary, _, _) = CountingTarget::new("primary", usize::MAX);
    let (secondary, _, delivered) = CountingTarget::new("secondary", 0);

    let fallback = FallbackGroupTarget::new("fallback", vec![Box::new(primary), Box::new(secondary)])
        .expect("group builds");
    let mut chain =
        RetryingTargetWrapper::new(Box::new(fallback), 3, Duration::from_millis(1)).expect("builds");
    chain.initialize().expect("initializes");

    let completions = Arc::new(AtomicUsize::new(0));
    for i in 0..5 {
        let completions = Arc::clone(&completions);
        chain.write_event(AsyncLogEventInfo::new(
            LogEvent::new(LogLevel::Info, format!("Message {}", i)),
            Continuation::new(move |error| {
                assert!(error.is_none(), "failover should recover the write");
                completions.fetch_add(1, Ordering::SeqCst);
            }),
        ));
    }

    assert_eq!(completions.load(Ordering::SeqCst), 5, "one completion per event");
    assert_eq!(delivered.load(Ordering::SeqCst), 5);
    chain.close();
}

#[test]
fn test_group_by_partitions_through_pipeline() {
    let buffers: Arc<parking_lot::Mutex<Vec<(String, log_pipeline::targets::MemoryBuffer)>>> =
        Arc::new(parking_lot::Mutex::new(Vec::new()));
    let buffers_clone = Arc::clone(&buffers);

    let group_by = GroupByTargetWrapper::new(
        "by-logger",
        Arc::new(|event: &LogEvent| event.logger.clone()),
        Box::new(move |key| {
            let target = MemoryTarget::new(key);
            buffers_clone.lock().push((key.to_string(), target.buffer()));
            Box::new(target)
        }),
    );

    let pipeline = Pipeline::new(Box::new(group_by)).expect("pipeline builds");
    pipeline.write(LogEvent::new(LogLevel::Info, "query").with_logger("app.db"));
    pipeline.write(LogEvent::new(LogLevel::Info, "request").with_logger("app.http"));
    pipeline.write(LogEvent::new(LogLevel::Info, "commit").with_logger("app.db"));

    let buffers = buffers.lock();
    assert_eq!(buffers.len(), 2, "one lazily created target per key");
    for (key, buffer) in buffers.iter() {
        let entries = buffer.lock();
        match key.as_str() {
            "app.db" => assert_eq!(entries.len(), 2),
            "app.http" => assert_eq!(entries.len(), 1),
            other => panic!("unexpected group key {}", other),
        }
    }
}

#[test]
fn test_filtered_pipeline_accepts_but_skips_rejected_events() {
    let memory = MemoryTarget::new("memory");
    let buffer = memory.buffer();

    let pipeline = Pipeline::builder(Box::new(memory))
        .filtered(level_at_least(LogLevel::Warn))
        .build()
        .expect("pipeline builds");

    let completions = Arc::new(AtomicUsize::new(0));
    for level in [LogLevel::Debug, LogLevel::Info, LogLevel::Warn, LogLevel::Error] {
        let completions = Arc::clone(&completions);
        pipeline.write_with(
            LogEvent::new(level, "message"),
            Continuation::new(move |error| {
                assert!(error.is_none(), "filtered-out events still succeed");
                completions.fetch_add(1, Ordering::SeqCst);
            }),
        );
    }

    assert_eq!(completions.load(Ordering::SeqCst), 4);
    assert_eq!(buffer.lock().len(), 2, "only Warn and Error are written");
}

#[test]
fn test_json_rendering_end_to_end() {
    let memory = MemoryTarget::new("memory").with_format(RenderFormat::Json);
    let buffer = memory.buffer();

    let pipeline = Pipeline::builder(Box::new(memory))
        .async_delivery()
        .build()
        .expect("pipeline builds");

    pipeline.write(
        LogEvent::new(LogLevel::Error, "payment failed")
            .with_logger("app.billing")
            .with_property("order_id", 42),
    );
    pipeline.flush_timeout(Duration::from_secs(5)).expect("flush");

    let entries = buffer.lock().clone();
    let value: serde_json::Value = serde_json::from_str(&entries[0]).expect("valid JSON");
    assert_eq!(value["logger"], "app.billing");
    assert_eq!(value["properties"]["order_id"], 42);
}

#[test]
fn test_idempotent_close_on_composed_chain() {
    let memory = MemoryTarget::new("memory");
    let pipeline = Pipeline::builder(Box::new(memory))
        .buffered(10)
        .expect("buffered layer")
        .async_delivery()
        .build()
        .expect("pipeline builds");

    pipeline.write(LogEvent::new(LogLevel::Info, "before close"));
    pipeline.close();
    pipeline.close();

    // Writes after close fail their continuation exactly once, no panic.
    let (continuation, latch) = Continuation::latch();
    pipeline.write_with(LogEvent::new(LogLevel::Info, "after close"), continuation);
    let outcome = latch.wait(Duration::from_millis(100)).expect("completed");
    assert!(matches!(outcome, Some(PipelineError::Closed { .. })));
}

#[test]
fn test_retry_cancellation_from_another_thread() {
    let (sink, _, _) = CountingTarget::new("down", usize::MAX);
    let mut wrapper =
        RetryingTargetWrapper::new(Box::new(sink), 10, Duration::from_secs(30)).expect("builds");
    wrapper.initialize().expect("initializes");

    let token: CancelToken = wrapper.cancel_token();
    let canceller = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(100));
        token.cancel();
    });

    let start = std::time::Instant::now();
    let (continuation, latch) = Continuation::latch();
    wrapper.write_event(AsyncLogEventInfo::new(
        LogEvent::new(LogLevel::Info, "doomed"),
        continuation,
    ));

    let outcome = latch.wait(Duration::from_secs(10)).expect("completed");
    assert!(outcome.is_some(), "cancelled retries surface the last error");
    assert!(
        start.elapsed() < Duration::from_secs(10),
        "cancellation must cut the 30s delay short"
    );
    canceller.join().expect("canceller thread");
}

#[test]
fn test_queue_event_callback_observes_backpressure() {
    let dropped_notifications = Arc::new(AtomicUsize::new(0));
    let dropped_clone = Arc::clone(&dropped_notifications);

    let memory = MemoryTarget::new("memory");
    let mut wrapper = AsyncTargetWrapper::new(Box::new(memory))
        .with_queue_limit(2)
        .with_overflow_action(OverflowAction::Discard)
        .with_time_to_sleep_between_batches(Duration::from_secs(60))
        .with_queue_event_callback(Arc::new(move |event| {
            if let QueueEvent::Dropped { pending } = event {
                assert!(*pending <= 2);
                dropped_clone.fetch_add(1, Ordering::SeqCst);
            }
        }));
    wrapper.initialize().expect("initializes");

    for i in 0..5 {
        wrapper.write_async(
            LogEvent::new(LogLevel::Info, format!("Message {}", i)),
            Continuation::none(),
        );
    }

    assert_eq!(dropped_notifications.load(Ordering::SeqCst), 3);
    assert_eq!(wrapper.metrics().dropped_count(), 3);
    assert_eq!(wrapper.metrics().enqueued_count(), 5);
    wrapper.close();
}
