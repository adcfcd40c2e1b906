//! Executor-driven consumers via `read_async`

use std::time::Duration;

use capture_core::{AudioPriority, AudioSource, BufferMode, CompletionEvent, ReadyRegion};
use tokio_test::{assert_pending, assert_ready};

use crate::harness::{fire, leak_buffer, leak_stream, new_stream, simulate_dma};

#[test]
fn test_read_async_pending_until_interrupt() {
    let stream = new_stream();
    let mut handle = stream
        .open(AudioSource::Mic, AudioPriority::Rx, leak_buffer(32), BufferMode::ContinuousSplit, 8_000)
        .unwrap();

    let mut task = tokio_test::task::spawn(stream.read_async(&mut handle));
    assert_pending!(task.poll());
    assert!(stream.has_parked_consumer());

    fire(&stream, CompletionEvent::HalfComplete);
    assert!(task.is_woken());

    let block = assert_ready!(task.poll());
    assert_eq!(block.region(), ReadyRegion::new(0, 16));
    drop(block);
    drop(task);

    assert!(!stream.has_parked_consumer());
    // The waker path never touches the thread scheduler
    assert_eq!(stream.scheduler().wakes(), 0);
}

#[test]
fn test_read_async_one_shot_arms_on_first_poll() {
    let stream = new_stream();
    let mut handle = stream
        .open(AudioSource::Mic, AudioPriority::Rx, leak_buffer(32), BufferMode::OneShot, 8_000)
        .unwrap();

    let mut task = tokio_test::task::spawn(stream.read_async(&mut handle));
    assert_eq!(stream.with_engine(|e| e.starts()), 0);

    assert_pending!(task.poll());
    assert_eq!(stream.with_engine(|e| e.starts()), 1);

    fire(&stream, CompletionEvent::Complete);
    let block = assert_ready!(task.poll());
    assert_eq!(block.len(), 32);
}

#[test]
fn test_read_async_stale_handle_is_ready_and_empty() {
    let stream = new_stream();
    let mut handle = stream
        .open(AudioSource::Mic, AudioPriority::Rx, leak_buffer(32), BufferMode::Continuous, 8_000)
        .unwrap();
    stream.stop(&handle);

    let mut task = tokio_test::task::spawn(stream.read_async(&mut handle));
    let block = assert_ready!(task.poll());
    assert!(block.is_empty());
}

#[test]
fn test_dropped_read_async_withdraws_reader() {
    let stream = new_stream();
    let mut handle = stream
        .open(AudioSource::Mic, AudioPriority::Rx, leak_buffer(32), BufferMode::ContinuousSplit, 8_000)
        .unwrap();

    {
        let mut task = tokio_test::task::spawn(stream.read_async(&mut handle));
        assert_pending!(task.poll());
        assert!(stream.has_parked_consumer());
    }
    assert!(!stream.has_parked_consumer());

    // Nobody is waiting any more: the event is not delivered to anyone
    fire(&stream, CompletionEvent::HalfComplete);
    assert_eq!(stream.stats().unclaimed, 1);

    // A fresh reader still gets the next region
    let mut task = tokio_test::task::spawn(stream.read_async(&mut handle));
    assert_pending!(task.poll());
    fire(&stream, CompletionEvent::Complete);
    let block = assert_ready!(task.poll());
    assert_eq!(block.region(), ReadyRegion::new(16, 16));
    drop(block);
    drop(task);
    assert_eq!(stream.stats().unclaimed, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_capture_task_on_runtime() {
    println!("🎙️ Spawning a capture task on tokio...");

    let stream = leak_stream();
    let buffer = leak_buffer(48);
    let mut handle = stream
        .open(AudioSource::ExternalRx, AudioPriority::Rx, buffer, BufferMode::ContinuousSplit, 16_000)
        .unwrap();

    let capture = tokio::spawn(async move {
        let mut sums = Vec::new();
        for _ in 0..4 {
            let block = stream.read_async(&mut handle).await;
            sums.push(block.iter().map(i32::from).sum::<i32>());
        }
        sums
    });

    for i in 0..4 {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !stream.has_parked_consumer() {
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        })
        .await
        .expect("capture task never parked");

        let (region, event) = if i % 2 == 0 {
            (ReadyRegion::new(0, 24), CompletionEvent::HalfComplete)
        } else {
            (ReadyRegion::new(24, 24), CompletionEvent::Complete)
        };
        simulate_dma(&buffer, region, i + 1);
        fire(stream, event);
    }

    let sums = capture.await.unwrap();
    assert_eq!(sums, vec![24, 48, 72, 96]);

    println!("  ✅ {} blocks delivered through the waker", sums.len());
}
