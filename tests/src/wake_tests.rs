//! Consumer wake-up: one wake per event, preemption requests and resumes
//! that arrive without data

use std::thread;
use std::time::{Duration, Instant};

use capture_core::{AudioPriority, AudioSource, BufferMode, CompletionEvent, EventFlags, ReadyRegion};

use crate::harness::{fire, leak_buffer, new_stream, wait_until_parked, TestStream, DEFAULT_PRIORITY};

fn open_split(stream: &TestStream) -> capture_core::SessionHandle {
    stream
        .open(AudioSource::Mic, AudioPriority::Rx, leak_buffer(128), BufferMode::ContinuousSplit, 8_000)
        .unwrap()
}

/// Run one read on a consumer thread at `priority`, fire `event` from here
fn read_once_at(stream: &TestStream, priority: u8, event: CompletionEvent) -> ReadyRegion {
    let mut handle = open_split(stream);
    let region = thread::scope(|s| {
        let consumer = s.spawn(|| {
            stream.scheduler().set_priority(priority);
            stream.read(&mut handle).region()
        });
        wait_until_parked(stream);
        fire(stream, event);
        consumer.join().unwrap()
    });
    stream.stop(&handle);
    region
}

#[test]
fn test_one_wake_per_event() {
    println!("⏰ Two events, two reads, two wakes...");

    let stream = new_stream();
    let mut handle = open_split(&stream);

    thread::scope(|s| {
        let consumer = s.spawn(|| {
            let first = stream.read(&mut handle).region();
            let second = stream.read(&mut handle).region();
            (first, second)
        });

        wait_until_parked(&stream);
        fire(&stream, CompletionEvent::HalfComplete);
        wait_until_parked(&stream);
        fire(&stream, CompletionEvent::Complete);

        let (first, second) = consumer.join().unwrap();
        assert_eq!(first, ReadyRegion::new(0, 64));
        assert_eq!(second, ReadyRegion::new(64, 64));
    });

    assert_eq!(stream.scheduler().wakes(), 2);
    assert_eq!(stream.stats().unclaimed, 0);

    println!("  ✅ wakes: {}", stream.scheduler().wakes());
}

#[test]
fn test_coalesced_events_wake_once() {
    let stream = new_stream();
    let mut handle = open_split(&stream);

    let region = thread::scope(|s| {
        let consumer = s.spawn(|| stream.read(&mut handle).region());
        wait_until_parked(&stream);
        fire(&stream, EventFlags::HALF_COMPLETE | EventFlags::COMPLETE);
        consumer.join().unwrap()
    });

    assert_eq!(region, ReadyRegion::new(64, 64));
    assert_eq!(stream.scheduler().wakes(), 1);
    let stats = stream.stats();
    assert_eq!((stats.half_completions, stats.completions), (1, 1));
}

#[test]
fn test_events_without_consumer_are_counted() {
    let stream = new_stream();
    let _handle = open_split(&stream);

    fire(&stream, CompletionEvent::HalfComplete);
    fire(&stream, CompletionEvent::Complete);

    assert_eq!(stream.scheduler().wakes(), 0);
    assert_eq!(stream.stats().unclaimed, 2);
    // The newest region is kept for the next reader
    assert_eq!(stream.ready_region(), ReadyRegion::new(64, 64));
}

#[test]
fn test_higher_priority_consumer_requests_reschedule() {
    let stream = new_stream();
    read_once_at(&stream, DEFAULT_PRIORITY + 4, CompletionEvent::Complete);
    assert_eq!(stream.scheduler().reschedules(), 1);
}

#[test]
fn test_equal_or_lower_priority_consumer_does_not_preempt() {
    let stream = new_stream();
    read_once_at(&stream, DEFAULT_PRIORITY, CompletionEvent::HalfComplete);
    read_once_at(&stream, DEFAULT_PRIORITY - 1, CompletionEvent::Complete);

    assert_eq!(stream.scheduler().wakes(), 2);
    assert_eq!(stream.scheduler().reschedules(), 0);
}

#[test]
fn test_spurious_resume_parks_again() {
    println!("👻 Resuming the consumer before any data...");

    let stream = new_stream();
    let mut handle = open_split(&stream);

    thread::scope(|s| {
        let consumer = s.spawn(|| stream.read(&mut handle).region());
        let id = consumer.thread().id();
        let scheduler = stream.scheduler();

        let deadline = Instant::now() + Duration::from_secs(5);
        while !scheduler.is_waiting(id) {
            assert!(Instant::now() < deadline, "consumer never suspended");
            thread::sleep(Duration::from_millis(1));
        }

        scheduler.nudge(id);

        // Back to sleep: still parked and suspended a second time
        while !(scheduler.is_waiting(id) && scheduler.yields() >= 2) {
            assert!(Instant::now() < deadline, "consumer did not park again");
            thread::sleep(Duration::from_millis(1));
        }
        assert!(stream.has_parked_consumer());
        assert!(!consumer.is_finished());

        fire(&stream, CompletionEvent::HalfComplete);
        assert_eq!(consumer.join().unwrap(), ReadyRegion::new(0, 64));
    });

    assert_eq!(stream.scheduler().wakes(), 1);

    println!("  ✅ only real data ended the read");
}
