// Capture stream walkthrough on host threads

use std::thread;

use capture_core::{
    default_config, AudioPriority, AudioSource, BufferMode, CaptureError, CompletionEvent, ReadyRegion, Timebase,
};
use capture_tests::harness::{fire, leak_buffer, new_stream, simulate_dma, wait_until_parked};

fn main() {
    println!("🧪 Capture Stream Integration Walkthrough (v{})", capture_core::VERSION);

    show_timebase();
    run_split_session();
    run_one_shot_session();
    check_exclusivity();

    println!("✅ All walkthrough steps passed!");
    println!();
    println!("📝 Run the full suite with: cargo test -p capture-tests");
}

fn show_timebase() {
    println!("⏱️ Sample clock quantization (1 MHz reference)...");

    for rate in [8_000, 16_000, 22_050, 44_100, 48_000] {
        match Timebase::for_rate(1_000_000, rate) {
            Ok(tb) => println!(
                "  {:>6} Hz -> reload {:>3}, realized {}.{:03} Hz",
                rate,
                tb.reload(),
                tb.realized_rate_hz(),
                tb.realized_rate_millihertz() % 1000
            ),
            Err(e) => println!("  {:>6} Hz -> {}", rate, e),
        }
    }
}

fn run_split_session() {
    println!("🔀 Continuous-split session from the default config...");

    let config = default_config();
    let stream = new_stream();
    let buffer = leak_buffer(256);
    let mut handle = stream.open_with(&config, buffer).expect("open failed");

    thread::scope(|s| {
        let consumer = s.spawn(|| {
            (0..4)
                .map(|_| {
                    let block = stream.read(&mut handle);
                    (block.offset(), block.iter().map(i64::from).sum::<i64>())
                })
                .collect::<Vec<_>>()
        });

        for i in 0..4 {
            wait_until_parked(&stream);
            let (region, event) = if i % 2 == 0 {
                (ReadyRegion::new(0, 128), CompletionEvent::HalfComplete)
            } else {
                (ReadyRegion::new(128, 128), CompletionEvent::Complete)
            };
            simulate_dma(&buffer, region, 100 * (i + 1));
            fire(&stream, event);
        }

        for (offset, sum) in consumer.join().unwrap() {
            println!("  📦 block @{:>3}: sum {}", offset, sum);
        }
    });

    let stats = stream.stats();
    println!(
        "  ✅ {} half + {} full completions, {} unclaimed",
        stats.half_completions, stats.completions, stats.unclaimed
    );
    stream.stop(&handle);
}

fn run_one_shot_session() {
    println!("🎯 One-shot session...");

    let stream = new_stream();
    let mut handle = stream
        .open(AudioSource::ExternalRx, AudioPriority::Rx, leak_buffer(64), BufferMode::OneShot, 8_000)
        .expect("open failed");

    let len = thread::scope(|s| {
        let consumer = s.spawn(|| stream.read(&mut handle).len());
        wait_until_parked(&stream);
        fire(&stream, CompletionEvent::Complete);
        consumer.join().unwrap()
    });

    assert_eq!(len, 64);
    stream.stop(&handle);
    println!("  ✅ captured {} samples, engine released", len);
}

fn check_exclusivity() {
    println!("🔒 Exclusive ownership...");

    let stream = new_stream();
    let first = stream.open_with(&default_config(), leak_buffer(32)).expect("open failed");
    let second = stream.open_with(&default_config(), leak_buffer(32));
    assert_eq!(second.unwrap_err(), CaptureError::AlreadyActive);

    stream.stop(&first);
    assert!(stream.open_with(&default_config(), leak_buffer(32)).is_ok());
    println!("  ✅ second open refused until stop");
}
