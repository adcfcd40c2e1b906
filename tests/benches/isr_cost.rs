use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use capture_core::hal::mock::{MockEngine, MockScheduler};
use capture_core::{AudioPriority, AudioSource, BufferMode, EventFlags, InputStream};
use capture_tests::harness::leak_buffer;

/// Interrupt handler cost per mode, no consumer parked
fn bench_transfer_interrupt(c: &mut Criterion) {
    let mut group = c.benchmark_group("transfer_interrupt");

    for mode in [BufferMode::OneShot, BufferMode::Continuous, BufferMode::ContinuousSplit] {
        let stream = InputStream::new(MockEngine::new(), MockScheduler::new());
        let _handle = stream
            .open(AudioSource::Mic, AudioPriority::Rx, leak_buffer(512), mode, 8_000)
            .unwrap();

        let flags = EventFlags::HALF_COMPLETE | EventFlags::COMPLETE;
        group.bench_with_input(BenchmarkId::from_parameter(mode.name()), &flags, |b, &flags| {
            b.iter(|| {
                stream.with_engine(|e| e.raise(black_box(flags)));
                stream.on_transfer_interrupt();
            });
        });
    }

    group.finish();
}

/// Spurious interrupt with nothing latched
fn bench_spurious_interrupt(c: &mut Criterion) {
    let stream = InputStream::new(MockEngine::new(), MockScheduler::new());
    let _handle = stream
        .open(AudioSource::Mic, AudioPriority::Rx, leak_buffer(512), BufferMode::Continuous, 8_000)
        .unwrap();

    c.bench_function("spurious_interrupt", |b| b.iter(|| stream.on_transfer_interrupt()));
}

criterion_group!(benches, bench_transfer_interrupt, bench_spurious_interrupt);
criterion_main!(benches);
