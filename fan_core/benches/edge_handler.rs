use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};
use fan_core::mocks::SpyGpio;
use fan_core::{PeriodEstimate, TachConfig, TachReader};
use fan_traits::EdgeEvent;

// Edge ticks around 1500 rpm with a little deterministic jitter.
fn synth_ticks(n: usize, seed: u32) -> Vec<u32> {
    let mut state = seed.max(1);
    let mut tick = u32::MAX - 1_000_000;
    let mut v = Vec::with_capacity(n);
    for _ in 0..n {
        state ^= state << 13;
        state ^= state >> 17;
        state ^= state << 5;
        let jitter = state % 800;
        tick = tick.wrapping_add(39_600 + jitter);
        v.push(tick);
    }
    v
}

fn bench_estimator(c: &mut Criterion) {
    let ticks = synth_ticks(10_000, 0xC0FFEE);
    let cfg = TachConfig::new(1.0, 0.8, 5.0);

    c.bench_function("period_estimate_on_event_10k", |b| {
        b.iter_batched(
            PeriodEstimate::default,
            |mut est| {
                for &t in &ticks {
                    est.on_event(EdgeEvent::rising(t), &cfg);
                }
                black_box(est.rpm(&cfg))
            },
            BatchSize::SmallInput,
        )
    });

    c.bench_function("period_estimate_timeout", |b| {
        let mut est = PeriodEstimate::default();
        est.on_event(EdgeEvent::rising(0), &cfg);
        est.on_event(EdgeEvent::rising(40_000), &cfg);
        b.iter(|| {
            let mut e = est;
            e.on_event(EdgeEvent::timeout(0), &cfg);
            black_box(e)
        })
    });
}

fn bench_reader(c: &mut Criterion) {
    let ticks = synth_ticks(1_000, 7);
    let spy = SpyGpio::new();
    let reader = match TachReader::start(spy.clone(), TachConfig::default()) {
        Ok(r) => r,
        Err(e) => panic!("start reader: {e}"),
    };

    // Lock + update through the subscribed sink, as a backend thread would.
    c.bench_function("tach_reader_sink_1k", |b| {
        b.iter(|| {
            for &t in &ticks {
                spy.emit(EdgeEvent::rising(t));
            }
            black_box(reader.rpm())
        })
    });
}

criterion_group!(benches, bench_estimator, bench_reader);
criterion_main!(benches);
