//! Frame-execution throughput benchmarks.

use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;

fn spiral_frames(c: &mut Criterion) {
    let mut group = c.benchmark_group("spiral");
    for count in [500i64, 5_000] {
        let mut engine = phosphor_bench::spiral_profile(count);
        let mut t = 0.0f64;
        group.bench_function(format!("{count}_lanes"), |b| {
            b.iter(|| {
                t += 16.6;
                let frame = engine.render_frame(black_box(t));
                black_box(frame.map(|f| f.passes.len()));
            });
        });
    }
    group.finish();
}

fn feedback_frames(c: &mut Criterion) {
    let mut engine = phosphor_bench::feedback_profile(1_000);
    let mut t = 0.0f64;
    c.bench_function("feedback_1000_lanes", |b| {
        b.iter(|| {
            t += 16.6;
            let frame = engine.render_frame(black_box(t));
            black_box(frame.map(|f| f.passes.len()));
        });
    });
}

criterion_group!(benches, spiral_frames, feedback_frames);
criterion_main!(benches);
