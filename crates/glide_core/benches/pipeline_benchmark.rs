//! Pipeline benchmarks
//!
//! Measures the audio-thread side of the coefficient pipeline.

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use glide_core::{
    Averager, BiquadDesigner, FilterLink, FilterParameters, PipelineConfig, Queue, ReleasePool,
};

fn benchmark_queue(c: &mut Criterion) {
    let queue: Queue<FilterParameters> = Queue::new(2048);
    let parameters = FilterParameters::default();
    let mut out = FilterParameters::default();

    c.bench_function("queue_push_pull", |b| {
        b.iter(|| {
            let _ = queue.push(black_box(parameters));
            black_box(queue.pull(&mut out));
        })
    });
}

fn benchmark_link(c: &mut Criterion) {
    let mut group = c.benchmark_group("filter_link");
    let config = PipelineConfig::default();

    for buffer_size in [64, 256, 1024].iter() {
        let pool = Arc::new(ReleasePool::new(&config.release_pool));
        let parameters = FilterParameters::peak(1000.0, 1.0, 6.0, 48000.0);
        let mut link =
            FilterLink::new(parameters, Arc::new(BiquadDesigner), Arc::clone(&pool), &config)
                .expect("Failed to build filter link");

        let mut buffer: Vec<f32> = (0..*buffer_size).map(|i| (i as f32 * 0.001).sin()).collect();

        group.throughput(Throughput::Elements(*buffer_size as u64));
        group.bench_function(format!("steady_block_{}_samples", buffer_size), |b| {
            b.iter(|| {
                link.run_block(black_box(&parameters), black_box(&mut buffer));
            })
        });
    }

    group.finish();
}

fn benchmark_averager(c: &mut Criterion) {
    let averager = Averager::new(64);

    c.bench_function("averager_add", |b| {
        let mut x = 0.0f32;
        b.iter(|| {
            x += 0.001;
            averager.add(black_box(x));
        })
    });
}

criterion_group!(benches, benchmark_queue, benchmark_link, benchmark_averager);
criterion_main!(benches);
