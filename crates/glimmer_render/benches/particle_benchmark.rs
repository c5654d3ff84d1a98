//! # Particle Benchmark
//!
//! Measures one simulated frame of the particle system on the recording
//! device: emission, integrate + compact, instance upload, and the draw pass.
//!
//! Target: 10,000 live particles updated and uploaded well under 1 ms.

#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use glimmer_core::FramePool;
use glimmer_render::backend::RecordingDevice;
use glimmer_render::ParticleSystem;

const DT: f32 = 1.0 / 60.0;

/// A system at steady state: full, with long lifetimes so nothing drains.
fn warmed(device: &mut RecordingDevice, capacity: u32) -> ParticleSystem {
    let mut ps = ParticleSystem::new(device, capacity).with_seed(42);
    ps.set_lifetime_range(1_000.0, 1_000.0);
    ps.set_emission_rate(0.0);
    ps.burst(capacity);
    ps.update(device, DT);
    device.clear_calls();
    ps
}

fn bench_update(c: &mut Criterion) {
    let mut group = c.benchmark_group("particle_update");
    for capacity in [1_000u32, 10_000, 50_000] {
        let mut device = RecordingDevice::new();
        let mut ps = warmed(&mut device, capacity);

        group.bench_with_input(BenchmarkId::from_parameter(capacity), &capacity, |b, _| {
            b.iter(|| {
                ps.update(&mut device, black_box(DT));
                device.clear_calls();
                black_box(ps.active_count());
            });
        });
        ps.dispose(&mut device);
    }
    group.finish();
}

fn bench_churn(c: &mut Criterion) {
    // Short lifetimes and a high rate: spawn and compaction every frame.
    let mut device = RecordingDevice::new();
    let mut ps = ParticleSystem::new(&mut device, 10_000).with_seed(7);
    ps.set_lifetime_range(0.2, 0.6);
    ps.set_emission_rate(20_000.0);
    for _ in 0..60 {
        ps.update(&mut device, DT);
    }
    device.clear_calls();

    c.bench_function("particle_churn_10k", |b| {
        b.iter(|| {
            ps.update(&mut device, black_box(DT));
            device.clear_calls();
            black_box(ps.stats().total_spawned);
        });
    });
    ps.dispose(&mut device);
}

fn bench_frame(c: &mut Criterion) {
    let mut device = RecordingDevice::new();
    let mut pool = FramePool::new();
    let mut ps = warmed(&mut device, 10_000);

    c.bench_function("particle_frame_10k", |b| {
        b.iter(|| {
            pool.reset();
            ps.update(&mut device, black_box(DT));
            ps.draw(&mut device, &mut pool);
            device.clear_calls();
        });
    });
    ps.dispose(&mut device);
}

criterion_group!(benches, bench_update, bench_churn, bench_frame);
criterion_main!(benches);
