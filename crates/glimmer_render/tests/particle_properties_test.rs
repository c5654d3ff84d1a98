//! Integration tests for the particle system's frame-loop guarantees.
//!
//! Everything runs headless on the recording device.

use glimmer_core::FramePool;
use glimmer_render::backend::{BlendFactor, DeviceCall, RecordingDevice, UniformValue};
use glimmer_render::effects::{ParticleBlendMode, ParticleSystem, STANDARD_BLEND};
use glimmer_render::EmitterConfig;

const DT: f32 = 1.0 / 60.0;

fn assert_alive_invariants(ps: &ParticleSystem) {
    assert!(ps.active_count() <= ps.capacity());
    for (life, max) in ps.lifetimes().iter().zip(ps.max_lifetimes()) {
        assert!(*life > 0.0, "dead particle left in the live range");
        assert!(life <= max, "lifetime {life} exceeds max {max}");
    }
}

#[test]
fn test_active_and_lifetimes_stay_bounded() {
    let mut device = RecordingDevice::new();
    let mut ps = ParticleSystem::new(&mut device, 64).with_seed(11);
    ps.set_emission_rate(400.0);

    // Irregular frame times, including long hitches.
    let steps = [DT, 0.001, 0.25, DT, 0.5, 0.0, DT, 1.2, 0.03];
    for _ in 0..40 {
        for dt in steps {
            ps.update(&mut device, dt);
            assert_alive_invariants(&ps);
        }
    }
    assert!(ps.stats().dropped_spawns > 0);
    ps.dispose(&mut device);
}

#[test]
fn test_zero_dt_is_stable() {
    let mut device = RecordingDevice::new();
    let mut ps = ParticleSystem::new(&mut device, 128).with_seed(3);
    ps.set_emission_rate(0.0);
    ps.burst(40);
    for _ in 0..30 {
        ps.update(&mut device, DT);
    }

    let before = ps.instances().to_vec();
    let count = ps.active_count();
    ps.update(&mut device, 0.0);

    assert_eq!(ps.active_count(), count);
    assert_eq!(ps.instances(), before.as_slice());
    ps.dispose(&mut device);
}

#[test]
fn test_emission_rate_law() {
    let mut device = RecordingDevice::new();
    let mut ps = ParticleSystem::new(&mut device, 10_000).with_seed(5);
    ps.set_emission_rate(50.0);

    for _ in 0..120 {
        ps.update(&mut device, DT);
    }

    let spawned = ps.stats().total_spawned;
    assert!((99..=101).contains(&spawned), "spawned {spawned}");
    assert_eq!(ps.stats().dropped_spawns, 0);
    ps.dispose(&mut device);
}

#[test]
fn test_capacity_bound_under_heavy_emission() {
    let mut device = RecordingDevice::new();
    let mut ps = ParticleSystem::new(&mut device, 10).with_seed(9);
    ps.set_emission_rate(1000.0);

    for _ in 0..600 {
        ps.update(&mut device, DT);
        assert!(ps.active_count() <= 10);
    }
    assert_eq!(ps.active_count(), 10);
    ps.dispose(&mut device);
}

#[test]
fn test_burst_is_immediate() {
    let mut device = RecordingDevice::new();
    let mut ps = ParticleSystem::new(&mut device, 100).with_seed(1);

    assert_eq!(ps.burst(5), 5);
    assert_eq!(ps.active_count(), 5);
    assert_eq!(ps.stats().total_spawned, 5);

    assert_eq!(ps.burst(500), 95);
    assert_eq!(ps.stats().dropped_spawns, 405);
    ps.dispose(&mut device);
}

#[test]
fn test_upload_is_exactly_live_floats() {
    let mut device = RecordingDevice::new();
    let mut ps = ParticleSystem::new(&mut device, 1_000).with_seed(2);
    ps.set_emission_rate(0.0);
    ps.set_lifetime_range(5.0, 5.0);
    ps.burst(37);

    device.clear_calls();
    ps.update(&mut device, DT);

    let uploads: Vec<usize> = device
        .calls()
        .iter()
        .filter_map(|call| match call {
            DeviceCall::BufferSubData { offset: 0, bytes, .. } => Some(*bytes),
            _ => None,
        })
        .collect();
    assert_eq!(uploads, vec![37 * 8 * 4]);
    assert_eq!(ps.stats().uploaded_floats, 37 * 8);
    ps.dispose(&mut device);
}

#[test]
fn test_nothing_uploaded_when_empty() {
    let mut device = RecordingDevice::new();
    let mut ps = ParticleSystem::new(&mut device, 100).with_seed(2);
    ps.set_emission_rate(0.0);
    device.clear_calls();

    ps.update(&mut device, DT);

    assert!(device.calls().is_empty());
    ps.dispose(&mut device);
}

#[test]
fn test_draw_is_one_call_and_restores_state() {
    let mut device = RecordingDevice::new();
    let mut pool = FramePool::new();
    let mut ps = ParticleSystem::new(&mut device, 500).with_seed(4);
    ps.burst(120);
    ps.update(&mut device, DT);

    pool.reset();
    device.clear_calls();
    ps.draw(&mut device, &mut pool);

    let draws: Vec<&DeviceCall> = device.calls().iter().filter(|c| c.is_draw()).collect();
    assert_eq!(draws.len(), 1);
    let DeviceCall::DrawArraysInstanced {
        count, instances, ..
    } = draws[0]
    else {
        panic!("expected an instanced draw, got {:?}", draws[0]);
    };
    assert_eq!(*count, 6);
    assert_eq!(*instances, ps.active_count() as u32);

    assert!(device.calls().contains(&DeviceCall::BlendFunc {
        src: BlendFactor::SrcAlpha,
        dst: BlendFactor::One,
    }));
    assert!(device.calls().contains(&DeviceCall::DepthMask(false)));

    assert!(device.depth_writes_enabled());
    assert_eq!(device.blend_factors(), STANDARD_BLEND);
    assert_eq!(device.bound_vertex_array(), None);
    assert_eq!(device.invalid_operations(), 0);
    ps.dispose(&mut device);
}

#[test]
fn test_draw_sets_view_projection_and_time() {
    let mut device = RecordingDevice::new();
    let mut pool = FramePool::new();
    let mut ps = ParticleSystem::new(&mut device, 50).with_seed(4);
    ps.set_blend_mode(ParticleBlendMode::AlphaBlend);

    let mut view_projection = glimmer_core::math::IDENTITY;
    glimmer_core::math::scale(&mut view_projection, 2.0, 2.0, 2.0);
    let mut model = glimmer_core::math::IDENTITY;
    glimmer_core::math::translate(&mut model, 1.0, 0.0, 0.0);
    ps.set_view_projection(&view_projection);
    ps.set_transform(&model);

    ps.burst(3);
    ps.update(&mut device, 0.5);
    ps.draw(&mut device, &mut pool);

    let program = device.current_program().unwrap();
    let Some(UniformValue::Mat4(mvp)) = device.uniform_value(program, "u_VP") else {
        panic!("u_VP not written");
    };
    assert_eq!(mvp[12], 2.0);
    assert_eq!(mvp[0], 2.0);
    assert_eq!(
        device.uniform_value(program, "u_Time"),
        Some(UniformValue::Float(0.5))
    );
    assert!(device.calls().contains(&DeviceCall::BlendFunc {
        src: BlendFactor::SrcAlpha,
        dst: BlendFactor::OneMinusSrcAlpha,
    }));
    ps.dispose(&mut device);
}

#[test]
fn test_draw_skipped_when_empty() {
    let mut device = RecordingDevice::new();
    let mut pool = FramePool::new();
    let mut ps = ParticleSystem::new(&mut device, 50);
    device.clear_calls();

    ps.draw(&mut device, &mut pool);

    assert!(device.calls().is_empty());
    ps.dispose(&mut device);
}

#[test]
fn test_toml_config_drives_emission() {
    let config = EmitterConfig::from_toml_str(
        r#"
        emission_rate = 30.0
        lifetime_min = 4.0
        lifetime_max = 4.0
        gravity = 0.0
        "#,
    )
    .unwrap();

    let mut device = RecordingDevice::new();
    let mut ps = ParticleSystem::with_config(&mut device, 100, config)
        .unwrap()
        .with_seed(8);
    for _ in 0..60 {
        ps.update(&mut device, DT);
    }
    assert!((29..=31).contains(&ps.active_count()));
    ps.dispose(&mut device);
    assert_eq!(device.total_live_objects(), 0);
}
