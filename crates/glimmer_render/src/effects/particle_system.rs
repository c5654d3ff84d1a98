//! Instanced CPU Particle System
//!
//! Fixed-capacity store simulated on the CPU and drawn with ONE instanced
//! draw call per frame.
//!
//! Storage is struct-of-arrays: the GPU-visible part of each particle is a
//! packed [`ParticleInstance`] (8 floats), uploaded straight from the front
//! of the array. Velocity and lifetimes live in parallel arrays the GPU never
//! sees. Slots `[0, active)` are alive; everything past `active` is stale.
//!
//! Per frame:
//! 1. Emission: accumulate `rate * dt`, spawn one particle per whole unit
//! 2. Integrate + compact: one forward pass with a write cursor
//! 3. Upload: sub-range update of exactly `active * 8` floats
//! 4. Draw: one instanced draw of the billboard quad
//!
//! Nothing in `update` or `draw` allocates.

use bytemuck::{Pod, Zeroable};
use glimmer_core::{math, FramePool, Mat4};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, error, warn};

use super::blend::{ParticleBlendMode, STANDARD_BLEND};
use super::config::EmitterConfig;
use crate::backend::GraphicsDevice;
use crate::error::RenderResult;
use crate::mesh::{primitives, MeshResource};
use crate::shader::{sources, ShaderProgram};

/// GPU-visible particle record (matches the 8-float instance layout).
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct ParticleInstance {
    /// World position.
    pub position: [f32; 3],
    /// RGBA; alpha fades with remaining lifetime.
    pub color: [f32; 4],
    /// Billboard edge length.
    pub size: f32,
}

impl ParticleInstance {
    /// Floats per record.
    pub const FLOATS: usize = std::mem::size_of::<Self>() / std::mem::size_of::<f32>();
}

/// Diagnostic counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParticleStats {
    /// Particles currently alive.
    pub active: u32,
    /// Maximum concurrent particles.
    pub capacity: u32,
    /// Particles spawned since creation.
    pub total_spawned: u64,
    /// Spawn requests dropped because the store was full.
    pub dropped_spawns: u64,
    /// Floats sent by the most recent instance upload.
    pub uploaded_floats: usize,
}

/// Uniform random value in `[min, max]`.
#[inline]
fn uniform(rng: &mut StdRng, min: f32, max: f32) -> f32 {
    min + rng.gen::<f32>() * (max - min)
}

/// Instanced particle emitter. See the module docs.
#[derive(Debug)]
pub struct ParticleSystem {
    capacity: usize,
    active: usize,

    instances: Vec<ParticleInstance>,
    velocities: Vec<[f32; 3]>,
    lifetimes: Vec<f32>,
    max_lifetimes: Vec<f32>,

    config: EmitterConfig,
    emission_accumulator: f32,
    rng: StdRng,

    mesh: MeshResource,
    shader: ShaderProgram,
    view_projection: Mat4,
    transform: Option<Mat4>,

    time: f32,
    needs_upload: bool,
    stats: ParticleStats,
}

impl ParticleSystem {
    /// Creates a system with the default emitter and built-in shaders.
    pub fn new<D: GraphicsDevice + ?Sized>(device: &mut D, max_particles: u32) -> Self {
        Self::with_shader_sources(
            device,
            max_particles,
            EmitterConfig::default(),
            sources::PARTICLE_VERTEX,
            sources::PARTICLE_FRAGMENT,
        )
    }

    /// Creates a system with the built-in shaders.
    ///
    /// # Errors
    ///
    /// [`RenderError::InvalidConfig`](crate::RenderError::InvalidConfig) when
    /// `config` does not validate. GPU failures are not errors; see
    /// [`Self::with_shader_sources`].
    pub fn with_config<D: GraphicsDevice + ?Sized>(
        device: &mut D,
        max_particles: u32,
        config: EmitterConfig,
    ) -> RenderResult<Self> {
        config.validate()?;
        Ok(Self::with_shader_sources(
            device,
            max_particles,
            config,
            sources::PARTICLE_VERTEX,
            sources::PARTICLE_FRAGMENT,
        ))
    }

    /// Creates a system with caller-supplied shader sources.
    ///
    /// The sources must accept the billboard layout described in
    /// [`sources`]. If the mesh or the shader fails to build, the failure is
    /// logged once here and the system simulates normally but never draws.
    pub fn with_shader_sources<D: GraphicsDevice + ?Sized>(
        device: &mut D,
        max_particles: u32,
        config: EmitterConfig,
        vertex: &str,
        fragment: &str,
    ) -> Self {
        let capacity = max_particles as usize;
        let mesh = primitives::particle_billboard(device, max_particles);
        let shader = ShaderProgram::new(device, vertex, fragment);

        if !mesh.is_valid() || !shader.is_valid() {
            error!(
                "particle system (capacity {}) will not draw: mesh valid = {}, shader valid = {}",
                capacity,
                mesh.is_valid(),
                shader.is_valid()
            );
        } else {
            debug!("particle system created: capacity {}", capacity);
        }

        Self {
            capacity,
            active: 0,
            instances: vec![ParticleInstance::default(); capacity],
            velocities: vec![[0.0; 3]; capacity],
            lifetimes: vec![0.0; capacity],
            max_lifetimes: vec![0.0; capacity],
            config,
            emission_accumulator: 0.0,
            rng: StdRng::from_entropy(),
            mesh,
            shader,
            view_projection: math::IDENTITY,
            transform: None,
            time: 0.0,
            needs_upload: false,
            stats: ParticleStats {
                capacity: max_particles,
                ..ParticleStats::default()
            },
        }
    }

    /// Replaces the random source with a seeded one for reproducible output.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    // ----- simulation -----

    /// Advances the simulation by `dt` seconds and uploads the live records.
    ///
    /// With an unusable mesh the simulation still runs but nothing is sent to
    /// the device.
    ///
    /// Negative or non-finite `dt` is treated as zero.
    pub fn update<D: GraphicsDevice + ?Sized>(&mut self, device: &mut D, dt: f32) {
        let dt = if dt.is_finite() && dt > 0.0 { dt } else { 0.0 };
        self.time += dt;

        self.emit(dt);
        self.integrate(dt);

        // An unusable mesh was reported at construction; stay quiet here.
        if self.active > 0 && self.mesh.is_valid() {
            self.upload(device);
        }
    }

    fn emit(&mut self, dt: f32) {
        self.emission_accumulator += self.config.emission_rate * dt;
        while self.emission_accumulator >= 1.0 && self.active < self.capacity {
            self.spawn();
            self.emission_accumulator -= 1.0;
        }
        // Saturated: whole units cannot spawn, keep only the fraction.
        if self.emission_accumulator >= 1.0 {
            let dropped = self.emission_accumulator.floor();
            self.stats.dropped_spawns += dropped as u64;
            self.emission_accumulator -= dropped;
        }
    }

    /// Ages, moves and fades every live particle, packing survivors to the
    /// front in their original order.
    fn integrate(&mut self, dt: f32) {
        let base_alpha = self.config.color[3];
        let gravity = self.config.gravity;
        let mut write = 0;

        for read in 0..self.active {
            let life = self.lifetimes[read] - dt;
            if life <= 0.0 {
                continue;
            }
            let max_life = self.max_lifetimes[read];
            let mut velocity = self.velocities[read];
            let mut instance = self.instances[read];

            for (p, v) in instance.position.iter_mut().zip(velocity) {
                *p += v * dt;
            }
            velocity[1] -= gravity * dt;
            instance.color[3] = base_alpha * (life / max_life);

            self.instances[write] = instance;
            self.velocities[write] = velocity;
            self.lifetimes[write] = life;
            self.max_lifetimes[write] = max_life;
            write += 1;
        }

        self.active = write;
        self.stats.active = write as u32;
    }

    fn spawn(&mut self) {
        let slot = self.active;
        let config = &self.config;
        let rng = &mut self.rng;

        let jitter = config.position_jitter;
        let position: [f32; 3] =
            std::array::from_fn(|axis| config.position[axis] + uniform(rng, -jitter, jitter));

        let low = 1.0 - config.color_jitter;
        let high = 1.0 + config.color_jitter;
        let [r, g, b, a] = config.color;
        let color = [
            r * uniform(rng, low, high),
            g * uniform(rng, low, high),
            b * uniform(rng, low, high),
            a,
        ];

        let size = uniform(rng, config.size_min, config.size_max);
        let velocity: [f32; 3] = std::array::from_fn(|axis| {
            uniform(rng, config.velocity_min[axis], config.velocity_max[axis])
        });
        let life = uniform(rng, config.lifetime_min, config.lifetime_max);

        self.instances[slot] = ParticleInstance {
            position,
            color,
            size,
        };
        self.velocities[slot] = velocity;
        self.lifetimes[slot] = life;
        self.max_lifetimes[slot] = life;

        self.active += 1;
        self.stats.active = self.active as u32;
        self.stats.total_spawned += 1;
        self.needs_upload = true;
    }

    /// Spawns up to `count` particles immediately, bypassing the emission
    /// rate. Requests beyond capacity are dropped. Returns how many spawned.
    pub fn burst(&mut self, count: u32) -> u32 {
        let room = self.capacity - self.active;
        let spawned = (count as usize).min(room);
        for _ in 0..spawned {
            self.spawn();
        }
        self.stats.dropped_spawns += u64::from(count) - spawned as u64;
        spawned as u32
    }

    /// Kills every particle and resets the emission accumulator.
    pub fn clear(&mut self) {
        self.active = 0;
        self.stats.active = 0;
        self.emission_accumulator = 0.0;
        self.needs_upload = false;
    }

    fn upload<D: GraphicsDevice + ?Sized>(&mut self, device: &mut D) {
        let live = &self.instances[..self.active];
        self.stats.uploaded_floats = self.mesh.update_instances(device, live);
        self.needs_upload = false;
    }

    // ----- drawing -----

    /// Draws every live particle with one instanced call.
    ///
    /// No-op when nothing is alive or the mesh or shader is unusable.
    /// Particles spawned by [`Self::burst`] since the last update are
    /// uploaded first. Depth writes and the standard alpha blend are restored
    /// afterwards.
    pub fn draw<D: GraphicsDevice + ?Sized>(&mut self, device: &mut D, pool: &mut FramePool) {
        if self.active == 0 || !self.is_renderable() {
            return;
        }
        if self.needs_upload {
            self.upload(device);
        }

        let (src, dst) = self.config.blend_mode.factors();
        device.set_blending(true);
        device.blend_func(src, dst);
        device.depth_mask(false);

        let mvp = pool.obtain_matrix();
        match &self.transform {
            Some(model) => math::multiply(mvp, &self.view_projection, model),
            None => *mvp = self.view_projection,
        }

        self.shader.use_program(device);
        self.shader
            .set_uniform(device, sources::UNIFORM_VIEW_PROJECTION, *mvp);
        self.shader.set_uniform(device, sources::UNIFORM_TIME, self.time);

        self.mesh.bind(device);
        self.mesh.draw_instanced(device, self.active as u32);
        self.mesh.unbind(device);

        device.depth_mask(true);
        device.blend_func(STANDARD_BLEND.0, STANDARD_BLEND.1);
    }

    /// Releases the mesh and the shader. Safe to call repeatedly.
    pub fn dispose<D: GraphicsDevice + ?Sized>(&mut self, device: &mut D) {
        self.mesh.dispose(device);
        self.shader.dispose(device);
        self.clear();
    }

    // ----- configuration -----

    /// Current emitter configuration.
    #[must_use]
    pub const fn config(&self) -> &EmitterConfig {
        &self.config
    }

    /// Replaces the whole emitter configuration.
    ///
    /// # Errors
    ///
    /// [`RenderError::InvalidConfig`](crate::RenderError::InvalidConfig); the
    /// current configuration is kept.
    pub fn set_config(&mut self, config: EmitterConfig) -> RenderResult<()> {
        config.validate()?;
        self.config = config;
        Ok(())
    }

    /// Applies one edit, keeping the old configuration if it stops validating.
    fn edit(&mut self, change: impl FnOnce(&mut EmitterConfig)) {
        let mut candidate = self.config;
        change(&mut candidate);
        if let Err(err) = self.set_config(candidate) {
            warn!("emitter setting ignored: {}", err);
        }
    }

    /// Moves the emitter.
    pub fn set_emitter_position(&mut self, position: [f32; 3]) {
        self.edit(|c| c.position = position);
    }

    /// Sets the per-axis initial velocity range.
    pub fn set_velocity_range(&mut self, min: [f32; 3], max: [f32; 3]) {
        self.edit(|c| {
            c.velocity_min = min;
            c.velocity_max = max;
        });
    }

    /// Sets particles per second.
    pub fn set_emission_rate(&mut self, per_second: f32) {
        self.edit(|c| c.emission_rate = per_second);
    }

    /// Sets the particle size range.
    pub fn set_size_range(&mut self, min: f32, max: f32) {
        self.edit(|c| {
            c.size_min = min;
            c.size_max = max;
        });
    }

    /// Sets the lifetime range in seconds.
    pub fn set_lifetime_range(&mut self, min: f32, max: f32) {
        self.edit(|c| {
            c.lifetime_min = min;
            c.lifetime_max = max;
        });
    }

    /// Sets the base RGBA color.
    pub fn set_base_color(&mut self, color: [f32; 4]) {
        self.edit(|c| c.color = color);
    }

    /// Sets the downward acceleration.
    pub fn set_gravity(&mut self, gravity: f32) {
        self.edit(|c| c.gravity = gravity);
    }

    /// Sets the blend mode of the draw pass.
    pub fn set_blend_mode(&mut self, mode: ParticleBlendMode) {
        self.config.blend_mode = mode;
    }

    /// Sets the view-projection matrix (column-major).
    pub fn set_view_projection(&mut self, view_projection: &Mat4) {
        self.view_projection = *view_projection;
    }

    /// Sets a model matrix applied before the view-projection.
    pub fn set_transform(&mut self, model: &Mat4) {
        self.transform = Some(*model);
    }

    /// Removes the model matrix.
    pub fn clear_transform(&mut self) {
        self.transform = None;
    }

    // ----- queries -----

    /// Particles currently alive.
    #[inline]
    #[must_use]
    pub const fn active_count(&self) -> usize {
        self.active
    }

    /// Maximum concurrent particles.
    #[inline]
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Whether `draw` can produce output.
    #[must_use]
    pub fn is_renderable(&self) -> bool {
        self.mesh.is_valid() && self.shader.is_valid()
    }

    /// GPU records of the live particles, in storage order.
    #[must_use]
    pub fn instances(&self) -> &[ParticleInstance] {
        &self.instances[..self.active]
    }

    /// Velocities of the live particles.
    #[must_use]
    pub fn velocities(&self) -> &[[f32; 3]] {
        &self.velocities[..self.active]
    }

    /// Remaining lifetimes of the live particles.
    #[must_use]
    pub fn lifetimes(&self) -> &[f32] {
        &self.lifetimes[..self.active]
    }

    /// Initial lifetimes of the live particles.
    #[must_use]
    pub fn max_lifetimes(&self) -> &[f32] {
        &self.max_lifetimes[..self.active]
    }

    /// Seconds simulated so far (drives `u_Time`).
    #[must_use]
    pub const fn time(&self) -> f32 {
        self.time
    }

    /// Diagnostic counters.
    #[must_use]
    pub const fn stats(&self) -> ParticleStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::RecordingDevice;

    fn system(device: &mut RecordingDevice, capacity: u32) -> ParticleSystem {
        ParticleSystem::new(device, capacity).with_seed(7)
    }

    #[test]
    fn test_instance_layout() {
        assert_eq!(ParticleInstance::FLOATS, 8);
        assert_eq!(std::mem::size_of::<ParticleInstance>(), 32);
    }

    #[test]
    fn test_spawn_respects_config_ranges() {
        let mut device = RecordingDevice::new();
        let mut ps = system(&mut device, 200);
        ps.burst(200);

        let c = *ps.config();
        for (i, p) in ps.instances().iter().enumerate() {
            assert!(p.size >= c.size_min && p.size <= c.size_max);
            for axis in 0..3 {
                let offset = (p.position[axis] - c.position[axis]).abs();
                assert!(offset <= c.position_jitter + 1e-6);
                let v = ps.velocities()[i][axis];
                assert!(v >= c.velocity_min[axis] && v <= c.velocity_max[axis]);
            }
            assert!(p.color[0] >= c.color[0] * 0.8 - 1e-6 && p.color[0] <= c.color[0] * 1.2 + 1e-6);
            assert_eq!(p.color[3], c.color[3]);
            assert_eq!(ps.lifetimes()[i], ps.max_lifetimes()[i]);
        }
        ps.dispose(&mut device);
    }

    #[test]
    fn test_compaction_keeps_survivor_order() {
        let mut device = RecordingDevice::new();
        let mut ps = system(&mut device, 16);
        ps.set_emission_rate(0.0);
        ps.burst(6);
        // Hand-pick lifetimes so slots 1 and 4 expire on the next step.
        ps.lifetimes[..6].copy_from_slice(&[2.0, 0.05, 2.0, 2.0, 0.05, 2.0]);
        ps.max_lifetimes[..6].copy_from_slice(&[2.0; 6]);
        let survivors: Vec<f32> = [0, 2, 3, 5]
            .iter()
            .map(|&i| ps.instances()[i].size)
            .collect();

        ps.update(&mut device, 0.1);

        assert_eq!(ps.active_count(), 4);
        let sizes: Vec<f32> = ps.instances().iter().map(|p| p.size).collect();
        assert_eq!(sizes, survivors);
        ps.dispose(&mut device);
    }

    #[test]
    fn test_fade_is_linear_in_remaining_life() {
        let mut device = RecordingDevice::new();
        let mut ps = system(&mut device, 4);
        ps.set_emission_rate(0.0);
        ps.set_lifetime_range(2.0, 2.0);
        ps.burst(1);

        ps.update(&mut device, 0.5);
        let alpha = ps.instances()[0].color[3];
        assert!((alpha - 0.75).abs() < 1e-5);
        ps.dispose(&mut device);
    }

    #[test]
    fn test_gravity_slows_rise() {
        let mut device = RecordingDevice::new();
        let mut ps = system(&mut device, 4);
        ps.set_emission_rate(0.0);
        ps.set_gravity(2.0);
        ps.burst(1);
        let vy = ps.velocities()[0][1];

        ps.update(&mut device, 0.25);
        assert!((ps.velocities()[0][1] - (vy - 0.5)).abs() < 1e-5);
        ps.dispose(&mut device);
    }

    #[test]
    fn test_saturation_drops_whole_units() {
        let mut device = RecordingDevice::new();
        let mut ps = system(&mut device, 2);
        ps.set_emission_rate(100.0);
        ps.set_lifetime_range(10.0, 10.0);

        ps.update(&mut device, 0.055);
        assert_eq!(ps.active_count(), 2);
        // 5.5 accumulated, 2 spawned, 3 dropped, 0.5 carried
        assert_eq!(ps.stats().dropped_spawns, 3);
        assert!((ps.emission_accumulator - 0.5).abs() < 1e-4);
        ps.dispose(&mut device);
    }

    #[test]
    fn test_bad_dt_is_zero() {
        let mut device = RecordingDevice::new();
        let mut ps = system(&mut device, 8);
        ps.burst(3);
        let before = ps.lifetimes().to_vec();

        ps.update(&mut device, -1.0);
        ps.update(&mut device, f32::NAN);

        assert_eq!(ps.lifetimes(), before.as_slice());
        assert_eq!(ps.time(), 0.0);
        ps.dispose(&mut device);
    }

    #[test]
    fn test_invalid_setter_keeps_config() {
        let mut device = RecordingDevice::new();
        let mut ps = system(&mut device, 8);
        ps.set_size_range(1.0, 0.5);
        ps.set_emission_rate(-5.0);
        assert_eq!(*ps.config(), EmitterConfig::default());

        ps.set_emitter_position([1.0, 2.0, 3.0]);
        assert_eq!(ps.config().position, [1.0, 2.0, 3.0]);
        ps.dispose(&mut device);
    }

    #[test]
    fn test_with_config_rejects_invalid() {
        let mut device = RecordingDevice::new();
        let config = EmitterConfig {
            lifetime_min: 5.0,
            lifetime_max: 1.0,
            ..EmitterConfig::default()
        };
        assert!(ParticleSystem::with_config(&mut device, 8, config).is_err());
        assert_eq!(device.total_live_objects(), 0);
    }

    #[test]
    fn test_seeded_systems_match() {
        let mut device = RecordingDevice::new();
        let mut a = system(&mut device, 32);
        let mut b = system(&mut device, 32);
        a.burst(10);
        b.burst(10);
        assert_eq!(a.instances(), b.instances());
        a.dispose(&mut device);
        b.dispose(&mut device);
    }

    #[test]
    fn test_clear_and_dispose() {
        let mut device = RecordingDevice::new();
        let mut ps = system(&mut device, 8);
        ps.burst(4);
        ps.clear();
        assert_eq!(ps.active_count(), 0);

        ps.dispose(&mut device);
        ps.dispose(&mut device);
        assert!(!ps.is_renderable());
        assert_eq!(device.total_live_objects(), 0);
        assert_eq!(device.invalid_operations(), 0);
    }
}
