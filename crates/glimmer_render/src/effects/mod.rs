//! # Particle Effects
//!
//! [`ParticleSystem`] owns a fixed-capacity particle store, a billboard mesh
//! with an instance buffer, and a shader program. It simulates on the CPU and
//! renders every live particle with one instanced draw call.
//!
//! ```rust
//! use glimmer_core::FramePool;
//! use glimmer_render::backend::RecordingDevice;
//! use glimmer_render::effects::ParticleSystem;
//!
//! let mut device = RecordingDevice::new();
//! let mut pool = FramePool::new();
//! let mut sparks = ParticleSystem::new(&mut device, 1_000).with_seed(1);
//!
//! pool.reset();
//! sparks.update(&mut device, 1.0 / 60.0);
//! sparks.burst(20);
//! sparks.draw(&mut device, &mut pool);
//!
//! assert_eq!(device.draw_call_count(), 1);
//! sparks.dispose(&mut device);
//! ```

mod blend;
mod config;
mod particle_system;

pub use blend::{ParticleBlendMode, STANDARD_BLEND};
pub use config::EmitterConfig;
pub use particle_system::{ParticleInstance, ParticleStats, ParticleSystem};
