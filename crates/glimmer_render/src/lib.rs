//! # GLIMMER Render
//!
//! GPU resource management and instanced particle rendering on an
//! OpenGL ES 3.0-shaped device.
//!
//! ## Layers
//!
//! - [`backend`]: the [`GraphicsDevice`] seam, a recording device for
//!   headless runs, and a `glow` device behind the `gl` feature
//! - [`resource`]: typed GPU handles with a single disposal path
//! - [`shader`]: compile/link with readable diagnostics and cached locations
//! - [`mesh`]: vertex/index/instance buffers behind one builder
//! - [`effects`]: the instanced CPU particle system
//!
//! ## Failure Policy
//!
//! GPU failures never panic and never propagate into the frame loop. A mesh
//! or shader that fails to build logs through `tracing` once and becomes
//! invalid; drawing an invalid resource is a no-op. Only configuration errors
//! are returned as [`RenderError`].

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod backend;
pub mod effects;
pub mod error;
pub mod mesh;
pub mod resource;
pub mod shader;

pub use backend::{GraphicsDevice, RecordingDevice};
pub use effects::{EmitterConfig, ParticleBlendMode, ParticleStats, ParticleSystem};
pub use error::{RenderError, RenderResult};
pub use mesh::{MeshBuilder, MeshResource};
pub use shader::ShaderProgram;
