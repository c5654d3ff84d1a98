//! GPU backend abstraction layer.
//!
//! Every GPU call the render layer makes goes through [`GraphicsDevice`], a
//! trait shaped after OpenGL ES 3.0: integer object ids, a bound vertex
//! array, per-attribute divisors, and sub-range buffer updates.
//!
//! # Available Backends
//!
//! - [`RecordingDevice`] (always built): headless, records every call,
//!   injects failures. Tests and tooling run on it.
//! - `GlDevice` (feature `gl`): forwards to a `glow::Context`.
//!
//! # Threading
//!
//! A device belongs to the thread that owns the GPU context. All methods take
//! `&mut self`; nothing here is `Sync`.

#[cfg(feature = "gl")]
pub mod gl;
pub mod recording;
mod types;

#[cfg(feature = "gl")]
pub use gl::GlDevice;
pub use recording::{DeviceCall, RecordingDevice};
pub use types::{
    BlendFactor, BufferTarget, BufferUsage, ObjectKind, PrimitiveKind, RawId, ShaderStage,
    UniformLocation, UniformValue,
};

use crate::error::RenderResult;

/// The GPU operations the render layer needs.
///
/// Creation calls return [`RenderError`](crate::RenderError) on failure; the
/// resource that asked logs it and degrades to its invalid state. All other
/// calls are fire-and-forget, like their GL counterparts.
pub trait GraphicsDevice {
    // ----- vertex-array binding state -----

    /// Creates an empty vertex array object.
    fn create_vertex_array(&mut self) -> RenderResult<RawId>;
    /// Deletes a vertex array object.
    fn delete_vertex_array(&mut self, id: RawId);
    /// Binds a vertex array (or unbinds with `None`).
    fn bind_vertex_array(&mut self, id: Option<RawId>);

    // ----- buffers -----

    /// Creates a buffer object with no storage.
    fn create_buffer(&mut self) -> RenderResult<RawId>;
    /// Deletes a buffer object.
    fn delete_buffer(&mut self, id: RawId);
    /// Binds a buffer to `target` (or unbinds with `None`).
    fn bind_buffer(&mut self, target: BufferTarget, id: Option<RawId>);
    /// Replaces the bound buffer's storage with `data`.
    fn buffer_data(&mut self, target: BufferTarget, data: &[u8], usage: BufferUsage);
    /// Replaces the bound buffer's storage with `size` uninitialised bytes.
    fn buffer_storage(&mut self, target: BufferTarget, size: usize, usage: BufferUsage);
    /// Overwrites `data.len()` bytes of the bound buffer starting at `offset`.
    fn buffer_sub_data(&mut self, target: BufferTarget, offset: usize, data: &[u8]);

    // ----- attribute state (recorded into the bound vertex array) -----

    /// Points attribute `index` at float data in the bound array buffer.
    fn vertex_attrib_pointer(&mut self, index: u32, components: u32, stride: u32, offset: u32);
    /// Enables attribute `index`.
    fn enable_vertex_attrib_array(&mut self, index: u32);
    /// Sets how often attribute `index` advances: 0 per vertex, 1 per instance.
    fn vertex_attrib_divisor(&mut self, index: u32, divisor: u32);

    // ----- draws -----

    /// Draws `count` vertices starting at `first`.
    fn draw_arrays(&mut self, mode: PrimitiveKind, first: u32, count: u32);
    /// Draws `count` u16 indices from the bound element buffer.
    fn draw_elements(&mut self, mode: PrimitiveKind, count: u32);
    /// Instanced [`draw_arrays`](Self::draw_arrays).
    fn draw_arrays_instanced(&mut self, mode: PrimitiveKind, first: u32, count: u32, instances: u32);
    /// Instanced [`draw_elements`](Self::draw_elements).
    fn draw_elements_instanced(&mut self, mode: PrimitiveKind, count: u32, instances: u32);

    // ----- shaders -----

    /// Compiles one stage. On failure returns the driver log.
    fn compile_shader(&mut self, stage: ShaderStage, source: &str) -> RenderResult<RawId>;
    /// Deletes a shader stage.
    fn delete_shader(&mut self, id: RawId);
    /// Links two compiled stages into a program. On failure returns the driver log.
    fn link_program(&mut self, vertex: RawId, fragment: RawId) -> RenderResult<RawId>;
    /// Deletes a program.
    fn delete_program(&mut self, id: RawId);
    /// Makes `id` the current program (or none).
    fn use_program(&mut self, id: Option<RawId>);
    /// Queries a uniform location. `None` when the program has no such uniform.
    fn uniform_location(&mut self, program: RawId, name: &str) -> Option<UniformLocation>;
    /// Queries an attribute location. `None` when the program has no such attribute.
    fn attribute_location(&mut self, program: RawId, name: &str) -> Option<u32>;
    /// Writes a uniform of the current program.
    fn set_uniform(&mut self, location: UniformLocation, value: UniformValue);

    // ----- fixed-function state -----

    /// Enables or disables blending.
    fn set_blending(&mut self, enabled: bool);
    /// Sets the blend equation factors.
    fn blend_func(&mut self, src: BlendFactor, dst: BlendFactor);
    /// Enables or disables depth writes.
    fn depth_mask(&mut self, enabled: bool);
}
