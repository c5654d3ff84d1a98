//! OpenGL ES 3.0 backend on top of `glow`.
//!
//! Every method forwards to one `glow` call. The context must be current on
//! the calling thread; that is the only precondition the `unsafe` blocks
//! rely on.

#![allow(unsafe_code)]

use glow::HasContext as _;

use super::types::{
    BlendFactor, BufferTarget, BufferUsage, ObjectKind, PrimitiveKind, RawId, ShaderStage,
    UniformLocation, UniformValue,
};
use super::GraphicsDevice;
use crate::error::{RenderError, RenderResult};

/// A [`GraphicsDevice`] driving a live GL ES 3.0 context.
pub struct GlDevice {
    gl: glow::Context,
}

impl std::fmt::Debug for GlDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GlDevice").finish_non_exhaustive()
    }
}

impl GlDevice {
    /// Wraps a context created by the windowing layer.
    #[must_use]
    pub const fn new(gl: glow::Context) -> Self {
        Self { gl }
    }

    /// Borrows the underlying context for calls this trait does not cover.
    #[must_use]
    pub const fn context(&self) -> &glow::Context {
        &self.gl
    }
}

const fn target(t: BufferTarget) -> u32 {
    match t {
        BufferTarget::Array => glow::ARRAY_BUFFER,
        BufferTarget::ElementArray => glow::ELEMENT_ARRAY_BUFFER,
    }
}

const fn usage(u: BufferUsage) -> u32 {
    match u {
        BufferUsage::Static => glow::STATIC_DRAW,
        BufferUsage::Dynamic => glow::DYNAMIC_DRAW,
    }
}

const fn mode(p: PrimitiveKind) -> u32 {
    match p {
        PrimitiveKind::Triangles => glow::TRIANGLES,
        PrimitiveKind::Points => glow::POINTS,
        PrimitiveKind::Lines => glow::LINES,
    }
}

const fn factor(f: BlendFactor) -> u32 {
    match f {
        BlendFactor::Zero => glow::ZERO,
        BlendFactor::One => glow::ONE,
        BlendFactor::SrcAlpha => glow::SRC_ALPHA,
        BlendFactor::OneMinusSrcAlpha => glow::ONE_MINUS_SRC_ALPHA,
    }
}

fn allocation_failed(kind: ObjectKind, reason: &str) -> RenderError {
    tracing::error!("GL {:?} allocation failed: {}", kind, reason);
    RenderError::AllocationFailed { kind }
}

impl GraphicsDevice for GlDevice {
    fn create_vertex_array(&mut self) -> RenderResult<RawId> {
        unsafe { self.gl.create_vertex_array() }
            .map(|v| v.0)
            .map_err(|e| allocation_failed(ObjectKind::VertexArray, &e))
    }

    fn delete_vertex_array(&mut self, id: RawId) {
        unsafe { self.gl.delete_vertex_array(glow::NativeVertexArray(id)) }
    }

    fn bind_vertex_array(&mut self, id: Option<RawId>) {
        unsafe { self.gl.bind_vertex_array(id.map(glow::NativeVertexArray)) }
    }

    fn create_buffer(&mut self) -> RenderResult<RawId> {
        unsafe { self.gl.create_buffer() }
            .map(|b| b.0)
            .map_err(|e| allocation_failed(ObjectKind::Buffer, &e))
    }

    fn delete_buffer(&mut self, id: RawId) {
        unsafe { self.gl.delete_buffer(glow::NativeBuffer(id)) }
    }

    fn bind_buffer(&mut self, t: BufferTarget, id: Option<RawId>) {
        unsafe { self.gl.bind_buffer(target(t), id.map(glow::NativeBuffer)) }
    }

    fn buffer_data(&mut self, t: BufferTarget, data: &[u8], u: BufferUsage) {
        unsafe { self.gl.buffer_data_u8_slice(target(t), data, usage(u)) }
    }

    fn buffer_storage(&mut self, t: BufferTarget, size: usize, u: BufferUsage) {
        unsafe { self.gl.buffer_data_size(target(t), size as i32, usage(u)) }
    }

    fn buffer_sub_data(&mut self, t: BufferTarget, offset: usize, data: &[u8]) {
        unsafe {
            self.gl
                .buffer_sub_data_u8_slice(target(t), offset as i32, data);
        }
    }

    fn vertex_attrib_pointer(&mut self, index: u32, components: u32, stride: u32, offset: u32) {
        unsafe {
            self.gl.vertex_attrib_pointer_f32(
                index,
                components as i32,
                glow::FLOAT,
                false,
                stride as i32,
                offset as i32,
            );
        }
    }

    fn enable_vertex_attrib_array(&mut self, index: u32) {
        unsafe { self.gl.enable_vertex_attrib_array(index) }
    }

    fn vertex_attrib_divisor(&mut self, index: u32, divisor: u32) {
        unsafe { self.gl.vertex_attrib_divisor(index, divisor) }
    }

    fn draw_arrays(&mut self, p: PrimitiveKind, first: u32, count: u32) {
        unsafe { self.gl.draw_arrays(mode(p), first as i32, count as i32) }
    }

    fn draw_elements(&mut self, p: PrimitiveKind, count: u32) {
        unsafe {
            self.gl
                .draw_elements(mode(p), count as i32, glow::UNSIGNED_SHORT, 0);
        }
    }

    fn draw_arrays_instanced(&mut self, p: PrimitiveKind, first: u32, count: u32, instances: u32) {
        unsafe {
            self.gl.draw_arrays_instanced(
                mode(p),
                first as i32,
                count as i32,
                instances as i32,
            );
        }
    }

    fn draw_elements_instanced(&mut self, p: PrimitiveKind, count: u32, instances: u32) {
        unsafe {
            self.gl.draw_elements_instanced(
                mode(p),
                count as i32,
                glow::UNSIGNED_SHORT,
                0,
                instances as i32,
            );
        }
    }

    fn compile_shader(&mut self, stage: ShaderStage, source: &str) -> RenderResult<RawId> {
        let kind = match stage {
            ShaderStage::Vertex => glow::VERTEX_SHADER,
            ShaderStage::Fragment => glow::FRAGMENT_SHADER,
        };
        unsafe {
            let shader = self
                .gl
                .create_shader(kind)
                .map_err(|e| allocation_failed(ObjectKind::Shader, &e))?;
            self.gl.shader_source(shader, source);
            self.gl.compile_shader(shader);
            if self.gl.get_shader_compile_status(shader) {
                Ok(shader.0)
            } else {
                let log = self.gl.get_shader_info_log(shader);
                self.gl.delete_shader(shader);
                Err(RenderError::ShaderCompile { stage, log })
            }
        }
    }

    fn delete_shader(&mut self, id: RawId) {
        unsafe { self.gl.delete_shader(glow::NativeShader(id)) }
    }

    fn link_program(&mut self, vertex: RawId, fragment: RawId) -> RenderResult<RawId> {
        unsafe {
            let program = self
                .gl
                .create_program()
                .map_err(|e| allocation_failed(ObjectKind::Program, &e))?;
            let vs = glow::NativeShader(vertex);
            let fs = glow::NativeShader(fragment);
            self.gl.attach_shader(program, vs);
            self.gl.attach_shader(program, fs);
            self.gl.link_program(program);
            self.gl.detach_shader(program, vs);
            self.gl.detach_shader(program, fs);
            if self.gl.get_program_link_status(program) {
                Ok(program.0)
            } else {
                let log = self.gl.get_program_info_log(program);
                self.gl.delete_program(program);
                Err(RenderError::ProgramLink { log })
            }
        }
    }

    fn delete_program(&mut self, id: RawId) {
        unsafe { self.gl.delete_program(glow::NativeProgram(id)) }
    }

    fn use_program(&mut self, id: Option<RawId>) {
        unsafe { self.gl.use_program(id.map(glow::NativeProgram)) }
    }

    fn uniform_location(&mut self, program: RawId, name: &str) -> Option<UniformLocation> {
        unsafe {
            self.gl
                .get_uniform_location(glow::NativeProgram(program), name)
        }
        .map(|loc| UniformLocation::new(loc.0))
    }

    fn attribute_location(&mut self, program: RawId, name: &str) -> Option<u32> {
        unsafe { self.gl.get_attrib_location(glow::NativeProgram(program), name) }
    }

    fn set_uniform(&mut self, location: UniformLocation, value: UniformValue) {
        let loc = glow::NativeUniformLocation(location.raw());
        let loc = Some(&loc);
        unsafe {
            match value {
                UniformValue::Float(v) => self.gl.uniform_1_f32(loc, v),
                UniformValue::Int(v) => self.gl.uniform_1_i32(loc, v),
                UniformValue::Vec2([x, y]) => self.gl.uniform_2_f32(loc, x, y),
                UniformValue::Vec3([x, y, z]) => self.gl.uniform_3_f32(loc, x, y, z),
                UniformValue::Vec4([x, y, z, w]) => self.gl.uniform_4_f32(loc, x, y, z, w),
                UniformValue::Mat4(m) => self.gl.uniform_matrix_4_f32_slice(loc, false, &m),
            }
        }
    }

    fn set_blending(&mut self, enabled: bool) {
        unsafe {
            if enabled {
                self.gl.enable(glow::BLEND);
            } else {
                self.gl.disable(glow::BLEND);
            }
        }
    }

    fn blend_func(&mut self, src: BlendFactor, dst: BlendFactor) {
        unsafe { self.gl.blend_func(factor(src), factor(dst)) }
    }

    fn depth_mask(&mut self, enabled: bool) {
        unsafe { self.gl.depth_mask(enabled) }
    }
}
