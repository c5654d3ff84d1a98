//! # Recording Device
//!
//! A headless [`GraphicsDevice`] that keeps enough state to stand in for a
//! real GL ES context:
//!
//! - every call is appended to a log of [`DeviceCall`]s,
//! - buffer contents are stored so uploads can be read back,
//! - live objects are counted per [`ObjectKind`] for leak checks,
//! - shader sources are checked for a `main` entry point and scanned for
//!   `uniform` and vertex `in` declarations so location queries behave,
//! - allocation and link failures can be injected.
//!
//! Misuse a driver would flag (deleting an unknown id, writing past a
//! buffer's end, drawing with no vertex array) is logged and counted in
//! [`RecordingDevice::invalid_operations`].

use std::collections::{HashMap, HashSet};
use std::num::NonZeroU32;

use tracing::warn;

use super::types::{
    BlendFactor, BufferTarget, BufferUsage, ObjectKind, PrimitiveKind, RawId, ShaderStage,
    UniformLocation, UniformValue,
};
use super::GraphicsDevice;
use crate::error::{RenderError, RenderResult};

/// One recorded device call. Byte payloads are recorded by size only.
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceCall {
    /// `create_vertex_array` succeeded.
    CreateVertexArray(RawId),
    /// `delete_vertex_array`.
    DeleteVertexArray(RawId),
    /// `bind_vertex_array`.
    BindVertexArray(Option<RawId>),
    /// `create_buffer` succeeded.
    CreateBuffer(RawId),
    /// `delete_buffer`.
    DeleteBuffer(RawId),
    /// `bind_buffer`.
    BindBuffer {
        /// Binding point.
        target: BufferTarget,
        /// Bound id.
        id: Option<RawId>,
    },
    /// `buffer_data`.
    BufferData {
        /// Binding point.
        target: BufferTarget,
        /// Bytes uploaded.
        bytes: usize,
        /// Usage hint.
        usage: BufferUsage,
    },
    /// `buffer_storage`.
    BufferStorage {
        /// Binding point.
        target: BufferTarget,
        /// Bytes reserved.
        bytes: usize,
        /// Usage hint.
        usage: BufferUsage,
    },
    /// `buffer_sub_data`.
    BufferSubData {
        /// Binding point.
        target: BufferTarget,
        /// Byte offset.
        offset: usize,
        /// Bytes written.
        bytes: usize,
    },
    /// `vertex_attrib_pointer`.
    VertexAttribPointer {
        /// Attribute index.
        index: u32,
        /// Floats per element.
        components: u32,
        /// Byte stride.
        stride: u32,
        /// Byte offset.
        offset: u32,
    },
    /// `enable_vertex_attrib_array`.
    EnableVertexAttribArray(u32),
    /// `vertex_attrib_divisor`.
    VertexAttribDivisor {
        /// Attribute index.
        index: u32,
        /// Divisor.
        divisor: u32,
    },
    /// `draw_arrays`.
    DrawArrays {
        /// Primitive mode.
        mode: PrimitiveKind,
        /// First vertex.
        first: u32,
        /// Vertex count.
        count: u32,
    },
    /// `draw_elements`.
    DrawElements {
        /// Primitive mode.
        mode: PrimitiveKind,
        /// Index count.
        count: u32,
    },
    /// `draw_arrays_instanced`.
    DrawArraysInstanced {
        /// Primitive mode.
        mode: PrimitiveKind,
        /// First vertex.
        first: u32,
        /// Vertex count.
        count: u32,
        /// Instance count.
        instances: u32,
    },
    /// `draw_elements_instanced`.
    DrawElementsInstanced {
        /// Primitive mode.
        mode: PrimitiveKind,
        /// Index count.
        count: u32,
        /// Instance count.
        instances: u32,
    },
    /// `compile_shader`, with its outcome.
    CompileShader {
        /// Stage compiled.
        stage: ShaderStage,
        /// Whether it compiled.
        ok: bool,
    },
    /// `delete_shader`.
    DeleteShader(RawId),
    /// `link_program`, with its outcome.
    LinkProgram {
        /// Whether it linked.
        ok: bool,
    },
    /// `delete_program`.
    DeleteProgram(RawId),
    /// `use_program`.
    UseProgram(Option<RawId>),
    /// `set_uniform`.
    SetUniform {
        /// Target location.
        location: UniformLocation,
        /// Value written.
        value: UniformValue,
    },
    /// `set_blending`.
    SetBlending(bool),
    /// `blend_func`.
    BlendFunc {
        /// Source factor.
        src: BlendFactor,
        /// Destination factor.
        dst: BlendFactor,
    },
    /// `depth_mask`.
    DepthMask(bool),
}

impl DeviceCall {
    /// True for any of the four draw calls.
    #[must_use]
    pub const fn is_draw(&self) -> bool {
        matches!(
            self,
            Self::DrawArrays { .. }
                | Self::DrawElements { .. }
                | Self::DrawArraysInstanced { .. }
                | Self::DrawElementsInstanced { .. }
        )
    }
}

/// Reflection data for a linked program.
#[derive(Debug, Default)]
struct ProgramInfo {
    uniforms: Vec<String>,
    attributes: Vec<(String, u32)>,
    values: HashMap<u32, UniformValue>,
}

/// Headless device that records calls. See the module docs.
///
/// The call log is never trimmed by the device. A long-lived device (a bench
/// loop, a tool running many frames) must call
/// [`RecordingDevice::clear_calls`] once per frame or the log grows without
/// bound. Clearing the log keeps every other piece of state.
#[derive(Debug)]
pub struct RecordingDevice {
    calls: Vec<DeviceCall>,
    next_id: u32,
    live: HashMap<RawId, ObjectKind>,
    buffers: HashMap<RawId, Vec<u8>>,
    shaders: HashMap<RawId, (ShaderStage, String)>,
    programs: HashMap<RawId, ProgramInfo>,

    bound_array: Option<RawId>,
    bound_element: Option<RawId>,
    bound_vertex_array: Option<RawId>,
    current_program: Option<RawId>,

    blending: bool,
    blend: (BlendFactor, BlendFactor),
    depth_writes: bool,

    failing_kinds: HashSet<ObjectKind>,
    fail_next_link: Option<String>,

    uniform_queries: usize,
    attribute_queries: usize,
    invalid_operations: usize,
}

impl Default for RecordingDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingDevice {
    /// Creates a device in the GL default state: blending off,
    /// `(One, Zero)` blend factors, depth writes on.
    #[must_use]
    pub fn new() -> Self {
        Self {
            calls: Vec::new(),
            next_id: 0,
            live: HashMap::new(),
            buffers: HashMap::new(),
            shaders: HashMap::new(),
            programs: HashMap::new(),
            bound_array: None,
            bound_element: None,
            bound_vertex_array: None,
            current_program: None,
            blending: false,
            blend: (BlendFactor::One, BlendFactor::Zero),
            depth_writes: true,
            failing_kinds: HashSet::new(),
            fail_next_link: None,
            uniform_queries: 0,
            attribute_queries: 0,
            invalid_operations: 0,
        }
    }

    // ----- failure injection -----

    /// Makes every future creation of `kind` fail until [`Self::heal`].
    pub fn fail_allocations(&mut self, kind: ObjectKind) {
        self.failing_kinds.insert(kind);
    }

    /// Makes the next `link_program` fail with `log`.
    pub fn fail_next_link(&mut self, log: impl Into<String>) {
        self.fail_next_link = Some(log.into());
    }

    /// Clears all injected failures.
    pub fn heal(&mut self) {
        self.failing_kinds.clear();
        self.fail_next_link = None;
    }

    // ----- inspection -----

    /// All calls since creation or the last [`Self::clear_calls`].
    #[must_use]
    pub fn calls(&self) -> &[DeviceCall] {
        &self.calls
    }

    /// Forgets recorded calls. State is kept.
    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    /// Number of recorded draw calls.
    #[must_use]
    pub fn draw_call_count(&self) -> usize {
        self.calls.iter().filter(|c| c.is_draw()).count()
    }

    /// Live objects of `kind`.
    #[must_use]
    pub fn live_objects(&self, kind: ObjectKind) -> usize {
        self.live.values().filter(|&&k| k == kind).count()
    }

    /// Live objects of any kind.
    #[must_use]
    pub fn total_live_objects(&self) -> usize {
        self.live.len()
    }

    /// Whether `id` is a live object.
    #[must_use]
    pub fn is_live(&self, id: RawId) -> bool {
        self.live.contains_key(&id)
    }

    /// Size in bytes of a buffer's storage.
    #[must_use]
    pub fn buffer_len(&self, id: RawId) -> Option<usize> {
        self.buffers.get(&id).map(Vec::len)
    }

    /// Buffer contents read back as floats.
    #[must_use]
    pub fn buffer_floats(&self, id: RawId) -> Option<Vec<f32>> {
        self.buffers
            .get(&id)
            .map(|bytes| bytemuck::pod_collect_to_vec::<u8, f32>(bytes))
    }

    /// Buffer bound to `target`.
    #[must_use]
    pub const fn bound_buffer(&self, target: BufferTarget) -> Option<RawId> {
        match target {
            BufferTarget::Array => self.bound_array,
            BufferTarget::ElementArray => self.bound_element,
        }
    }

    /// Currently bound vertex array.
    #[must_use]
    pub const fn bound_vertex_array(&self) -> Option<RawId> {
        self.bound_vertex_array
    }

    /// Current program.
    #[must_use]
    pub const fn current_program(&self) -> Option<RawId> {
        self.current_program
    }

    /// Whether blending is enabled.
    #[must_use]
    pub const fn blending_enabled(&self) -> bool {
        self.blending
    }

    /// Current blend factors.
    #[must_use]
    pub const fn blend_factors(&self) -> (BlendFactor, BlendFactor) {
        self.blend
    }

    /// Whether depth writes are enabled.
    #[must_use]
    pub const fn depth_writes_enabled(&self) -> bool {
        self.depth_writes
    }

    /// How many uniform location queries reached the device.
    #[must_use]
    pub const fn uniform_queries(&self) -> usize {
        self.uniform_queries
    }

    /// How many attribute location queries reached the device.
    #[must_use]
    pub const fn attribute_queries(&self) -> usize {
        self.attribute_queries
    }

    /// Misuse a real driver would have reported.
    #[must_use]
    pub const fn invalid_operations(&self) -> usize {
        self.invalid_operations
    }

    /// Last value written to uniform `name` of `program`.
    #[must_use]
    pub fn uniform_value(&self, program: RawId, name: &str) -> Option<UniformValue> {
        let info = self.programs.get(&program)?;
        let location = info.uniforms.iter().position(|u| u == name)?;
        info.values.get(&(location as u32)).copied()
    }

    // ----- internals -----

    fn allocate(&mut self, kind: ObjectKind) -> RenderResult<RawId> {
        if self.failing_kinds.contains(&kind) {
            return Err(RenderError::AllocationFailed { kind });
        }
        self.next_id += 1;
        let id = NonZeroU32::new(self.next_id).ok_or(RenderError::AllocationFailed { kind })?;
        self.live.insert(id, kind);
        Ok(id)
    }

    fn release(&mut self, id: RawId, kind: ObjectKind) {
        if self.live.get(&id) == Some(&kind) {
            self.live.remove(&id);
        } else {
            self.invalid("delete of unknown or mismatched object", id.get());
        }
    }

    fn invalid(&mut self, what: &str, detail: u32) {
        warn!("RecordingDevice: invalid operation: {} ({})", what, detail);
        self.invalid_operations += 1;
    }

    fn bound_storage(&mut self, target: BufferTarget) -> Option<&mut Vec<u8>> {
        let id = self.bound_buffer(target)?;
        self.buffers.get_mut(&id)
    }
}

/// Finds a GLSL-style compile problem in `source`.
fn check_source(source: &str) -> Option<String> {
    let lines = source.lines().count().max(1);
    if source.trim().is_empty() {
        return Some("ERROR: 0:1: '' : empty shader source".to_owned());
    }
    let opens = source.matches('{').count();
    let closes = source.matches('}').count();
    if opens != closes {
        return Some(format!(
            "ERROR: 0:{lines}: '' : syntax error: unbalanced braces"
        ));
    }
    if !source.contains("void main") {
        return Some(format!(
            "ERROR: 0:{lines}: 'main' : function not defined"
        ));
    }
    None
}

/// Top-level declarations using `keyword` (`uniform`, `in`, `attribute`).
/// Returns `(name, explicit layout location)`.
fn declarations<'s>(source: &'s str, keyword: &str) -> Vec<(&'s str, Option<u32>)> {
    let mut found = Vec::new();
    for line in source.lines() {
        let line = line.trim();
        let Some(decl) = line.strip_suffix(';') else {
            continue;
        };
        let tokens: Vec<&str> = decl.split_whitespace().collect();
        let Some(pos) = tokens.iter().position(|t| *t == keyword) else {
            continue;
        };
        // `keyword type name`, nothing after the name
        if tokens.len() != pos + 3 {
            continue;
        }
        let name = tokens[pos + 2];
        let name = name.split('[').next().unwrap_or(name);
        found.push((name, layout_location(decl)));
    }
    found
}

fn layout_location(decl: &str) -> Option<u32> {
    let rest = &decl[decl.find("location")? + "location".len()..];
    let rest = rest.trim_start().strip_prefix('=')?.trim_start();
    let digits: String = rest.chars().take_while(char::is_ascii_digit).collect();
    digits.parse().ok()
}

impl GraphicsDevice for RecordingDevice {
    fn create_vertex_array(&mut self) -> RenderResult<RawId> {
        let id = self.allocate(ObjectKind::VertexArray)?;
        self.calls.push(DeviceCall::CreateVertexArray(id));
        Ok(id)
    }

    fn delete_vertex_array(&mut self, id: RawId) {
        self.calls.push(DeviceCall::DeleteVertexArray(id));
        self.release(id, ObjectKind::VertexArray);
        if self.bound_vertex_array == Some(id) {
            self.bound_vertex_array = None;
        }
    }

    fn bind_vertex_array(&mut self, id: Option<RawId>) {
        self.calls.push(DeviceCall::BindVertexArray(id));
        if let Some(id) = id {
            if self.live.get(&id) != Some(&ObjectKind::VertexArray) {
                self.invalid("bind of unknown vertex array", id.get());
            }
        }
        self.bound_vertex_array = id;
    }

    fn create_buffer(&mut self) -> RenderResult<RawId> {
        let id = self.allocate(ObjectKind::Buffer)?;
        self.buffers.insert(id, Vec::new());
        self.calls.push(DeviceCall::CreateBuffer(id));
        Ok(id)
    }

    fn delete_buffer(&mut self, id: RawId) {
        self.calls.push(DeviceCall::DeleteBuffer(id));
        self.release(id, ObjectKind::Buffer);
        self.buffers.remove(&id);
        if self.bound_array == Some(id) {
            self.bound_array = None;
        }
        if self.bound_element == Some(id) {
            self.bound_element = None;
        }
    }

    fn bind_buffer(&mut self, target: BufferTarget, id: Option<RawId>) {
        self.calls.push(DeviceCall::BindBuffer { target, id });
        if let Some(id) = id {
            if !self.buffers.contains_key(&id) {
                self.invalid("bind of unknown buffer", id.get());
            }
        }
        match target {
            BufferTarget::Array => self.bound_array = id,
            BufferTarget::ElementArray => self.bound_element = id,
        }
    }

    fn buffer_data(&mut self, target: BufferTarget, data: &[u8], usage: BufferUsage) {
        self.calls.push(DeviceCall::BufferData {
            target,
            bytes: data.len(),
            usage,
        });
        match self.bound_storage(target) {
            Some(storage) => {
                storage.clear();
                storage.extend_from_slice(data);
            }
            None => self.invalid("buffer_data with no buffer bound", 0),
        }
    }

    fn buffer_storage(&mut self, target: BufferTarget, size: usize, usage: BufferUsage) {
        self.calls.push(DeviceCall::BufferStorage {
            target,
            bytes: size,
            usage,
        });
        match self.bound_storage(target) {
            Some(storage) => {
                storage.clear();
                storage.resize(size, 0);
            }
            None => self.invalid("buffer_storage with no buffer bound", 0),
        }
    }

    fn buffer_sub_data(&mut self, target: BufferTarget, offset: usize, data: &[u8]) {
        self.calls.push(DeviceCall::BufferSubData {
            target,
            offset,
            bytes: data.len(),
        });
        let in_range = match self.bound_storage(target) {
            Some(storage) if offset + data.len() <= storage.len() => {
                storage[offset..offset + data.len()].copy_from_slice(data);
                true
            }
            _ => false,
        };
        if !in_range {
            self.invalid("buffer_sub_data out of range", data.len() as u32);
        }
    }

    fn vertex_attrib_pointer(&mut self, index: u32, components: u32, stride: u32, offset: u32) {
        self.calls.push(DeviceCall::VertexAttribPointer {
            index,
            components,
            stride,
            offset,
        });
        if self.bound_array.is_none() {
            self.invalid("attribute pointer with no array buffer", index);
        }
    }

    fn enable_vertex_attrib_array(&mut self, index: u32) {
        self.calls.push(DeviceCall::EnableVertexAttribArray(index));
    }

    fn vertex_attrib_divisor(&mut self, index: u32, divisor: u32) {
        self.calls
            .push(DeviceCall::VertexAttribDivisor { index, divisor });
    }

    fn draw_arrays(&mut self, mode: PrimitiveKind, first: u32, count: u32) {
        self.calls.push(DeviceCall::DrawArrays { mode, first, count });
        if self.bound_vertex_array.is_none() {
            self.invalid("draw with no vertex array", count);
        }
    }

    fn draw_elements(&mut self, mode: PrimitiveKind, count: u32) {
        self.calls.push(DeviceCall::DrawElements { mode, count });
        if self.bound_vertex_array.is_none() {
            self.invalid("draw with no vertex array", count);
        }
    }

    fn draw_arrays_instanced(&mut self, mode: PrimitiveKind, first: u32, count: u32, instances: u32) {
        self.calls.push(DeviceCall::DrawArraysInstanced {
            mode,
            first,
            count,
            instances,
        });
        if self.bound_vertex_array.is_none() {
            self.invalid("draw with no vertex array", count);
        }
    }

    fn draw_elements_instanced(&mut self, mode: PrimitiveKind, count: u32, instances: u32) {
        self.calls.push(DeviceCall::DrawElementsInstanced {
            mode,
            count,
            instances,
        });
        if self.bound_vertex_array.is_none() {
            self.invalid("draw with no vertex array", count);
        }
    }

    fn compile_shader(&mut self, stage: ShaderStage, source: &str) -> RenderResult<RawId> {
        if let Some(log) = check_source(source) {
            self.calls.push(DeviceCall::CompileShader { stage, ok: false });
            return Err(RenderError::ShaderCompile { stage, log });
        }
        let id = self.allocate(ObjectKind::Shader)?;
        self.shaders.insert(id, (stage, source.to_owned()));
        self.calls.push(DeviceCall::CompileShader { stage, ok: true });
        Ok(id)
    }

    fn delete_shader(&mut self, id: RawId) {
        self.calls.push(DeviceCall::DeleteShader(id));
        self.release(id, ObjectKind::Shader);
        self.shaders.remove(&id);
    }

    fn link_program(&mut self, vertex: RawId, fragment: RawId) -> RenderResult<RawId> {
        if let Some(log) = self.fail_next_link.take() {
            self.calls.push(DeviceCall::LinkProgram { ok: false });
            return Err(RenderError::ProgramLink { log });
        }
        let (Some((ShaderStage::Vertex, vs)), Some((ShaderStage::Fragment, fs))) =
            (self.shaders.get(&vertex), self.shaders.get(&fragment))
        else {
            self.calls.push(DeviceCall::LinkProgram { ok: false });
            return Err(RenderError::ProgramLink {
                log: "ERROR: Linking requires one vertex and one fragment shader".to_owned(),
            });
        };

        let mut info = ProgramInfo::default();
        for source in [vs, fs] {
            for (name, _) in declarations(source, "uniform") {
                if !info.uniforms.iter().any(|u| u == name) {
                    info.uniforms.push(name.to_owned());
                }
            }
        }
        let mut next_slot = 0;
        for keyword in ["in", "attribute"] {
            for (name, location) in declarations(vs, keyword) {
                let slot = location.unwrap_or(next_slot);
                next_slot = slot + 1;
                info.attributes.push((name.to_owned(), slot));
            }
        }

        let id = self.allocate(ObjectKind::Program)?;
        self.programs.insert(id, info);
        self.calls.push(DeviceCall::LinkProgram { ok: true });
        Ok(id)
    }

    fn delete_program(&mut self, id: RawId) {
        self.calls.push(DeviceCall::DeleteProgram(id));
        self.release(id, ObjectKind::Program);
        self.programs.remove(&id);
        if self.current_program == Some(id) {
            self.current_program = None;
        }
    }

    fn use_program(&mut self, id: Option<RawId>) {
        self.calls.push(DeviceCall::UseProgram(id));
        if let Some(id) = id {
            if !self.programs.contains_key(&id) {
                self.invalid("use of unknown program", id.get());
            }
        }
        self.current_program = id;
    }

    fn uniform_location(&mut self, program: RawId, name: &str) -> Option<UniformLocation> {
        self.uniform_queries += 1;
        let info = self.programs.get(&program)?;
        let index = info.uniforms.iter().position(|u| u == name)?;
        Some(UniformLocation::new(index as u32))
    }

    fn attribute_location(&mut self, program: RawId, name: &str) -> Option<u32> {
        self.attribute_queries += 1;
        let info = self.programs.get(&program)?;
        info.attributes
            .iter()
            .find(|(attr, _)| attr == name)
            .map(|&(_, slot)| slot)
    }

    fn set_uniform(&mut self, location: UniformLocation, value: UniformValue) {
        self.calls.push(DeviceCall::SetUniform { location, value });
        let stored = self
            .current_program
            .and_then(|id| self.programs.get_mut(&id))
            .map(|info| info.values.insert(location.raw(), value));
        if stored.is_none() {
            self.invalid("set_uniform with no program in use", location.raw());
        }
    }

    fn set_blending(&mut self, enabled: bool) {
        self.calls.push(DeviceCall::SetBlending(enabled));
        self.blending = enabled;
    }

    fn blend_func(&mut self, src: BlendFactor, dst: BlendFactor) {
        self.calls.push(DeviceCall::BlendFunc { src, dst });
        self.blend = (src, dst);
    }

    fn depth_mask(&mut self, enabled: bool) {
        self.calls.push(DeviceCall::DepthMask(enabled));
        self.depth_writes = enabled;
    }
}
