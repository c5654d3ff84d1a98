//! GPU mesh: a vertex array plus the buffers it references.

use bytemuck::Pod;
use tracing::{debug, warn};

use super::builder::InstanceLayout;
use crate::backend::{BufferTarget, GraphicsDevice, PrimitiveKind};
use crate::resource::{BufferHandle, VertexArrayHandle};

/// Dynamic per-instance buffer and its live record count.
#[derive(Debug)]
pub(crate) struct InstanceBuffer {
    handle: BufferHandle,
    layout: InstanceLayout,
    live: u32,
}

impl InstanceBuffer {
    pub(crate) const fn new(handle: BufferHandle, layout: InstanceLayout) -> Self {
        Self {
            handle,
            layout,
            live: 0,
        }
    }
}

/// A drawable mesh created by [`MeshBuilder`](super::MeshBuilder).
///
/// Owns its vertex array and every buffer. A mesh whose creation failed is
/// *invalid*: every operation on it is a no-op. [`MeshResource::dispose`]
/// releases everything and may be called any number of times.
#[derive(Debug)]
pub struct MeshResource {
    vertex_array: Option<VertexArrayHandle>,
    vertex_buffers: Vec<BufferHandle>,
    index_buffer: Option<BufferHandle>,
    instance: Option<InstanceBuffer>,
    vertex_count: u32,
    index_count: u32,
    primitive: PrimitiveKind,
}

impl MeshResource {
    pub(crate) const fn invalid(primitive: PrimitiveKind) -> Self {
        Self {
            vertex_array: None,
            vertex_buffers: Vec::new(),
            index_buffer: None,
            instance: None,
            vertex_count: 0,
            index_count: 0,
            primitive,
        }
    }

    pub(crate) fn attach_vertex_array(&mut self, handle: VertexArrayHandle) {
        self.vertex_array = Some(handle);
    }

    pub(crate) fn attach_vertex_buffer(&mut self, handle: BufferHandle) {
        self.vertex_buffers.push(handle);
    }

    pub(crate) fn attach_index_buffer(&mut self, handle: BufferHandle, count: u32) {
        self.index_buffer = Some(handle);
        self.index_count = count;
    }

    pub(crate) fn attach_instance_buffer(&mut self, instance: InstanceBuffer) {
        self.instance = Some(instance);
    }

    pub(crate) fn set_vertex_count(&mut self, count: u32) {
        self.vertex_count = count;
    }

    // ----- queries -----

    /// Whether the mesh was created and not yet disposed.
    #[inline]
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.vertex_array.as_ref().is_some_and(VertexArrayHandle::is_live)
    }

    /// Raw vertex array id, `0` when invalid or disposed.
    #[must_use]
    pub fn vertex_array_raw(&self) -> u32 {
        self.vertex_array.as_ref().map_or(0, VertexArrayHandle::raw)
    }

    /// Vertices per draw (from the first per-vertex channel).
    #[inline]
    #[must_use]
    pub const fn vertex_count(&self) -> u32 {
        self.vertex_count
    }

    /// Indices per draw, `0` for non-indexed meshes.
    #[inline]
    #[must_use]
    pub const fn index_count(&self) -> u32 {
        self.index_count
    }

    /// Whether draws use the index buffer.
    #[inline]
    #[must_use]
    pub const fn has_indices(&self) -> bool {
        self.index_buffer.is_some()
    }

    /// Whether an instance buffer was declared.
    #[inline]
    #[must_use]
    pub const fn has_instance_buffer(&self) -> bool {
        self.instance.is_some()
    }

    /// Declared instance capacity, `0` without an instance buffer.
    #[must_use]
    pub fn instance_capacity(&self) -> u32 {
        self.instance.as_ref().map_or(0, |i| i.layout.capacity)
    }

    /// Instance records uploaded by the last update.
    #[must_use]
    pub fn instance_count(&self) -> u32 {
        self.instance.as_ref().map_or(0, |i| i.live)
    }

    /// Floats per instance record, `0` without an instance buffer.
    #[must_use]
    pub fn floats_per_instance(&self) -> u32 {
        self.instance
            .as_ref()
            .map_or(0, |i| i.layout.floats_per_instance)
    }

    /// Raw id of the instance buffer, `0` when there is none.
    #[must_use]
    pub fn instance_buffer_raw(&self) -> u32 {
        self.instance.as_ref().map_or(0, |i| i.handle.raw())
    }

    /// Current primitive kind.
    #[inline]
    #[must_use]
    pub const fn primitive(&self) -> PrimitiveKind {
        self.primitive
    }

    /// Switches the primitive kind used by later draws.
    pub fn set_draw_mode(&mut self, primitive: PrimitiveKind) {
        self.primitive = primitive;
    }

    // ----- drawing -----

    /// Binds the vertex array. No-op when invalid.
    pub fn bind<D: GraphicsDevice + ?Sized>(&self, device: &mut D) {
        if let Some(id) = self.vertex_array.as_ref().and_then(VertexArrayHandle::id) {
            device.bind_vertex_array(Some(id));
        }
    }

    /// Unbinds the vertex array. No-op when invalid.
    pub fn unbind<D: GraphicsDevice + ?Sized>(&self, device: &mut D) {
        if self.is_valid() {
            device.bind_vertex_array(None);
        }
    }

    /// Issues one draw call. The mesh must be bound.
    pub fn draw<D: GraphicsDevice + ?Sized>(&self, device: &mut D) {
        if !self.is_valid() {
            return;
        }
        if self.has_indices() {
            device.draw_elements(self.primitive, self.index_count);
        } else {
            device.draw_arrays(self.primitive, 0, self.vertex_count);
        }
    }

    /// Issues one instanced draw of `instances` copies. The mesh must be bound.
    ///
    /// No-op without an instance buffer. `instances` is clamped to capacity.
    pub fn draw_instanced<D: GraphicsDevice + ?Sized>(&self, device: &mut D, instances: u32) {
        let capacity = self.instance_capacity();
        if !self.is_valid() || capacity == 0 || instances == 0 {
            return;
        }
        let instances = instances.min(capacity);
        if self.has_indices() {
            device.draw_elements_instanced(self.primitive, self.index_count, instances);
        } else {
            device.draw_arrays_instanced(self.primitive, 0, self.vertex_count, instances);
        }
    }

    /// Uploads instance records from a flat float slice.
    ///
    /// The live count becomes `data.len() / floats_per_instance`, clamped to
    /// capacity, and exactly that many records are written as a sub-range
    /// update starting at offset 0. Returns the number of floats uploaded.
    ///
    /// A mesh without an instance buffer, or a record size that does not
    /// match the declared layout, logs a warning and uploads nothing.
    pub fn update_instance_buffer<D: GraphicsDevice + ?Sized>(
        &mut self,
        device: &mut D,
        data: &[f32],
        floats_per_instance: u32,
    ) -> usize {
        let Some(instance) = self.instance.as_mut() else {
            warn!("update_instance_buffer on a mesh without an instance buffer");
            return 0;
        };
        let Some(id) = instance.handle.id() else {
            return 0;
        };
        if floats_per_instance != instance.layout.floats_per_instance {
            warn!(
                "instance record of {} floats does not match layout of {}",
                floats_per_instance, instance.layout.floats_per_instance
            );
            return 0;
        }

        let fpi = floats_per_instance as usize;
        let records = (data.len() / fpi).min(instance.layout.capacity as usize);
        instance.live = records as u32;
        if records == 0 {
            return 0;
        }

        let floats = records * fpi;
        device.bind_buffer(BufferTarget::Array, Some(id));
        device.buffer_sub_data(BufferTarget::Array, 0, bytemuck::cast_slice(&data[..floats]));
        device.bind_buffer(BufferTarget::Array, None);
        floats
    }

    /// Uploads typed instance records; see [`Self::update_instance_buffer`].
    pub fn update_instances<D, T>(&mut self, device: &mut D, records: &[T]) -> usize
    where
        D: GraphicsDevice + ?Sized,
        T: Pod,
    {
        let fpi = (std::mem::size_of::<T>() / std::mem::size_of::<f32>()) as u32;
        self.update_instance_buffer(device, bytemuck::cast_slice(records), fpi)
    }

    /// Releases the vertex array and every buffer. Safe to call repeatedly.
    pub fn dispose<D: GraphicsDevice + ?Sized>(&mut self, device: &mut D) {
        let was_valid = self.is_valid();
        if let Some(vao) = self.vertex_array.as_mut() {
            vao.release(device);
        }
        for buffer in &mut self.vertex_buffers {
            buffer.release(device);
        }
        if let Some(buffer) = self.index_buffer.as_mut() {
            buffer.release(device);
        }
        if let Some(instance) = self.instance.as_mut() {
            instance.handle.release(device);
            instance.live = 0;
        }
        if was_valid {
            debug!("mesh disposed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{DeviceCall, ObjectKind, RecordingDevice};
    use crate::mesh::MeshBuilder;

    const QUAD: [f32; 12] = [
        -0.5, -0.5, 0.0, 0.5, -0.5, 0.0, 0.5, 0.5, 0.0, -0.5, 0.5, 0.0,
    ];

    fn instanced(device: &mut RecordingDevice, capacity: u32) -> MeshResource {
        MeshBuilder::new()
            .add_vertex_buffer(&QUAD, 3)
            .set_index_buffer(&[0, 1, 2, 0, 2, 3])
            .set_instance_buffer(capacity, 8, 1)
            .build(device)
    }

    #[test]
    fn test_draw_indexed_vs_arrays() {
        let mut device = RecordingDevice::new();
        let mut indexed = instanced(&mut device, 4);
        let mut plain = MeshBuilder::new()
            .add_vertex_buffer(&QUAD, 3)
            .set_draw_mode(PrimitiveKind::Points)
            .build(&mut device);
        device.clear_calls();

        indexed.bind(&mut device);
        indexed.draw(&mut device);
        plain.bind(&mut device);
        plain.draw(&mut device);
        plain.unbind(&mut device);

        assert!(device.calls().contains(&DeviceCall::DrawElements {
            mode: PrimitiveKind::Triangles,
            count: 6
        }));
        assert!(device.calls().contains(&DeviceCall::DrawArrays {
            mode: PrimitiveKind::Points,
            first: 0,
            count: 4
        }));
        assert_eq!(device.invalid_operations(), 0);

        indexed.dispose(&mut device);
        plain.dispose(&mut device);
    }

    #[test]
    fn test_update_uploads_only_live_records() {
        let mut device = RecordingDevice::new();
        let mut mesh = instanced(&mut device, 100);
        device.clear_calls();

        let data = [1.0f32; 3 * 8];
        let floats = mesh.update_instance_buffer(&mut device, &data, 8);

        assert_eq!(floats, 24);
        assert_eq!(mesh.instance_count(), 3);
        assert!(device.calls().contains(&DeviceCall::BufferSubData {
            target: BufferTarget::Array,
            offset: 0,
            bytes: 24 * 4
        }));
        mesh.dispose(&mut device);
    }

    #[test]
    fn test_update_clamps_to_capacity() {
        let mut device = RecordingDevice::new();
        let mut mesh = instanced(&mut device, 2);

        let data = [0.5f32; 5 * 8];
        assert_eq!(mesh.update_instance_buffer(&mut device, &data, 8), 16);
        assert_eq!(mesh.instance_count(), 2);
        assert_eq!(device.invalid_operations(), 0);
        mesh.dispose(&mut device);
    }

    #[test]
    fn test_update_without_instance_buffer_is_noop() {
        let mut device = RecordingDevice::new();
        let mut mesh = MeshBuilder::new()
            .add_vertex_buffer(&QUAD, 3)
            .build(&mut device);
        device.clear_calls();

        assert_eq!(mesh.update_instance_buffer(&mut device, &[0.0; 8], 8), 0);
        assert!(device.calls().is_empty());
        mesh.dispose(&mut device);
    }

    #[test]
    fn test_update_rejects_mismatched_record_size() {
        let mut device = RecordingDevice::new();
        let mut mesh = instanced(&mut device, 10);
        device.clear_calls();

        assert_eq!(mesh.update_instance_buffer(&mut device, &[0.0; 14], 7), 0);
        assert!(device.calls().is_empty());
        mesh.dispose(&mut device);
    }

    #[test]
    fn test_draw_instanced_requires_instance_buffer() {
        let mut device = RecordingDevice::new();
        let mut mesh = MeshBuilder::new()
            .add_vertex_buffer(&QUAD, 3)
            .build(&mut device);
        mesh.bind(&mut device);
        mesh.draw_instanced(&mut device, 10);
        assert_eq!(device.draw_call_count(), 0);
        mesh.dispose(&mut device);
    }

    #[test]
    fn test_draw_instanced_clamps_count() {
        let mut device = RecordingDevice::new();
        let mut mesh = instanced(&mut device, 5);
        mesh.bind(&mut device);
        mesh.draw_instanced(&mut device, 50);
        assert_eq!(
            device.calls().last(),
            Some(&DeviceCall::DrawElementsInstanced {
                mode: PrimitiveKind::Triangles,
                count: 6,
                instances: 5
            })
        );
        mesh.dispose(&mut device);
    }

    #[test]
    fn test_dispose_twice_is_noop() {
        let mut device = RecordingDevice::new();
        let mut mesh = instanced(&mut device, 10);
        assert_eq!(device.total_live_objects(), 4);

        mesh.dispose(&mut device);
        mesh.dispose(&mut device);

        assert!(!mesh.is_valid());
        assert_eq!(mesh.vertex_array_raw(), 0);
        assert_eq!(mesh.instance_buffer_raw(), 0);
        assert_eq!(device.live_objects(ObjectKind::Buffer), 0);
        assert_eq!(device.invalid_operations(), 0);
    }

    #[test]
    fn test_disposed_mesh_draws_nothing() {
        let mut device = RecordingDevice::new();
        let mut mesh = instanced(&mut device, 10);
        mesh.dispose(&mut device);
        device.clear_calls();

        mesh.bind(&mut device);
        mesh.draw(&mut device);
        mesh.draw_instanced(&mut device, 3);
        assert!(device.calls().is_empty());
    }
}
