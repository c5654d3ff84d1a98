//! Mesh assembly.
//!
//! ```text
//! MeshBuilder::new()
//!     .add_vertex_buffer(&positions, 3)     // attribute 0
//!     .add_vertex_buffer(&uvs, 2)           // attribute 1
//!     .set_index_buffer(&indices)
//!     .set_instance_buffer(1000, 8, 2)      // attributes 2, 3, 4
//!     .build(&mut device)
//! ```
//!
//! Vertex channels take attribute indices in declaration order. The builder
//! only borrows the caller's data; everything is uploaded during
//! [`MeshBuilder::build`].

use tracing::{debug, error};

use super::resource::{InstanceBuffer, MeshResource};
use crate::backend::{BufferTarget, BufferUsage, GraphicsDevice, PrimitiveKind};
use crate::error::{RenderError, RenderResult};
use crate::resource::{BufferHandle, VertexArrayHandle};

/// Sub-attribute widths of an instance record, in order: position, color, size.
pub const INSTANCE_SCHEME: [u32; 3] = [3, 4, 1];

/// One declared vertex channel.
#[derive(Debug, Clone, Copy)]
struct VertexChannel<'a> {
    data: &'a [f32],
    components: u32,
    divisor: u32,
}

/// Per-instance buffer declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstanceLayout {
    /// Maximum instances the buffer holds.
    pub capacity: u32,
    /// Floats in one instance record.
    pub floats_per_instance: u32,
    /// First attribute index used by the instance channels.
    pub start_attribute: u32,
}

impl InstanceLayout {
    /// Byte stride of one instance record.
    #[inline]
    #[must_use]
    pub const fn stride(&self) -> u32 {
        self.floats_per_instance * 4
    }

    /// Sub-attributes as `(attribute, components, byte offset)`.
    ///
    /// Follows [`INSTANCE_SCHEME`] for as many entries as fit in the record;
    /// floats past the last whole entry are padding.
    pub fn sub_attributes(&self) -> impl Iterator<Item = (u32, u32, u32)> + '_ {
        let mut offset = 0;
        INSTANCE_SCHEME
            .into_iter()
            .enumerate()
            .map_while(move |(i, components)| {
                if offset + components > self.floats_per_instance {
                    return None;
                }
                let entry = (self.start_attribute + i as u32, components, offset * 4);
                offset += components;
                Some(entry)
            })
    }

    fn validate(&self, vertex_channels: usize) -> RenderResult<()> {
        if self.capacity == 0 {
            return Err(RenderError::InstanceLayout("capacity is zero".into()));
        }
        if self.floats_per_instance < INSTANCE_SCHEME[0] {
            return Err(RenderError::InstanceLayout(format!(
                "{} floats per instance, need at least {}",
                self.floats_per_instance, INSTANCE_SCHEME[0]
            )));
        }
        if (self.start_attribute as usize) < vertex_channels {
            return Err(RenderError::InstanceLayout(format!(
                "start attribute {} overlaps {} vertex channels",
                self.start_attribute, vertex_channels
            )));
        }
        Ok(())
    }
}

/// Collects mesh data, then creates the GPU objects in one go.
#[derive(Debug, Clone, Default)]
#[must_use]
pub struct MeshBuilder<'a> {
    channels: Vec<VertexChannel<'a>>,
    indices: Option<&'a [u16]>,
    instance: Option<InstanceLayout>,
    primitive: PrimitiveKind,
}

impl<'a> MeshBuilder<'a> {
    /// Creates an empty builder drawing triangles.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a per-vertex channel of `components` floats per element.
    pub fn add_vertex_buffer(self, data: &'a [f32], components: u32) -> Self {
        self.add_vertex_buffer_with_divisor(data, components, 0)
    }

    /// Declares a channel with an explicit divisor (0 per vertex, 1 per instance).
    pub fn add_vertex_buffer_with_divisor(
        mut self,
        data: &'a [f32],
        components: u32,
        divisor: u32,
    ) -> Self {
        self.channels.push(VertexChannel {
            data,
            components,
            divisor,
        });
        self
    }

    /// Sets 16-bit indices; the mesh then draws indexed.
    pub fn set_index_buffer(mut self, indices: &'a [u16]) -> Self {
        self.indices = Some(indices);
        self
    }

    /// Declares a dynamic per-instance buffer.
    ///
    /// Each record of `floats_per_instance` floats is split into position
    /// (3), color (4) and size (1) attributes starting at `start_attribute`,
    /// each with divisor 1.
    pub fn set_instance_buffer(
        mut self,
        max_instances: u32,
        floats_per_instance: u32,
        start_attribute: u32,
    ) -> Self {
        self.instance = Some(InstanceLayout {
            capacity: max_instances,
            floats_per_instance,
            start_attribute,
        });
        self
    }

    /// Sets the primitive kind.
    pub fn set_draw_mode(mut self, primitive: PrimitiveKind) -> Self {
        self.primitive = primitive;
        self
    }

    /// Checks the declarations and returns the non-instanced vertex count.
    fn validate(&self) -> RenderResult<u32> {
        for (channel, c) in self.channels.iter().enumerate() {
            let components = c.components as usize;
            if !(1..=4).contains(&components) {
                return Err(RenderError::ChannelComponents {
                    channel,
                    components,
                });
            }
            if c.data.len() % components != 0 {
                return Err(RenderError::ChannelLength {
                    channel,
                    len: c.data.len(),
                    components,
                });
            }
        }

        let vertex_count = self
            .channels
            .iter()
            .find(|c| c.divisor == 0)
            .map(|c| c.data.len() / c.components as usize)
            .ok_or(RenderError::NoVertexChannel)?;

        if let Some(indices) = self.indices {
            if indices.is_empty() {
                return Err(RenderError::EmptyIndexBuffer);
            }
            if let Some((position, &index)) = indices
                .iter()
                .enumerate()
                .find(|&(_, &i)| usize::from(i) >= vertex_count)
            {
                return Err(RenderError::IndexOutOfRange {
                    index,
                    position,
                    vertex_count,
                });
            }
        }

        if let Some(layout) = &self.instance {
            layout.validate(self.channels.len())?;
        }

        Ok(vertex_count as u32)
    }

    /// Creates the vertex array and buffers and uploads the static data.
    ///
    /// Never fails outright: validation or allocation errors are logged, any
    /// objects created so far are released, and an invalid mesh is returned.
    /// Drawing an invalid mesh does nothing.
    pub fn build<D: GraphicsDevice + ?Sized>(self, device: &mut D) -> MeshResource {
        let mut mesh = MeshResource::invalid(self.primitive);
        let vertex_count = match self.validate() {
            Ok(count) => count,
            Err(err) => {
                error!("mesh rejected: {}", err);
                return mesh;
            }
        };

        if let Err(err) = self.upload(device, &mut mesh, vertex_count) {
            error!("mesh creation failed: {}", err);
            device.bind_vertex_array(None);
            mesh.dispose(device);
            return mesh;
        }

        debug!(
            "mesh built: {} channels, {} vertices, {} indices, {} instances",
            self.channels.len(),
            mesh.vertex_count(),
            mesh.index_count(),
            mesh.instance_capacity()
        );
        mesh
    }

    fn upload<D: GraphicsDevice + ?Sized>(
        &self,
        device: &mut D,
        mesh: &mut MeshResource,
        vertex_count: u32,
    ) -> RenderResult<()> {
        let vao = VertexArrayHandle::create(device)?;
        device.bind_vertex_array(vao.id());
        mesh.attach_vertex_array(vao);

        for (index, channel) in self.channels.iter().enumerate() {
            let buffer = BufferHandle::create(device)?;
            device.bind_buffer(BufferTarget::Array, buffer.id());
            mesh.attach_vertex_buffer(buffer);

            device.buffer_data(
                BufferTarget::Array,
                bytemuck::cast_slice(channel.data),
                BufferUsage::Static,
            );
            let index = index as u32;
            device.vertex_attrib_pointer(index, channel.components, 0, 0);
            device.enable_vertex_attrib_array(index);
            if channel.divisor > 0 {
                device.vertex_attrib_divisor(index, channel.divisor);
            }
        }
        mesh.set_vertex_count(vertex_count);

        if let Some(indices) = self.indices {
            let buffer = BufferHandle::create(device)?;
            // Element binding is recorded in the vertex array; keep it bound.
            device.bind_buffer(BufferTarget::ElementArray, buffer.id());
            device.buffer_data(
                BufferTarget::ElementArray,
                bytemuck::cast_slice(indices),
                BufferUsage::Static,
            );
            mesh.attach_index_buffer(buffer, indices.len() as u32);
        }

        if let Some(layout) = self.instance {
            let buffer = BufferHandle::create(device)?;
            device.bind_buffer(BufferTarget::Array, buffer.id());
            device.buffer_storage(
                BufferTarget::Array,
                layout.capacity as usize * layout.stride() as usize,
                BufferUsage::Dynamic,
            );
            for (attribute, components, offset) in layout.sub_attributes() {
                device.vertex_attrib_pointer(attribute, components, layout.stride(), offset);
                device.enable_vertex_attrib_array(attribute);
                device.vertex_attrib_divisor(attribute, 1);
            }
            mesh.attach_instance_buffer(InstanceBuffer::new(buffer, layout));
        }

        device.bind_vertex_array(None);
        device.bind_buffer(BufferTarget::Array, None);
        device.bind_buffer(BufferTarget::ElementArray, None);
        Ok(())
    }
}
