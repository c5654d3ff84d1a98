//! # Meshes
//!
//! [`MeshBuilder`] declares vertex channels, optional 16-bit indices and an
//! optional dynamic instance buffer, then creates everything in one
//! [`MeshBuilder::build`]. The resulting [`MeshResource`] keeps static
//! geometry and per-frame instance data in separate buffers with separate
//! usage hints, so updating thousands of instances never touches the base
//! geometry.
//!
//! Per frame:
//!
//! ```text
//! mesh.update_instance_buffer(dev, &records, 8)   // sub-range upload
//! mesh.bind(dev)
//! mesh.draw_instanced(dev, mesh.instance_count())
//! mesh.unbind(dev)
//! ```

mod builder;
pub mod primitives;
mod resource;

pub use builder::{InstanceLayout, MeshBuilder, INSTANCE_SCHEME};
pub use resource::MeshResource;
