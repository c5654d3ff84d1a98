//! GPU object ownership.

mod handle;

pub use handle::{
    BufferHandle, BufferObject, GpuHandle, HandleKind, ProgramHandle, ProgramObject,
    VertexArrayHandle, VertexArrayObject,
};
