//! # Owning GPU Handles
//!
//! A [`GpuHandle`] is the single owner of one GPU object. It is not `Clone`,
//! so exactly one resource can release it, and [`GpuHandle::release`] is the
//! only path that frees it. After release the handle stays queryable:
//! [`GpuHandle::raw`] reports `0` and further releases do nothing.
//!
//! Handles never free on `Drop` (there is no device to call). A live handle
//! dropped in a debug build logs a leak warning.

use std::fmt;
use std::marker::PhantomData;

use tracing::{debug, warn};

use crate::backend::{GraphicsDevice, ObjectKind, RawId};
use crate::error::RenderResult;

mod sealed {
    pub trait Sealed {}
}

/// A kind of GPU object that can be owned by a [`GpuHandle`].
pub trait HandleKind: sealed::Sealed {
    /// Kind reported in diagnostics.
    const KIND: ObjectKind;

    /// Deletes `id` through the device call for this kind.
    fn delete<D: GraphicsDevice + ?Sized>(device: &mut D, id: RawId);
}

/// Marker for buffer objects.
#[derive(Debug)]
pub enum BufferObject {}
/// Marker for vertex array objects.
#[derive(Debug)]
pub enum VertexArrayObject {}
/// Marker for linked programs.
#[derive(Debug)]
pub enum ProgramObject {}

impl sealed::Sealed for BufferObject {}
impl sealed::Sealed for VertexArrayObject {}
impl sealed::Sealed for ProgramObject {}

impl HandleKind for BufferObject {
    const KIND: ObjectKind = ObjectKind::Buffer;

    fn delete<D: GraphicsDevice + ?Sized>(device: &mut D, id: RawId) {
        device.delete_buffer(id);
    }
}

impl HandleKind for VertexArrayObject {
    const KIND: ObjectKind = ObjectKind::VertexArray;

    fn delete<D: GraphicsDevice + ?Sized>(device: &mut D, id: RawId) {
        device.delete_vertex_array(id);
    }
}

impl HandleKind for ProgramObject {
    const KIND: ObjectKind = ObjectKind::Program;

    fn delete<D: GraphicsDevice + ?Sized>(device: &mut D, id: RawId) {
        device.delete_program(id);
    }
}

/// Owned buffer object.
pub type BufferHandle = GpuHandle<BufferObject>;
/// Owned vertex array object.
pub type VertexArrayHandle = GpuHandle<VertexArrayObject>;
/// Owned program.
pub type ProgramHandle = GpuHandle<ProgramObject>;

/// Exclusive owner of one GPU object of kind `K`.
pub struct GpuHandle<K: HandleKind> {
    id: Option<RawId>,
    _kind: PhantomData<K>,
}

impl<K: HandleKind> GpuHandle<K> {
    /// Takes ownership of an id the device just created.
    #[must_use]
    pub const fn from_raw(id: RawId) -> Self {
        Self {
            id: Some(id),
            _kind: PhantomData,
        }
    }

    /// Raw id, or `0` once released.
    #[inline]
    #[must_use]
    pub fn raw(&self) -> u32 {
        self.id.map_or(0, RawId::get)
    }

    /// The live id, if any.
    #[inline]
    #[must_use]
    pub const fn id(&self) -> Option<RawId> {
        self.id
    }

    /// Whether the object has not been released yet.
    #[inline]
    #[must_use]
    pub const fn is_live(&self) -> bool {
        self.id.is_some()
    }

    /// Deletes the object. Later calls are no-ops.
    pub fn release<D: GraphicsDevice + ?Sized>(&mut self, device: &mut D) {
        if let Some(id) = self.id.take() {
            debug!("releasing {:?} {}", K::KIND, id);
            K::delete(device, id);
        }
    }
}

impl GpuHandle<BufferObject> {
    /// Creates a new buffer object.
    ///
    /// # Errors
    ///
    /// Returns the device's allocation error.
    pub fn create<D: GraphicsDevice + ?Sized>(device: &mut D) -> RenderResult<Self> {
        device.create_buffer().map(Self::from_raw)
    }
}

impl GpuHandle<VertexArrayObject> {
    /// Creates a new vertex array object.
    ///
    /// # Errors
    ///
    /// Returns the device's allocation error.
    pub fn create<D: GraphicsDevice + ?Sized>(device: &mut D) -> RenderResult<Self> {
        device.create_vertex_array().map(Self::from_raw)
    }
}

impl<K: HandleKind> fmt::Debug for GpuHandle<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.id {
            Some(id) => write!(f, "{:?}({})", K::KIND, id),
            None => write!(f, "{:?}(released)", K::KIND),
        }
    }
}

impl<K: HandleKind> Drop for GpuHandle<K> {
    fn drop(&mut self) {
        if cfg!(debug_assertions) {
            if let Some(id) = self.id {
                warn!("{:?} {} dropped without release; GPU object leaked", K::KIND, id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{DeviceCall, RecordingDevice};

    #[test]
    fn test_release_deletes_once() {
        let mut device = RecordingDevice::new();
        let mut handle = BufferHandle::create(&mut device).unwrap();
        let id = handle.id().unwrap();
        assert!(handle.is_live());
        assert_eq!(handle.raw(), id.get());

        handle.release(&mut device);
        handle.release(&mut device);

        assert!(!handle.is_live());
        assert_eq!(handle.raw(), 0);
        assert_eq!(
            device
                .calls()
                .iter()
                .filter(|c| matches!(c, DeviceCall::DeleteBuffer(_)))
                .count(),
            1
        );
        assert_eq!(device.invalid_operations(), 0);
        assert_eq!(device.total_live_objects(), 0);
    }

    #[test]
    fn test_release_uses_kind_delete() {
        let mut device = RecordingDevice::new();
        let mut vao = VertexArrayHandle::create(&mut device).unwrap();
        vao.release(&mut device);
        assert!(matches!(device.calls().last(), Some(DeviceCall::DeleteVertexArray(_))));
    }

    #[test]
    fn test_create_failure_propagates() {
        let mut device = RecordingDevice::new();
        device.fail_allocations(ObjectKind::Buffer);
        assert!(BufferHandle::create(&mut device).is_err());
    }

    #[test]
    fn test_debug_shows_state() {
        let mut device = RecordingDevice::new();
        let mut handle = BufferHandle::create(&mut device).unwrap();
        assert_eq!(format!("{handle:?}"), "Buffer(1)");
        handle.release(&mut device);
        assert_eq!(format!("{handle:?}"), "Buffer(released)");
    }
}
