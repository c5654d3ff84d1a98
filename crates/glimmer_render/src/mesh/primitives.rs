//! Prefab meshes.
//!
//! Particle prefabs declare an 8-float instance record
//! (position 3, color 4, size 1) matching
//! [`ParticleInstance`](crate::effects::ParticleInstance).

use super::{MeshBuilder, MeshResource};
use crate::backend::{GraphicsDevice, PrimitiveKind};

/// Floats per particle instance record.
pub const PARTICLE_FLOATS: u32 = 8;

const QUAD_UVS: [f32; 8] = [0.0, 0.0, 1.0, 0.0, 1.0, 1.0, 0.0, 1.0];
const QUAD_INDICES: [u16; 6] = [0, 1, 2, 0, 2, 3];

/// NDC quad covering the screen: positions at attribute 0, UVs at 1.
pub fn fullscreen_quad<D: GraphicsDevice + ?Sized>(device: &mut D) -> MeshResource {
    const POSITIONS: [f32; 12] = [
        -1.0, -1.0, 0.0, //
        1.0, -1.0, 0.0, //
        1.0, 1.0, 0.0, //
        -1.0, 1.0, 0.0, //
    ];
    MeshBuilder::new()
        .add_vertex_buffer(&POSITIONS, 3)
        .add_vertex_buffer(&QUAD_UVS, 2)
        .set_index_buffer(&QUAD_INDICES)
        .build(device)
}

/// A single point drawn once per particle; instance record at attribute 1.
pub fn particle_point<D: GraphicsDevice + ?Sized>(
    device: &mut D,
    max_particles: u32,
) -> MeshResource {
    MeshBuilder::new()
        .add_vertex_buffer(&[0.0, 0.0, 0.0], 3)
        .set_draw_mode(PrimitiveKind::Points)
        .set_instance_buffer(max_particles, PARTICLE_FLOATS, 1)
        .build(device)
}

/// Indexed unit quad centred on the origin with UVs; instance record at attribute 2.
pub fn particle_quad<D: GraphicsDevice + ?Sized>(
    device: &mut D,
    max_particles: u32,
) -> MeshResource {
    const POSITIONS: [f32; 12] = [
        -0.5, -0.5, 0.0, //
        0.5, -0.5, 0.0, //
        0.5, 0.5, 0.0, //
        -0.5, 0.5, 0.0, //
    ];
    MeshBuilder::new()
        .add_vertex_buffer(&POSITIONS, 3)
        .add_vertex_buffer(&QUAD_UVS, 2)
        .set_index_buffer(&QUAD_INDICES)
        .set_instance_buffer(max_particles, PARTICLE_FLOATS, 2)
        .build(device)
}

/// Non-indexed unit quad as two triangles (6 vertices); instance record at attribute 2.
///
/// This is the geometry [`ParticleSystem`](crate::effects::ParticleSystem) draws.
pub fn particle_billboard<D: GraphicsDevice + ?Sized>(
    device: &mut D,
    max_particles: u32,
) -> MeshResource {
    const POSITIONS: [f32; 18] = [
        -0.5, -0.5, 0.0, //
        0.5, -0.5, 0.0, //
        0.5, 0.5, 0.0, //
        -0.5, -0.5, 0.0, //
        0.5, 0.5, 0.0, //
        -0.5, 0.5, 0.0, //
    ];
    const UVS: [f32; 12] = [
        0.0, 0.0, 1.0, 0.0, 1.0, 1.0, //
        0.0, 0.0, 1.0, 1.0, 0.0, 1.0, //
    ];
    MeshBuilder::new()
        .add_vertex_buffer(&POSITIONS, 3)
        .add_vertex_buffer(&UVS, 2)
        .set_instance_buffer(max_particles, PARTICLE_FLOATS, 2)
        .build(device)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::RecordingDevice;

    #[test]
    fn test_fullscreen_quad() {
        let mut device = RecordingDevice::new();
        let mut mesh = fullscreen_quad(&mut device);
        assert!(mesh.is_valid());
        assert_eq!(mesh.vertex_count(), 4);
        assert_eq!(mesh.index_count(), 6);
        assert!(!mesh.has_instance_buffer());
        mesh.dispose(&mut device);
    }

    #[test]
    fn test_particle_point() {
        let mut device = RecordingDevice::new();
        let mut mesh = particle_point(&mut device, 500);
        assert_eq!(mesh.primitive(), PrimitiveKind::Points);
        assert_eq!(mesh.vertex_count(), 1);
        assert_eq!(mesh.instance_capacity(), 500);
        assert_eq!(mesh.floats_per_instance(), 8);
        mesh.dispose(&mut device);
    }

    #[test]
    fn test_particle_quad_and_billboard() {
        let mut device = RecordingDevice::new();
        let mut quad = particle_quad(&mut device, 64);
        let mut billboard = particle_billboard(&mut device, 64);

        assert!(quad.has_indices());
        assert_eq!(quad.vertex_count(), 4);
        assert!(!billboard.has_indices());
        assert_eq!(billboard.vertex_count(), 6);
        assert_eq!(billboard.instance_capacity(), 64);

        quad.dispose(&mut device);
        billboard.dispose(&mut device);
        assert_eq!(device.total_live_objects(), 0);
    }
}
