//! Column-major 4x4 matrix helpers.
//!
//! Matrices use the OpenGL memory layout: element `(row, col)` lives at
//! index `col * 4 + row`, translation sits in indices 12..15. Every function
//! writes into caller-provided storage (usually slots from a
//! [`FramePool`](crate::FramePool)) so transformation math never allocates.

/// A 4x4 column-major matrix.
pub type Mat4 = [f32; 16];
/// A 4-component vector.
pub type Vec4 = [f32; 4];

/// The identity matrix.
pub const IDENTITY: Mat4 = [
    1.0, 0.0, 0.0, 0.0, //
    0.0, 1.0, 0.0, 0.0, //
    0.0, 0.0, 1.0, 0.0, //
    0.0, 0.0, 0.0, 1.0, //
];

/// Overwrites `m` with the identity matrix.
#[inline]
pub fn set_identity(m: &mut Mat4) {
    *m = IDENTITY;
}

/// Writes `lhs * rhs` into `out`.
pub fn multiply(out: &mut Mat4, lhs: &Mat4, rhs: &Mat4) {
    for col in 0..4 {
        for row in 0..4 {
            let mut sum = 0.0;
            for k in 0..4 {
                sum += lhs[k * 4 + row] * rhs[col * 4 + k];
            }
            out[col * 4 + row] = sum;
        }
    }
}

/// Writes `m * v` into `out`.
pub fn transform(out: &mut Vec4, m: &Mat4, v: &Vec4) {
    for (row, value) in out.iter_mut().enumerate() {
        *value = m[row] * v[0] + m[4 + row] * v[1] + m[8 + row] * v[2] + m[12 + row] * v[3];
    }
}

/// Post-multiplies `m` by a translation.
pub fn translate(m: &mut Mat4, x: f32, y: f32, z: f32) {
    for i in 0..4 {
        m[12 + i] += m[i] * x + m[4 + i] * y + m[8 + i] * z;
    }
}

/// Post-multiplies `m` by a non-uniform scale.
pub fn scale(m: &mut Mat4, x: f32, y: f32, z: f32) {
    for i in 0..4 {
        m[i] *= x;
        m[4 + i] *= y;
        m[8 + i] *= z;
    }
}

/// Post-multiplies `m` by a rotation of `degrees` around the axis `(x, y, z)`.
///
/// A zero-length axis leaves `m` unchanged.
pub fn rotate(m: &mut Mat4, degrees: f32, x: f32, y: f32, z: f32) {
    let len = (x * x + y * y + z * z).sqrt();
    if len <= f32::EPSILON {
        return;
    }
    let (x, y, z) = (x / len, y / len, z / len);
    let (s, c) = degrees.to_radians().sin_cos();
    let nc = 1.0 - c;

    let r: Mat4 = [
        x * x * nc + c,
        y * x * nc + z * s,
        x * z * nc - y * s,
        0.0,
        x * y * nc - z * s,
        y * y * nc + c,
        y * z * nc + x * s,
        0.0,
        x * z * nc + y * s,
        y * z * nc - x * s,
        z * z * nc + c,
        0.0,
        0.0,
        0.0,
        0.0,
        1.0,
    ];
    let lhs = *m;
    multiply(m, &lhs, &r);
}

/// Overwrites `m` with a right-handed perspective projection.
pub fn perspective(m: &mut Mat4, fovy_degrees: f32, aspect: f32, near: f32, far: f32) {
    let f = 1.0 / (fovy_degrees.to_radians() * 0.5).tan();
    let range = 1.0 / (near - far);

    *m = [0.0; 16];
    m[0] = f / aspect;
    m[5] = f;
    m[10] = (far + near) * range;
    m[11] = -1.0;
    m[14] = 2.0 * far * near * range;
}

/// Overwrites `m` with an orthographic projection.
pub fn orthographic(
    m: &mut Mat4,
    left: f32,
    right: f32,
    bottom: f32,
    top: f32,
    near: f32,
    far: f32,
) {
    let rl = 1.0 / (right - left);
    let tb = 1.0 / (top - bottom);
    let fnr = 1.0 / (far - near);

    *m = IDENTITY;
    m[0] = 2.0 * rl;
    m[5] = 2.0 * tb;
    m[10] = -2.0 * fnr;
    m[12] = -(right + left) * rl;
    m[13] = -(top + bottom) * tb;
    m[14] = -(far + near) * fnr;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-5
    }

    #[test]
    fn test_identity_multiply() {
        let mut m = IDENTITY;
        translate(&mut m, 1.0, 2.0, 3.0);

        let mut out = [0.0; 16];
        multiply(&mut out, &IDENTITY, &m);
        assert_eq!(out, m);
    }

    #[test]
    fn test_translate_moves_point() {
        let mut m = IDENTITY;
        translate(&mut m, 1.0, 2.0, 3.0);

        let mut out = [0.0; 4];
        transform(&mut out, &m, &[1.0, 1.0, 1.0, 1.0]);
        assert_eq!(out, [2.0, 3.0, 4.0, 1.0]);
    }

    #[test]
    fn test_scale_then_translate_order() {
        // m = S * T: the translation is scaled too.
        let mut m = IDENTITY;
        scale(&mut m, 2.0, 2.0, 2.0);
        translate(&mut m, 1.0, 0.0, 0.0);

        let mut out = [0.0; 4];
        transform(&mut out, &m, &[0.0, 0.0, 0.0, 1.0]);
        assert_eq!(out, [2.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_rotate_quarter_turn_z() {
        let mut m = IDENTITY;
        rotate(&mut m, 90.0, 0.0, 0.0, 1.0);

        let mut out = [0.0; 4];
        transform(&mut out, &m, &[1.0, 0.0, 0.0, 1.0]);
        assert!(approx(out[0], 0.0));
        assert!(approx(out[1], 1.0));
    }

    #[test]
    fn test_rotate_zero_axis_is_noop() {
        let mut m = IDENTITY;
        rotate(&mut m, 45.0, 0.0, 0.0, 0.0);
        assert_eq!(m, IDENTITY);
    }

    #[test]
    fn test_perspective_maps_near_plane() {
        let mut m = [0.0; 16];
        perspective(&mut m, 90.0, 1.0, 1.0, 10.0);

        let mut out = [0.0; 4];
        transform(&mut out, &m, &[0.0, 0.0, -1.0, 1.0]);
        assert!(approx(out[2] / out[3], -1.0));
    }

    #[test]
    fn test_orthographic_maps_corners() {
        let mut m = [0.0; 16];
        orthographic(&mut m, 0.0, 100.0, 0.0, 50.0, -1.0, 1.0);

        let mut out = [0.0; 4];
        transform(&mut out, &m, &[100.0, 50.0, 0.0, 1.0]);
        assert!(approx(out[0], 1.0));
        assert!(approx(out[1], 1.0));
    }
}
