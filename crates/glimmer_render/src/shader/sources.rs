//! Built-in GLSL ES 3.00 shaders.
//!
//! The particle pair matches [`primitives::particle_billboard`]
//! (and [`primitives::particle_quad`]):
//!
//! | location | attribute          | rate         |
//! |----------|--------------------|--------------|
//! | 0        | `a_Position` vec3  | per vertex   |
//! | 1        | `a_TexCoord` vec2  | per vertex   |
//! | 2        | `a_InstancePos` vec3   | per instance |
//! | 3        | `a_InstanceColor` vec4 | per instance |
//! | 4        | `a_InstanceSize` float | per instance |
//!
//! Uniforms: `u_VP` (mat4), `u_Time` (float, seconds).
//!
//! [`primitives::particle_billboard`]: crate::mesh::primitives::particle_billboard
//! [`primitives::particle_quad`]: crate::mesh::primitives::particle_quad

/// View-projection uniform name.
pub const UNIFORM_VIEW_PROJECTION: &str = "u_VP";
/// Time uniform name.
pub const UNIFORM_TIME: &str = "u_Time";

/// Instanced particle vertex shader.
pub const PARTICLE_VERTEX: &str = r"#version 300 es
precision highp float;

layout(location = 0) in vec3 a_Position;
layout(location = 1) in vec2 a_TexCoord;
layout(location = 2) in vec3 a_InstancePos;
layout(location = 3) in vec4 a_InstanceColor;
layout(location = 4) in float a_InstanceSize;

uniform mat4 u_VP;
uniform float u_Time;

out vec2 v_TexCoord;
out vec4 v_Color;

void main() {
    // slight per-particle shimmer
    float shimmer = 1.0 + 0.08 * sin(u_Time * 7.0 + a_InstancePos.x * 13.0 + a_InstancePos.z * 5.0);
    vec3 world = a_InstancePos + a_Position * (a_InstanceSize * shimmer);
    gl_Position = u_VP * vec4(world, 1.0);
    v_TexCoord = a_TexCoord;
    v_Color = a_InstanceColor;
}
";

/// Soft round particle fragment shader.
pub const PARTICLE_FRAGMENT: &str = r"#version 300 es
precision mediump float;

in vec2 v_TexCoord;
in vec4 v_Color;

out vec4 fragColor;

void main() {
    float dist = length(v_TexCoord - vec2(0.5)) * 2.0;
    float glow = 1.0 - smoothstep(0.0, 1.0, dist);
    if (glow < 0.01) {
        discard;
    }
    fragColor = vec4(v_Color.rgb, v_Color.a * glow * glow);
}
";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sources_declare_expected_interface() {
        assert!(PARTICLE_VERTEX.starts_with("#version 300 es"));
        assert!(PARTICLE_FRAGMENT.starts_with("#version 300 es"));
        assert!(PARTICLE_VERTEX.contains(&format!("uniform mat4 {UNIFORM_VIEW_PROJECTION};")));
        assert!(PARTICLE_VERTEX.contains(&format!("uniform float {UNIFORM_TIME};")));
        assert!(PARTICLE_VERTEX.contains("layout(location = 4) in float a_InstanceSize;"));
    }
}
