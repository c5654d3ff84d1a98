//! Particle blend modes.
//!
//! Additive suits glowing effects (fire, sparks, magic): the sum is order
//! independent, so no sorting is needed. Alpha blending suits particles that
//! block light (smoke, ash); dark particles are invisible under additive.

use serde::{Deserialize, Serialize};

use crate::backend::BlendFactor;

/// Blend state restored after every particle pass.
pub const STANDARD_BLEND: (BlendFactor, BlendFactor) =
    (BlendFactor::SrcAlpha, BlendFactor::OneMinusSrcAlpha);

/// How particle fragments combine with the framebuffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticleBlendMode {
    /// `src * src.a + dst`: glow, no sorting.
    #[default]
    Additive,
    /// `src * src.a + dst * (1 - src.a)`: occluding particles.
    AlphaBlend,
}

impl ParticleBlendMode {
    /// Source and destination factors for this mode.
    #[must_use]
    pub const fn factors(self) -> (BlendFactor, BlendFactor) {
        match self {
            Self::Additive => (BlendFactor::SrcAlpha, BlendFactor::One),
            Self::AlphaBlend => STANDARD_BLEND,
        }
    }
}
