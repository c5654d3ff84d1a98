//! Emitter configuration.
//!
//! Authored as TOML; every field is optional and falls back to the default
//! golden-ember look:
//!
//! ```toml
//! emission_rate = 120.0
//! position = [0.0, -1.0, 0.0]
//! velocity_min = [-0.2, 1.0, -0.2]
//! velocity_max = [0.2, 3.0, 0.2]
//! color = [0.4, 0.8, 1.0, 1.0]
//! blend_mode = "additive"
//! ```

use serde::{Deserialize, Serialize};

use super::blend::ParticleBlendMode;
use crate::error::{RenderError, RenderResult};

/// Spawn and simulation parameters for one [`ParticleSystem`](super::ParticleSystem).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EmitterConfig {
    /// Particles per second.
    pub emission_rate: f32,
    /// Emitter position in world space.
    pub position: [f32; 3],
    /// Per-axis minimum initial velocity.
    pub velocity_min: [f32; 3],
    /// Per-axis maximum initial velocity.
    pub velocity_max: [f32; 3],
    /// Smallest particle size.
    pub size_min: f32,
    /// Largest particle size.
    pub size_max: f32,
    /// Shortest lifetime in seconds.
    pub lifetime_min: f32,
    /// Longest lifetime in seconds.
    pub lifetime_max: f32,
    /// Base RGBA color. Alpha is the starting opacity of the fade.
    pub color: [f32; 4],
    /// Downward acceleration applied to velocity.y.
    pub gravity: f32,
    /// Spawn offset range around the emitter, per axis (±).
    pub position_jitter: f32,
    /// Relative per-channel RGB variation (±).
    pub color_jitter: f32,
    /// Blend mode for the draw pass.
    pub blend_mode: ParticleBlendMode,
}

impl Default for EmitterConfig {
    fn default() -> Self {
        Self {
            emission_rate: 50.0,
            position: [0.0; 3],
            velocity_min: [-0.5, 0.5, -0.5],
            velocity_max: [0.5, 2.0, 0.5],
            size_min: 0.05,
            size_max: 0.15,
            lifetime_min: 1.0,
            lifetime_max: 3.0,
            color: [1.0, 0.8, 0.3, 1.0],
            gravity: 0.5,
            position_jitter: 0.1,
            color_jitter: 0.2,
            blend_mode: ParticleBlendMode::Additive,
        }
    }
}

impl EmitterConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// [`RenderError::ConfigParse`] for malformed TOML or unknown keys,
    /// [`RenderError::InvalidConfig`] for unusable values.
    pub fn from_toml_str(text: &str) -> RenderResult<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that every value is usable.
    ///
    /// # Errors
    ///
    /// [`RenderError::InvalidConfig`] naming the first offending field.
    pub fn validate(&self) -> RenderResult<()> {
        let scalars = [
            ("emission_rate", self.emission_rate),
            ("size_min", self.size_min),
            ("size_max", self.size_max),
            ("lifetime_min", self.lifetime_min),
            ("lifetime_max", self.lifetime_max),
            ("gravity", self.gravity),
            ("position_jitter", self.position_jitter),
            ("color_jitter", self.color_jitter),
        ];
        for (name, value) in scalars {
            if !value.is_finite() {
                return Err(invalid(format!("{name} is not finite")));
            }
        }
        if self
            .position
            .iter()
            .chain(&self.velocity_min)
            .chain(&self.velocity_max)
            .chain(&self.color)
            .any(|v| !v.is_finite())
        {
            return Err(invalid("vector component is not finite".into()));
        }

        if self.emission_rate < 0.0 {
            return Err(invalid("emission_rate is negative".into()));
        }
        if self.lifetime_min <= 0.0 {
            return Err(invalid("lifetime_min must be positive".into()));
        }
        if self.size_min < 0.0 {
            return Err(invalid("size_min is negative".into()));
        }
        if self.position_jitter < 0.0 || self.color_jitter < 0.0 {
            return Err(invalid("jitter is negative".into()));
        }
        if self.size_min > self.size_max {
            return Err(invalid("size_min exceeds size_max".into()));
        }
        if self.lifetime_min > self.lifetime_max {
            return Err(invalid("lifetime_min exceeds lifetime_max".into()));
        }
        for axis in 0..3 {
            if self.velocity_min[axis] > self.velocity_max[axis] {
                return Err(invalid(format!(
                    "velocity_min[{axis}] exceeds velocity_max[{axis}]"
                )));
            }
        }
        Ok(())
    }
}

fn invalid(reason: String) -> RenderError {
    RenderError::InvalidConfig(reason)
}
