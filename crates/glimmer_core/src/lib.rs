//! # GLIMMER Core
//!
//! Backend-independent primitives for the GLIMMER particle renderer:
//! - Frame-scoped scratch memory that is rewound, never freed, each frame
//! - Column-major 4x4 matrix helpers that write into caller-provided storage
//!
//! ## Architecture Rules
//!
//! 1. **No heap allocations in the frame loop** - scratch storage is warmed once
//! 2. **Single render thread** - nothing here is `Sync`, nothing locks
//! 3. **Frame-scoped borrows** - pooled storage cannot outlive `reset()`
//!
//! ## Example
//!
//! ```rust
//! use glimmer_core::{math, FramePool};
//!
//! let mut pool = FramePool::new();
//!
//! // Start of every frame
//! pool.reset();
//!
//! let (model, mvp) = pool.obtain_matrix_pair();
//! math::set_identity(model);
//! math::translate(model, 0.0, 1.0, 0.0);
//! math::multiply(mvp, &math::IDENTITY, model);
//! assert_eq!(mvp[13], 1.0);
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod math;
pub mod memory;

pub use math::{Mat4, Vec4};
pub use memory::{FramePool, PoolStats};
