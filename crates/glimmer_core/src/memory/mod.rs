//! # Memory Management
//!
//! Frame-scoped scratch memory for transformation math and temporary vertex
//! data.
//!
//! ## Design Philosophy
//!
//! Scratch storage is allocated once and reused every frame:
//! - `reset()` rewinds cursors, it never frees
//! - Exhausting a ring wraps to slot 0 instead of growing
//! - Everything handed out borrows the pool, so it cannot survive a `reset()`

mod frame_pool;

pub use frame_pool::{
    FramePool, PoolStats, ARRAY_POOL_SIZE, MATRIX_POOL_SIZE, VECTOR_POOL_SIZE,
};
