//! # Frame Pool
//!
//! Ring-allocated scratch storage that lives for exactly one frame.

use std::fmt;

use crate::math::{Mat4, Vec4};

/// Number of 4x4 matrices available per frame.
pub const MATRIX_POOL_SIZE: usize = 32;
/// Number of 4-vectors available per frame.
pub const VECTOR_POOL_SIZE: usize = 16;
/// Number of variable-length scratch arrays available per frame.
pub const ARRAY_POOL_SIZE: usize = 8;

/// A ring above this fraction (4/5) of its capacity counts as near full.
const NEAR_FULL_NUMERATOR: usize = 4;
const NEAR_FULL_DENOMINATOR: usize = 5;

/// Per-frame scratch memory for matrices, vectors and float arrays.
///
/// Three independent rings hand out slots by bumping a cursor. `reset()`
/// rewinds every cursor to zero at the start of a frame; backing storage is
/// never freed. When a ring runs out within one frame the cursor wraps to
/// slot 0 and the oldest slot is reused, so a scene that needs more scratch
/// storage than the ring holds will see its earliest matrices overwritten.
/// Watch [`FramePool::is_near_full`] during development to catch that.
///
/// Every slot is handed out as a mutable borrow of the pool, so nothing
/// obtained in frame N can still be held when `reset()` starts frame N+1.
///
/// # Thread Safety
///
/// Owned by the render thread. Not shared.
///
/// # Example
///
/// ```rust
/// use glimmer_core::FramePool;
///
/// let mut pool = FramePool::new();
/// pool.reset();
///
/// let scratch = pool.obtain_array(12);
/// scratch.fill(1.0);
/// assert_eq!(scratch.len(), 12);
/// ```
pub struct FramePool {
    /// Matrix ring.
    matrices: [Mat4; MATRIX_POOL_SIZE],
    /// Next matrix slot.
    matrix_cursor: usize,
    /// Vector ring.
    vectors: [Vec4; VECTOR_POOL_SIZE],
    /// Next vector slot.
    vector_cursor: usize,
    /// Scratch array slots, grown on demand and kept.
    arrays: [Vec<f32>; ARRAY_POOL_SIZE],
    /// Next array slot.
    array_cursor: usize,
    /// Wrap-arounds since the last reset, across all rings.
    wraps: u32,
    /// Number of resets performed.
    frame: u64,
}

/// Snapshot of pool usage for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Matrices handed out this frame (cursor position).
    pub matrices_used: usize,
    /// Vectors handed out this frame (cursor position).
    pub vectors_used: usize,
    /// Arrays handed out this frame (cursor position).
    pub arrays_used: usize,
    /// Ring wrap-arounds since the last reset.
    pub wraps: u32,
    /// Frames started so far.
    pub frame: u64,
}

impl fmt::Display for PoolStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "matrices {}/{} | vectors {}/{} | arrays {}/{}",
            self.matrices_used,
            MATRIX_POOL_SIZE,
            self.vectors_used,
            VECTOR_POOL_SIZE,
            self.arrays_used,
            ARRAY_POOL_SIZE,
        )?;
        if self.wraps > 0 {
            write!(f, " | wrapped {}x", self.wraps)?;
        }
        Ok(())
    }
}

impl FramePool {
    /// Creates a pool with every matrix and vector slot zeroed.
    ///
    /// Scratch arrays start empty and grow the first time a slot is asked
    /// for more floats than it holds.
    #[must_use]
    pub fn new() -> Self {
        Self {
            matrices: [[0.0; 16]; MATRIX_POOL_SIZE],
            matrix_cursor: 0,
            vectors: [[0.0; 4]; VECTOR_POOL_SIZE],
            vector_cursor: 0,
            arrays: Default::default(),
            array_cursor: 0,
            wraps: 0,
            frame: 0,
        }
    }

    /// Starts a new frame by rewinding every cursor to zero.
    ///
    /// This is a **zero-cost** operation - no memory is freed or reallocated.
    #[inline]
    pub fn reset(&mut self) {
        self.matrix_cursor = 0;
        self.vector_cursor = 0;
        self.array_cursor = 0;
        self.wraps = 0;
        self.frame += 1;
    }

    /// Returns the next 4x4 matrix slot.
    ///
    /// Contents are whatever the previous user of the slot left behind.
    #[inline]
    pub fn obtain_matrix(&mut self) -> &mut Mat4 {
        if self.matrix_cursor >= MATRIX_POOL_SIZE {
            self.matrix_cursor = 0;
            self.note_wrap("matrix");
        }
        let slot = self.matrix_cursor;
        self.matrix_cursor += 1;
        &mut self.matrices[slot]
    }

    /// Returns two distinct matrix slots at once, typically `model` and `mvp`.
    ///
    /// If only one slot is left before the end of the ring, both are taken
    /// from the start of the ring instead.
    pub fn obtain_matrix_pair(&mut self) -> (&mut Mat4, &mut Mat4) {
        if self.matrix_cursor + 2 > MATRIX_POOL_SIZE {
            self.matrix_cursor = 0;
            self.note_wrap("matrix");
        }
        let start = self.matrix_cursor;
        self.matrix_cursor += 2;
        let (first, second) = self.matrices[start..start + 2].split_at_mut(1);
        (&mut first[0], &mut second[0])
    }

    /// Returns the next 4-vector slot.
    #[inline]
    pub fn obtain_vector(&mut self) -> &mut Vec4 {
        if self.vector_cursor >= VECTOR_POOL_SIZE {
            self.vector_cursor = 0;
            self.note_wrap("vector");
        }
        let slot = self.vector_cursor;
        self.vector_cursor += 1;
        &mut self.vectors[slot]
    }

    /// Returns a scratch array of exactly `size` floats.
    ///
    /// The slot's backing storage only grows the first time a larger size is
    /// requested for it; after warm-up this never allocates.
    pub fn obtain_array(&mut self, size: usize) -> &mut [f32] {
        if self.array_cursor >= ARRAY_POOL_SIZE {
            self.array_cursor = 0;
            self.note_wrap("array");
        }
        let slot = &mut self.arrays[self.array_cursor];
        self.array_cursor += 1;
        if slot.len() < size {
            slot.resize(size, 0.0);
        }
        &mut slot[..size]
    }

    /// Returns true if the matrix or vector ring is more than 80% used this
    /// frame.
    ///
    /// The array ring is not counted: its few slots are routinely all in use,
    /// and its cursor shows up in [`FramePool::stats`] instead.
    #[must_use]
    pub fn is_near_full(&self) -> bool {
        near_full(self.matrix_cursor, MATRIX_POOL_SIZE)
            || near_full(self.vector_cursor, VECTOR_POOL_SIZE)
    }

    /// Returns usage statistics for the current frame.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            matrices_used: self.matrix_cursor,
            vectors_used: self.vector_cursor,
            arrays_used: self.array_cursor,
            wraps: self.wraps,
            frame: self.frame,
        }
    }

    /// Returns the total floats retained by the scratch array slots.
    #[must_use]
    pub fn retained_array_floats(&self) -> usize {
        self.arrays.iter().map(Vec::capacity).sum()
    }

    fn note_wrap(&mut self, ring: &'static str) {
        self.wraps += 1;
        // Release builds keep the silent wrap; debug builds say so once per frame.
        if cfg!(debug_assertions) && self.wraps == 1 {
            tracing::warn!(
                ring,
                frame = self.frame,
                "frame pool ring exhausted, wrapping to slot 0"
            );
        }
    }
}

impl Default for FramePool {
    fn default() -> Self {
        Self::new()
    }
}

#[inline]
const fn near_full(cursor: usize, capacity: usize) -> bool {
    cursor * NEAR_FULL_DENOMINATOR > capacity * NEAR_FULL_NUMERATOR
}
