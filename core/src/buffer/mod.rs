//! CPU-side byte buffers used as mirrors of GPU memory.
//!
//! A [`FlatBuffer`] is a plain byte array of fixed size. A [`DirtyFlatBuffer`]
//! wraps one and records every written range as a [`DirtyRegion`], so callers
//! can upload only the bytes that changed since the last flush.
//!
//! # Example
//!
//! ```ignore
//! use uniforge_core::buffer::DirtyFlatBuffer;
//!
//! let mut mirror = DirtyFlatBuffer::new(32);
//! mirror.set(0, &1.0f32)?;
//! mirror.set(4, &2.0f32)?;
//! mirror.merge_consecutive_dirty_regions();
//!
//! for region in mirror.dirty_regions() {
//!     queue.write(region.offset, mirror.region_bytes(region)?);
//! }
//! mirror.clear_dirty_regions();
//! ```

mod dirty;
mod flat;

pub use dirty::{DirtyFlatBuffer, DirtyRegion};
pub use flat::FlatBuffer;

/// Errors produced by buffer accesses.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BufferError {
    /// The requested byte range does not fit inside the buffer.
    #[error("byte range {offset}..{offset}+{len} is out of bounds for a buffer of {capacity} bytes")]
    OutOfBounds {
        offset: usize,
        len: usize,
        capacity: usize,
    },
}
