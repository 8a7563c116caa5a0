//! Dirty-range tracking on top of [`FlatBuffer`].

use std::ops::Range;

use bytemuck::Pod;

use super::{BufferError, FlatBuffer};

/// A half-open byte range `[offset, offset + size)` that was written since the
/// last flush.
///
/// Regions order by offset first, then by size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DirtyRegion {
    /// First changed byte.
    pub offset: usize,
    /// Number of changed bytes.
    pub size: usize,
}

impl DirtyRegion {
    /// Create a new region.
    pub const fn new(offset: usize, size: usize) -> Self {
        Self { offset, size }
    }

    /// One past the last byte of the region.
    pub const fn end(&self) -> usize {
        self.offset + self.size
    }

    /// The region as a byte range.
    pub const fn range(&self) -> Range<usize> {
        self.offset..self.end()
    }
}

/// A [`FlatBuffer`] that remembers which ranges were written.
///
/// Every successful write appends a [`DirtyRegion`]. Before flushing, call
/// [`merge_consecutive_dirty_regions`](Self::merge_consecutive_dirty_regions)
/// to collapse back-to-back writes into single ranges, upload each region, and
/// then [`clear_dirty_regions`](Self::clear_dirty_regions).
#[derive(Debug, Clone, Default)]
pub struct DirtyFlatBuffer {
    buffer: FlatBuffer,
    dirty: Vec<DirtyRegion>,
}

impl DirtyFlatBuffer {
    /// Create a clean buffer of `size` zero bytes.
    pub fn new(size: usize) -> Self {
        Self {
            buffer: FlatBuffer::new(size),
            dirty: Vec::new(),
        }
    }

    /// Size of the buffer in bytes.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Whether the buffer holds no bytes.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// All bytes of the buffer.
    pub fn bytes(&self) -> &[u8] {
        self.buffer.bytes()
    }

    /// The underlying flat buffer.
    pub fn buffer(&self) -> &FlatBuffer {
        &self.buffer
    }

    /// Copy the bytes of `value` to `offset` and mark them dirty.
    pub fn set<T: Pod>(&mut self, offset: usize, value: &T) -> Result<(), BufferError> {
        self.set_bytes(offset, bytemuck::bytes_of(value))
    }

    /// Copy `bytes` to `offset` and mark them dirty.
    ///
    /// A rejected write leaves both the bytes and the dirty list untouched.
    /// Empty writes change nothing and record no region.
    pub fn set_bytes(&mut self, offset: usize, bytes: &[u8]) -> Result<(), BufferError> {
        self.buffer.set_bytes(offset, bytes)?;
        if !bytes.is_empty() {
            self.dirty.push(DirtyRegion::new(offset, bytes.len()));
        }
        Ok(())
    }

    /// Read a value of type `T` from `offset`.
    pub fn get<T: Pod>(&self, offset: usize) -> Result<T, BufferError> {
        self.buffer.get(offset)
    }

    /// Whether any region was written since the last clear.
    pub fn is_dirty(&self) -> bool {
        !self.dirty.is_empty()
    }

    /// The recorded regions, in write order until merged.
    pub fn dirty_regions(&self) -> &[DirtyRegion] {
        &self.dirty
    }

    /// The bytes covered by `region`.
    pub fn region_bytes(&self, region: &DirtyRegion) -> Result<&[u8], BufferError> {
        self.buffer.bytes_at(region.offset, region.size)
    }

    /// Sort the dirty regions and fold every region into its successor when
    /// it ends exactly where the successor starts.
    ///
    /// Overlapping or duplicate regions are kept as they are; uploading them
    /// twice is harmless. After the call the list is sorted and no region ends
    /// where the next one begins. Calling it again changes nothing.
    pub fn merge_consecutive_dirty_regions(&mut self) {
        if self.dirty.is_empty() {
            return;
        }

        self.dirty.sort_unstable();

        let mut merged: Vec<DirtyRegion> = Vec::with_capacity(self.dirty.len());
        for region in self.dirty.drain(..) {
            match merged.last_mut() {
                Some(previous) if previous.end() == region.offset => {
                    previous.size += region.size;
                }
                _ => merged.push(region),
            }
        }

        log::trace!("Merged dirty regions into {} range(s)", merged.len());
        self.dirty = merged;
    }

    /// Forget every dirty region. The bytes are left untouched.
    pub fn clear_dirty_regions(&mut self) {
        self.dirty.clear();
    }
}

impl From<FlatBuffer> for DirtyFlatBuffer {
    fn from(buffer: FlatBuffer) -> Self {
        Self {
            buffer,
            dirty: Vec::new(),
        }
    }
}
