//! Fixed-size byte storage.

use std::ops::Range;

use bytemuck::Pod;

use super::BufferError;

/// A contiguous, zero-initialized byte buffer.
///
/// Writes never grow the buffer: it is sized once to the final extent of the
/// data it mirrors, and any access outside `0..len()` is rejected with
/// [`BufferError::OutOfBounds`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlatBuffer {
    data: Vec<u8>,
}

impl FlatBuffer {
    /// Create a buffer of `size` zero bytes.
    pub fn new(size: usize) -> Self {
        Self {
            data: vec![0; size],
        }
    }

    /// Create a buffer holding a copy of `bytes`.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self {
            data: bytes.to_vec(),
        }
    }

    /// Size of the buffer in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the buffer holds no bytes.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// All bytes of the buffer.
    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    /// `len` bytes starting at `offset`.
    pub fn bytes_at(&self, offset: usize, len: usize) -> Result<&[u8], BufferError> {
        let range = self.checked_range(offset, len)?;
        Ok(&self.data[range])
    }

    /// Copy the bytes of `value` to `offset`.
    pub fn set<T: Pod>(&mut self, offset: usize, value: &T) -> Result<(), BufferError> {
        self.set_bytes(offset, bytemuck::bytes_of(value))
    }

    /// Copy `bytes` to `offset`.
    pub fn set_bytes(&mut self, offset: usize, bytes: &[u8]) -> Result<(), BufferError> {
        let range = self.checked_range(offset, bytes.len())?;
        self.data[range].copy_from_slice(bytes);
        Ok(())
    }

    /// Read a value of type `T` from `offset`.
    ///
    /// The offset does not need to be aligned for `T`.
    pub fn get<T: Pod>(&self, offset: usize) -> Result<T, BufferError> {
        let bytes = self.bytes_at(offset, std::mem::size_of::<T>())?;
        Ok(bytemuck::pod_read_unaligned(bytes))
    }

    /// Append `size` zero bytes and return the offset where they start.
    pub fn allocate(&mut self, size: usize) -> usize {
        let offset = self.data.len();
        self.data.resize(offset + size, 0);
        offset
    }

    /// Remove `size` bytes from the end of the buffer.
    pub fn deallocate(&mut self, size: usize) {
        let len = self.data.len().saturating_sub(size);
        self.data.truncate(len);
    }

    /// Remove every byte.
    pub fn clear(&mut self) {
        self.data.clear();
    }

    fn checked_range(&self, offset: usize, len: usize) -> Result<Range<usize>, BufferError> {
        let capacity = self.data.len();
        match offset.checked_add(len) {
            Some(end) if end <= capacity => Ok(offset..end),
            _ => Err(BufferError::OutOfBounds {
                offset,
                len,
                capacity,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_is_zeroed() {
        let buffer = FlatBuffer::new(16);
        assert_eq!(buffer.len(), 16);
        assert!(buffer.bytes().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_set_and_get() {
        let mut buffer = FlatBuffer::new(16);
        buffer.set(4, &1.5f32).unwrap();
        buffer.set(8, &[1u32, 2u32]).unwrap();

        assert_eq!(buffer.get::<f32>(4).unwrap(), 1.5);
        assert_eq!(buffer.get::<[u32; 2]>(8).unwrap(), [1, 2]);
        assert_eq!(buffer.get::<u32>(0).unwrap(), 0);
    }

    #[test]
    fn test_unaligned_access() {
        let mut buffer = FlatBuffer::new(8);
        buffer.set(1, &0xDEADBEEFu32).unwrap();
        assert_eq!(buffer.get::<u32>(1).unwrap(), 0xDEADBEEF);
    }

    #[test]
    fn test_out_of_bounds_write_is_rejected() {
        let mut buffer = FlatBuffer::new(8);
        let err = buffer.set(6, &0u32).unwrap_err();
        assert_eq!(
            err,
            BufferError::OutOfBounds {
                offset: 6,
                len: 4,
                capacity: 8
            }
        );
        // Nothing was written
        assert!(buffer.bytes().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_offset_overflow_is_rejected() {
        let mut buffer = FlatBuffer::new(8);
        assert!(buffer.set_bytes(usize::MAX, &[1, 2]).is_err());
    }

    #[test]
    fn test_write_at_end_with_empty_slice() {
        let mut buffer = FlatBuffer::new(8);
        assert!(buffer.set_bytes(8, &[]).is_ok());
    }

    #[test]
    fn test_allocate_and_deallocate() {
        let mut buffer = FlatBuffer::new(4);
        let offset = buffer.allocate(12);
        assert_eq!(offset, 4);
        assert_eq!(buffer.len(), 16);

        buffer.deallocate(8);
        assert_eq!(buffer.len(), 8);

        buffer.deallocate(100);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_clear() {
        let mut buffer = FlatBuffer::from_bytes(&[1, 2, 3]);
        buffer.clear();
        assert!(buffer.is_empty());
    }
}
