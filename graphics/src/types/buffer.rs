//! Buffer types and descriptors.

use bitflags::bitflags;

bitflags! {
    /// Usage flags for buffers.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BufferUsage: u32 {
        /// Buffer can be bound to a uniform block slot.
        const UNIFORM = 1 << 0;
        /// Buffer can be copied from.
        const COPY_SRC = 1 << 1;
        /// Buffer can be written from the host.
        const COPY_DST = 1 << 2;
    }
}

impl Default for BufferUsage {
    fn default() -> Self {
        Self::empty()
    }
}

/// Descriptor for creating a buffer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct BufferDescriptor {
    /// Debug label for the buffer.
    pub label: Option<String>,
    /// Size in bytes.
    pub size: u64,
    /// Usage flags.
    pub usage: BufferUsage,
}

impl BufferDescriptor {
    /// Create a new buffer descriptor.
    pub fn new(size: u64, usage: BufferUsage) -> Self {
        Self {
            label: None,
            size,
            usage,
        }
    }

    /// Descriptor for a host-written uniform buffer.
    pub fn uniform(size: u64) -> Self {
        Self::new(size, BufferUsage::UNIFORM | BufferUsage::COPY_DST)
    }

    /// Set the debug label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// A sub-range of a buffer bound to a slot instead of the whole buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferRange {
    /// Start of the range in bytes.
    pub offset: u64,
    /// Length of the range in bytes.
    pub size: u64,
}

impl BufferRange {
    /// Create a new range.
    pub fn new(offset: u64, size: u64) -> Self {
        Self { offset, size }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_descriptor() {
        let desc = BufferDescriptor::uniform(256).with_label("Camera");
        assert_eq!(desc.size, 256);
        assert!(desc.usage.contains(BufferUsage::UNIFORM | BufferUsage::COPY_DST));
        assert_eq!(desc.label.as_deref(), Some("Camera"));
    }
}
