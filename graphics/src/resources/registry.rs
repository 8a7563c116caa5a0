//! Device buffers for uniform blocks.

use std::collections::HashMap;

use crate::backend::{BufferHandle, GpuBackend};
use crate::binding::BindingPointAllocator;
use crate::error::{BindingError, GraphicsError};
use crate::types::BufferDescriptor;
use crate::uniform::{BlockCategory, UniformBlockDescriptor};

#[derive(Debug, Clone, Copy)]
struct RegisteredBuffer {
    handle: BufferHandle,
    size: u64,
}

/// One device buffer per `(category, block name)`.
///
/// The first request for a block creates the buffer and connects it to the
/// block's binding point; later requests return the same handle, so every
/// synchronizer that registers the block writes to one buffer.
#[derive(Debug, Default)]
pub struct UniformBufferRegistry {
    buffers: HashMap<(BlockCategory, String), RegisteredBuffer>,
}

impl UniformBufferRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Buffer for `block`, creating and connecting it on first request.
    ///
    /// The block must already have a binding point.
    pub fn request<B: GpuBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        bindings: &BindingPointAllocator,
        block: &UniformBlockDescriptor,
    ) -> Result<BufferHandle, GraphicsError> {
        let key = (block.category, block.name.clone());
        if let Some(existing) = self.buffers.get(&key) {
            if existing.size < u64::from(block.size) {
                log::warn!(
                    "Uniform buffer for block '{}' holds {} bytes but the block needs {}",
                    block.name,
                    existing.size,
                    block.size
                );
            }
            return Ok(existing.handle);
        }

        if bindings.slot_of(&block.name, block.category).is_none() {
            return Err(BindingError::BlockNotRegistered {
                category: block.category,
                block: block.name.clone(),
            }
            .into());
        }

        let size = u64::from(block.size);
        let handle =
            backend.create_buffer(&BufferDescriptor::uniform(size).with_label(&block.name))?;
        let slot =
            bindings.connect_buffer_to_block(backend, handle, &block.name, block.category, None)?;

        log::debug!(
            "Created {} uniform buffer for block '{}' ({} bytes) at binding point {}",
            block.category,
            block.name,
            size,
            slot
        );

        self.buffers.insert(key, RegisteredBuffer { handle, size });
        Ok(handle)
    }

    /// Buffer already created for `block`.
    pub fn get(&self, block: &str, category: BlockCategory) -> Option<BufferHandle> {
        self.buffers
            .get(&(category, block.to_string()))
            .map(|b| b.handle)
    }

    /// Destroy every buffer. Blocks requested afterwards get new buffers.
    pub fn release_all<B: GpuBackend + ?Sized>(&mut self, backend: &mut B) {
        for ((category, block), buffer) in self.buffers.drain() {
            log::debug!("Releasing {category} uniform buffer for block '{block}'");
            backend.destroy_buffer(buffer.handle);
        }
    }

    /// Number of buffers created.
    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    /// Whether no buffer was created yet.
    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }
}
