//! CPU mirrors of uniform buffers with minimal partial uploads.
//!
//! [`UniformBufferSynchronizer`] keeps one [`DirtyFlatBuffer`] per registered
//! uniform block. Typed setters translate a member path into a byte range of
//! the mirror and record it as dirty; [`upload_all`] then sends only those
//! ranges to the device, one write per merged region.
//!
//! # Example
//!
//! ```ignore
//! let mut uniforms = UniformBufferSynchronizer::new();
//! let block = shader.uniform_block("Material").unwrap().clone();
//! uniforms.register_block(&mut ctx, "Material", block)?;
//!
//! uniforms.set_scalar_member("Material", "roughness", &0.5f32)?;
//! uniforms.set_array_element("Material", "weights", 2, &[1.0f32, 0.0, 0.0, 0.0])?;
//!
//! // Once per frame, before drawing
//! let writes = uniforms.upload_all(&mut ctx)?;
//! ```
//!
//! [`upload_all`]: UniformBufferSynchronizer::upload_all

use std::collections::BTreeMap;
use std::sync::Arc;

use bytemuck::Pod;
use uniforge_core::buffer::DirtyFlatBuffer;
use uniforge_core::profiling::{profile_function, profile_plot};

use crate::backend::{BufferHandle, GpuBackend};
use crate::context::GraphicsResourceContext;
use crate::error::{GraphicsError, UniformError};
use crate::uniform::{MemberKind, UniformBlockDescriptor};

#[derive(Debug)]
struct SyncedBlock {
    descriptor: Arc<UniformBlockDescriptor>,
    buffer: BufferHandle,
    mirror: DirtyFlatBuffer,
}

/// Owns the CPU mirrors of a set of uniform blocks.
///
/// Several synchronizers may register the same block (a per-material one and a
/// per-renderer one, say); they share the device buffer through the context's
/// [`UniformBufferRegistry`](super::UniformBufferRegistry) but keep separate
/// mirrors.
#[derive(Debug, Default)]
pub struct UniformBufferSynchronizer {
    blocks: BTreeMap<String, SyncedBlock>,
}

impl UniformBufferSynchronizer {
    /// Create a synchronizer with no blocks.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start mirroring the block `name`.
    ///
    /// Does nothing if `name` is already registered. Otherwise requests the
    /// block's device buffer from the context and allocates a zeroed mirror of
    /// `descriptor.size` bytes. The block must already have a binding point,
    /// which [`Shader::new`](crate::shader::Shader::new) assigns.
    pub fn register_block<B: GpuBackend>(
        &mut self,
        ctx: &mut GraphicsResourceContext<B>,
        name: &str,
        descriptor: Arc<UniformBlockDescriptor>,
    ) -> Result<(), GraphicsError> {
        if self.blocks.contains_key(name) {
            return Ok(());
        }

        let buffer = ctx.request_uniform_buffer(&descriptor)?;
        let mirror = DirtyFlatBuffer::new(descriptor.size as usize);
        log::debug!(
            "Mirroring uniform block '{}' ({} bytes)",
            name,
            descriptor.size
        );

        self.blocks.insert(
            name.to_string(),
            SyncedBlock {
                descriptor,
                buffer,
                mirror,
            },
        );
        Ok(())
    }

    /// Stop mirroring `name`. Pending writes are dropped.
    pub fn unregister_block(&mut self, name: &str) -> bool {
        self.blocks.remove(name).is_some()
    }

    /// Stop mirroring every block.
    pub fn unregister_all(&mut self) {
        self.blocks.clear();
    }

    /// Whether `name` is registered.
    pub fn is_registered(&self, name: &str) -> bool {
        self.blocks.contains_key(name)
    }

    /// Number of registered blocks.
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Whether no block is registered.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Descriptor of a registered block.
    pub fn descriptor(&self, name: &str) -> Option<&Arc<UniformBlockDescriptor>> {
        self.blocks.get(name).map(|b| &b.descriptor)
    }

    /// Device buffer of a registered block.
    pub fn buffer(&self, name: &str) -> Option<BufferHandle> {
        self.blocks.get(name).map(|b| b.buffer)
    }

    /// Whether `name` has writes that were not uploaded yet.
    pub fn is_dirty(&self, name: &str) -> bool {
        self.blocks.get(name).is_some_and(|b| b.mirror.is_dirty())
    }

    /// Overwrite the block from offset 0 with `value`.
    pub fn set<T: Pod>(&mut self, name: &str, value: &T) -> Result<(), UniformError> {
        self.block_mut(name)?.mirror.set(0, value)?;
        Ok(())
    }

    /// Write element `index` of the array member `member`.
    ///
    /// `index` is not checked against the array length; writes past the end
    /// of the array land on whatever follows it in the block. Writes past the
    /// end of the block fail with [`UniformError::Buffer`].
    pub fn set_array_element<T: Pod>(
        &mut self,
        name: &str,
        member: &str,
        index: u32,
        value: &T,
    ) -> Result<(), UniformError> {
        let block = self.block_mut(name)?;
        let array = block.descriptor.members_array.get(member).ok_or_else(|| {
            member_not_found(name, member, MemberKind::Array)
        })?;
        let offset = array.offset as usize + index as usize * array.stride as usize;
        block.mirror.set(offset, value)?;
        Ok(())
    }

    /// Write the whole struct member `member`.
    pub fn set_struct_member<T: Pod>(
        &mut self,
        name: &str,
        member: &str,
        value: &T,
    ) -> Result<(), UniformError> {
        let block = self.block_mut(name)?;
        let offset = block
            .descriptor
            .members_struct
            .get(member)
            .ok_or_else(|| member_not_found(name, member, MemberKind::Struct))?
            .offset;
        block.mirror.set(offset as usize, value)?;
        Ok(())
    }

    /// Write the single member `member`; exactly `size_of::<T>()` bytes change.
    pub fn set_scalar_member<T: Pod>(
        &mut self,
        name: &str,
        member: &str,
        value: &T,
    ) -> Result<(), UniformError> {
        let block = self.block_mut(name)?;
        let offset = block
            .descriptor
            .members_single
            .get(member)
            .ok_or_else(|| member_not_found(name, member, MemberKind::Single))?
            .offset;
        block.mirror.set(offset as usize, value)?;
        Ok(())
    }

    /// Current mirror contents of `name`.
    pub fn get(&self, name: &str) -> Result<&[u8], UniformError> {
        self.blocks
            .get(name)
            .map(|b| b.mirror.bytes())
            .ok_or_else(|| block_not_registered(name))
    }

    /// Send every dirty range to the device.
    ///
    /// For each block with pending writes the dirty regions are merged, each
    /// merged region is written with one call, and the regions are cleared.
    /// Clean blocks cost nothing. Returns the number of device writes.
    ///
    /// If a write fails, that block keeps its (merged) regions so a later
    /// call retries them.
    pub fn upload_all<B: GpuBackend>(
        &mut self,
        ctx: &mut GraphicsResourceContext<B>,
    ) -> Result<usize, GraphicsError> {
        profile_function!();

        let backend = ctx.backend_mut();
        let mut writes = 0;

        for (name, block) in self.blocks.iter_mut().filter(|(_, b)| b.mirror.is_dirty()) {
            block.mirror.merge_consecutive_dirty_regions();

            for region in block.mirror.dirty_regions() {
                let bytes = block.mirror.region_bytes(region)?;
                log::trace!(
                    "Uploading '{}' [{}..{})",
                    name,
                    region.offset,
                    region.end()
                );
                backend.write_buffer(block.buffer, region.offset as u64, bytes)?;
                writes += 1;
            }

            block.mirror.clear_dirty_regions();
        }

        profile_plot!("uniform_buffer_writes", writes as f64);
        Ok(writes)
    }

    fn block_mut(&mut self, name: &str) -> Result<&mut SyncedBlock, UniformError> {
        self.blocks
            .get_mut(name)
            .ok_or_else(|| block_not_registered(name))
    }
}

fn block_not_registered(name: &str) -> UniformError {
    UniformError::BlockNotRegistered {
        block: name.to_string(),
    }
}

fn member_not_found(block: &str, member: &str, kind: MemberKind) -> UniformError {
    UniformError::MemberNotFound {
        block: block.to_string(),
        member: member.to_string(),
        kind,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{DummyBackend, ProgramInterface};
    use crate::types::UniformType;
    use crate::uniform::{BlockArrayMember, BlockMember, BlockStructMember};
    use uniforge_core::buffer::BufferError;

    fn material_block() -> UniformBlockDescriptor {
        let mut block = UniformBlockDescriptor::new("Material", 0, 64);
        block.members_single.insert(
            "albedo".into(),
            BlockMember {
                offset: 0,
                size: 16,
                ty: UniformType::Vec4,
            },
        );
        block.members_single.insert(
            "roughness".into(),
            BlockMember {
                offset: 16,
                size: 4,
                ty: UniformType::Float,
            },
        );
        block.members_single.insert(
            "metallic".into(),
            BlockMember {
                offset: 20,
                size: 4,
                ty: UniformType::Float,
            },
        );
        block.members_array.insert(
            "weights".into(),
            BlockArrayMember {
                offset: 32,
                stride: 4,
                element_count: 4,
                element_type: Some(UniformType::Float),
            },
        );
        block.members_struct.insert(
            "sheen".into(),
            BlockStructMember {
                offset: 48,
                size: 16,
                members: Vec::new(),
            },
        );
        block
    }

    fn setup() -> (GraphicsResourceContext<DummyBackend>, UniformBufferSynchronizer) {
        let mut ctx = GraphicsResourceContext::new(DummyBackend::new());
        let shader = ctx
            .backend_mut()
            .compile_shader(crate::shader::ShaderStage::Fragment, "void main() {}")
            .unwrap();
        ctx.backend_mut()
            .queue_program_interface(ProgramInterface::new());
        let program = ctx.backend_mut().link_program(&[shader]).unwrap();
        ctx.register_uniform_block(program, "Material", crate::uniform::BlockCategory::Regular)
            .unwrap();

        let mut sync = UniformBufferSynchronizer::new();
        sync.register_block(&mut ctx, "Material", Arc::new(material_block()))
            .unwrap();
        ctx.backend_mut().clear_recorded();
        (ctx, sync)
    }

    #[test]
    fn test_register_is_idempotent() {
        let (mut ctx, mut sync) = setup();
        sync.register_block(&mut ctx, "Material", Arc::new(material_block()))
            .unwrap();
        assert_eq!(sync.len(), 1);
        assert_eq!(ctx.backend().buffer_count(), 1);
        assert_eq!(sync.get("Material").unwrap().len(), 64);
    }

    #[test]
    fn test_adjacent_scalars_upload_as_one_write() {
        let (mut ctx, mut sync) = setup();
        sync.set_scalar_member("Material", "roughness", &0.25f32)
            .unwrap();
        sync.set_scalar_member("Material", "metallic", &1.0f32)
            .unwrap();

        assert_eq!(sync.upload_all(&mut ctx).unwrap(), 1);
        let writes = ctx.backend().writes();
        assert_eq!(writes.len(), 1);
        assert_eq!((writes[0].offset, writes[0].size), (16, 8));

        let buffer = sync.buffer("Material").unwrap();
        let contents = ctx.backend().buffer_contents(buffer).unwrap();
        assert_eq!(&contents[16..20], bytemuck::bytes_of(&0.25f32));
        assert_eq!(&contents[20..24], bytemuck::bytes_of(&1.0f32));
    }

    #[test]
    fn test_upload_skips_clean_blocks() {
        let (mut ctx, mut sync) = setup();
        assert_eq!(sync.upload_all(&mut ctx).unwrap(), 0);

        sync.set_scalar_member("Material", "roughness", &0.5f32)
            .unwrap();
        assert!(sync.is_dirty("Material"));
        assert_eq!(sync.upload_all(&mut ctx).unwrap(), 1);
        assert!(!sync.is_dirty("Material"));
        assert_eq!(sync.upload_all(&mut ctx).unwrap(), 0);
        assert_eq!(ctx.backend().writes().len(), 1);
    }

    #[test]
    fn test_array_element_offset() {
        let (mut ctx, mut sync) = setup();
        sync.set_array_element("Material", "weights", 2, &7.0f32)
            .unwrap();
        sync.upload_all(&mut ctx).unwrap();

        let write = &ctx.backend().writes()[0];
        assert_eq!((write.offset, write.size), (40, 4));
    }

    #[test]
    fn test_struct_member_and_whole_block() {
        let (_ctx, mut sync) = setup();
        sync.set_struct_member("Material", "sheen", &[0.1f32, 0.2, 0.3, 0.4])
            .unwrap();
        assert_eq!(
            &sync.get("Material").unwrap()[48..64],
            bytemuck::bytes_of(&[0.1f32, 0.2, 0.3, 0.4])
        );

        sync.set("Material", &[1u32; 16]).unwrap();
        assert_eq!(sync.get("Material").unwrap(), bytemuck::bytes_of(&[1u32; 16]));
    }

    #[test]
    fn test_lookup_errors() {
        let (_ctx, mut sync) = setup();

        assert_eq!(
            sync.set_scalar_member("Unknown", "roughness", &0.0f32),
            Err(UniformError::BlockNotRegistered {
                block: "Unknown".into()
            })
        );
        assert_eq!(
            sync.set_struct_member("Material", "roughness", &0.0f32),
            Err(UniformError::MemberNotFound {
                block: "Material".into(),
                member: "roughness".into(),
                kind: MemberKind::Struct,
            })
        );
        assert!(sync.get("Unknown").is_err());
    }

    #[test]
    fn test_write_past_block_end_is_rejected() {
        let (_ctx, mut sync) = setup();
        let result = sync.set_array_element("Material", "weights", 8, &0.0f32);
        assert_eq!(
            result,
            Err(UniformError::Buffer(BufferError::OutOfBounds {
                offset: 64,
                len: 4,
                capacity: 64,
            }))
        );
        assert!(!sync.is_dirty("Material"));
    }

    #[test]
    fn test_unregister() {
        let (_ctx, mut sync) = setup();
        sync.set_scalar_member("Material", "roughness", &0.5f32)
            .unwrap();
        assert!(sync.unregister_block("Material"));
        assert!(!sync.unregister_block("Material"));
        assert!(!sync.is_registered("Material"));

        sync.unregister_all();
        assert!(sync.is_empty());
    }
}
