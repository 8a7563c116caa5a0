//! GPU backend abstraction layer.
//!
//! Everything the uniform system needs from a graphics driver goes through the
//! [`GpuBackend`] trait: compiling and linking programs, introspecting their
//! active uniforms, creating and writing buffers, and wiring buffers to
//! uniform-block binding points.
//!
//! # Available Backends
//!
//! - [`DummyBackend`]: records every call, for tests and headless tools
//! - `WgpuBackend` (`wgpu-backend` feature): wraps a `wgpu` device and queue

#[cfg(feature = "wgpu-backend")]
pub mod wgpu_backend;

pub mod dummy;
mod error;

pub use dummy::{DummyBackend, RecordedBind, RecordedUniform, RecordedWrite};
pub use error::BackendError;
#[cfg(feature = "wgpu-backend")]
pub use wgpu_backend::WgpuBackend;

use crate::shader::ShaderStage;
use crate::types::{BufferDescriptor, BufferRange, UniformType, UniformValue};

/// Handle to a compiled shader stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShaderHandle(pub(crate) u64);

/// Handle to a linked program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProgramHandle(pub(crate) u64);

/// Handle to a device buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferHandle(pub(crate) u64);

/// An active uniform as reported by the driver after linking.
///
/// Default-block uniforms have no `block_index`; their `location` is what
/// uploads target. Block members carry the block index and their byte offset
/// inside the block instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveUniform {
    /// Fully qualified name, e.g. `light.ambient`, `weights[0]` or `Camera.view`.
    pub name: String,
    /// Uniform location, or -1 for block members.
    pub location: i32,
    /// Element type.
    pub ty: UniformType,
    /// Number of array elements, 1 for non-arrays.
    pub array_count: u32,
    /// Index of the owning uniform block.
    pub block_index: Option<u32>,
    /// Byte offset inside the owning block.
    pub block_offset: u32,
    /// Byte distance between array elements inside a block.
    pub array_stride: u32,
}

impl ActiveUniform {
    /// A default-block uniform at `location`.
    pub fn new(name: impl Into<String>, location: i32, ty: UniformType) -> Self {
        Self {
            name: name.into(),
            location,
            ty,
            array_count: 1,
            block_index: None,
            block_offset: 0,
            array_stride: 0,
        }
    }

    /// A member of block `block_index` at byte `offset`.
    pub fn block_member(
        name: impl Into<String>,
        ty: UniformType,
        block_index: u32,
        offset: u32,
    ) -> Self {
        Self {
            name: name.into(),
            location: -1,
            ty,
            array_count: 1,
            block_index: Some(block_index),
            block_offset: offset,
            array_stride: 0,
        }
    }

    /// Set the array element count.
    pub fn with_array_count(mut self, count: u32) -> Self {
        self.array_count = count;
        self
    }

    /// Set the array stride.
    pub fn with_array_stride(mut self, stride: u32) -> Self {
        self.array_stride = stride;
        self
    }
}

/// An active uniform block as reported by the driver after linking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveUniformBlock {
    /// Block (type) name.
    pub name: String,
    /// Driver index referenced by [`ActiveUniform::block_index`].
    pub index: u32,
    /// Total data size in bytes.
    pub size: u32,
}

impl ActiveUniformBlock {
    /// Create a new block record.
    pub fn new(name: impl Into<String>, index: u32, size: u32) -> Self {
        Self {
            name: name.into(),
            index,
            size,
        }
    }
}

/// Every active uniform and uniform block of a linked program, in driver order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgramInterface {
    pub uniforms: Vec<ActiveUniform>,
    pub blocks: Vec<ActiveUniformBlock>,
}

impl ProgramInterface {
    /// Create an empty interface.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an active uniform.
    pub fn with_uniform(mut self, uniform: ActiveUniform) -> Self {
        self.uniforms.push(uniform);
        self
    }

    /// Append an active uniform block.
    pub fn with_block(mut self, block: ActiveUniformBlock) -> Self {
        self.blocks.push(block);
        self
    }
}

/// Driver operations used by the uniform system.
///
/// Backends are driven from a single render thread, so every state-changing
/// method takes `&mut self`.
pub trait GpuBackend {
    /// Human-readable backend name.
    fn name(&self) -> &'static str;

    /// Compile one shader stage. Errors carry the driver log.
    fn compile_shader(
        &mut self,
        stage: ShaderStage,
        source: &str,
    ) -> Result<ShaderHandle, BackendError>;

    /// Link compiled stages into a program. Errors carry the driver log.
    fn link_program(&mut self, shaders: &[ShaderHandle]) -> Result<ProgramHandle, BackendError>;

    /// Release a compiled stage. Linked programs stay valid.
    fn delete_shader(&mut self, shader: ShaderHandle);

    /// Release a linked program and its block bindings.
    fn delete_program(&mut self, program: ProgramHandle);

    /// Active uniforms and uniform blocks of a linked program.
    fn program_interface(&self, program: ProgramHandle) -> Result<ProgramInterface, BackendError>;

    /// Point the program's uniform block `block_name` at binding `slot`.
    fn bind_block_to_slot(
        &mut self,
        program: ProgramHandle,
        block_name: &str,
        slot: u32,
    ) -> Result<(), BackendError>;

    /// Create a device buffer.
    fn create_buffer(&mut self, descriptor: &BufferDescriptor)
    -> Result<BufferHandle, BackendError>;

    /// Release a device buffer and unbind it from every slot.
    fn destroy_buffer(&mut self, buffer: BufferHandle);

    /// Copy `data` into the buffer starting at `offset`.
    fn write_buffer(
        &mut self,
        buffer: BufferHandle,
        offset: u64,
        data: &[u8],
    ) -> Result<(), BackendError>;

    /// Bind the whole buffer, or `range` of it, to binding `slot`.
    fn bind_buffer_to_slot(
        &mut self,
        buffer: BufferHandle,
        slot: u32,
        range: Option<BufferRange>,
    ) -> Result<(), BackendError>;

    /// Number of uniform-buffer binding points the device exposes.
    fn max_uniform_buffer_bindings(&self) -> u32;

    /// Upload one default-block uniform element to `location`.
    fn set_uniform(
        &mut self,
        program: ProgramHandle,
        location: i32,
        value: &UniformValue,
    ) -> Result<(), BackendError>;
}

impl GpuBackend for Box<dyn GpuBackend> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn compile_shader(
        &mut self,
        stage: ShaderStage,
        source: &str,
    ) -> Result<ShaderHandle, BackendError> {
        (**self).compile_shader(stage, source)
    }

    fn link_program(&mut self, shaders: &[ShaderHandle]) -> Result<ProgramHandle, BackendError> {
        (**self).link_program(shaders)
    }

    fn delete_shader(&mut self, shader: ShaderHandle) {
        (**self).delete_shader(shader)
    }

    fn delete_program(&mut self, program: ProgramHandle) {
        (**self).delete_program(program)
    }

    fn program_interface(&self, program: ProgramHandle) -> Result<ProgramInterface, BackendError> {
        (**self).program_interface(program)
    }

    fn bind_block_to_slot(
        &mut self,
        program: ProgramHandle,
        block_name: &str,
        slot: u32,
    ) -> Result<(), BackendError> {
        (**self).bind_block_to_slot(program, block_name, slot)
    }

    fn create_buffer(
        &mut self,
        descriptor: &BufferDescriptor,
    ) -> Result<BufferHandle, BackendError> {
        (**self).create_buffer(descriptor)
    }

    fn destroy_buffer(&mut self, buffer: BufferHandle) {
        (**self).destroy_buffer(buffer)
    }

    fn write_buffer(
        &mut self,
        buffer: BufferHandle,
        offset: u64,
        data: &[u8],
    ) -> Result<(), BackendError> {
        (**self).write_buffer(buffer, offset, data)
    }

    fn bind_buffer_to_slot(
        &mut self,
        buffer: BufferHandle,
        slot: u32,
        range: Option<BufferRange>,
    ) -> Result<(), BackendError> {
        (**self).bind_buffer_to_slot(buffer, slot, range)
    }

    fn max_uniform_buffer_bindings(&self) -> u32 {
        (**self).max_uniform_buffer_bindings()
    }

    fn set_uniform(
        &mut self,
        program: ProgramHandle,
        location: i32,
        value: &UniformValue,
    ) -> Result<(), BackendError> {
        (**self).set_uniform(program, location, value)
    }
}

/// Create the best available backend.
///
/// With the `wgpu-backend` feature this tries to open a headless wgpu device
/// and falls back to the dummy backend when no adapter is available.
pub fn create_backend() -> Box<dyn GpuBackend> {
    #[cfg(feature = "wgpu-backend")]
    {
        match WgpuBackend::new_headless() {
            Ok(backend) => {
                log::info!("Using wgpu backend");
                return Box::new(backend);
            }
            Err(e) => {
                log::warn!("wgpu backend unavailable ({e}), falling back to dummy backend");
            }
        }
    }

    log::info!("Using dummy backend");
    Box::new(DummyBackend::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_active_uniform_builders() {
        let uniform = ActiveUniform::block_member("Lights.positions[0]", UniformType::Vec4, 2, 32)
            .with_array_count(8)
            .with_array_stride(16);
        assert_eq!(uniform.location, -1);
        assert_eq!(uniform.block_index, Some(2));
        assert_eq!(uniform.block_offset, 32);
        assert_eq!(uniform.array_count, 8);
        assert_eq!(uniform.array_stride, 16);
    }

    #[cfg(not(feature = "wgpu-backend"))]
    #[test]
    fn test_create_backend_falls_back_to_dummy() {
        let backend = create_backend();
        assert_eq!(backend.name(), "Dummy");
    }

    #[test]
    fn test_boxed_backend_forwards() {
        let mut backend: Box<dyn GpuBackend> =
            Box::new(DummyBackend::new().with_max_uniform_buffer_bindings(24));
        assert_eq!(backend.max_uniform_buffer_bindings(), 24);
        let buffer = backend
            .create_buffer(&BufferDescriptor::uniform(16))
            .unwrap();
        assert!(backend.write_buffer(buffer, 0, &[0; 16]).is_ok());
        backend.destroy_buffer(buffer);
        assert!(backend.write_buffer(buffer, 0, &[0; 16]).is_err());
    }
}
