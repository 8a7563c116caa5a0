//! Host storage for default-block uniforms.

use std::collections::BTreeMap;

use bytemuck::Pod;
use uniforge_core::buffer::{BufferError, FlatBuffer};

use crate::backend::{GpuBackend, ProgramHandle};
use crate::error::{GraphicsError, UniformError};
use crate::shader::Shader;
use crate::types::UniformValue;

use super::{MemberOrder, UniformDescriptor};

/// Values of a shader's loose (non-block) uniforms.
///
/// Values are stored in a [`FlatBuffer`] laid out by each uniform's
/// [`effective_offset`](UniformDescriptor::effective_offset), so struct members
/// sit at their declared offsets. [`upload`](Self::upload) walks every leaf
/// uniform and sends it to its location through
/// [`GpuBackend::set_uniform`].
#[derive(Debug, Clone)]
pub struct DefaultBlockUniforms {
    shader_name: String,
    program: ProgramHandle,
    uniforms: BTreeMap<String, UniformDescriptor>,
    storage: FlatBuffer,
}

impl DefaultBlockUniforms {
    /// Zeroed storage for every default-block uniform of `shader`.
    pub fn new(shader: &Shader) -> Self {
        Self {
            shader_name: shader.name().to_string(),
            program: shader.program(),
            uniforms: shader.uniforms().clone(),
            storage: FlatBuffer::new(shader.default_block_size() as usize),
        }
    }

    /// Set the uniform `name`. Dotted names address struct members.
    ///
    /// For arrays, `value` may cover any number of leading elements.
    pub fn set<T: Pod>(&mut self, name: &str, value: &T) -> Result<(), UniformError> {
        let offset = self.descriptor(name)?.effective_offset();
        self.storage.set(offset as usize, value)?;
        Ok(())
    }

    /// Set consecutive elements of the array uniform `name`, starting at 0.
    pub fn set_array<T: Pod>(&mut self, name: &str, values: &[T]) -> Result<(), UniformError> {
        let offset = self.descriptor(name)?.effective_offset();
        self.storage
            .set_bytes(offset as usize, bytemuck::cast_slice(values))?;
        Ok(())
    }

    /// Read the uniform `name` back.
    pub fn get<T: Pod>(&self, name: &str) -> Result<T, UniformError> {
        let offset = self.descriptor(name)?.effective_offset();
        Ok(self.storage.get(offset as usize)?)
    }

    /// Raw storage.
    pub fn bytes(&self) -> &[u8] {
        self.storage.bytes()
    }

    /// Send every uniform to the program. Returns the number of calls made.
    ///
    /// Struct members are visited in declaration order; each array element
    /// goes to `location + index`.
    pub fn upload<B: GpuBackend + ?Sized>(&self, backend: &mut B) -> Result<usize, GraphicsError> {
        let mut calls = 0;
        for descriptor in self.uniforms.values() {
            if descriptor.is_struct() {
                for (_, member) in descriptor.members_in(MemberOrder::Declared) {
                    calls += self.upload_leaf(backend, member)?;
                }
            } else {
                calls += self.upload_leaf(backend, descriptor)?;
            }
        }
        Ok(calls)
    }

    fn upload_leaf<B: GpuBackend + ?Sized>(
        &self,
        backend: &mut B,
        descriptor: &UniformDescriptor,
    ) -> Result<usize, GraphicsError> {
        let Some(ty) = descriptor.uniform_type() else {
            return Ok(0);
        };

        let element_size = ty.size() as usize;
        let base = descriptor.effective_offset() as usize;
        for index in 0..descriptor.array_count {
            let offset = base + index as usize * element_size;
            let bytes = self.storage.bytes_at(offset, element_size)?;
            let value = UniformValue::from_bytes(ty, bytes).ok_or(BufferError::OutOfBounds {
                offset,
                len: element_size,
                capacity: self.storage.len(),
            })?;
            backend.set_uniform(self.program, descriptor.location + index as i32, &value)?;
        }
        Ok(descriptor.array_count as usize)
    }

    fn descriptor(&self, name: &str) -> Result<&UniformDescriptor, UniformError> {
        self.uniforms
            .get(name)
            .or_else(|| {
                let (parent, member) = name.rsplit_once('.')?;
                self.uniforms.get(parent)?.member(member)
            })
            .ok_or_else(|| UniformError::UniformNotFound {
                shader: self.shader_name.clone(),
                name: name.to_string(),
            })
    }
}
