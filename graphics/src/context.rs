//! Graphics resource context.
//!
//! The [`GraphicsResourceContext`] owns everything the uniform system shares
//! between shaders: the GPU backend, the binding-point allocator, the
//! uniform-buffer registry and the shader composer. One context exists per
//! device; there is no process-wide state, so several contexts can live side
//! by side (one per test, for instance).
//!
//! # Example
//!
//! ```ignore
//! use uniforge_graphics::{ContextParameters, GraphicsResourceContext, StructOrderPolicy};
//! use uniforge_graphics::backend::DummyBackend;
//!
//! let mut ctx = GraphicsResourceContext::with_parameters(
//!     DummyBackend::new(),
//!     ContextParameters::new().with_struct_order_policy(StructOrderPolicy::Strict),
//! );
//! ctx.composer_mut().register_include("common/lighting.glsl", LIGHTING);
//! ```

use crate::backend::{BufferHandle, GpuBackend, ProgramHandle};
use crate::binding::{BindingPointAllocator, BindingQuotas};
use crate::error::GraphicsError;
use crate::resources::UniformBufferRegistry;
use crate::shader::{ShaderComposer, StructOrderPolicy};
use crate::types::BufferRange;
use crate::uniform::{BlockCategory, UniformBlockDescriptor};

/// Parameters for creating a [`GraphicsResourceContext`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ContextParameters {
    /// Quotas of the Intrinsic and Global binding pools.
    pub binding_quotas: BindingQuotas,
    /// What shaders do when a struct's member order cannot be recovered.
    pub struct_order_policy: StructOrderPolicy,
}

impl ContextParameters {
    /// Create parameters with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the binding pool quotas.
    pub fn with_binding_quotas(mut self, quotas: BindingQuotas) -> Self {
        self.binding_quotas = quotas;
        self
    }

    /// Set the unresolved-struct policy.
    pub fn with_struct_order_policy(mut self, policy: StructOrderPolicy) -> Self {
        self.struct_order_policy = policy;
        self
    }
}

/// Shared state of the uniform system for one device.
///
/// # Thread Safety
///
/// The context is confined to the thread that owns the device. Every
/// state-changing method takes `&mut self`.
pub struct GraphicsResourceContext<B: GpuBackend> {
    backend: B,
    bindings: BindingPointAllocator,
    uniform_buffers: UniformBufferRegistry,
    composer: ShaderComposer,
    parameters: ContextParameters,
}

impl<B: GpuBackend> GraphicsResourceContext<B> {
    /// Create a context with default parameters.
    pub fn new(backend: B) -> Self {
        Self::with_parameters(backend, ContextParameters::default())
    }

    /// Create a context with custom parameters.
    ///
    /// The binding-point limit is queried from the backend once, here.
    pub fn with_parameters(backend: B, parameters: ContextParameters) -> Self {
        let max_bindings = backend.max_uniform_buffer_bindings();
        log::info!(
            "Creating graphics resource context on {} backend ({} uniform binding points)",
            backend.name(),
            max_bindings
        );

        Self {
            bindings: BindingPointAllocator::new(max_bindings, parameters.binding_quotas),
            backend,
            uniform_buffers: UniformBufferRegistry::new(),
            composer: ShaderComposer::new(),
            parameters,
        }
    }

    /// The GPU backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// The GPU backend, mutably.
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// The binding-point allocator.
    pub fn bindings(&self) -> &BindingPointAllocator {
        &self.bindings
    }

    /// Device buffers created for uniform blocks.
    pub fn uniform_buffers(&self) -> &UniformBufferRegistry {
        &self.uniform_buffers
    }

    /// The shader composer.
    pub fn composer(&self) -> &ShaderComposer {
        &self.composer
    }

    /// The shader composer, for registering includes.
    pub fn composer_mut(&mut self) -> &mut ShaderComposer {
        &mut self.composer
    }

    /// The parameters the context was created with.
    pub fn parameters(&self) -> &ContextParameters {
        &self.parameters
    }

    /// Give `block` of `program` a binding point in `category`.
    pub fn register_uniform_block(
        &mut self,
        program: ProgramHandle,
        block: &str,
        category: BlockCategory,
    ) -> Result<u32, GraphicsError> {
        self.bindings
            .register_block(&mut self.backend, program, block, category)
    }

    /// Bind `buffer` to the binding point of `block`.
    pub fn connect_buffer_to_block(
        &mut self,
        buffer: BufferHandle,
        block: &str,
        category: BlockCategory,
        range: Option<BufferRange>,
    ) -> Result<u32, GraphicsError> {
        self.bindings
            .connect_buffer_to_block(&mut self.backend, buffer, block, category, range)
    }

    /// Destroy every uniform buffer the context created.
    ///
    /// Synchronizers holding one of the released handles must re-register
    /// their blocks.
    pub fn release_uniform_buffers(&mut self) {
        self.uniform_buffers.release_all(&mut self.backend);
    }

    /// Device buffer backing `block`, created and connected on first request.
    pub fn request_uniform_buffer(
        &mut self,
        block: &UniformBlockDescriptor,
    ) -> Result<BufferHandle, GraphicsError> {
        self.uniform_buffers
            .request(&mut self.backend, &self.bindings, block)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::DummyBackend;

    #[test]
    fn test_parameters_builder() {
        let params = ContextParameters::new()
            .with_binding_quotas(BindingQuotas::new().with_intrinsic(2))
            .with_struct_order_policy(StructOrderPolicy::Strict);
        assert_eq!(params.binding_quotas.intrinsic, 2);
        assert_eq!(params.binding_quotas.global, 4);
        assert_eq!(params.struct_order_policy, StructOrderPolicy::Strict);
    }

    #[test]
    fn test_allocator_uses_backend_limit() {
        let ctx = GraphicsResourceContext::new(
            DummyBackend::new().with_max_uniform_buffer_bindings(16),
        );
        assert_eq!(ctx.bindings().max_bindings(), 16);
        assert_eq!(ctx.bindings().pool(BlockCategory::Regular).capacity(), 4);
    }

    #[test]
    fn test_contexts_are_independent() {
        let mut first = GraphicsResourceContext::new(DummyBackend::new());
        let second = GraphicsResourceContext::new(DummyBackend::new());

        first.backend_mut().queue_program_interface(Default::default());
        let shader = first
            .backend_mut()
            .compile_shader(crate::shader::ShaderStage::Vertex, "void main() {}")
            .unwrap();
        let program = first.backend_mut().link_program(&[shader]).unwrap();
        first
            .register_uniform_block(program, "Material", BlockCategory::Regular)
            .unwrap();

        assert_eq!(first.bindings().slot_of("Material", BlockCategory::Regular), Some(8));
        assert_eq!(second.bindings().slot_of("Material", BlockCategory::Regular), None);
    }
}
