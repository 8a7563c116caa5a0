//! # Uniforge Graphics
//!
//! Shader-uniform reflection and uniform-buffer synchronization.
//!
//! ## Overview
//!
//! This crate provides:
//! - [`Shader`] - compiles and links a program, then reflects its uniforms,
//!   recovering the declared member order of struct uniforms from source
//! - [`UniformBufferSynchronizer`] - CPU mirrors of uniform blocks, uploaded
//!   as the minimal set of partial writes
//! - [`BindingPointAllocator`] - per-category pools of uniform-block binding points
//! - [`GraphicsResourceContext`] - the per-device state tying them together
//! - [`GpuBackend`] - the driver boundary, with a Dummy (recording) and an
//!   optional wgpu implementation
//!
//! ## Example
//!
//! ```ignore
//! use uniforge_graphics::{GraphicsResourceContext, Shader, ShaderSource, UniformBufferSynchronizer};
//! use uniforge_graphics::backend::DummyBackend;
//!
//! let mut ctx = GraphicsResourceContext::new(DummyBackend::new());
//! let shader = Shader::new(&mut ctx, "Lit", &[ShaderSource::fragment(LIT_FS)], &[])?;
//!
//! let mut uniforms = UniformBufferSynchronizer::new();
//! uniforms.register_block(&mut ctx, "Lights_Global", shader.uniform_block("Lights_Global").unwrap().clone())?;
//! uniforms.set_scalar_member("Lights_Global", "count", &3u32)?;
//! uniforms.upload_all(&mut ctx)?;
//! ```

pub mod backend;
pub mod binding;
pub mod context;
pub mod error;
pub mod resources;
pub mod shader;
pub mod types;
pub mod uniform;

// Re-export main types for convenience
pub use backend::{BackendError, DummyBackend, GpuBackend};
pub use binding::{BindingPointAllocator, BindingQuotas};
pub use context::{ContextParameters, GraphicsResourceContext};
pub use error::{BindingError, GraphicsError, ShaderError, UniformError};
pub use resources::{UniformBufferRegistry, UniformBufferSynchronizer};
pub use shader::{Shader, ShaderSource, ShaderStage, StructOrderPolicy, UniformReflector};
pub use types::{UniformType, UniformValue};
pub use uniform::{
    BlockCategory, DefaultBlockUniforms, MemberOrder, UniformBlockDescriptor, UniformDescriptor,
};

/// Graphics library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the graphics subsystem.
///
/// This should be called before using any graphics functionality.
pub fn init() {
    uniforge_core::init();
    log::info!("Uniforge Graphics v{} initialized", VERSION);
}
