//! Common types and descriptors for uniform resources.
//!
//! This module contains buffer usage flags, buffer descriptors and the closed
//! set of uniform value types understood by the upload path.

mod buffer;
mod uniform;

pub use buffer::{BufferDescriptor, BufferRange, BufferUsage};
pub use uniform::{UniformType, UniformValue};
