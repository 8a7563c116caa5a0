//! GPU resources backing uniform blocks.
//!
//! - [`UniformBufferRegistry`] - one device buffer per named uniform block,
//!   shared by every program and synchronizer using the block
//! - [`UniformBufferSynchronizer`] - CPU mirrors of block contents, uploaded as
//!   minimal partial writes

mod registry;
mod uniform_buffers;

pub use registry::UniformBufferRegistry;
pub use uniform_buffers::UniformBufferSynchronizer;
