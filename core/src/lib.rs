//! # Uniforge Core
//!
//! Engine-agnostic building blocks shared by the Uniforge crates:
//!
//! - [`buffer::FlatBuffer`] - fixed-size, zero-initialized byte storage
//! - [`buffer::DirtyFlatBuffer`] - a flat buffer that tracks which byte ranges changed
//! - [`profiling`] - optional Tracy instrumentation macros

pub mod buffer;
pub mod profiling;

pub use buffer::{BufferError, DirtyFlatBuffer, DirtyRegion, FlatBuffer};

/// Core library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Log the core library version.
pub fn init() {
    log::info!("Uniforge Core v{} initialized", VERSION);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
