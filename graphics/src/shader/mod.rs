//! Shader programs and uniform reflection.
//!
//! # Overview
//!
//! - [`ShaderComposer`] - resolves `#include` directives and `#pragma feature` toggles
//! - [`Shader`] - compiles and links a program, then reflects its uniforms
//! - [`UniformReflector`] - turns the driver's active-uniform list into
//!   [`UniformDescriptor`](crate::uniform::UniformDescriptor) trees and
//!   [`UniformBlockDescriptor`](crate::uniform::UniformBlockDescriptor)s
//! - [`source`] - declaration tables recovered from shader text
//! - [`interface`] - naga-based introspection for backends without one
//!
//! # Example
//!
//! ```ignore
//! use uniforge_graphics::shader::{Shader, ShaderSource};
//!
//! let shader = Shader::new(
//!     &mut ctx,
//!     "Phong",
//!     &[ShaderSource::vertex(PHONG_VS), ShaderSource::fragment(PHONG_FS)],
//!     &["SHADOWS"],
//! )?;
//!
//! let light = shader.uniform("light").unwrap();
//! for (name, member) in light.members_in(MemberOrder::Declared) {
//!     println!("{name} @ {}", member.effective_offset());
//! }
//! ```

mod composer;
pub mod interface;
mod program;
mod reflection;
pub mod source;

use std::fmt;

pub use composer::ShaderComposer;
pub use program::{Shader, ShaderSource};
pub use reflection::{ReflectedUniforms, StructOrderPolicy, UniformReflector};

/// Programmable pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Geometry,
    Fragment,
    Compute,
}

impl ShaderStage {
    /// Lowercase stage name used in messages.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Vertex => "vertex",
            Self::Geometry => "geometry",
            Self::Fragment => "fragment",
            Self::Compute => "compute",
        }
    }

    /// Macro defined while composing this stage.
    pub const fn define(self) -> &'static str {
        match self {
            Self::Vertex => "VERTEX",
            Self::Geometry => "GEOMETRY",
            Self::Fragment => "FRAGMENT",
            Self::Compute => "COMPUTE",
        }
    }

    /// The naga stage, or `None` for stages naga cannot parse.
    pub(crate) fn to_naga(self) -> Option<naga::ShaderStage> {
        match self {
            Self::Vertex => Some(naga::ShaderStage::Vertex),
            Self::Geometry => None,
            Self::Fragment => Some(naga::ShaderStage::Fragment),
            Self::Compute => Some(naga::ShaderStage::Compute),
        }
    }
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_names() {
        assert_eq!(ShaderStage::Geometry.name(), "geometry");
        assert_eq!(ShaderStage::Geometry.define(), "GEOMETRY");
        assert_eq!(ShaderStage::Vertex.to_string(), "vertex");
    }

    #[test]
    fn test_geometry_has_no_naga_stage() {
        assert_eq!(ShaderStage::Geometry.to_naga(), None);
        assert_eq!(ShaderStage::Compute.to_naga(), Some(naga::ShaderStage::Compute));
    }
}
