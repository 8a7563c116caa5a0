//! Uniform descriptors and the default-block mirror.
//!
//! Two kinds of uniform storage are described here:
//!
//! - **Default-block uniforms** ([`UniformDescriptor`]): loose `uniform`
//!   declarations addressed by location. A struct uniform holds its members
//!   as nested descriptors with both the driver offset and, once recovered, the
//!   offset implied by declaration order.
//! - **Uniform blocks** ([`UniformBlockDescriptor`]): named blocks backed by a
//!   GPU buffer, bound through a binding point drawn from the pool of their
//!   [`BlockCategory`].

mod block;
mod default_block;
mod descriptor;

pub use block::{
    BlockArrayMember, BlockCategory, BlockMember, BlockStructMember, MemberKind,
    UniformBlockDescriptor,
};
pub use default_block::DefaultBlockUniforms;
pub use descriptor::{DeclaredLayout, MemberOrder, UniformDescriptor, UniformKind};
