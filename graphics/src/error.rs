//! Graphics error types.

use uniforge_core::buffer::BufferError;

use crate::backend::BackendError;
use crate::shader::ShaderStage;
use crate::uniform::{BlockCategory, MemberKind};

/// Errors that can occur in the graphics system.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphicsError {
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error(transparent)]
    Shader(#[from] ShaderError),
    #[error(transparent)]
    Binding(#[from] BindingError),
    #[error(transparent)]
    Uniform(#[from] UniformError),
    #[error(transparent)]
    Buffer(#[from] BufferError),
}

/// Fatal errors raised while building a [`Shader`](crate::shader::Shader).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ShaderError {
    /// A stage failed to compile. `log` is the indented driver log.
    #[error("shader '{shader}': {stage} stage failed to compile:\n{log}")]
    Compilation {
        shader: String,
        stage: ShaderStage,
        log: String,
    },
    /// The program failed to link. `log` is the indented driver log.
    #[error("shader '{shader}': program failed to link:\n{log}")]
    Linking { shader: String, log: String },
    /// An `#include` directive named a source that was never registered.
    #[error("include not found: \"{path}\"")]
    IncludeNotFound { path: String },
    /// The member order of a struct uniform could not be recovered from source.
    #[error("shader '{shader}': could not recover member order of struct uniform '{uniform}'")]
    UnresolvedStructOrder { shader: String, uniform: String },
}

/// Errors raised by the binding-point allocator.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BindingError {
    /// Every slot of the category is already assigned.
    #[error(
        "no free {category} binding point for block '{block}' ({capacity} slot(s) already in use)"
    )]
    PoolExhausted {
        category: BlockCategory,
        block: String,
        capacity: u32,
    },
    /// A buffer was connected to a block that never received a slot.
    #[error("uniform block '{block}' has no {category} binding point")]
    BlockNotRegistered {
        category: BlockCategory,
        block: String,
    },
}

/// Errors raised when writing uniform values.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UniformError {
    /// The block is not registered with the synchronizer.
    #[error("uniform block '{block}' is not registered")]
    BlockNotRegistered { block: String },
    /// The block has no member of the requested kind with that name.
    #[error("uniform block '{block}' has no {kind} member '{member}'")]
    MemberNotFound {
        block: String,
        member: String,
        kind: MemberKind,
    },
    /// The shader has no default-block uniform with that name.
    #[error("shader '{shader}' has no uniform '{name}'")]
    UniformNotFound { shader: String, name: String },
    /// The write falls outside the CPU mirror.
    #[error(transparent)]
    Buffer(#[from] BufferError),
}

/// Indent every line of a driver log by four spaces.
pub fn format_error_log(log: &str) -> String {
    let mut formatted = String::with_capacity(log.len() + 16);
    for line in log.trim_end().lines() {
        if !formatted.is_empty() {
            formatted.push('\n');
        }
        formatted.push_str("    ");
        formatted.push_str(line);
    }
    formatted
}
