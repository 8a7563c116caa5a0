//! Backend error types.

/// Errors reported by a [`GpuBackend`](super::GpuBackend).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    /// A shader stage failed to compile. Carries the driver log.
    #[error("shader compilation failed:\n{0}")]
    CompileFailed(String),
    /// A program failed to link. Carries the driver log.
    #[error("program link failed:\n{0}")]
    LinkFailed(String),
    /// A handle did not belong to this backend or was already destroyed.
    #[error("invalid handle: {0}")]
    InvalidHandle(String),
    /// Failed to create a resource.
    #[error("resource creation failed: {0}")]
    ResourceCreationFailed(String),
    /// The requested feature is not supported by this backend.
    #[error("feature not supported: {0}")]
    FeatureNotSupported(String),
    /// Out of GPU memory.
    #[error("out of GPU memory")]
    OutOfMemory,
}
