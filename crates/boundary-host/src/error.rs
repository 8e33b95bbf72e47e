//! Error types for host imports.

use thiserror::Error;

/// Errors raised while registering or servicing host imports.
///
/// These are failures of the host side of the boundary. When one escapes a
/// host import it aborts the guest call as an invocation failure, never as
/// an uncaught guest exception.
#[derive(Debug, Error)]
pub enum HostError {
    /// The guest does not export a linear memory named `memory`.
    #[error("Memory export 'memory' not found")]
    MemoryNotFound,

    /// Memory access out of bounds.
    #[error("Memory access out of bounds: offset={offset}, len={len}, memory_size={memory_size}")]
    MemoryAccessOutOfBounds {
        /// The offset attempted.
        offset: usize,
        /// The length attempted.
        len: usize,
        /// The actual memory size.
        memory_size: usize,
    },

    /// Guest bytes were not valid UTF-8.
    #[error("Invalid UTF-8: {0}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),

    /// Function registration failed.
    #[error("Failed to register function '{module}::{name}': {reason}")]
    RegistrationFailed {
        /// The module name.
        module: String,
        /// The function name.
        name: String,
        /// The reason for failure.
        reason: String,
    },

    /// Function already registered.
    #[error("Function already registered: {module}::{name}")]
    AlreadyRegistered {
        /// The module name.
        module: String,
        /// The function name.
        name: String,
    },
}

/// Result type for host operations.
pub type HostResult<T> = std::result::Result<T, HostError>;
