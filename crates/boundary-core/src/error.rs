//! Core error types for Boundary.
//!
//! Errors are split by origin. [`CallError`] is the dispatch taxonomy: its
//! [`CallError::Uncaught`] variant is the only one that means the guest
//! itself failed. Every other variant is an invocation-level failure owned by
//! the host side of the boundary.

use std::time::Duration;
use thiserror::Error;

use crate::failure::BoundaryFailure;

/// Top-level error type for Boundary core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Error during engine creation or configuration.
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    /// Error during module loading or validation.
    #[error("Module error: {0}")]
    Module(#[from] ModuleError),

    /// Error while calling into a guest.
    #[error("Call error: {0}")]
    Call(#[from] CallError),
}

/// Errors during engine creation and configuration.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Invalid engine configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The epoch ticker needs epoch interruption enabled on the engine.
    #[error("Epoch interruption is disabled on this engine")]
    EpochsDisabled,

    /// The epoch ticker thread could not be spawned.
    #[error("Failed to spawn epoch ticker: {0}")]
    TickerSpawn(#[from] std::io::Error),

    /// Underlying Wasmtime error.
    #[error("Wasmtime error: {0}")]
    Wasmtime(#[from] wasmtime::Error),
}

/// Errors during module loading and validation.
#[derive(Debug, Error)]
pub enum ModuleError {
    /// The WASM module is invalid or malformed.
    #[error("Invalid WASM module: {0}")]
    Invalid(String),

    /// IO error reading the module.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Instantiation failed, for example because an import is unresolved.
    #[error("Instantiation failed: {0}")]
    Instantiation(String),

    /// Underlying Wasmtime error.
    #[error("Wasmtime error: {0}")]
    Wasmtime(#[from] wasmtime::Error),
}

/// Errors from calling an exported guest function.
#[derive(Debug, Error)]
pub enum CallError {
    /// The guest raised an exception it did not handle.
    #[error(transparent)]
    Uncaught(#[from] BoundaryFailure),

    /// No module has been loaded into the guest.
    #[error("Module not loaded")]
    ModuleNotLoaded,

    /// The requested function is not exported by the module.
    #[error("Function not found: '{0}'")]
    FunctionNotFound(String),

    /// The export exists but its signature does not match the call.
    #[error("Type mismatch calling '{function}': {reason}")]
    TypeMismatch {
        /// The function that was called.
        function: String,
        /// Why the signatures disagree.
        reason: String,
    },

    /// Execution ran out of fuel.
    #[error("Out of fuel: consumed {consumed}, limit was {limit}")]
    OutOfFuel {
        /// Amount of fuel consumed.
        consumed: u64,
        /// The fuel limit that was set.
        limit: u64,
    },

    /// Execution passed its epoch deadline.
    #[error("Execution timeout after {0:?}")]
    Timeout(Duration),

    /// Any other failure to invoke the guest, such as argument marshalling
    /// or a host import that could not complete.
    #[error("Wasmtime error: {0}")]
    Wasmtime(#[from] wasmtime::Error),
}

impl CallError {
    /// Whether this error is an uncaught guest exception.
    pub fn is_uncaught(&self) -> bool {
        matches!(self, Self::Uncaught(_))
    }

    /// Borrow the failure if this is an uncaught guest exception.
    pub fn boundary_failure(&self) -> Option<&BoundaryFailure> {
        match self {
            Self::Uncaught(failure) => Some(failure),
            _ => None,
        }
    }

    /// Split off the failure, handing every other error back unchanged.
    pub fn into_boundary_failure(self) -> std::result::Result<BoundaryFailure, CallError> {
        match self {
            Self::Uncaught(failure) => Ok(failure),
            other => Err(other),
        }
    }
}

/// Result type alias for Boundary core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Result type alias for engine operations.
pub type EngineResult<T> = std::result::Result<T, EngineError>;

/// Result type alias for module operations.
pub type ModuleResult<T> = std::result::Result<T, ModuleError>;

/// Result type alias for guest calls.
pub type CallResult<T> = std::result::Result<T, CallError>;
