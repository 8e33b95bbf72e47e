//! Boundary Core - uncaught WebAssembly exceptions as host-native errors
//!
//! This crate holds the call-dispatch side of the Boundary host and the
//! translator it feeds:
//!
//! - [`translate`] / [`BoundaryFailure`]: the single host-side error kind for
//!   an exception a guest raised and never handled
//! - [`BoundaryEngine`]: the shared Wasmtime engine
//! - [`ModuleLoader`]: compiling and validating guest modules
//! - [`Guest`]: a live guest instance, and the only way into guest code
//! - [`EpochTicker`]: the background thread that makes guest timeouts fire
//!
//! # Outcomes
//!
//! A guest call ends in exactly one of three ways:
//!
//! | outcome | surfaced as |
//! |---------|-------------|
//! | normal return | `Ok(value)` |
//! | invocation failure or host limit | any other [`CallError`] variant |
//! | uncaught guest exception | [`CallError::Uncaught`] holding a [`BoundaryFailure`] |
//!
//! [`CallOutcome`] spells the three cases out for callers that prefer to
//! match on them directly.
//!
//! # Quick Start
//!
//! ```ignore
//! use boundary_core::prelude::*;
//!
//! let engine = BoundaryEngine::default_engine()?.into_shared();
//! let module = ModuleLoader::new(engine.clone()).load_file(Path::new("guest.wasm"))?;
//!
//! let mut guest = GuestBuilder::<()>::new(engine).build()?;
//! guest.load_module(&module)?;
//!
//! if let Err(CallError::Uncaught(failure)) = guest.call_void("main") {
//!     eprintln!("{failure}"); // Uncaught WebAssembly exception: `...`
//! }
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod failure;
pub mod guest;
pub mod module;
pub mod outcome;
pub mod ticker;

pub use config::{EngineConfig, GuestConfig, GuestLimits};
pub use engine::{BoundaryEngine, IntoShared, SharedEngine};
pub use error::{
    CallError, CallResult, CoreError, EngineError, EngineResult, ModuleError, ModuleResult, Result,
};
pub use failure::{BoundaryFailure, FOREIGN_RUNTIME, GuestException, translate};
pub use guest::{CallMetrics, Guest, GuestBuilder, GuestData, GuestId};
pub use module::{
    ExportInfo, ExternKind, ImportInfo, MemoryInfo, ModuleLoader, ModuleMetadata, ValidatedModule,
};
pub use outcome::CallOutcome;
pub use ticker::{DEFAULT_TICK_INTERVAL, EpochTicker};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::config::{EngineConfig, GuestConfig, GuestLimits};
    pub use crate::engine::{BoundaryEngine, IntoShared, SharedEngine};
    pub use crate::error::{CallError, CoreError, ModuleError};
    pub use crate::failure::{BoundaryFailure, translate};
    pub use crate::guest::{Guest, GuestBuilder};
    pub use crate::module::{ModuleLoader, ValidatedModule};
    pub use crate::outcome::CallOutcome;
}

#[cfg(test)]
mod tests {
    use super::prelude::*;
    use std::sync::Arc;

    #[test]
    fn test_end_to_end() {
        let engine = BoundaryEngine::default_engine().unwrap().into_shared();

        let module = ModuleLoader::new(Arc::clone(&engine))
            .load_wat(
                r#"
            (module
                (func (export "checked_double") (param i32) (result i32)
                    (if (i32.lt_s (local.get 0) (i32.const 0))
                        (then unreachable))
                    local.get 0
                    i32.const 2
                    i32.mul
                )
            )
        "#,
            )
            .unwrap();

        let mut guest = GuestBuilder::<()>::new(engine).build().unwrap();
        guest.load_module(&module).unwrap();

        let doubled: i32 = guest.call("checked_double", (21i32,)).unwrap();
        assert_eq!(doubled, 42);

        let err = guest.call::<i32, i32>("checked_double", -1).unwrap_err();
        assert!(matches!(err, CallError::Uncaught(_)));
        assert_eq!(
            err.to_string(),
            "Uncaught WebAssembly exception: `UnreachableCodeReached`"
        );
    }
}
