//! Boundary Host Imports
//!
//! Host-side plumbing for guests running under Boundary:
//!
//! - [`BoundaryLinker`]: a Wasmtime linker that tracks what it defines
//! - [`HostContext`]: bounds-checked access to guest memory from an import
//! - the `env.raise` exception import, installed with
//!   [`BoundaryLinker::with_exception_import`]
//!
//! # Raising from a guest
//!
//! ```ignore
//! let mut linker = BoundaryLinker::<GuestData<()>>::new(engine.inner());
//! linker.with_exception_import()?;
//!
//! let mut guest = Guest::with_linker(engine, (), GuestConfig::default(), linker.into_inner())?;
//! guest.load_module(&module)?;
//!
//! // guest calls env.raise("Not_found")
//! let err = guest.call_void("main").unwrap_err();
//! assert_eq!(err.to_string(), "Uncaught WebAssembly exception: `Not_found`");
//! ```

pub mod context;
pub mod error;
pub mod linker;
pub mod raise;

pub use context::{HostContext, IntoHostContext};
pub use error::{HostError, HostResult};
pub use linker::{BoundaryLinker, RegisteredFunction};
pub use raise::{EXCEPTION_IMPORT, EXCEPTION_MODULE};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::context::{HostContext, IntoHostContext};
    pub use crate::error::{HostError, HostResult};
    pub use crate::linker::BoundaryLinker;
    pub use crate::raise::{EXCEPTION_IMPORT, EXCEPTION_MODULE};
}
