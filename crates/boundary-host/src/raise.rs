//! The guest exception import.
//!
//! Guests report an exception they cannot handle by calling
//! `env.raise(ptr, len)` with a UTF-8 payload in their exported memory. The
//! import never returns to the guest: it aborts the call with a
//! [`GuestException`], which the dispatch layer turns into a
//! `BoundaryFailure` for the host caller.
//!
//! ```wat
//! (import "env" "raise" (func $raise (param i32 i32)))
//! ```

use boundary_core::GuestException;
use tracing::debug;
use wasmtime::Caller;

use crate::context::IntoHostContext;
use crate::error::HostResult;
use crate::linker::BoundaryLinker;

/// Import module of the exception import.
pub const EXCEPTION_MODULE: &str = "env";

/// Import name of the exception import.
pub const EXCEPTION_IMPORT: &str = "raise";

impl<T: 'static> BoundaryLinker<T> {
    /// Define `env.raise` in this linker.
    ///
    /// A payload that cannot be read (no `memory` export, out-of-bounds
    /// span, invalid UTF-8) fails the call as a host error instead.
    pub fn with_exception_import(&mut self) -> HostResult<&mut Self> {
        self.func_wrap(
            EXCEPTION_MODULE,
            EXCEPTION_IMPORT,
            |caller: Caller<'_, T>, ptr: i32, len: i32| -> wasmtime::Result<()> {
                let payload = caller.into_context().read_str(ptr, len)?;
                debug!(payload_len = payload.len(), "Guest raised an exception");
                Err(wasmtime::Error::new(GuestException::new(payload)))
            },
        )
    }
}
