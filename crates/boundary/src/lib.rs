//! # Boundary - uncaught WebAssembly exceptions as Rust errors
//!
//! Boundary embeds WebAssembly guests and guarantees one thing about how
//! they fail: when a guest raises an exception it never handles, the host
//! caller receives a single, plain Rust error,
//! [`BoundaryFailure`], whose message reads
//! ``Uncaught WebAssembly exception: `<diagnostic>` ``.
//! Failures of the binding itself (missing exports, signature mismatches,
//! fuel or time limits) stay distinct [`CallError`] variants.
//!
//! ## Quick Start
//!
//! ```ignore
//! use boundary::prelude::*;
//!
//! let runtime = Boundary::builder()
//!     .with_fuel_limit(1_000_000_000)
//!     .with_timeout(Duration::from_secs(5))
//!     .build()?;
//!
//! let module = runtime.load_file("guest.wasm")?;
//! let mut guest = runtime.guest().build()?;
//! guest.load_module(&module)?;
//!
//! match guest.call::<(i32, i32), i32>("divide", (1, 0)) {
//!     Ok(value) => println!("{value}"),
//!     Err(CallError::Uncaught(failure)) => eprintln!("{failure}"),
//!     Err(other) => return Err(other.into()),
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────┐
//! │                Your Application               │
//! ├───────────────────────────────────────────────┤
//! │               boundary (facade)               │
//! ├───────────────────────┬───────────────────────┤
//! │ boundary-core         │ boundary-host         │
//! │ (engine, guests,      │ (linker, env.raise,   │
//! │  translation)         │  guest memory)        │
//! ├───────────────────────┴───────────────────────┤
//! │                   Wasmtime                    │
//! └───────────────────────────────────────────────┘
//! ```

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use boundary_core::{
    BoundaryEngine, CallError, EngineConfig, EpochTicker, Guest, GuestConfig, GuestData,
    GuestLimits, ModuleLoader, SharedEngine, ValidatedModule,
};
use boundary_host::BoundaryLinker;
use tracing::debug;

pub use boundary_core;
pub use boundary_core::{BoundaryFailure, CallOutcome, FOREIGN_RUNTIME, translate};
pub use boundary_host;

/// Main entry point for Boundary.
pub struct Boundary;

impl Boundary {
    /// Create a new runtime builder.
    pub fn builder() -> BoundaryBuilder {
        BoundaryBuilder::new()
    }

    /// Create a runtime with default configuration.
    pub fn with_defaults() -> Result<BoundaryRuntime, BoundaryError> {
        BoundaryBuilder::new().build()
    }
}

/// Builder for configuring a [`BoundaryRuntime`].
#[derive(Debug, Clone)]
pub struct BoundaryBuilder {
    engine_config: EngineConfig,
    limits: GuestLimits,
    tick_interval: Duration,
}

impl Default for BoundaryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl BoundaryBuilder {
    /// Create a new builder with default configuration.
    pub fn new() -> Self {
        Self {
            engine_config: EngineConfig::default(),
            limits: GuestLimits::default(),
            tick_interval: boundary_core::DEFAULT_TICK_INTERVAL,
        }
    }

    /// Replace the engine configuration.
    pub fn with_engine_config(mut self, config: EngineConfig) -> Self {
        self.engine_config = config;
        self
    }

    /// Enable or disable fuel metering.
    pub fn with_fuel(mut self, enabled: bool) -> Self {
        self.engine_config.fuel_enabled = enabled;
        self
    }

    /// Enable or disable epoch-based timeouts.
    pub fn with_epochs(mut self, enabled: bool) -> Self {
        self.engine_config.epoch_enabled = enabled;
        self
    }

    /// Set the maximum memory limit in bytes.
    pub fn with_memory_limit(mut self, bytes: usize) -> Self {
        self.limits.max_memory_bytes = bytes;
        self
    }

    /// Set the initial fuel limit.
    pub fn with_fuel_limit(mut self, fuel: u64) -> Self {
        self.limits.initial_fuel = fuel;
        self
    }

    /// Set the call timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.limits.timeout = timeout;
        self
    }

    /// Set default guest limits.
    pub fn with_limits(mut self, limits: GuestLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Build the runtime, starting the epoch ticker when epochs are enabled.
    pub fn build(self) -> Result<BoundaryRuntime, BoundaryError> {
        let engine = Arc::new(BoundaryEngine::new(self.engine_config)?);

        let ticker = if engine.epoch_enabled() {
            Some(EpochTicker::spawn(Arc::clone(&engine), self.tick_interval)?)
        } else {
            None
        };

        Ok(BoundaryRuntime {
            engine,
            default_limits: self.limits,
            ticker,
        })
    }
}

/// A configured runtime: shared engine, default limits, and the ticker that
/// drives guest timeouts.
///
/// Dropping the runtime stops the ticker. Guests keep the engine alive on
/// their own, but their timeouts stop advancing once the runtime is gone.
pub struct BoundaryRuntime {
    engine: SharedEngine,
    default_limits: GuestLimits,
    ticker: Option<EpochTicker>,
}

impl BoundaryRuntime {
    /// Get the shared engine.
    pub fn engine(&self) -> &SharedEngine {
        &self.engine
    }

    /// Get the default guest limits.
    pub fn default_limits(&self) -> &GuestLimits {
        &self.default_limits
    }

    /// Get the epoch ticker, if epochs are enabled.
    pub fn ticker(&self) -> Option<&EpochTicker> {
        self.ticker.as_ref()
    }

    /// Create a module loader.
    pub fn loader(&self) -> ModuleLoader {
        ModuleLoader::new(Arc::clone(&self.engine))
    }

    /// Load a module from bytes.
    pub fn load_bytes(&self, bytes: &[u8]) -> Result<ValidatedModule, BoundaryError> {
        Ok(self.loader().load_bytes(bytes)?)
    }

    /// Load a module from a file.
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<ValidatedModule, BoundaryError> {
        Ok(self.loader().load_file(path.as_ref())?)
    }

    /// Load a module from WAT text format.
    pub fn load_wat(&self, wat: &str) -> Result<ValidatedModule, BoundaryError> {
        Ok(self.loader().load_wat(wat)?)
    }

    /// Create a guest builder with this runtime's defaults.
    pub fn guest(&self) -> RuntimeGuestBuilder<'_> {
        RuntimeGuestBuilder::new(self)
    }

    /// Instantiate `module` in a fresh guest and call `function` with no
    /// arguments.
    pub fn execute<R: wasmtime::WasmResults>(
        &self,
        module: &ValidatedModule,
        function: &str,
    ) -> Result<R, BoundaryError> {
        let mut guest = self.guest().build()?;
        guest.load_module(module)?;
        Ok(guest.call(function, ())?)
    }
}

impl std::fmt::Debug for BoundaryRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundaryRuntime")
            .field("engine", &self.engine)
            .field("default_limits", &self.default_limits)
            .field("ticker", &self.ticker)
            .finish()
    }
}

/// Builder for guests created from a runtime.
///
/// Every guest it builds has the `env.raise` exception import defined.
pub struct RuntimeGuestBuilder<'a> {
    runtime: &'a BoundaryRuntime,
    limits: GuestLimits,
    collect_metrics: bool,
}

impl<'a> RuntimeGuestBuilder<'a> {
    fn new(runtime: &'a BoundaryRuntime) -> Self {
        Self {
            runtime,
            limits: runtime.default_limits.clone(),
            collect_metrics: true,
        }
    }

    /// Override resource limits.
    pub fn with_limits(mut self, limits: GuestLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Override memory limit.
    pub fn with_memory_limit(mut self, bytes: usize) -> Self {
        self.limits.max_memory_bytes = bytes;
        self
    }

    /// Override fuel limit.
    pub fn with_fuel_limit(mut self, fuel: u64) -> Self {
        self.limits.initial_fuel = fuel;
        self
    }

    /// Override the call timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.limits.timeout = timeout;
        self
    }

    /// Enable or disable per-call metrics.
    pub fn with_metrics(mut self, enabled: bool) -> Self {
        self.collect_metrics = enabled;
        self
    }

    /// Build the guest.
    pub fn build(self) -> Result<Guest<()>, BoundaryError> {
        self.build_with_state(())
    }

    /// Build the guest with custom state.
    pub fn build_with_state<S: Send + 'static>(self, state: S) -> Result<Guest<S>, BoundaryError> {
        let engine = Arc::clone(&self.runtime.engine);

        let mut linker = BoundaryLinker::<GuestData<S>>::new(engine.inner());
        linker.with_exception_import()?;
        debug!(
            imports = linker.registered_functions().len(),
            "Prepared guest imports"
        );

        let config = GuestConfig::default()
            .with_limits(self.limits)
            .with_metrics(self.collect_metrics);

        Ok(Guest::with_linker(engine, state, config, linker.into_inner())?)
    }
}

/// Errors from the Boundary runtime.
#[derive(Debug, thiserror::Error)]
pub enum BoundaryError {
    /// Engine error.
    #[error("Engine error: {0}")]
    Engine(#[from] boundary_core::EngineError),

    /// Module error.
    #[error("Module error: {0}")]
    Module(#[from] boundary_core::ModuleError),

    /// Guest call error, including uncaught guest exceptions.
    #[error(transparent)]
    Call(#[from] CallError),

    /// Host import error.
    #[error("Host error: {0}")]
    Host(#[from] boundary_host::HostError),
}

impl BoundaryError {
    /// Borrow the failure if this error is an uncaught guest exception.
    pub fn boundary_failure(&self) -> Option<&BoundaryFailure> {
        match self {
            Self::Call(err) => err.boundary_failure(),
            _ => None,
        }
    }
}

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::{Boundary, BoundaryBuilder, BoundaryError, BoundaryRuntime};

    pub use boundary_core::{
        BoundaryEngine, BoundaryFailure, CallError, CallOutcome, EngineConfig, Guest,
        GuestConfig, GuestLimits, ModuleLoader, ValidatedModule, translate,
    };

    pub use boundary_host::{BoundaryLinker, EXCEPTION_IMPORT, EXCEPTION_MODULE};

    pub use std::sync::Arc;
    pub use std::time::Duration;
}

#[cfg(test)]
mod tests {
    use super::*;

    const GUEST: &str = r#"
        (module
            (import "env" "raise" (func $raise (param i32 i32)))
            (memory (export "memory") 1)
            (data (i32.const 0) "Not_found")

            (func (export "answer") (result i32)
                i32.const 42
            )
            (func (export "lookup") (param i32) (result i32)
                (if (i32.ne (local.get 0) (i32.const 7))
                    (then (call $raise (i32.const 0) (i32.const 9))))
                i32.const 700
            )
            (func (export "spin")
                (loop $loop (br $loop))
            )
        )
    "#;

    #[test]
    fn test_builder() {
        let runtime = Boundary::builder()
            .with_memory_limit(32 * 1024 * 1024)
            .with_fuel_limit(100_000)
            .with_timeout(Duration::from_secs(5))
            .build()
            .unwrap();

        assert_eq!(runtime.default_limits().max_memory_bytes, 32 * 1024 * 1024);
        assert_eq!(runtime.default_limits().initial_fuel, 100_000);
        assert!(runtime.ticker().unwrap().is_running());
    }

    #[test]
    fn test_without_epochs_has_no_ticker() {
        let runtime = Boundary::builder().with_epochs(false).build().unwrap();
        assert!(runtime.ticker().is_none());
    }

    #[test]
    fn test_returned_and_uncaught() {
        let runtime = Boundary::with_defaults().unwrap();
        let module = runtime.load_wat(GUEST).unwrap();

        let mut guest = runtime.guest().build().unwrap();
        guest.load_module(&module).unwrap();

        let found: i32 = guest.call("lookup", (7i32,)).unwrap();
        assert_eq!(found, 700);

        match guest.call_outcome::<i32, i32>("lookup", 3) {
            CallOutcome::Uncaught(failure) => assert_eq!(
                failure.to_string(),
                "Uncaught WebAssembly exception: `Not_found`"
            ),
            other => panic!("expected uncaught exception, got {other:?}"),
        }
    }

    #[test]
    fn test_execute() {
        let runtime = Boundary::with_defaults().unwrap();
        let module = runtime.load_wat(GUEST).unwrap();

        let answer: i32 = runtime.execute(&module, "answer").unwrap();
        assert_eq!(answer, 42);

        let err = runtime.execute::<()>(&module, "missing").unwrap_err();
        assert!(err.boundary_failure().is_none());
        assert!(matches!(
            err,
            BoundaryError::Call(CallError::FunctionNotFound(_))
        ));
    }

    #[test]
    fn test_error_display_is_transparent_for_calls() {
        let err = BoundaryError::from(CallError::from(translate("Exit")));
        assert_eq!(err.to_string(), "Uncaught WebAssembly exception: `Exit`");
        assert_eq!(err.boundary_failure().unwrap().diagnostic(), "Exit");
    }

    #[test]
    fn test_guest_overrides() {
        let runtime = Boundary::builder().with_fuel_limit(1_000_000).build().unwrap();

        let guest = runtime
            .guest()
            .with_fuel_limit(500_000)
            .with_memory_limit(16 * 1024 * 1024)
            .build()
            .unwrap();

        assert_eq!(guest.remaining_fuel(), Some(500_000));
    }

    #[test]
    fn test_runtime_timeout() {
        let runtime = Boundary::builder()
            .with_fuel(false)
            .with_timeout(Duration::from_millis(50))
            .build()
            .unwrap();
        let module = runtime.load_wat(GUEST).unwrap();

        let mut guest = runtime.guest().build().unwrap();
        guest.load_module(&module).unwrap();

        let err = guest.call_void("spin").unwrap_err();
        assert!(matches!(err, CallError::Timeout(_)));
    }

    #[test]
    fn test_guest_with_state() {
        let runtime = Boundary::with_defaults().unwrap();
        let mut guest = runtime.guest().build_with_state(vec![1u8, 2, 3]).unwrap();

        guest.state_mut().push(4);
        assert_eq!(guest.state(), &vec![1, 2, 3, 4]);
    }
}
