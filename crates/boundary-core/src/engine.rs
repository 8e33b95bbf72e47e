//! Wasmtime engine wrapper for Boundary.
//!
//! [`BoundaryEngine`] configures the underlying Wasmtime engine and owns the
//! epoch counter that guest timeouts are measured against.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{info, trace};
use wasmtime::{Config, Engine};

use crate::config::EngineConfig;
use crate::error::EngineResult;

/// The shared engine every guest is compiled and run with.
///
/// # Example
///
/// ```
/// use boundary_core::{BoundaryEngine, EngineConfig};
///
/// let engine = BoundaryEngine::new(EngineConfig::default()).unwrap();
/// assert!(engine.fuel_enabled());
/// ```
pub struct BoundaryEngine {
    inner: Engine,
    config: EngineConfig,
    /// Epochs elapsed since the engine was created.
    epoch: RwLock<u64>,
}

impl BoundaryEngine {
    /// Create a new engine with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if Wasmtime rejects the configuration.
    pub fn new(config: EngineConfig) -> EngineResult<Self> {
        let mut wasmtime_config = Config::new();

        wasmtime_config.consume_fuel(config.fuel_enabled);
        wasmtime_config.epoch_interruption(config.epoch_enabled);
        wasmtime_config.max_wasm_stack(config.max_wasm_stack);
        wasmtime_config.debug_info(config.debug_info);

        let inner = Engine::new(&wasmtime_config)?;

        info!(
            fuel = config.fuel_enabled,
            epochs = config.epoch_enabled,
            max_wasm_stack = config.max_wasm_stack,
            "Created Boundary engine"
        );

        Ok(Self {
            inner,
            config,
            epoch: RwLock::new(0),
        })
    }

    /// Create a new engine with default configuration.
    pub fn default_engine() -> EngineResult<Self> {
        Self::new(EngineConfig::default())
    }

    /// Get a reference to the underlying Wasmtime engine.
    pub fn inner(&self) -> &Engine {
        &self.inner
    }

    /// Get the configuration used to create this engine.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Advance the epoch by one tick. No-op when epochs are disabled.
    pub fn increment_epoch(&self) {
        if self.config.epoch_enabled {
            let mut epoch = self.epoch.write();
            *epoch += 1;
            self.inner.increment_epoch();
            trace!(epoch = *epoch, "Incremented engine epoch");
        }
    }

    /// Get the current epoch value.
    pub fn current_epoch(&self) -> u64 {
        *self.epoch.read()
    }

    /// Check if fuel-based limiting is enabled.
    pub fn fuel_enabled(&self) -> bool {
        self.config.fuel_enabled
    }

    /// Check if epoch-based interruption is enabled.
    pub fn epoch_enabled(&self) -> bool {
        self.config.epoch_enabled
    }
}

impl std::fmt::Debug for BoundaryEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundaryEngine")
            .field("config", &self.config)
            .field("epoch", &*self.epoch.read())
            .finish()
    }
}

/// A shared reference to a Boundary engine.
pub type SharedEngine = Arc<BoundaryEngine>;

/// Extension trait for creating shared engines.
pub trait IntoShared {
    /// Convert into a shared engine reference.
    fn into_shared(self) -> SharedEngine;
}

impl IntoShared for BoundaryEngine {
    fn into_shared(self) -> SharedEngine {
        Arc::new(self)
    }
}
