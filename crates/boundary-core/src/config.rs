//! Configuration types for the Boundary runtime.
//!
//! [`EngineConfig`] shapes the shared Wasmtime engine; [`GuestConfig`] and
//! [`GuestLimits`] bound each guest instance.

use std::time::Duration;

/// Configuration for the Boundary engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Enable fuel-based CPU limiting.
    ///
    /// Guests that exhaust their fuel fail with an out-of-fuel error rather
    /// than an uncaught exception.
    pub fuel_enabled: bool,

    /// Enable epoch-based interruption, which backs guest timeouts.
    pub epoch_enabled: bool,

    /// Maximum WASM stack size in bytes.
    ///
    /// Defaults to 1MB. Guests that overflow it trap with `StackOverflow`.
    pub max_wasm_stack: usize,

    /// Enable debug information in compiled code.
    pub debug_info: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            fuel_enabled: true,
            epoch_enabled: true,
            max_wasm_stack: 1024 * 1024, // 1MB
            debug_info: false,
        }
    }
}

impl EngineConfig {
    /// Create a new engine configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable fuel-based CPU limiting.
    pub fn with_fuel(mut self, enabled: bool) -> Self {
        self.fuel_enabled = enabled;
        self
    }

    /// Enable epoch-based interruption.
    pub fn with_epochs(mut self, enabled: bool) -> Self {
        self.epoch_enabled = enabled;
        self
    }

    /// Set the maximum WASM stack size.
    pub fn with_max_wasm_stack(mut self, bytes: usize) -> Self {
        self.max_wasm_stack = bytes;
        self
    }

    /// Enable debug information.
    pub fn with_debug_info(mut self, enabled: bool) -> Self {
        self.debug_info = enabled;
        self
    }

    /// Conservative settings: every limit on, a smaller stack.
    pub fn secure() -> Self {
        Self {
            fuel_enabled: true,
            epoch_enabled: true,
            max_wasm_stack: 512 * 1024, // 512KB
            debug_info: false,
        }
    }

    /// Throughput settings: no fuel metering, a larger stack.
    pub fn performance() -> Self {
        Self {
            fuel_enabled: false,
            epoch_enabled: true,
            max_wasm_stack: 2 * 1024 * 1024, // 2MB
            debug_info: false,
        }
    }
}

/// Configuration for a single guest instance.
#[derive(Debug, Clone)]
pub struct GuestConfig {
    /// Resource limits for this guest.
    pub limits: GuestLimits,

    /// Whether to record per-call metrics.
    pub collect_metrics: bool,
}

impl Default for GuestConfig {
    fn default() -> Self {
        Self {
            limits: GuestLimits::default(),
            collect_metrics: true,
        }
    }
}

impl GuestConfig {
    /// Create a new guest configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set resource limits.
    pub fn with_limits(mut self, limits: GuestLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Enable or disable metrics collection.
    pub fn with_metrics(mut self, enabled: bool) -> Self {
        self.collect_metrics = enabled;
        self
    }
}

/// Resource limits applied to a guest's store.
#[derive(Debug, Clone)]
pub struct GuestLimits {
    /// Maximum linear memory in bytes. Defaults to 64MB.
    pub max_memory_bytes: usize,

    /// Maximum number of memory instances. Defaults to 1.
    pub max_memories: u32,

    /// Maximum table elements. Defaults to 10,000.
    pub max_table_elements: u32,

    /// Fuel granted to the guest. Defaults to 1 billion units.
    pub initial_fuel: u64,

    /// Wall-clock budget for a call. Defaults to 30 seconds.
    pub timeout: Duration,
}

impl Default for GuestLimits {
    fn default() -> Self {
        Self {
            max_memory_bytes: 64 * 1024 * 1024, // 64MB
            max_memories: 1,
            max_table_elements: 10_000,
            initial_fuel: 1_000_000_000,
            timeout: Duration::from_secs(30),
        }
    }
}

impl GuestLimits {
    /// Create guest limits with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum memory limit.
    pub fn with_max_memory(mut self, bytes: usize) -> Self {
        self.max_memory_bytes = bytes;
        self
    }

    /// Set the initial fuel allocation.
    pub fn with_fuel(mut self, fuel: u64) -> Self {
        self.initial_fuel = fuel;
        self
    }

    /// Set the call timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Small limits, mostly useful in tests.
    pub fn minimal() -> Self {
        Self {
            max_memory_bytes: 1024 * 1024, // 1MB
            max_memories: 1,
            max_table_elements: 1_000,
            initial_fuel: 10_000,
            timeout: Duration::from_secs(1),
        }
    }

    /// Limits for typical workloads.
    pub fn standard() -> Self {
        Self::default()
    }

    /// Large limits for compute-heavy guests.
    pub fn generous() -> Self {
        Self {
            max_memory_bytes: 256 * 1024 * 1024, // 256MB
            max_memories: 4,
            max_table_elements: 100_000,
            initial_fuel: 10_000_000_000,
            timeout: Duration::from_secs(300),
        }
    }
}
