//! Guest instances and call dispatch.
//!
//! A [`Guest`] is one live instance of the embedded runtime: a Wasmtime
//! store, the linker used to satisfy its imports, and the instantiated
//! module. It is the only place guest code is entered, and the only place
//! an uncaught guest exception is detected and translated.

use std::time::{Duration, Instant};

use tracing::{debug, info, warn};
use uuid::Uuid;
use wasmtime::{Func, FuncType, Instance, Linker, Store, StoreLimits, StoreLimitsBuilder, Val};

use crate::config::{GuestConfig, GuestLimits};
use crate::engine::SharedEngine;
use crate::error::{CallError, CallResult, ModuleError, ModuleResult};
use crate::module::ValidatedModule;
use crate::outcome::{CallBudget, CallOutcome, classify};
use crate::ticker::{DEFAULT_TICK_INTERVAL, epochs_for};

/// Unique identifier for a guest instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GuestId(Uuid);

impl GuestId {
    /// Create a new random guest ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for GuestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for GuestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Data stored in the guest's Wasmtime store.
pub struct GuestData<S = ()> {
    /// Identifier of the owning guest.
    pub id: GuestId,
    /// Embedder state, reachable from host imports.
    pub user_state: S,
    /// Store limits.
    pub limits: StoreLimits,
    /// Call metrics.
    pub metrics: CallMetrics,
    config: GuestConfig,
}

impl<S> GuestData<S> {
    /// Access the user state.
    pub fn state(&self) -> &S {
        &self.user_state
    }

    /// Access the user state mutably.
    pub fn state_mut(&mut self) -> &mut S {
        &mut self.user_state
    }

    /// The limits this guest was created with.
    pub fn guest_limits(&self) -> &GuestLimits {
        &self.config.limits
    }
}

/// Metrics for the most recent call, plus running totals.
#[derive(Debug, Clone, Default)]
pub struct CallMetrics {
    /// When the last call started.
    pub start_time: Option<Instant>,
    /// When the last call ended.
    pub end_time: Option<Instant>,
    /// Fuel consumed by the last call.
    pub fuel_consumed: u64,
    /// Calls made into the guest.
    pub calls: u64,
    /// Calls that ended in an uncaught guest exception.
    pub uncaught: u64,
}

impl CallMetrics {
    /// Duration of the last call.
    pub fn duration(&self) -> Option<Duration> {
        match (self.start_time, self.end_time) {
            (Some(start), Some(end)) => Some(end.duration_since(start)),
            _ => None,
        }
    }
}

/// A live instance of the embedded runtime.
///
/// The guest is live once a module is loaded and stays live until
/// [`Guest::reset`] or drop. Calls made while it is not live fail with
/// [`CallError::ModuleNotLoaded`].
///
/// # Example
///
/// ```ignore
/// let mut guest = GuestBuilder::<()>::new(engine).build()?;
/// guest.load_module(&module)?;
///
/// match guest.call::<(i32, i32), i32>("divide", (1, 0)) {
///     Ok(value) => println!("{value}"),
///     Err(CallError::Uncaught(failure)) => eprintln!("{failure}"),
///     Err(other) => return Err(other.into()),
/// }
/// ```
pub struct Guest<S = ()> {
    engine: SharedEngine,
    store: Store<GuestData<S>>,
    linker: Linker<GuestData<S>>,
    instance: Option<Instance>,
    module: Option<ValidatedModule>,
}

impl<S: Send + 'static> Guest<S> {
    /// Create a guest with an empty linker.
    pub fn new(engine: SharedEngine, user_state: S, config: GuestConfig) -> CallResult<Self> {
        let linker = Linker::new(engine.inner());
        Self::with_linker(engine, user_state, config, linker)
    }

    /// Create a guest whose imports are resolved by `linker`.
    pub fn with_linker(
        engine: SharedEngine,
        user_state: S,
        config: GuestConfig,
        linker: Linker<GuestData<S>>,
    ) -> CallResult<Self> {
        let data = GuestData {
            id: GuestId::new(),
            user_state,
            limits: store_limits(&config.limits),
            metrics: CallMetrics::default(),
            config,
        };
        let store = new_store(&engine, data)?;

        debug!(guest_id = %store.data().id, "Created guest");

        Ok(Self {
            engine,
            store,
            linker,
            instance: None,
            module: None,
        })
    }

    /// Get the guest ID.
    pub fn id(&self) -> GuestId {
        self.store.data().id
    }

    /// Get a reference to the engine.
    pub fn engine(&self) -> &SharedEngine {
        &self.engine
    }

    /// Access the user state.
    pub fn state(&self) -> &S {
        &self.store.data().user_state
    }

    /// Access the user state mutably.
    pub fn state_mut(&mut self) -> &mut S {
        &mut self.store.data_mut().user_state
    }

    /// Get the call metrics.
    pub fn metrics(&self) -> &CallMetrics {
        &self.store.data().metrics
    }

    /// Get a mutable reference to the linker, for registering imports
    /// before a module is loaded.
    pub fn linker_mut(&mut self) -> &mut Linker<GuestData<S>> {
        &mut self.linker
    }

    /// Instantiate a module, bringing the guest live.
    ///
    /// A start function that traps fails instantiation; it is reported as a
    /// module error, not as a call outcome.
    pub fn load_module(&mut self, module: &ValidatedModule) -> ModuleResult<()> {
        debug!(
            guest_id = %self.id(),
            module_name = ?module.name(),
            "Instantiating module"
        );

        let instance = self
            .linker
            .instantiate(&mut self.store, module.inner())
            .map_err(|e| ModuleError::Instantiation(format!("{e:#}")))?;

        self.instance = Some(instance);
        self.module = Some(module.clone());

        info!(
            guest_id = %self.id(),
            module_name = ?module.name(),
            "Guest is live"
        );

        Ok(())
    }

    /// Whether a module is instantiated and callable.
    pub fn is_live(&self) -> bool {
        self.instance.is_some()
    }

    /// Get the loaded module, if any.
    pub fn loaded_module(&self) -> Option<&ValidatedModule> {
        self.module.as_ref()
    }

    /// Call an exported function with no arguments and no results.
    pub fn call_void(&mut self, name: &str) -> CallResult<()> {
        self.call::<(), ()>(name, ())
    }

    /// Call an exported function with static types.
    ///
    /// # Errors
    ///
    /// - [`CallError::FunctionNotFound`] if there is no such export.
    /// - [`CallError::TypeMismatch`] if the export's signature differs from `P -> R`.
    /// - [`CallError::Uncaught`] if the guest raised an exception it did not handle.
    /// - Other variants for host limits and invocation failures.
    pub fn call<P, R>(&mut self, name: &str, params: P) -> CallResult<R>
    where
        P: wasmtime::WasmParams,
        R: wasmtime::WasmResults,
    {
        let func = self.export(name)?;
        let typed = func
            .typed::<P, R>(&self.store)
            .map_err(|e| CallError::TypeMismatch {
                function: name.to_string(),
                reason: e.to_string(),
            })?;

        let initial_fuel = self.begin_call(name);
        let result = typed.call(&mut self.store, params);
        self.finish_call(name, initial_fuel, result)
    }

    /// Call an exported function and return an explicit [`CallOutcome`].
    pub fn call_outcome<P, R>(&mut self, name: &str, params: P) -> CallOutcome<R>
    where
        P: wasmtime::WasmParams,
        R: wasmtime::WasmResults,
    {
        self.call(name, params).into()
    }

    /// Call an exported function with dynamically typed values.
    pub fn call_dynamic(&mut self, name: &str, params: &[Val]) -> CallResult<Vec<Val>> {
        let func = self.export(name)?;
        let func_type = func.ty(&self.store);
        if func_type.params().len() != params.len() {
            return Err(CallError::TypeMismatch {
                function: name.to_string(),
                reason: format!(
                    "expected {} arguments, got {}",
                    func_type.params().len(),
                    params.len()
                ),
            });
        }

        let mut results = vec![Val::I32(0); func_type.results().len()];

        let initial_fuel = self.begin_call(name);
        let result = func.call(&mut self.store, params, &mut results);
        self.finish_call(name, initial_fuel, result.map(|()| results))
    }

    /// Signature of an exported function, if it exists.
    pub fn func_type(&mut self, name: &str) -> Option<FuncType> {
        let instance = self.instance.as_ref()?;
        let func = instance.get_func(&mut self.store, name)?;
        Some(func.ty(&self.store))
    }

    /// Remaining fuel, when fuel metering is on.
    pub fn remaining_fuel(&self) -> Option<u64> {
        if self.engine.fuel_enabled() {
            self.store.get_fuel().ok()
        } else {
            None
        }
    }

    /// Top up the guest's fuel.
    pub fn add_fuel(&mut self, fuel: u64) -> CallResult<()> {
        if self.engine.fuel_enabled() {
            let current = self.store.get_fuel()?;
            self.store.set_fuel(current.saturating_add(fuel))?;
            debug!(guest_id = %self.id(), added = fuel, "Added fuel");
        }
        Ok(())
    }

    /// Tear down the instance together with its store.
    ///
    /// The returned guest keeps its id, state and registered imports, has
    /// its initial fuel and limits back, and is not live until a module is
    /// loaded again.
    pub fn reset(self) -> CallResult<Self> {
        let Self {
            engine,
            store,
            linker,
            ..
        } = self;

        let mut data = store.into_data();
        data.limits = store_limits(&data.config.limits);
        data.metrics = CallMetrics::default();
        let store = new_store(&engine, data)?;

        debug!(guest_id = %store.data().id, "Guest reset");

        Ok(Self {
            engine,
            store,
            linker,
            instance: None,
            module: None,
        })
    }

    fn export(&mut self, name: &str) -> CallResult<Func> {
        let instance = self.instance.as_ref().ok_or(CallError::ModuleNotLoaded)?;
        instance
            .get_func(&mut self.store, name)
            .ok_or_else(|| CallError::FunctionNotFound(name.to_string()))
    }

    fn begin_call(&mut self, name: &str) -> u64 {
        let initial_fuel = self.remaining_fuel().unwrap_or(0);

        if self.engine.epoch_enabled() {
            let timeout = self.store.data().config.limits.timeout;
            self.store
                .set_epoch_deadline(epochs_for(timeout, DEFAULT_TICK_INTERVAL));
        }

        let data = self.store.data_mut();
        if data.config.collect_metrics {
            data.metrics.start_time = Some(Instant::now());
            data.metrics.end_time = None;
        }
        data.metrics.calls += 1;

        debug!(guest_id = %data.id, function = name, "Calling guest function");
        initial_fuel
    }

    fn finish_call<T>(
        &mut self,
        name: &str,
        initial_fuel: u64,
        result: wasmtime::Result<T>,
    ) -> CallResult<T> {
        let remaining_fuel = self.remaining_fuel().unwrap_or(0);
        let data = self.store.data_mut();
        if data.config.collect_metrics {
            data.metrics.end_time = Some(Instant::now());
        }
        data.metrics.fuel_consumed = initial_fuel.saturating_sub(remaining_fuel);

        let err = match result {
            Ok(value) => {
                debug!(
                    guest_id = %data.id,
                    function = name,
                    duration = ?data.metrics.duration(),
                    "Guest function returned"
                );
                return Ok(value);
            }
            Err(err) => err,
        };

        let budget = CallBudget {
            fuel_consumed: data.metrics.fuel_consumed,
            fuel_limit: data.config.limits.initial_fuel,
            timeout: data.config.limits.timeout,
        };

        let classified = classify(err, budget);
        match &classified {
            CallError::Uncaught(failure) => {
                data.metrics.uncaught += 1;
                warn!(
                    guest_id = %data.id,
                    function = name,
                    diagnostic = failure.diagnostic(),
                    "Uncaught guest exception"
                );
            }
            other => {
                warn!(
                    guest_id = %data.id,
                    function = name,
                    error = %other,
                    "Guest call failed"
                );
            }
        }

        Err(classified)
    }
}

impl<S> Drop for GuestData<S> {
    fn drop(&mut self) {
        debug!(guest_id = %self.id, "Tearing down guest");
    }
}

fn store_limits(limits: &GuestLimits) -> StoreLimits {
    StoreLimitsBuilder::new()
        .memory_size(limits.max_memory_bytes)
        .table_elements(limits.max_table_elements as usize)
        .instances(1)
        .memories(limits.max_memories as usize)
        .build()
}

/// A store with fuel and epoch deadline set from the guest's limits.
fn new_store<S: Send + 'static>(
    engine: &SharedEngine,
    data: GuestData<S>,
) -> CallResult<Store<GuestData<S>>> {
    let initial_fuel = data.config.limits.initial_fuel;
    let timeout = data.config.limits.timeout;

    let mut store = Store::new(engine.inner(), data);
    store.limiter(|data| &mut data.limits);

    if engine.fuel_enabled() {
        store.set_fuel(initial_fuel)?;
    }

    if engine.epoch_enabled() {
        store.epoch_deadline_trap();
        store.set_epoch_deadline(epochs_for(timeout, DEFAULT_TICK_INTERVAL));
    }

    Ok(store)
}

impl<S: Send + 'static> std::fmt::Debug for Guest<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Guest")
            .field("id", &self.id())
            .field("live", &self.is_live())
            .field("metrics", self.metrics())
            .finish()
    }
}

/// Builder for guests with custom configuration.
pub struct GuestBuilder<S = ()> {
    engine: SharedEngine,
    user_state: Option<S>,
    config: GuestConfig,
}

impl<S: Send + 'static> GuestBuilder<S> {
    /// Create a new guest builder.
    pub fn new(engine: SharedEngine) -> Self {
        Self {
            engine,
            user_state: None,
            config: GuestConfig::default(),
        }
    }

    /// Set the user state.
    pub fn with_state(mut self, state: S) -> Self {
        self.user_state = Some(state);
        self
    }

    /// Set the guest configuration.
    pub fn with_config(mut self, config: GuestConfig) -> Self {
        self.config = config;
        self
    }

    /// Set resource limits.
    pub fn with_limits(mut self, limits: GuestLimits) -> Self {
        self.config.limits = limits;
        self
    }

    /// Set the memory limit.
    pub fn with_memory_limit(mut self, bytes: usize) -> Self {
        self.config.limits.max_memory_bytes = bytes;
        self
    }

    /// Set the fuel limit.
    pub fn with_fuel_limit(mut self, fuel: u64) -> Self {
        self.config.limits.initial_fuel = fuel;
        self
    }

    /// Set the call timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.config.limits.timeout = timeout;
        self
    }

    /// Build the guest with an empty linker.
    pub fn build(self) -> CallResult<Guest<S>>
    where
        S: Default,
    {
        let state = self.user_state.unwrap_or_default();
        Guest::new(self.engine, state, self.config)
    }

    /// Build the guest with a prepared linker.
    pub fn build_with_linker(self, linker: Linker<GuestData<S>>) -> CallResult<Guest<S>>
    where
        S: Default,
    {
        let state = self.user_state.unwrap_or_default();
        Guest::with_linker(self.engine, state, self.config, linker)
    }
}
