//! Linker wrapper that keeps track of registered host imports.

use tracing::{debug, info};
use wasmtime::{Engine, Linker};

use crate::error::{HostError, HostResult};

/// A host import registered with a [`BoundaryLinker`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisteredFunction {
    /// The import module name.
    pub module: String,
    /// The function name.
    pub name: String,
}

/// Wasmtime `Linker` plus a registry of what has been defined in it.
///
/// Registering the same `module::name` twice is an error rather than a
/// silent shadow.
pub struct BoundaryLinker<T> {
    inner: Linker<T>,
    registered: Vec<RegisteredFunction>,
}

impl<T: 'static> BoundaryLinker<T> {
    /// Create a new linker for the given engine.
    pub fn new(engine: &Engine) -> Self {
        Self {
            inner: Linker::new(engine),
            registered: Vec::new(),
        }
    }

    /// Get a reference to the underlying Wasmtime linker.
    pub fn inner(&self) -> &Linker<T> {
        &self.inner
    }

    /// Consume this linker and return the underlying Wasmtime linker.
    pub fn into_inner(self) -> Linker<T> {
        info!(functions = self.registered.len(), "Linker ready");
        self.inner
    }

    /// Get the list of registered functions.
    pub fn registered_functions(&self) -> &[RegisteredFunction] {
        &self.registered
    }

    /// Check if a function is already registered.
    pub fn is_registered(&self, module: &str, name: &str) -> bool {
        self.registered
            .iter()
            .any(|f| f.module == module && f.name == name)
    }

    /// Register a host function.
    pub fn func_wrap<Params, Results>(
        &mut self,
        module: &str,
        name: &str,
        func: impl wasmtime::IntoFunc<T, Params, Results>,
    ) -> HostResult<&mut Self> {
        if self.is_registered(module, name) {
            return Err(HostError::AlreadyRegistered {
                module: module.to_string(),
                name: name.to_string(),
            });
        }

        self.inner
            .func_wrap(module, name, func)
            .map_err(|e| HostError::RegistrationFailed {
                module: module.to_string(),
                name: name.to_string(),
                reason: e.to_string(),
            })?;

        self.registered.push(RegisteredFunction {
            module: module.to_string(),
            name: name.to_string(),
        });

        debug!(module, name, "Registered host function");
        Ok(self)
    }
}

impl<T> std::fmt::Debug for BoundaryLinker<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundaryLinker")
            .field("registered_functions", &self.registered.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linker_creation() {
        let linker = BoundaryLinker::<()>::new(&Engine::default());
        assert!(linker.registered_functions().is_empty());
    }

    #[test]
    fn test_func_wrap() {
        let mut linker = BoundaryLinker::<()>::new(&Engine::default());

        linker
            .func_wrap("env", "answer", || -> i32 { 42 })
            .unwrap();

        assert!(linker.is_registered("env", "answer"));
        assert_eq!(
            linker.registered_functions(),
            &[RegisteredFunction {
                module: "env".into(),
                name: "answer".into(),
            }]
        );
    }

    #[test]
    fn test_duplicate_registration() {
        let mut linker = BoundaryLinker::<()>::new(&Engine::default());

        linker.func_wrap("env", "answer", || -> i32 { 42 }).unwrap();
        let result = linker.func_wrap("env", "answer", || -> i32 { 0 });

        assert!(matches!(result, Err(HostError::AlreadyRegistered { .. })));
        assert_eq!(linker.registered_functions().len(), 1);
    }
}
