//! Guest module loading.
//!
//! Modules are compiled and validated once by a [`ModuleLoader`], then
//! instantiated into as many guests as needed.

use std::path::Path;

use tracing::{debug, info};
use wasmtime::{ExternType, Module};

use crate::engine::SharedEngine;
use crate::error::{ModuleError, ModuleResult};

/// A compiled, validated guest module.
#[derive(Clone)]
pub struct ValidatedModule {
    inner: Module,
    metadata: ModuleMetadata,
}

impl ValidatedModule {
    /// Get a reference to the underlying Wasmtime module.
    pub fn inner(&self) -> &Module {
        &self.inner
    }

    /// Get the module metadata.
    pub fn metadata(&self) -> &ModuleMetadata {
        &self.metadata
    }

    /// Get the module name, if set.
    pub fn name(&self) -> Option<&str> {
        self.metadata.name.as_deref()
    }

    /// Get the list of exports.
    pub fn exports(&self) -> &[ExportInfo] {
        &self.metadata.exports
    }

    /// Get the list of imports.
    pub fn imports(&self) -> &[ImportInfo] {
        &self.metadata.imports
    }

    /// Check if the module has a specific export.
    pub fn has_export(&self, name: &str) -> bool {
        self.metadata.exports.iter().any(|e| e.name == name)
    }

    /// Look up an exported function by name.
    pub fn function_export(&self, name: &str) -> Option<&ExportInfo> {
        self.metadata
            .exports
            .iter()
            .find(|e| e.name == name && e.kind.is_function())
    }

    /// Check if the module requires a specific import.
    pub fn requires_import(&self, module: &str, name: &str) -> bool {
        self.metadata
            .imports
            .iter()
            .any(|i| i.module == module && i.name == name)
    }
}

impl std::fmt::Debug for ValidatedModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValidatedModule")
            .field("name", &self.metadata.name)
            .field("exports", &self.metadata.exports.len())
            .field("imports", &self.metadata.imports.len())
            .finish()
    }
}

/// Metadata extracted from a guest module.
#[derive(Debug, Clone, Default)]
pub struct ModuleMetadata {
    /// Module name, if specified.
    pub name: Option<String>,
    /// Exported items.
    pub exports: Vec<ExportInfo>,
    /// Required imports.
    pub imports: Vec<ImportInfo>,
    /// Exported memories.
    pub memories: Vec<MemoryInfo>,
}

/// An exported item.
#[derive(Debug, Clone)]
pub struct ExportInfo {
    /// Export name.
    pub name: String,
    /// What is exported.
    pub kind: ExternKind,
}

/// A required import.
#[derive(Debug, Clone)]
pub struct ImportInfo {
    /// Import module name.
    pub module: String,
    /// Import name.
    pub name: String,
    /// What is imported.
    pub kind: ExternKind,
}

/// The kind of an import or export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExternKind {
    /// A function, with its arity.
    Function {
        /// Number of parameters.
        params: usize,
        /// Number of results.
        results: usize,
    },
    /// A linear memory.
    Memory,
    /// A global.
    Global,
    /// A table.
    Table,
    /// A tag or anything else this host does not model.
    Other,
}

impl ExternKind {
    /// Whether this is a function.
    pub fn is_function(&self) -> bool {
        matches!(self, Self::Function { .. })
    }
}

impl std::fmt::Display for ExternKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Function { params, results } => {
                write!(f, "func({params} params, {results} results)")
            }
            Self::Memory => f.write_str("memory"),
            Self::Global => f.write_str("global"),
            Self::Table => f.write_str("table"),
            Self::Other => f.write_str("other"),
        }
    }
}

impl From<ExternType> for ExternKind {
    fn from(ty: ExternType) -> Self {
        match ty {
            ExternType::Func(func) => Self::Function {
                params: func.params().len(),
                results: func.results().len(),
            },
            ExternType::Memory(_) => Self::Memory,
            ExternType::Global(_) => Self::Global,
            ExternType::Table(_) => Self::Table,
            #[allow(unreachable_patterns)]
            _ => Self::Other,
        }
    }
}

/// An exported memory definition.
#[derive(Debug, Clone)]
pub struct MemoryInfo {
    /// Minimum size in 64KB pages.
    pub min_pages: u64,
    /// Maximum size in pages, if bounded.
    pub max_pages: Option<u64>,
    /// Whether this is a 64-bit memory.
    pub memory64: bool,
}

/// Compiles and validates guest modules against a shared engine.
pub struct ModuleLoader {
    engine: SharedEngine,
}

impl ModuleLoader {
    /// Create a new module loader with the given engine.
    pub fn new(engine: SharedEngine) -> Self {
        Self { engine }
    }

    /// Load a module from raw bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are not a valid module.
    pub fn load_bytes(&self, bytes: &[u8]) -> ModuleResult<ValidatedModule> {
        debug!(size = bytes.len(), "Loading module from bytes");

        let module = Module::new(self.engine.inner(), bytes)?;
        Ok(self.validated(module))
    }

    /// Load a module from a `.wasm` or `.wat` file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or does not hold a valid module.
    pub fn load_file(&self, path: &Path) -> ModuleResult<ValidatedModule> {
        debug!(path = %path.display(), "Loading module from file");

        let bytes = std::fs::read(path)?;
        let module = if bytes.starts_with(b"\0asm") {
            Module::new(self.engine.inner(), &bytes)?
        } else {
            let wasm = wat::parse_bytes(&bytes).map_err(|e| ModuleError::Invalid(e.to_string()))?;
            Module::new(self.engine.inner(), &wasm)?
        };

        Ok(self.validated(module))
    }

    /// Load a module from WebAssembly text.
    ///
    /// # Errors
    ///
    /// Returns an error if the text does not parse or validate.
    pub fn load_wat(&self, wat: &str) -> ModuleResult<ValidatedModule> {
        debug!(size = wat.len(), "Loading module from WAT");

        let wasm = wat::parse_str(wat).map_err(|e| ModuleError::Invalid(e.to_string()))?;
        self.load_bytes(&wasm)
    }

    fn validated(&self, module: Module) -> ValidatedModule {
        let metadata = extract_metadata(&module);

        info!(
            name = ?metadata.name,
            exports = metadata.exports.len(),
            imports = metadata.imports.len(),
            "Loaded module"
        );

        ValidatedModule {
            inner: module,
            metadata,
        }
    }
}

fn extract_metadata(module: &Module) -> ModuleMetadata {
    let exports = module
        .exports()
        .map(|export| ExportInfo {
            name: export.name().to_string(),
            kind: export.ty().into(),
        })
        .collect();

    let imports = module
        .imports()
        .map(|import| ImportInfo {
            module: import.module().to_string(),
            name: import.name().to_string(),
            kind: import.ty().into(),
        })
        .collect();

    let memories = module
        .exports()
        .filter_map(|export| match export.ty() {
            ExternType::Memory(mem) => Some(MemoryInfo {
                min_pages: mem.minimum(),
                max_pages: mem.maximum(),
                memory64: mem.is_64(),
            }),
            _ => None,
        })
        .collect();

    ModuleMetadata {
        name: module.name().map(String::from),
        exports,
        imports,
        memories,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{BoundaryEngine, IntoShared};

    fn create_loader() -> ModuleLoader {
        ModuleLoader::new(BoundaryEngine::default_engine().unwrap().into_shared())
    }

    #[test]
    fn test_function_exports() {
        let module = create_loader()
            .load_wat(
                r#"
            (module $calc
                (memory (export "memory") 1)
                (func (export "add") (param i32 i32) (result i32)
                    local.get 0
                    local.get 1
                    i32.add
                )
            )
        "#,
            )
            .unwrap();

        assert_eq!(module.name(), Some("calc"));
        assert!(module.has_export("memory"));
        assert!(module.function_export("memory").is_none());

        let add = module.function_export("add").unwrap();
        assert_eq!(
            add.kind,
            ExternKind::Function {
                params: 2,
                results: 1
            }
        );
        assert_eq!(add.kind.to_string(), "func(2 params, 1 results)");
    }

    #[test]
    fn test_exception_import_is_reported() {
        let module = create_loader()
            .load_wat(
                r#"
            (module
                (import "env" "raise" (func (param i32 i32)))
                (memory (export "memory") 1)
                (func (export "main"))
            )
        "#,
            )
            .unwrap();

        assert!(module.requires_import("env", "raise"));
        assert!(!module.requires_import("env", "log"));
        assert_eq!(module.metadata().memories.len(), 1);
        assert_eq!(module.metadata().memories[0].min_pages, 1);
        assert_eq!(module.metadata().memories[0].max_pages, None);
    }

    #[test]
    fn test_load_invalid_module() {
        let loader = create_loader();
        assert!(loader.load_bytes(&[0, 1, 2, 3]).is_err());
        assert!(matches!(
            loader.load_wat("(module (func"),
            Err(ModuleError::Invalid(_))
        ));
    }

    #[test]
    fn test_load_missing_file() {
        let result = create_loader().load_file(Path::new("/nonexistent/guest.wasm"));
        assert!(matches!(result, Err(ModuleError::Io(_))));
    }
}
