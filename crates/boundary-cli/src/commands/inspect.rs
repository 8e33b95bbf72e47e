//! Inspect command - Show what a WebAssembly module exports and imports.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;

use boundary::boundary_core::{ExportInfo, ExternKind, ImportInfo};
use boundary::prelude::*;

use crate::OutputFormat;
use crate::config::FileConfig;

/// Arguments for the inspect command.
#[derive(Args)]
pub struct InspectArgs {
    /// Path to the WebAssembly module (binary or text format)
    #[arg(required = true)]
    pub module: PathBuf,

    /// Show exports
    #[arg(long)]
    pub exports: bool,

    /// Show imports
    #[arg(long)]
    pub imports: bool,

    /// Show memory information
    #[arg(long)]
    pub memory: bool,

    /// Show all information
    #[arg(long, short)]
    pub all: bool,
}

#[derive(Debug, Serialize)]
struct InspectionResult {
    path: String,
    name: Option<String>,
    /// Whether the module imports `env.raise`.
    raises_exceptions: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    exports: Option<Vec<ExternDisplay>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    imports: Option<Vec<ExternDisplay>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    memories: Option<Vec<MemoryDisplay>>,
}

#[derive(Debug, Serialize)]
struct ExternDisplay {
    #[serde(skip_serializing_if = "Option::is_none")]
    module: Option<String>,
    name: String,
    kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    signature: Option<String>,
}

#[derive(Debug, Serialize)]
struct MemoryDisplay {
    min_pages: u64,
    max_pages: Option<u64>,
    memory64: bool,
}

impl ExternDisplay {
    fn new(module: Option<String>, name: &str, kind: &ExternKind) -> Self {
        let (kind, signature) = match kind {
            ExternKind::Function { params, results } => {
                ("function", Some(format!("({params}) -> ({results})")))
            }
            ExternKind::Memory => ("memory", None),
            ExternKind::Global => ("global", None),
            ExternKind::Table => ("table", None),
            ExternKind::Other => ("other", None),
        };

        Self {
            module,
            name: name.to_string(),
            kind,
            signature,
        }
    }

    fn label(&self) -> String {
        match &self.module {
            Some(module) => format!("{module}::{}", self.name),
            None => self.name.clone(),
        }
    }
}

impl From<&ExportInfo> for ExternDisplay {
    fn from(info: &ExportInfo) -> Self {
        Self::new(None, &info.name, &info.kind)
    }
}

impl From<&ImportInfo> for ExternDisplay {
    fn from(info: &ImportInfo) -> Self {
        Self::new(Some(info.module.clone()), &info.name, &info.kind)
    }
}

/// Execute the inspect command.
pub fn execute(args: InspectArgs, config: &FileConfig, format: OutputFormat) -> Result<()> {
    let runtime = Boundary::builder()
        .with_engine_config(config.engine_config())
        .with_epochs(false)
        .build()
        .context("Failed to create runtime")?;

    let module = runtime
        .load_file(&args.module)
        .context("Failed to load module")?;

    let result = inspect(&module, &args);

    match format {
        OutputFormat::Human => print_human(&result),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&result)?),
        OutputFormat::JsonCompact => println!("{}", serde_json::to_string(&result)?),
    }

    Ok(())
}

fn inspect(module: &ValidatedModule, args: &InspectArgs) -> InspectionResult {
    let show_all = args.all || (!args.exports && !args.imports && !args.memory);

    let mut result = InspectionResult {
        path: args.module.display().to_string(),
        name: module.name().map(String::from),
        raises_exceptions: module.requires_import(EXCEPTION_MODULE, EXCEPTION_IMPORT),
        exports: None,
        imports: None,
        memories: None,
    };

    if show_all || args.exports {
        result.exports = Some(module.exports().iter().map(ExternDisplay::from).collect());
    }

    if show_all || args.imports {
        result.imports = Some(module.imports().iter().map(ExternDisplay::from).collect());
    }

    if show_all || args.memory {
        result.memories = Some(
            module
                .metadata()
                .memories
                .iter()
                .map(|m| MemoryDisplay {
                    min_pages: m.min_pages,
                    max_pages: m.max_pages,
                    memory64: m.memory64,
                })
                .collect(),
        );
    }

    result
}

fn print_human(result: &InspectionResult) {
    println!("Module: {}", result.path);
    if let Some(name) = &result.name {
        println!("Name: {name}");
    }
    println!(
        "Raises exceptions: {}",
        if result.raises_exceptions { "yes (env.raise)" } else { "no" }
    );
    println!();

    for (title, items) in [("Exports", &result.exports), ("Imports", &result.imports)] {
        let Some(items) = items else { continue };
        println!("{title} ({}):", items.len());
        for item in items {
            match &item.signature {
                Some(sig) => println!("  {} [{}]: {}", item.label(), item.kind, sig),
                None => println!("  {} [{}]", item.label(), item.kind),
            }
        }
        println!();
    }

    if let Some(memories) = &result.memories {
        println!("Memories ({}):", memories.len());
        for (i, memory) in memories.iter().enumerate() {
            let max = memory
                .max_pages
                .map(|m| m.to_string())
                .unwrap_or_else(|| "unbounded".to_string());
            let bits = if memory.memory64 { "64-bit" } else { "32-bit" };
            println!("  [{}] {} - {} pages ({})", i, memory.min_pages, max, bits);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(exports: bool) -> InspectArgs {
        InspectArgs {
            module: PathBuf::from("guest.wat"),
            exports,
            imports: false,
            memory: false,
            all: false,
        }
    }

    #[test]
    fn test_inspect_raising_module() {
        let runtime = Boundary::builder().with_epochs(false).build().unwrap();
        let module = runtime
            .load_wat(
                r#"
                (module
                    (import "env" "raise" (func $raise (param i32 i32)))
                    (memory (export "memory") 1 2)
                    (func (export "divide") (param i32 i32) (result i32)
                        (i32.div_s (local.get 0) (local.get 1)))
                )
            "#,
            )
            .unwrap();

        let result = inspect(&module, &args(false));
        assert!(result.raises_exceptions);

        let imports = result.imports.unwrap();
        assert_eq!(imports[0].label(), "env::raise");
        assert_eq!(imports[0].signature.as_deref(), Some("(2) -> (0)"));

        let exports = result.exports.unwrap();
        assert_eq!(exports.len(), 2);
        assert!(exports.iter().any(|e| e.name == "divide" && e.kind == "function"));

        let memories = result.memories.unwrap();
        assert_eq!(memories[0].max_pages, Some(2));
    }

    #[test]
    fn test_inspect_filters_sections() {
        let runtime = Boundary::builder().with_epochs(false).build().unwrap();
        let module = runtime
            .load_wat(r#"(module (func (export "main")))"#)
            .unwrap();

        let result = inspect(&module, &args(true));
        assert!(!result.raises_exceptions);
        assert!(result.exports.is_some());
        assert!(result.imports.is_none());
        assert!(result.memories.is_none());
    }
}
