//! Run command - Call an exported function of a WebAssembly module.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use clap::Args;
use serde::Serialize;
use wasmtime::{FuncType, Val, ValType};

use boundary::boundary_core::CallMetrics;
use boundary::prelude::*;

use crate::OutputFormat;
use crate::config::FileConfig;

/// Arguments for the run command.
#[derive(Args)]
pub struct RunArgs {
    /// Path to the WebAssembly module (binary or text format)
    #[arg(required = true)]
    pub module: PathBuf,

    /// Function to call (default: _start, main, or the first exported function)
    #[arg(short = 'e', long = "invoke")]
    pub function: Option<String>,

    /// Arguments to pass to the function, parsed by its parameter types
    #[arg(last = true)]
    pub args: Vec<String>,

    /// Memory limit in bytes
    #[arg(long)]
    pub memory_limit: Option<usize>,

    /// Fuel limit for the call
    #[arg(long)]
    pub fuel_limit: Option<u64>,

    /// Call timeout in seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Show call metrics
    #[arg(long)]
    pub metrics: bool,
}

/// Serializable summary of one call.
#[derive(Debug, Serialize)]
pub struct RunReport {
    pub module: String,
    pub function: String,
    /// `returned`, `invocation_failed` or `uncaught`.
    pub outcome: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<Vec<String>>,
    /// Guest diagnostic, for uncaught exceptions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostic: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub duration_ms: Option<f64>,
    pub fuel_consumed: u64,
}

/// A finished call: its report, outcome and metrics.
struct GuestRun {
    report: RunReport,
    outcome: CallOutcome<Vec<Val>>,
    metrics: CallMetrics,
}

/// Execute the run command.
///
/// Fails unless the guest function returned; an uncaught guest exception
/// fails with the `BoundaryFailure` itself as the error.
pub fn execute(
    args: RunArgs,
    config: &FileConfig,
    format: OutputFormat,
    quiet: bool,
) -> Result<()> {
    let GuestRun {
        report,
        outcome,
        metrics,
    } = call_guest(&args, config)?;

    match format {
        OutputFormat::Human => {
            if let CallOutcome::Returned(values) = &outcome {
                for value in values {
                    println!("{}", format_val(value));
                }
                if values.is_empty() && !quiet {
                    println!("{} returned", report.function);
                }
            }
            if args.metrics {
                println!("\nMetrics:");
                if let Some(duration) = metrics.duration() {
                    println!("  Duration: {duration:?}");
                }
                println!("  Fuel consumed: {}", metrics.fuel_consumed);
            }
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::JsonCompact => println!("{}", serde_json::to_string(&report)?),
    }

    outcome_result(outcome)
}

fn call_guest(args: &RunArgs, config: &FileConfig) -> Result<GuestRun> {
    let mut builder = Boundary::builder()
        .with_engine_config(config.engine_config())
        .with_limits(config.guest_limits());

    if let Some(bytes) = args.memory_limit {
        builder = builder.with_memory_limit(bytes);
    }
    if let Some(fuel) = args.fuel_limit {
        builder = builder.with_fuel_limit(fuel);
    }
    if let Some(secs) = args.timeout {
        builder = builder.with_timeout(Duration::from_secs(secs));
    }

    let runtime = builder.build().context("Failed to create runtime")?;

    let module = runtime
        .load_file(&args.module)
        .context("Failed to load module")?;

    let function = resolve_function(&module, args.function.as_deref())?;

    tracing::info!(
        module = %args.module.display(),
        function = %function,
        "Calling guest function"
    );

    let mut guest = runtime.guest().build().context("Failed to create guest")?;
    guest
        .load_module(&module)
        .context("Failed to instantiate module")?;

    let func_type = guest
        .func_type(&function)
        .ok_or_else(|| CallError::FunctionNotFound(function.clone()))
        .context("Invocation failed")?;
    let params = parse_args(&func_type, &args.args).context("Invalid arguments")?;

    let outcome = CallOutcome::from(guest.call_dynamic(&function, &params));
    let metrics = guest.metrics().clone();

    let report = RunReport {
        module: args.module.display().to_string(),
        function,
        outcome: outcome.kind(),
        results: match &outcome {
            CallOutcome::Returned(values) => Some(values.iter().map(format_val).collect()),
            _ => None,
        },
        diagnostic: match &outcome {
            CallOutcome::Uncaught(failure) => Some(failure.diagnostic().to_string()),
            _ => None,
        },
        message: match &outcome {
            CallOutcome::Returned(_) => None,
            CallOutcome::InvocationFailed(err) => Some(err.to_string()),
            CallOutcome::Uncaught(failure) => Some(failure.to_string()),
        },
        duration_ms: metrics.duration().map(|d| d.as_secs_f64() * 1000.0),
        fuel_consumed: metrics.fuel_consumed,
    };

    Ok(GuestRun {
        report,
        outcome,
        metrics,
    })
}

fn outcome_result<T>(outcome: CallOutcome<T>) -> Result<()> {
    match outcome {
        CallOutcome::Returned(_) => Ok(()),
        CallOutcome::Uncaught(failure) => Err(anyhow::Error::new(failure)),
        CallOutcome::InvocationFailed(err) => {
            Err(anyhow::Error::new(err).context("Invocation failed"))
        }
    }
}

/// Pick the function to call: the one asked for, else `_start`, else
/// `main`, else the first exported function.
fn resolve_function(module: &ValidatedModule, requested: Option<&str>) -> Result<String> {
    if let Some(name) = requested {
        return Ok(name.to_string());
    }

    ["_start", "main"]
        .into_iter()
        .find(|name| module.function_export(name).is_some())
        .map(String::from)
        .or_else(|| {
            module
                .exports()
                .iter()
                .find(|export| export.kind.is_function())
                .map(|export| export.name.clone())
        })
        .ok_or_else(|| anyhow!("Module exports no functions"))
}

/// Parse command-line arguments against a function's parameter types.
fn parse_args(func_type: &FuncType, raw: &[String]) -> Result<Vec<Val>> {
    let params: Vec<ValType> = func_type.params().collect();
    if params.len() != raw.len() {
        bail!("expected {} argument(s), got {}", params.len(), raw.len());
    }

    params
        .iter()
        .zip(raw)
        .enumerate()
        .map(|(index, (ty, value))| {
            parse_val(ty, value).with_context(|| format!("argument {index}: `{value}`"))
        })
        .collect()
}

fn parse_val(ty: &ValType, raw: &str) -> Result<Val> {
    let val = match ty {
        ValType::I32 => Val::I32(raw.parse()?),
        ValType::I64 => Val::I64(raw.parse()?),
        ValType::F32 => Val::F32(raw.parse::<f32>()?.to_bits()),
        ValType::F64 => Val::F64(raw.parse::<f64>()?.to_bits()),
        other => bail!("unsupported parameter type {other}"),
    };
    Ok(val)
}

fn format_val(val: &Val) -> String {
    match val {
        Val::I32(v) => v.to_string(),
        Val::I64(v) => v.to_string(),
        Val::F32(bits) => f32::from_bits(*bits).to_string(),
        Val::F64(bits) => f64::from_bits(*bits).to_string(),
        other => format!("{other:?}"),
    }
}
