//! Classification of guest call results.
//!
//! Every call into a guest ends in one of three disjoint ways: it returns,
//! it fails to be invoked (or is stopped by a host-imposed limit), or the
//! guest raises an exception nobody catches. Only the last one is translated
//! into a [`BoundaryFailure`].

use std::time::Duration;

use wasmtime::Trap;

use crate::error::{CallError, CallResult};
use crate::failure::{BoundaryFailure, GuestException, translate};

/// Explicit three-way view of a guest call.
#[derive(Debug)]
pub enum CallOutcome<T> {
    /// The guest returned normally.
    Returned(T),
    /// The call could not be carried out, or a host limit stopped it.
    InvocationFailed(CallError),
    /// The guest raised an exception it did not handle.
    Uncaught(BoundaryFailure),
}

impl<T> CallOutcome<T> {
    /// Stable lowercase label, used in reports.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Returned(_) => "returned",
            Self::InvocationFailed(_) => "invocation_failed",
            Self::Uncaught(_) => "uncaught",
        }
    }

    /// Whether the guest returned normally.
    pub fn is_returned(&self) -> bool {
        matches!(self, Self::Returned(_))
    }

    /// Convert back into a `Result`.
    pub fn into_result(self) -> CallResult<T> {
        match self {
            Self::Returned(value) => Ok(value),
            Self::InvocationFailed(err) => Err(err),
            Self::Uncaught(failure) => Err(CallError::Uncaught(failure)),
        }
    }

    /// Map the returned value.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> CallOutcome<U> {
        match self {
            Self::Returned(value) => CallOutcome::Returned(f(value)),
            Self::InvocationFailed(err) => CallOutcome::InvocationFailed(err),
            Self::Uncaught(failure) => CallOutcome::Uncaught(failure),
        }
    }
}

impl<T> From<CallResult<T>> for CallOutcome<T> {
    fn from(result: CallResult<T>) -> Self {
        match result {
            Ok(value) => Self::Returned(value),
            Err(CallError::Uncaught(failure)) => Self::Uncaught(failure),
            Err(err) => Self::InvocationFailed(err),
        }
    }
}

/// Limits in force for the call being classified.
#[derive(Debug, Clone, Copy)]
pub(crate) struct CallBudget {
    pub fuel_consumed: u64,
    pub fuel_limit: u64,
    pub timeout: Duration,
}

/// Sort a Wasmtime call error into the dispatch taxonomy.
pub(crate) fn classify(err: wasmtime::Error, budget: CallBudget) -> CallError {
    if let Some(exception) = err.downcast_ref::<GuestException>() {
        return CallError::Uncaught(translate(exception.payload()));
    }

    match err.downcast_ref::<Trap>() {
        Some(Trap::OutOfFuel) => CallError::OutOfFuel {
            consumed: budget.fuel_consumed,
            limit: budget.fuel_limit,
        },
        Some(Trap::Interrupt) => CallError::Timeout(budget.timeout),
        Some(trap) => CallError::Uncaught(translate(trap_diagnostic(trap))),
        None => CallError::Wasmtime(err),
    }
}

/// Diagnostic for a guest trap: the trap code's identifier, such as
/// `IntegerDivisionByZero`.
pub(crate) fn trap_diagnostic(trap: &Trap) -> String {
    format!("{trap:?}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn budget() -> CallBudget {
        CallBudget {
            fuel_consumed: 7,
            fuel_limit: 10,
            timeout: Duration::from_secs(1),
        }
    }

    #[test]
    fn test_guest_exception_is_uncaught() {
        let err = wasmtime::Error::new(GuestException::new("Not_found"));
        let classified = classify(err, budget());
        assert_eq!(
            classified.to_string(),
            "Uncaught WebAssembly exception: `Not_found`"
        );
    }

    #[test]
    fn test_guest_exception_survives_context() {
        let err = wasmtime::Error::new(GuestException::new("Exit")).context("while calling main");
        assert!(classify(err, budget()).is_uncaught());
    }

    #[test]
    fn test_trap_is_uncaught() {
        let err = wasmtime::Error::new(Trap::UnreachableCodeReached);
        let failure = classify(err, budget()).into_boundary_failure().unwrap();
        assert_eq!(failure.diagnostic(), "UnreachableCodeReached");
    }

    #[test]
    fn test_host_limits_are_not_uncaught() {
        let fuel = classify(wasmtime::Error::new(Trap::OutOfFuel), budget());
        assert!(matches!(
            fuel,
            CallError::OutOfFuel {
                consumed: 7,
                limit: 10
            }
        ));

        let timeout = classify(wasmtime::Error::new(Trap::Interrupt), budget());
        assert!(matches!(timeout, CallError::Timeout(d) if d == Duration::from_secs(1)));
    }

    #[test]
    fn test_other_errors_are_invocation_failures() {
        let err = wasmtime::Error::msg("argument type mismatch");
        assert!(matches!(classify(err, budget()), CallError::Wasmtime(_)));
    }

    #[test]
    fn test_outcome_round_trip() {
        let returned: CallOutcome<i32> = Ok(3).into();
        assert_eq!(returned.kind(), "returned");
        assert_eq!(returned.map(|v| v * 2).into_result().unwrap(), 6);

        let uncaught: CallOutcome<i32> = Err(CallError::from(translate("Exit"))).into();
        assert_eq!(uncaught.kind(), "uncaught");
        assert!(matches!(uncaught, CallOutcome::Uncaught(ref f) if f.diagnostic() == "Exit"));
        assert!(uncaught.into_result().unwrap_err().is_uncaught());

        let failed: CallOutcome<i32> = Err(CallError::ModuleNotLoaded).into();
        assert_eq!(failed.kind(), "invocation_failed");
        assert!(!failed.is_returned());
    }
}
