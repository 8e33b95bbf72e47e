//! Translation of uncaught guest exceptions into host errors.
//!
//! When a guest call ends because the guest raised an error it never
//! handled, the dispatch layer renders a diagnostic string and passes it to
//! [`translate`]. The resulting [`BoundaryFailure`] is the only signal the
//! host caller receives; it does not carry the guest's structured payload.

use thiserror::Error;

/// Label naming the embedded runtime in every rendered failure message.
pub const FOREIGN_RUNTIME: &str = "WebAssembly";

/// An uncaught exception raised inside the guest, surfaced to the host.
///
/// The message is always
/// ``Uncaught WebAssembly exception: `<diagnostic>` ``, with the diagnostic
/// embedded verbatim. Nothing in it is escaped or truncated.
///
/// # Example
///
/// ```
/// use boundary_core::failure::translate;
///
/// let failure = translate("Not_found");
/// assert_eq!(failure.to_string(), "Uncaught WebAssembly exception: `Not_found`");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Error)]
#[error("Uncaught {runtime} exception: `{diagnostic}`", runtime = FOREIGN_RUNTIME)]
pub struct BoundaryFailure {
    diagnostic: String,
}

impl BoundaryFailure {
    /// Wrap a diagnostic. Same as [`translate`].
    pub fn new(diagnostic: impl Into<String>) -> Self {
        Self {
            diagnostic: diagnostic.into(),
        }
    }

    /// The diagnostic text exactly as the dispatch layer rendered it.
    pub fn diagnostic(&self) -> &str {
        &self.diagnostic
    }

    /// The rendered message. Equal to the `Display` output.
    pub fn display_message(&self) -> String {
        self.to_string()
    }
}

/// Turn the diagnostic of an uncaught guest exception into a [`BoundaryFailure`].
///
/// Accepts any text, including the empty string. Never fails.
pub fn translate(diagnostic: impl Into<String>) -> BoundaryFailure {
    BoundaryFailure::new(diagnostic)
}

/// Error value a host import hands back to Wasmtime to abort the guest
/// with an exception payload.
///
/// The dispatch layer recovers it from the call error and translates the
/// payload. It is not meant to reach host callers.
#[derive(Debug, Clone, Error)]
#[error("guest raised an exception: {payload}")]
pub struct GuestException {
    payload: String,
}

impl GuestException {
    /// Create an exception carrying the given payload.
    pub fn new(payload: impl Into<String>) -> Self {
        Self {
            payload: payload.into(),
        }
    }

    /// The payload supplied by the guest.
    pub fn payload(&self) -> &str {
        &self.payload
    }

    /// Consume the exception and return its payload.
    pub fn into_payload(self) -> String {
        self.payload
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::thread;

    #[test]
    fn test_message_template() {
        let failure = translate("Division_by_zero");
        assert_eq!(
            failure.to_string(),
            "Uncaught WebAssembly exception: `Division_by_zero`"
        );
        assert_eq!(failure.display_message(), failure.to_string());
        assert_eq!(failure.diagnostic(), "Division_by_zero");
    }

    #[test]
    fn test_not_found() {
        assert_eq!(
            translate("Not_found").display_message(),
            "Uncaught WebAssembly exception: `Not_found`"
        );
    }

    #[test]
    fn test_empty_diagnostic_keeps_delimiters() {
        let failure = translate("");
        assert_eq!(failure.to_string(), "Uncaught WebAssembly exception: ``");
        assert!(failure.diagnostic().is_empty());
    }

    #[test]
    fn test_special_characters_are_verbatim() {
        let failure = translate("Failure(`x`)");
        assert_eq!(
            failure.to_string(),
            "Uncaught WebAssembly exception: `Failure(`x`)`"
        );

        let multiline = "Failure(\"line one\nline two\")\r\n\ttrailing";
        let failure = translate(multiline);
        assert_eq!(
            failure.to_string(),
            format!("Uncaught WebAssembly exception: `{multiline}`")
        );

        let unicode = "Invalid_argument(\"ünïcödé ✓\")";
        assert_eq!(translate(unicode).diagnostic(), unicode);
    }

    #[test]
    fn test_long_diagnostic_is_not_truncated() {
        let long = "x".repeat(64 * 1024);
        let failure = translate(long.clone());
        let message = failure.to_string();

        assert_eq!(message.len(), long.len() + "Uncaught WebAssembly exception: ``".len());
        assert!(message.ends_with(&format!("{long}`")));
    }

    #[test]
    fn test_translation_is_deterministic() {
        let a = translate("Stack_overflow");
        let b = translate(String::from("Stack_overflow"));

        assert_eq!(a, b);
        assert_eq!(a.display_message(), b.display_message());

        let mut set = HashSet::new();
        set.insert(a);
        set.insert(b);
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_new_matches_translate() {
        assert_eq!(BoundaryFailure::new("Exit"), translate("Exit"));
    }

    #[test]
    fn test_usable_as_std_error() {
        fn fails() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
            let outcome: Result<(), BoundaryFailure> = Err(translate("Assert_failure"));
            outcome?;
            Ok(())
        }

        let err = fails().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Uncaught WebAssembly exception: `Assert_failure`"
        );
        assert!(err.downcast_ref::<BoundaryFailure>().is_some());
    }

    #[test]
    fn test_concurrent_translation() {
        fn assert_send_sync<T: Send + Sync + 'static>() {}
        assert_send_sync::<BoundaryFailure>();

        let handles: Vec<_> = (0..8)
            .map(|i| {
                thread::spawn(move || {
                    (0..100)
                        .map(|j| translate(format!("Failure(\"{i}:{j}\")")))
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        for (i, handle) in handles.into_iter().enumerate() {
            let failures = handle.join().unwrap();
            for (j, failure) in failures.iter().enumerate() {
                assert_eq!(
                    failure.to_string(),
                    format!("Uncaught WebAssembly exception: `Failure(\"{i}:{j}\")`")
                );
            }
        }
    }

    #[test]
    fn test_guest_exception_payload() {
        let exception = GuestException::new("Not_found");
        assert_eq!(exception.payload(), "Not_found");
        assert_eq!(exception.to_string(), "guest raised an exception: Not_found");
        assert_eq!(exception.into_payload(), "Not_found");
    }
}
