//! Trace capture for faults raised while handling a request.
//!
//! A fault's trace comes from the best source available, in order:
//!
//! 1. a [`TracedError`] payload (or `Error::Traced`) carries its own trace,
//!    captured where the error was created;
//! 2. the panic hook installed by [`install_panic_hook`] records a
//!    backtrace on the panicking thread, which [`Fault::from_panic`] picks
//!    up when called on that same thread;
//! 3. a backtrace captured on the spot.
//!
//! Frames of this module are elided from rendered reports by the default
//! parse options.

use crate::Error;
use once_cell::sync::OnceCell;
use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::RefCell;
use std::fmt;
use std::sync::{Arc, Once};
use thiserror::Error as ThisError;

/// Trace text, or a captured backtrace symbolized on first read.
///
/// Capturing only walks the stack. Symbol resolution happens when the text
/// is first asked for, so it can be left to the reporting thread.
#[derive(Clone)]
enum Trace {
    Text(String),
    Captured(Arc<Captured>),
}

struct Captured {
    backtrace: Backtrace,
    text: OnceCell<String>,
}

impl Trace {
    fn capture() -> Self {
        Self::from_backtrace(Backtrace::force_capture())
    }

    fn from_backtrace(backtrace: Backtrace) -> Self {
        Trace::Captured(Arc::new(Captured {
            backtrace,
            text: OnceCell::new(),
        }))
    }

    fn as_str(&self) -> &str {
        match self {
            Trace::Text(text) => text,
            Trace::Captured(captured) => captured
                .text
                .get_or_init(|| captured.backtrace.to_string()),
        }
    }

    fn is_resolved(&self) -> bool {
        match self {
            Trace::Text(_) => true,
            Trace::Captured(captured) => captured.text.get().is_some(),
        }
    }
}

impl fmt::Debug for Trace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trace::Text(text) => f.debug_tuple("Text").field(&text.len()).finish(),
            Trace::Captured(_) if self.is_resolved() => f.write_str("Captured(resolved)"),
            Trace::Captured(_) => f.write_str("Captured(pending)"),
        }
    }
}

/// An error value that remembers where it was created.
///
/// Raise it with `std::panic::panic_any(TracedError::new(..))` or return it
/// as `Error::Traced` to give the crash report a precise trace.
#[derive(ThisError, Debug, Clone)]
#[error("{message}")]
pub struct TracedError {
    message: String,
    trace: Trace,
}

impl TracedError {
    /// Capture the current stack along with `message`.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            trace: Trace::capture(),
        }
    }

    /// Use an already captured trace.
    pub fn with_trace(message: impl Into<String>, trace: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            trace: Trace::Text(trace.into()),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// The trace as text. Resolves symbols on the first call.
    pub fn trace(&self) -> &str {
        self.trace.as_str()
    }
}

thread_local! {
    static PANIC_TRACE: RefCell<Option<Backtrace>> = const { RefCell::new(None) };
}

static HOOK: Once = Once::new();

/// Install a panic hook that records a backtrace for the panicking thread.
///
/// The backtrace is stored unresolved. The previously installed hook still
/// runs afterwards. Calling this more than once has no further effect.
pub fn install_panic_hook() {
    HOOK.call_once(|| {
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            let payload = info.payload();
            let carries_trace = payload.is::<TracedError>()
                || payload.downcast_ref::<Error>().is_some_and(Error::has_trace);
            if !carries_trace {
                let backtrace = Backtrace::force_capture();
                PANIC_TRACE.with(|slot| *slot.borrow_mut() = Some(backtrace));
            }
            previous(info);
        }));
        tracing::debug!("scrivener panic hook installed");
    });
}

/// Take the backtrace recorded by the panic hook on this thread, if any.
pub fn take_panic_trace() -> Option<Backtrace> {
    PANIC_TRACE.with(|slot| slot.borrow_mut().take())
}

/// A caught panic, reduced to its message and whatever trace it carried.
#[derive(Debug, Clone)]
pub struct Fault {
    message: String,
    trace: Option<Trace>,
}

impl Fault {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            trace: None,
        }
    }

    pub fn with_trace(message: impl Into<String>, trace: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            trace: Some(Trace::Text(trace.into())),
        }
    }

    /// Use a captured backtrace, symbolized when the trace is first read.
    pub fn with_backtrace(message: impl Into<String>, backtrace: Backtrace) -> Self {
        Self {
            message: message.into(),
            trace: Some(Trace::from_backtrace(backtrace)),
        }
    }

    /// Convert a `catch_unwind` payload.
    ///
    /// Call this on the thread that panicked so the hook's trace is found.
    /// No symbols are resolved here.
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let hooked = take_panic_trace();

        let mut fault = if let Some(traced) = payload.downcast_ref::<TracedError>() {
            Fault {
                message: traced.message.clone(),
                trace: Some(traced.trace.clone()),
            }
        } else if let Some(err) = payload.downcast_ref::<Error>() {
            Fault {
                message: err.to_string(),
                trace: match err {
                    Error::Traced(traced) => Some(traced.trace.clone()),
                    _ => None,
                },
            }
        } else if let Some(message) = payload.downcast_ref::<&'static str>() {
            Fault::new(*message)
        } else if let Some(message) = payload.downcast_ref::<String>() {
            Fault::new(message.clone())
        } else {
            Fault::new("Box<dyn Any>")
        };

        if fault.trace.is_none() {
            fault.trace = hooked.map(Trace::from_backtrace);
        }
        fault
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn has_trace(&self) -> bool {
        self.trace.is_some()
    }

    /// Whether reading the trace would still need symbol resolution.
    pub fn trace_is_resolved(&self) -> bool {
        self.trace.as_ref().is_none_or(Trace::is_resolved)
    }

    /// Capture a backtrace here unless the fault already has a trace.
    pub fn capture_if_missing(&mut self) {
        if self.trace.is_none() {
            self.trace = Some(Trace::capture());
        }
    }

    /// The trace captured along with the fault, if any, as text.
    pub fn trace(&self) -> Option<&str> {
        self.trace
            .as_ref()
            .map(Trace::as_str)
            .filter(|t| !t.trim().is_empty())
    }

    /// The fault's own trace, or one captured now.
    pub fn trace_or_capture(&self) -> String {
        match self.trace() {
            Some(trace) => trace.to_string(),
            None => Backtrace::force_capture().to_string(),
        }
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::panic::{self, AssertUnwindSafe};

    fn caught<F: FnOnce()>(f: F) -> Fault {
        let payload = panic::catch_unwind(AssertUnwindSafe(f)).unwrap_err();
        Fault::from_panic(payload)
    }

    #[test]
    fn test_traced_payload_keeps_its_trace() {
        let fault = caught(|| panic::panic_any(TracedError::with_trace("boom", "   0: app::boom")));
        assert_eq!(fault.message(), "boom");
        assert_eq!(fault.trace(), Some("   0: app::boom"));
        assert_eq!(fault.trace_or_capture(), "   0: app::boom");
    }

    #[test]
    fn test_traced_error_variant_payload() {
        let fault = caught(|| {
            panic::panic_any(Error::Traced(TracedError::with_trace("db", "   0: app::db")))
        });
        assert_eq!(fault.trace(), Some("   0: app::db"));
    }

    #[test]
    fn test_string_payloads() {
        assert_eq!(caught(|| panic!("static")).message(), "static");
        assert_eq!(caught(|| panic!("formatted {}", 7)).message(), "formatted 7");
        assert_eq!(caught(|| panic::panic_any(42u8)).message(), "Box<dyn Any>");
    }

    #[test]
    fn test_hook_records_trace_on_panicking_thread() {
        install_panic_hook();
        let fault = caught(|| panic!("hooked"));
        assert!(fault.has_trace());
        assert!(!fault.trace_is_resolved());
        assert!(take_panic_trace().is_none());

        assert!(fault.trace().is_some_and(|t| !t.is_empty()));
        assert!(fault.trace_is_resolved());
    }

    #[test]
    fn test_capture_if_missing_defers_resolution() {
        let mut fault = Fault::new("bare");
        fault.capture_if_missing();
        assert!(fault.has_trace());
        assert!(!fault.trace_is_resolved());

        let copy = fault.clone();
        assert!(!fault.trace_or_capture().is_empty());
        assert!(copy.trace_is_resolved());
    }

    #[test]
    fn test_text_trace_is_kept_by_capture_if_missing() {
        let mut fault = Fault::with_trace("db", "   0: app::db");
        fault.capture_if_missing();
        assert_eq!(fault.trace(), Some("   0: app::db"));
    }

    #[test]
    fn test_bare_fault_captures_fresh_trace() {
        let fault = Fault::new("bare");
        assert!(fault.trace().is_none());
        assert!(!fault.trace_or_capture().is_empty());
    }

    #[test]
    fn test_new_captures_trace() {
        let err = TracedError::new("captured");
        let fault = caught(|| panic::panic_any(err.clone()));
        assert!(!fault.trace_is_resolved());
        assert!(!err.trace().is_empty());
        assert!(fault.trace_is_resolved());
    }
}
