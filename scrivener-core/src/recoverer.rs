//! Panic recovery middleware.
//!
//! [`Recoverer`] runs the rest of the chain under a `catch_unwind` guard.
//! When a handler panics the client gets a plain `500 Internal Server Error`
//! right away. Only an unresolved backtrace is taken on the request path;
//! symbol resolution and rendering happen afterwards on a blocking task, and
//! the report is printed to the crash entry's sink.
//!
//! The crash entry comes from the recoverer's own formatter, else from a
//! [`CrashEntrySlot`] an outer middleware attached to the request, else from
//! the process-wide default formatter.

use crate::formatter::{CrashEntry, EntryFormatter, RequestInfo, new_crash_entry};
use crate::logging::{debug, error};
use crate::middleware::{Middleware, Next};
use crate::sink::{LogSink, SharedSink, StderrSink};
use crate::trace::{Fault, install_panic_hook};
use crate::{Error, HttpRequest, HttpResponse};
use async_trait::async_trait;
use futures_util::FutureExt;
use parking_lot::Mutex;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

/// Body of the response sent for a panicking handler.
pub const PANIC_RESPONSE_TEXT: &str = "Internal Server Error";

enum SlotEntry {
    Deferred {
        formatter: Arc<dyn EntryFormatter>,
        info: RequestInfo,
    },
    Ready(Box<dyn CrashEntry>),
}

/// A crash entry for a request, stored in its extensions.
///
/// A deferred slot only holds the formatter and the request descriptor; the
/// entry is opened when [`take`](Self::take) is called after a fault.
pub struct CrashEntrySlot {
    entry: Mutex<Option<SlotEntry>>,
}

impl CrashEntrySlot {
    /// A slot that opens its entry through `formatter` on first take.
    pub fn deferred(formatter: Arc<dyn EntryFormatter>, info: RequestInfo) -> Self {
        Self {
            entry: Mutex::new(Some(SlotEntry::Deferred { formatter, info })),
        }
    }

    /// A slot holding an already opened entry.
    pub fn new(entry: Box<dyn CrashEntry>) -> Self {
        Self {
            entry: Mutex::new(Some(SlotEntry::Ready(entry))),
        }
    }

    pub fn empty() -> Self {
        Self {
            entry: Mutex::new(None),
        }
    }

    /// Replace the stored entry.
    pub fn set(&self, entry: Box<dyn CrashEntry>) {
        *self.entry.lock() = Some(SlotEntry::Ready(entry));
    }

    pub fn take(&self) -> Option<Box<dyn CrashEntry>> {
        let taken = self.entry.lock().take()?;
        Some(match taken {
            SlotEntry::Deferred { formatter, info } => formatter.new_crash_entry(&info),
            SlotEntry::Ready(entry) => entry,
        })
    }

    pub fn is_filled(&self) -> bool {
        self.entry.lock().is_some()
    }

    /// Whether the entry is still to be opened.
    pub fn is_deferred(&self) -> bool {
        matches!(*self.entry.lock(), Some(SlotEntry::Deferred { .. }))
    }
}

impl std::fmt::Debug for CrashEntrySlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CrashEntrySlot")
            .field("filled", &self.is_filled())
            .field("deferred", &self.is_deferred())
            .finish()
    }
}

/// Answers handler panics with a 500 and reports them.
#[derive(Clone)]
pub struct Recoverer {
    formatter: Option<Arc<dyn EntryFormatter>>,
    crash_sink: Option<SharedSink>,
}

impl Recoverer {
    /// Also installs the trace-recording panic hook.
    pub fn new() -> Self {
        install_panic_hook();
        Self {
            formatter: None,
            crash_sink: None,
        }
    }

    pub fn with_formatter<F: EntryFormatter + 'static>(self, formatter: F) -> Self {
        self.with_shared_formatter(Arc::new(formatter))
    }

    pub fn with_shared_formatter(mut self, formatter: Arc<dyn EntryFormatter>) -> Self {
        self.formatter = Some(formatter);
        self
    }

    /// Print reports to `sink` whichever formatter produced the entry.
    pub fn with_crash_sink<S: LogSink + 'static>(mut self, sink: S) -> Self {
        self.crash_sink = Some(Arc::new(sink));
        self
    }

    fn crash_entry(
        &self,
        info: &RequestInfo,
        slot: Option<Arc<CrashEntrySlot>>,
    ) -> Box<dyn CrashEntry> {
        let entry = match &self.formatter {
            Some(formatter) => formatter.new_crash_entry(info),
            None => slot
                .and_then(|slot| slot.take())
                .unwrap_or_else(|| new_crash_entry(info)),
        };
        match &self.crash_sink {
            Some(sink) => entry.with_sink(sink.clone()),
            None => entry,
        }
    }
}

impl Default for Recoverer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Middleware for Recoverer {
    async fn handle(&self, req: HttpRequest, next: Next) -> Result<HttpResponse, Error> {
        let info = RequestInfo::from_request(&req);
        let slot = req.extensions.get_arc::<CrashEntrySlot>();

        let payload = match AssertUnwindSafe(next(req)).catch_unwind().await {
            Ok(result) => return result,
            Err(payload) => payload,
        };

        let response = HttpResponse::internal_server_error().with_text(PANIC_RESPONSE_TEXT);

        let mut fault = Fault::from_panic(payload);
        fault.capture_if_missing();
        error!(
            method = %info.method,
            path = %info.path,
            panic = %fault,
            "Handler panicked"
        );

        report(self.crash_entry(&info, slot), fault);
        Ok(response)
    }
}

/// Render and print the report on a blocking task, or on a thread of its
/// own outside a tokio runtime. The fault's trace is symbolized there too.
fn report(mut entry: Box<dyn CrashEntry>, fault: Fault) {
    let job = move || {
        let trace = fault.trace_or_capture();
        let written = panic::catch_unwind(AssertUnwindSafe(|| entry.write(&fault, &trace)));
        if written.is_err() {
            error!(panic = %fault, "Crash report failed, printing raw trace");
            StderrSink::new().print(&format!("panic: {}\n{}", fault, trace));
        }
    };

    match tokio::runtime::Handle::try_current() {
        Ok(handle) => {
            debug!("Rendering crash report on blocking pool");
            drop(handle.spawn_blocking(job));
        }
        Err(_) => {
            let spawned = std::thread::Builder::new()
                .name("scrivener-crash".to_string())
                .spawn(job);
            if let Err(err) = spawned {
                error!(error = %err, "Failed to start crash reporter thread");
            }
        }
    }
}
