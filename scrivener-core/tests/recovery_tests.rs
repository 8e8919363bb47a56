// Integration tests for crash capture and reporting

use scrivener_core::prelude::*;
use scrivener_core::{
    CrashEntry, CrashEntrySlot, Fault, LogEntry, RequestInfo, install_panic_hook,
    set_default_formatter,
};
use scrivener_stack::{Palette, ParseOptions, RenderOptions, render_dump};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

const HANDLER_TRACE: &str = "\
   0: shop::checkout::charge
             at ./src/checkout.rs:77:13
   1: shop::checkout::handle
             at ./src/checkout.rs:31:5
";

fn quiet(sink: &Arc<MemorySink>) -> DefaultFormatter {
    DefaultFormatter::new()
        .no_color(true)
        .env_hint(false)
        .with_sink(sink.clone())
        .with_crash_sink(sink.clone())
}

fn panicking_next(traced: bool) -> Next {
    Box::new(move |_req| {
        Box::pin(async move {
            if traced {
                std::panic::panic_any(TracedError::with_trace("card declined", HANDLER_TRACE));
            }
            if !traced {
                panic!("card declined");
            }
            Ok(HttpResponse::ok())
        })
    })
}

#[tokio::test]
async fn test_traced_fault_renders_its_own_trace() {
    let sink = MemorySink::shared();
    let res = Recoverer::new()
        .with_formatter(quiet(&sink))
        .handle(HttpRequest::new("POST", "/checkout"), panicking_next(true))
        .await
        .unwrap();
    assert_eq!(res.status, 500);

    assert!(sink.wait_for(1, Duration::from_secs(10)));
    let report = &sink.lines()[0];
    assert!(report.contains("panic: card declined\n"));
    assert!(report.contains("1: running\n"));
    assert!(report.contains("shop checkout.rs:77 checkout::charge()"));
    assert!(report.contains("shop checkout.rs:31 checkout::handle()"));
}

#[tokio::test]
async fn test_bare_fault_gets_a_captured_trace() {
    let sink = MemorySink::shared();
    Recoverer::new()
        .with_formatter(quiet(&sink))
        .handle(HttpRequest::new("POST", "/checkout"), panicking_next(false))
        .await
        .unwrap();

    assert!(sink.wait_for(1, Duration::from_secs(10)));
    let report = &sink.lines()[0];
    let (_, rendered) = report.split_once("panic: card declined\n").unwrap();
    assert!(!rendered.trim().is_empty());
}

#[tokio::test]
async fn test_logger_and_recoverer_share_formatter() {
    let sink = MemorySink::shared();
    let chain = MiddlewareChain::new()
        .with(RequestLogger::with_formatter(quiet(&sink)))
        .with(Recoverer::new());

    let res = chain
        .apply(
            HttpRequest::new("GET", "/explode").with_header("Host", "shop"),
            handler(|req: HttpRequest| async move {
                if req.extensions.contains::<CrashEntrySlot>() {
                    std::panic::panic_any(TracedError::with_trace("slot", HANDLER_TRACE));
                }
                Ok(HttpResponse::ok())
            }),
        )
        .await
        .unwrap();
    assert_eq!(res.status, 500);

    assert!(sink.wait_for(2, Duration::from_secs(10)));
    let lines = sink.lines();
    assert!(lines.iter().any(|l| l.contains("HTTP/1.1\" → \"500 21B ")));
    assert!(lines.iter().any(|l| l.contains("\"GET http://shop/explode HTTP/1.1\" panic: slot\n")));
}

#[test]
fn test_default_formatter_is_replaceable() {
    let sink = MemorySink::shared();
    let previous = set_default_formatter(Arc::new(quiet(&sink)));

    tokio_test::block_on(async {
        let res = Recoverer::new()
            .handle(HttpRequest::new("GET", "/default"), panicking_next(true))
            .await
            .unwrap();
        assert_eq!(res.status, 500);
        assert!(sink.wait_for(1, Duration::from_secs(10)));
    });
    assert!(sink.lines()[0].contains("panic: card declined"));

    set_default_formatter(previous);
}

#[test]
fn test_fault_message_and_trace() {
    let fault = Fault::with_trace("db down", HANDLER_TRACE);
    assert_eq!(fault.to_string(), "db down");
    assert_eq!(fault.trace_or_capture(), HANDLER_TRACE);
}

/// Counts the crash entries it opens.
struct CountingFormatter {
    inner: DefaultFormatter,
    crash_entries: Arc<AtomicUsize>,
}

impl EntryFormatter for CountingFormatter {
    fn accept(&self, req: &RequestInfo) -> bool {
        self.inner.accept(req)
    }

    fn new_log_entry(&self, req: &RequestInfo) -> Box<dyn LogEntry> {
        self.inner.new_log_entry(req)
    }

    fn new_crash_entry(&self, req: &RequestInfo) -> Box<dyn CrashEntry> {
        self.crash_entries.fetch_add(1, Ordering::SeqCst);
        self.inner.new_crash_entry(req)
    }
}

#[tokio::test]
async fn test_crash_entries_are_opened_only_for_faults() {
    let sink = MemorySink::shared();
    let crash_entries = Arc::new(AtomicUsize::new(0));
    let chain = MiddlewareChain::new()
        .with(RequestLogger::with_formatter(CountingFormatter {
            inner: quiet(&sink),
            crash_entries: crash_entries.clone(),
        }))
        .with(Recoverer::new());

    for path in ["/a", "/b", "/c"] {
        let res = chain
            .apply(
                HttpRequest::new("GET", path),
                handler(|_req| async { Ok(HttpResponse::ok()) }),
            )
            .await
            .unwrap();
        assert_eq!(res.status, 200);
    }
    assert_eq!(crash_entries.load(Ordering::SeqCst), 0);

    let res = chain
        .apply(HttpRequest::new("GET", "/checkout"), handler(|req| panicking_next(true)(req)))
        .await
        .unwrap();
    assert_eq!(res.status, 500);
    assert_eq!(crash_entries.load(Ordering::SeqCst), 1);
    assert!(sink.wait_for(5, Duration::from_secs(10)));
}

#[inline(never)]
fn charge_card(ledger: &[u32], index: usize) -> u32 {
    ledger[index]
}

#[inline(never)]
fn refuse_card() {
    panic!("card refused");
}

fn first_frame_line(report: &str) -> &str {
    report
        .lines()
        .find(|line| line.starts_with("    "))
        .unwrap_or_default()
}

fn render_with_defaults(fault: &Fault) -> String {
    render_dump(
        &fault.trace_or_capture(),
        &ParseOptions::default(),
        &Palette::PLAIN,
        &RenderOptions::default(),
    )
    .unwrap()
}

#[test]
fn test_real_panic_report_starts_at_the_faulting_frame() {
    install_panic_hook();

    let index = std::hint::black_box(7);
    let payload = std::panic::catch_unwind(|| charge_card(&[1, 2, 3], index)).unwrap_err();
    let fault = Fault::from_panic(payload);
    assert!(fault.message().contains("index out of bounds"));
    assert!(!fault.trace_is_resolved());

    let report = render_with_defaults(&fault);
    let first = first_frame_line(&report);
    assert!(first.contains("charge_card()"), "report opens with {first:?}\n{report}");
    assert!(!report.contains("PanicHookInfo"));
    assert!(!report.contains("__rust_try"));

    let payload = std::panic::catch_unwind(refuse_card).unwrap_err();
    let report = render_with_defaults(&Fault::from_panic(payload));
    let first = first_frame_line(&report);
    assert!(first.contains("refuse_card()"), "report opens with {first:?}\n{report}");
}
