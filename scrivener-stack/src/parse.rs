//! Stack dump parser.
//!
//! Accepts the `Display` output of `std::backtrace::Backtrace` (short and
//! full formats) and multi-thread dumps made of `thread '<name>' ...:` blocks.
//! Lines that are neither headers, frames, locations, origins nor truncation
//! markers are kept verbatim in [`Snapshot::unclassified`].

use crate::error::ParseError;
use crate::types::{Frame, Location, ThreadRecord};
use once_cell::sync::Lazy;
use regex::Regex;

static HEADER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*thread '(?P<name>[^']*)'(?:\s+\((?P<id>\d+)\))?(?:\s+\[(?P<attrs>[^\]]*)\])?:\s*$")
        .expect("header pattern is valid")
});

static FRAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?P<idx>\d+):\s+(?:(?P<addr>0x[0-9a-fA-F]+)(?:\s+-\s+(?P<sym>.+?))?|(?P<bare>.+?))\s*$")
        .expect("frame pattern is valid")
});

static INLINED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s{4,}(?P<sym>[A-Za-z_<][^\s]*(?:\s+as\s+[^\s]+)?)\s*$")
        .expect("inlined frame pattern is valid")
});

static AT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*at\s+(?P<file>.+?):(?P<line>\d+)(?::(?P<col>\d+))?\s*$")
        .expect("location pattern is valid")
});

static OMITTED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?:\[\.\.\. omitted \d+ frames? \.\.\.\]|note: Some details are omitted)")
        .expect("omitted pattern is valid")
});

static CREATED_BY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*created by\s+(?P<sym>.+?)\s*$").expect("created-by pattern is valid")
});

static SLEEP: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<n>\d+) minutes?$").expect("sleep pattern is valid")
});

/// Symbol prefixes of frames that belong to the capture machinery.
pub const DEFAULT_ELIDE_PREFIXES: &[&str] = &[
    "std::backtrace::",
    "std::backtrace_rs::",
    "backtrace::",
    "std::panicking::",
    "core::panicking::",
    "std::panic::",
    "rust_begin_unwind",
    "__rustc::rust_begin_unwind",
    "std::sys::backtrace::",
    "std::sys_common::backtrace::",
    "scrivener_core::trace::",
    "__rust_try",
    "core::panic::unwind_safe::",
    "futures_util::future::future::catch_unwind::",
];

/// Symbol fragments of the frame that calls the installed panic hook.
///
/// Every frame above it belongs to the hook and its dispatch, so a stack
/// that contains one starts right below it.
pub const DEFAULT_HOOK_MARKERS: &[&str] = &[
    "std::panicking::rust_panic_with_hook",
    "std::panicking::panic_with_hook",
    "PanicHookInfo",
];

/// Knobs for [`parse_dump`].
#[derive(Debug, Clone)]
pub struct ParseOptions {
    /// Frames whose symbol starts with any of these are dropped.
    pub elide_prefixes: Vec<String>,
    /// A frame whose symbol contains any of these is dropped together with
    /// every frame recorded above it in the same thread.
    pub hook_markers: Vec<String>,
    /// Name given to frames that appear before any thread header.
    pub implicit_thread_name: String,
    /// State given to the implicit thread.
    pub implicit_state: String,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            elide_prefixes: DEFAULT_ELIDE_PREFIXES.iter().map(|p| p.to_string()).collect(),
            hook_markers: DEFAULT_HOOK_MARKERS.iter().map(|m| m.to_string()).collect(),
            implicit_thread_name: "current".to_string(),
            implicit_state: "running".to_string(),
        }
    }
}

impl ParseOptions {
    /// Options that keep every frame.
    pub fn keep_all() -> Self {
        Self {
            elide_prefixes: Vec::new(),
            hook_markers: Vec::new(),
            ..Self::default()
        }
    }

    pub fn with_elide_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.elide_prefixes.push(prefix.into());
        self
    }

    fn is_elided(&self, symbol: &str) -> bool {
        let symbol = symbol.trim_start_matches('<');
        self.elide_prefixes
            .iter()
            .any(|prefix| symbol.starts_with(prefix.as_str()))
    }

    fn is_hook_dispatch(&self, symbol: &str) -> bool {
        self.hook_markers
            .iter()
            .any(|marker| symbol.contains(marker.as_str()))
    }
}

/// Result of a successful parse.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    /// Threads in dump order; the first one triggered the capture.
    pub threads: Vec<ThreadRecord>,
    /// Lines the parser did not recognize, in order.
    pub unclassified: Vec<String>,
}

impl Snapshot {
    pub fn unclassified_text(&self) -> String {
        self.unclassified.join("\n")
    }

    pub fn frame_count(&self) -> usize {
        self.threads.iter().map(|t| t.stack.calls.len()).sum()
    }
}

/// What the most recent location line should attach to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Anchor {
    None,
    Frame,
    CreatedBy,
    Skipped,
}

struct DumpBuilder<'a> {
    options: &'a ParseOptions,
    threads: Vec<ThreadRecord>,
    current: Option<ThreadRecord>,
    unclassified: Vec<String>,
    anchor: Anchor,
    frames_seen: usize,
    /// The current thread passed a panic hook dispatch frame.
    hooked: bool,
    next_id: u64,
}

impl<'a> DumpBuilder<'a> {
    fn new(options: &'a ParseOptions) -> Self {
        Self {
            options,
            threads: Vec::new(),
            current: None,
            unclassified: Vec::new(),
            anchor: Anchor::None,
            frames_seen: 0,
            hooked: false,
            next_id: 1,
        }
    }

    fn line(&mut self, line: &str) {
        if let Some(caps) = HEADER.captures(line) {
            let id = caps
                .name("id")
                .and_then(|m| m.as_str().parse().ok())
                .unwrap_or_else(|| self.allocate_id());
            let mut record = ThreadRecord::new(id, &caps["name"], "");
            apply_attributes(&mut record, caps.name("attrs").map(|m| m.as_str()));
            self.start(record);
            return;
        }

        if let Some(caps) = CREATED_BY.captures(line) {
            let frame = Frame::from_symbol(&caps["sym"], "");
            self.thread().created_by = Some(frame);
            self.anchor = Anchor::CreatedBy;
            return;
        }

        if let Some(caps) = AT.captures(line) {
            let location = Location {
                file: caps["file"].to_string(),
                line: caps["line"].parse().unwrap_or(0),
                column: caps.name("col").and_then(|m| m.as_str().parse().ok()),
            };
            if self.attach(location) {
                return;
            }
        }

        if OMITTED.is_match(line) {
            if self.current.is_some() || self.frames_seen > 0 {
                self.thread().stack.elided = true;
                self.anchor = Anchor::None;
                return;
            }
        }

        if let Some(caps) = FRAME.captures(line) {
            let address = caps.name("addr").map(|m| m.as_str()).unwrap_or("");
            let symbol = caps
                .name("sym")
                .or_else(|| caps.name("bare"))
                .map(|m| m.as_str())
                .unwrap_or("<unknown>");
            self.frame(symbol, address);
            return;
        }

        if matches!(self.anchor, Anchor::Frame | Anchor::Skipped) {
            if let Some(caps) = INLINED.captures(line) {
                self.frame(&caps["sym"], "");
                return;
            }
        }

        self.unclassified.push(line.to_string());
    }

    fn frame(&mut self, symbol: &str, address: &str) {
        if self.options.is_hook_dispatch(symbol) {
            let thread = self.thread();
            let dropped = thread.stack.calls.len();
            thread.stack.calls.clear();
            self.frames_seen = self.frames_seen.saturating_sub(dropped);
            self.hooked = true;
            self.anchor = Anchor::Skipped;
            return;
        }
        if self.options.is_elided(symbol) {
            self.anchor = Anchor::Skipped;
            return;
        }
        let frame = Frame::from_symbol(symbol, address);
        self.thread().stack.calls.push(frame);
        self.frames_seen += 1;
        self.anchor = Anchor::Frame;
    }

    fn attach(&mut self, location: Location) -> bool {
        if self.anchor == Anchor::Skipped {
            return true;
        }
        let Some(thread) = self.current.as_mut() else {
            return false;
        };
        match self.anchor {
            Anchor::Frame => match thread.stack.calls.last_mut() {
                Some(frame) if frame.location.is_none() => frame.set_location(location),
                _ => return false,
            },
            Anchor::CreatedBy => match thread.created_by.as_mut() {
                Some(frame) if frame.location.is_none() => frame.set_location(location),
                _ => return false,
            },
            Anchor::Skipped => {}
            Anchor::None => return false,
        }
        true
    }

    fn allocate_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn start(&mut self, record: ThreadRecord) {
        self.close_thread();
        self.current = Some(record);
        self.anchor = Anchor::None;
    }

    /// The thread being filled, opening the implicit one if needed.
    fn thread(&mut self) -> &mut ThreadRecord {
        let options = self.options;
        let next_id = &mut self.next_id;
        self.current.get_or_insert_with(|| {
            let id = *next_id;
            *next_id += 1;
            ThreadRecord::new(
                id,
                options.implicit_thread_name.clone(),
                options.implicit_state.clone(),
            )
        })
    }

    /// Move the current thread to the finished list. A thread that went
    /// through the panic hook loses the toolchain frames that raised the
    /// panic, so its stack starts at the faulting caller.
    fn close_thread(&mut self) {
        let Some(mut done) = self.current.take() else {
            return;
        };
        if std::mem::take(&mut self.hooked) {
            let calls = &mut done.stack.calls;
            let leading = calls.iter().take_while(|f| f.is_stdlib).count();
            if leading < calls.len() {
                calls.drain(..leading);
                self.frames_seen -= leading;
            }
        }
        self.threads.push(done);
    }

    fn finish(mut self, lines: usize) -> Result<Snapshot, ParseError> {
        self.close_thread();
        if self.frames_seen == 0 {
            return Err(ParseError::NoFrames { lines });
        }
        if let Some(first) = self.threads.first_mut() {
            first.first = true;
        }
        mark_main(&mut self.threads);
        Ok(Snapshot {
            threads: self.threads,
            unclassified: self.unclassified,
        })
    }
}

fn apply_attributes(record: &mut ThreadRecord, attrs: Option<&str>) {
    let Some(attrs) = attrs else {
        return;
    };
    let mut parts = attrs.split(',').map(str::trim).filter(|p| !p.is_empty());
    if let Some(state) = parts.next() {
        record.state = state.to_string();
    }
    for part in parts {
        if part == "locked" {
            record.locked = true;
        } else if let Some(caps) = SLEEP.captures(part) {
            record.sleep_minutes = caps["n"].parse().ok();
        } else {
            record.state = format!("{}, {}", record.state, part);
        }
    }
}

/// Flag frames that belong to the program entry crate.
fn mark_main(threads: &mut [ThreadRecord]) {
    let main_crate = threads
        .iter()
        .flat_map(|t| t.stack.calls.iter())
        .find(|f| !f.is_stdlib && !f.crate_name.is_empty() && f.function == "main")
        .map(|f| f.crate_name.clone());

    let is_main = |frame: &Frame| {
        frame.symbol == "main"
            || main_crate
                .as_deref()
                .is_some_and(|name| !frame.is_stdlib && frame.crate_name == name)
    };

    for thread in threads.iter_mut() {
        for frame in thread.stack.calls.iter_mut() {
            frame.is_main = is_main(frame);
        }
        if let Some(frame) = thread.created_by.as_mut() {
            frame.is_main = is_main(frame);
        }
    }
}

/// Parse raw dump text into thread records.
///
/// Fails with [`ParseError::Empty`] for blank input and
/// [`ParseError::NoFrames`] when nothing in the text looks like a frame.
pub fn parse_dump(raw: &str, options: &ParseOptions) -> Result<Snapshot, ParseError> {
    if raw.trim().is_empty() {
        return Err(ParseError::Empty);
    }

    let mut builder = DumpBuilder::new(options);
    let mut lines = 0;
    for line in raw.lines() {
        lines += 1;
        builder.line(line);
    }

    let snapshot = builder.finish(lines)?;
    tracing::debug!(
        target: "scrivener::stack",
        "parsed {} thread(s), {} frame(s), {} unclassified line(s)",
        snapshot.threads.len(),
        snapshot.frame_count(),
        snapshot.unclassified.len()
    );
    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHORT: &str = "\
stack backtrace:
   0: std::panicking::begin_panic
             at /rustc/abc/library/std/src/panicking.rs:652:12
   1: app::handlers::index
             at ./src/handlers.rs:12:5
   2: app::main
             at ./src/main.rs:4:5
note: Some details are omitted, run with `RUST_BACKTRACE=full` for a verbose backtrace.";

    const MULTI: &str = "\
thread 'main' (1) [running]:
   0: app::main
             at ./src/main.rs:3:1
thread 'worker-1' (2) [parked, 5 minutes, locked]:
   0: std::thread::park
             at /rustc/abc/library/std/src/thread/mod.rs:1070:5
   1:     0x55d5c5f2e0a1 - app::pool::Worker::run::h0123456789abcdef
             at ./src/pool.rs:88:17
      [... omitted 3 frames ...]
created by app::pool::Pool::spawn
             at ./src/pool.rs:41:9";

    const HOOKED: &str = "\
   0: std::backtrace_rs::backtrace::libunwind::trace
             at /rustc/abc/library/std/src/../../backtrace/src/backtrace/libunwind.rs:116:5
   1: std::backtrace::Backtrace::force_capture
             at /rustc/abc/library/std/src/backtrace.rs:312:9
   2: scrivener_core::trace::install_panic_hook::{{closure}}::{{closure}}
             at ./scrivener-core/src/trace.rs:144:33
   3: audit::hooks::report::{{closure}}
             at ./src/hooks.rs:9:13
   4: <alloc::boxed::Box<dyn for<'a, 'b> core::ops::function::Fn<(&'a std::panic::PanicHookInfo<'b>,), Output = ()> + core::marker::Sync + core::marker::Send> as core::ops::function::Fn<(&std::panic::PanicHookInfo,)>>::call
             at /rustc/abc/library/alloc/src/boxed.rs:2254:9
   5: std::panicking::rust_panic_with_hook
             at /rustc/abc/library/std/src/panicking.rs:833:13
   6: std::panicking::begin_panic_handler::{{closure}}
             at /rustc/abc/library/std/src/panicking.rs:706:13
   7: std::sys::backtrace::__rust_end_short_backtrace
             at /rustc/abc/library/std/src/sys/backtrace.rs:168:18
   8: __rustc::rust_begin_unwind
             at /rustc/abc/library/std/src/panicking.rs:697:5
   9: core::panicking::panic_fmt
             at /rustc/abc/library/core/src/panicking.rs:75:14
  10: shop::checkout::charge
             at ./src/checkout.rs:77:13
  11: <core::panic::unwind_safe::AssertUnwindSafe<F> as core::ops::function::FnOnce<()>>::call_once
             at /rustc/abc/library/core/src/panic/unwind_safe.rs:272:9
  12: std::panicking::catch_unwind::do_call
             at /rustc/abc/library/std/src/panicking.rs:589:40
  13: __rust_try
  14: std::panic::catch_unwind
             at /rustc/abc/library/std/src/panic.rs:358:14
  15: shop::main
             at ./src/main.rs:8:5";

    #[test]
    fn test_hook_dispatch_frames_are_dropped() {
        let snapshot = parse_dump(HOOKED, &ParseOptions::default()).unwrap();
        let symbols: Vec<_> = snapshot.threads[0]
            .stack
            .calls
            .iter()
            .map(|f| f.symbol.as_str())
            .collect();
        assert_eq!(symbols, vec!["shop::checkout::charge", "shop::main"]);
        assert!(snapshot.unclassified.is_empty());
    }

    #[test]
    fn test_legacy_hook_dispatch_symbol() {
        let dump = "\
   0: <alloc::boxed::Box<F,A> as core::ops::function::Fn<Args>>::call
   1: std::panicking::panic_with_hook
   2: app::run
   3: app::main";
        let snapshot = parse_dump(dump, &ParseOptions::default()).unwrap();
        assert_eq!(snapshot.frame_count(), 2);
        assert_eq!(snapshot.threads[0].stack.calls[0].symbol, "app::run");
    }

    #[test]
    fn test_hooked_stack_starts_at_faulting_caller() {
        let dump = "\
   0: std::panicking::rust_panic_with_hook
             at /rustc/abc/library/std/src/panicking.rs:833:13
   1: core::panicking::panic_bounds_check
             at /rustc/abc/library/core/src/panicking.rs:280:5
   2: <usize as core::slice::index::SliceIndex<[T]>>::index
             at /rustc/abc/library/core/src/slice/index.rs:266:10
   3: <alloc::vec::Vec<T,A> as core::ops::index::Index<I>>::index
             at /rustc/abc/library/alloc/src/vec/mod.rs:3361:9
   4: shop::ledger::entry
             at ./src/ledger.rs:14:5
   5: core::ops::function::FnOnce::call_once
             at /rustc/abc/library/core/src/ops/function.rs:250:5
   6: shop::main
             at ./src/main.rs:3:5";
        let snapshot = parse_dump(dump, &ParseOptions::default()).unwrap();
        let symbols: Vec<_> = snapshot.threads[0]
            .stack
            .calls
            .iter()
            .map(|f| f.symbol.as_str())
            .collect();
        assert_eq!(
            symbols,
            vec!["shop::ledger::entry", "core::ops::function::FnOnce::call_once", "shop::main"]
        );
    }

    #[test]
    fn test_unhooked_stack_keeps_leading_toolchain_frames() {
        let dump = "\
   0: std::thread::park
             at /rustc/abc/library/std/src/thread/mod.rs:1070:5
   1: app::pool::run
             at ./src/pool.rs:8:5";
        let snapshot = parse_dump(dump, &ParseOptions::default()).unwrap();
        assert_eq!(snapshot.frame_count(), 2);
    }

    #[test]
    fn test_keep_all_keeps_hook_frames() {
        let snapshot = parse_dump(HOOKED, &ParseOptions::keep_all()).unwrap();
        assert_eq!(snapshot.frame_count(), 16);
    }

    #[test]
    fn test_empty_is_error() {
        let options = ParseOptions::default();
        assert_eq!(parse_dump("", &options), Err(ParseError::Empty));
        assert_eq!(parse_dump("  \n\t\n", &options), Err(ParseError::Empty));
    }

    #[test]
    fn test_text_without_frames_is_error() {
        let err = parse_dump("just a message\nand another", &ParseOptions::default());
        assert_eq!(err, Err(ParseError::NoFrames { lines: 2 }));
    }

    #[test]
    fn test_short_backtrace_becomes_implicit_thread() {
        let snapshot = parse_dump(SHORT, &ParseOptions::default()).unwrap();
        assert_eq!(snapshot.threads.len(), 1);

        let thread = &snapshot.threads[0];
        assert_eq!(thread.name, "current");
        assert_eq!(thread.state, "running");
        assert!(thread.first);
        assert!(thread.stack.elided);

        let symbols: Vec<_> = thread.stack.calls.iter().map(|f| f.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["app::handlers::index", "app::main"]);
        assert_eq!(thread.stack.calls[0].src_line(false), "handlers.rs:12");
        assert_eq!(snapshot.unclassified, vec!["stack backtrace:".to_string()]);
    }

    #[test]
    fn test_keep_all_keeps_capture_frames() {
        let snapshot = parse_dump(SHORT, &ParseOptions::keep_all()).unwrap();
        assert_eq!(snapshot.threads[0].stack.calls.len(), 3);
        assert!(snapshot.threads[0].stack.calls[0].is_stdlib);
    }

    #[test]
    fn test_multi_thread_headers() {
        let snapshot = parse_dump(MULTI, &ParseOptions::default()).unwrap();
        assert_eq!(snapshot.threads.len(), 2);
        assert!(snapshot.threads[0].first);
        assert!(!snapshot.threads[1].first);

        let worker = &snapshot.threads[1];
        assert_eq!(worker.id, 2);
        assert_eq!(worker.name, "worker-1");
        assert_eq!(worker.state, "parked");
        assert_eq!(worker.sleep_minutes, Some(5));
        assert!(worker.locked);
        assert!(worker.stack.elided);
        assert_eq!(worker.stack.calls[1].args, "0x55d5c5f2e0a1");
        assert_eq!(worker.stack.calls[1].function, "pool::Worker::run");

        let origin = worker.created_by.as_ref().unwrap();
        assert_eq!(origin.symbol, "app::pool::Pool::spawn");
        assert_eq!(origin.src_line(false), "pool.rs:41");
        assert!(snapshot.unclassified.is_empty());
    }

    #[test]
    fn test_main_crate_detection() {
        let snapshot = parse_dump(MULTI, &ParseOptions::default()).unwrap();
        let worker = &snapshot.threads[1];
        assert!(!worker.stack.calls[0].is_main);
        assert!(worker.stack.calls[1].is_main);
        assert!(worker.created_by.as_ref().unwrap().is_main);
    }

    #[test]
    fn test_panic_message_is_unclassified() {
        let dump = "thread 'main' panicked at src/main.rs:2:5:\nboom\n   0: app::main\n";
        let snapshot = parse_dump(dump, &ParseOptions::default()).unwrap();
        assert_eq!(
            snapshot.unclassified,
            vec!["thread 'main' panicked at src/main.rs:2:5:".to_string(), "boom".to_string()]
        );
        assert_eq!(snapshot.threads[0].name, "current");
    }

    #[test]
    fn test_full_format_inlined_frames() {
        let dump = "\
   0:     0x5633aa - app::serve::{{closure}}
                               at ./src/serve.rs:20:9
                           app::serve
                               at ./src/serve.rs:18:5
   1:     0x5633bb - app::main";
        let snapshot = parse_dump(dump, &ParseOptions::default()).unwrap();
        let calls = &snapshot.threads[0].stack.calls;
        assert_eq!(calls.len(), 3);
        assert!(!calls[0].is_exported);
        assert_eq!(calls[1].symbol, "app::serve");
        assert_eq!(calls[1].src_line(false), "serve.rs:18");
        assert_eq!(calls[2].args, "0x5633bb");
    }

    #[test]
    fn test_custom_elide_prefix() {
        let options = ParseOptions::default().with_elide_prefix("app::handlers::");
        let snapshot = parse_dump(SHORT, &options).unwrap();
        let calls = &snapshot.threads[0].stack.calls;
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].symbol, "app::main");
    }
}
