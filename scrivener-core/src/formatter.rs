//! Request log formatting.
//!
//! An [`EntryFormatter`] opens one [`LogEntry`] per accepted request and,
//! when a handler panics, one [`CrashEntry`]. Both start from the same
//! request preamble:
//!
//! ```text
//! «203.0.113.7 [4bf92f35]» "GET http://example.com/x HTTP/1.1"
//! ```
//!
//! A log entry is closed with the outcome and flushed to its sink once:
//!
//! ```text
//! «203.0.113.7 [4bf92f35]» "GET http://example.com/x HTTP/1.1" → "200 42B 10ms"
//! ```
//!
//! A crash entry appends `panic: <message>` and the rendered stack report.
//!
//! The process-wide default formatter is read with [`default_formatter`]
//! and replaced with [`set_default_formatter`]; middleware given their own
//! formatter never consult it.

use crate::client_ip::{client_ip, remote_ip};
use crate::extension_set::ExtensionSet;
use crate::http::HttpRequest;
use crate::middleware::RequestId;
use crate::sink::{LogSink, SharedSink, StderrSink, StdoutSink};
use crate::trace::Fault;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use regex::Regex;
use scrivener_stack::{ColorWriter, Palette, ParseOptions, RenderOptions, Style, cwrite, render_dump};
use std::fmt::{self, Write};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

/// Status band styles, informational through server error.
static STATUS_STYLES: [Style; 5] = [
    Style::BOLD_BLUE,
    Style::BOLD_GREEN,
    Style::BOLD_CYAN,
    Style::BOLD_YELLOW,
    Style::BOLD_RED,
];

/// Latency band styles, fast through slow.
static LATENCY_STYLES: [Style; 3] = [Style::GREEN, Style::YELLOW, Style::RED];

/// What the formatter needs to know about a request, captured when it
/// arrives.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestInfo {
    pub method: String,
    pub tls: bool,
    pub host: String,
    pub path: String,
    /// Request target as sent, path plus query.
    pub uri: String,
    pub protocol: String,
    /// Socket peer IP.
    pub remote_ip: Option<String>,
    /// Client IP as reported by forwarding proxies, else the peer.
    pub client_ip: Option<String>,
    pub request_id: Option<String>,
}

impl RequestInfo {
    pub fn from_request(req: &HttpRequest) -> Self {
        let request_id = req
            .extensions
            .get::<RequestId>()
            .map(|id| id.as_str().to_string())
            .or_else(|| req.header(RequestId::HEADER).map(str::to_string))
            .filter(|id| !id.is_empty());

        Self {
            method: req.method.clone(),
            tls: req.tls,
            host: req.host().to_string(),
            path: req.path.clone(),
            uri: req.uri.clone(),
            protocol: req.protocol.clone(),
            remote_ip: remote_ip(req),
            client_ip: client_ip(req),
            request_id,
        }
    }

    pub fn scheme(&self) -> &'static str {
        if self.tls { "https" } else { "http" }
    }
}

/// Color band of a response status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusBand {
    /// Below 200.
    Informational,
    /// 200 to 299.
    Success,
    /// 300 to 399.
    Redirect,
    /// 400 to 499.
    ClientError,
    /// 500 and above.
    ServerError,
}

impl StatusBand {
    pub fn of(status: u16) -> Self {
        match status {
            s if s < 200 => StatusBand::Informational,
            s if s < 300 => StatusBand::Success,
            s if s < 400 => StatusBand::Redirect,
            s if s < 500 => StatusBand::ClientError,
            _ => StatusBand::ServerError,
        }
    }

    pub fn style(&self) -> &'static Style {
        match self {
            StatusBand::Informational => &STATUS_STYLES[0],
            StatusBand::Success => &STATUS_STYLES[1],
            StatusBand::Redirect => &STATUS_STYLES[2],
            StatusBand::ClientError => &STATUS_STYLES[3],
            StatusBand::ServerError => &STATUS_STYLES[4],
        }
    }
}

/// Color band of a request's elapsed time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LatencyBand {
    /// Under 500ms.
    Fast,
    /// Under 5s.
    Medium,
    Slow,
}

impl LatencyBand {
    pub fn of(elapsed: Duration) -> Self {
        if elapsed < Duration::from_millis(500) {
            LatencyBand::Fast
        } else if elapsed < Duration::from_secs(5) {
            LatencyBand::Medium
        } else {
            LatencyBand::Slow
        }
    }

    pub fn style(&self) -> &'static Style {
        match self {
            LatencyBand::Fast => &LATENCY_STYLES[0],
            LatencyBand::Medium => &LATENCY_STYLES[1],
            LatencyBand::Slow => &LATENCY_STYLES[2],
        }
    }
}

/// Cut `uri` to `max` characters plus ` ...` when it is more than four
/// characters longer than `max`. Zero disables truncation.
pub fn truncate_uri(uri: &str, max: usize) -> std::borrow::Cow<'_, str> {
    if max == 0 || uri.chars().count() <= max + 4 {
        return uri.into();
    }
    let end = uri.char_indices().nth(max).map_or(uri.len(), |(i, _)| i);
    format!("{} ...", &uri[..end]).into()
}

/// Write the `«addr [id]» "METHOD scheme://host/uri PROTO" ` preamble.
pub fn write_request_preamble<W: Write + ?Sized>(
    out: &mut W,
    writer: ColorWriter,
    use_color: bool,
    max_uri_len: usize,
    addr: &str,
    info: &RequestInfo,
) -> fmt::Result {
    write!(out, "«{}", addr)?;
    if let Some(id) = &info.request_id {
        cwrite!(writer, out, use_color, &Style::YELLOW, " [{}]", id)?;
    }
    out.write_str("» ")?;
    cwrite!(writer, out, use_color, &Style::CYAN, "\"")?;
    cwrite!(writer, out, use_color, &Style::BOLD_MAGENTA, "{} ", info.method)?;
    cwrite!(
        writer,
        out,
        use_color,
        &Style::CYAN,
        "{}://{}{} {}\" ",
        info.scheme(),
        info.host,
        truncate_uri(&info.uri, max_uri_len),
        info.protocol
    )
}

/// Write the `→ "STATUS BYTESB ELAPSED"` outcome.
pub fn write_response_outcome<W: Write + ?Sized>(
    out: &mut W,
    writer: ColorWriter,
    use_color: bool,
    status: u16,
    bytes: u64,
    elapsed: Duration,
) -> fmt::Result {
    out.write_str("→ \"")?;
    cwrite!(writer, out, use_color, StatusBand::of(status).style(), "{:03}", status)?;
    cwrite!(writer, out, use_color, &Style::BOLD_BLUE, " {}B ", bytes)?;
    cwrite!(writer, out, use_color, LatencyBand::of(elapsed).style(), "{:?}", elapsed)?;
    out.write_str("\"")
}

/// Accumulates one request's access line.
pub trait LogEntry: Send {
    /// Close the entry with the response outcome and flush it. Only the
    /// first call has any effect.
    fn write(&mut self, status: u16, bytes: u64, elapsed: Duration);

    /// A copy of this entry, buffered text included, bound to `sink`.
    fn with_sink(&self, sink: SharedSink) -> Box<dyn LogEntry>;
}

/// Produces the report for a fault raised while handling one request.
pub trait CrashEntry: Send {
    /// Render `trace` for `fault` and flush. Only the first call has any
    /// effect.
    fn write(&mut self, fault: &Fault, trace: &str);

    /// A copy of this entry bound to `sink`.
    fn with_sink(&self, sink: SharedSink) -> Box<dyn CrashEntry>;
}

/// Decides which requests are logged and opens their entries.
pub trait EntryFormatter: Send + Sync {
    fn accept(&self, req: &RequestInfo) -> bool;

    fn new_log_entry(&self, req: &RequestInfo) -> Box<dyn LogEntry>;

    fn new_crash_entry(&self, req: &RequestInfo) -> Box<dyn CrashEntry>;
}

/// The stock formatter.
///
/// Access lines go to standard output and crash reports to standard error,
/// both with a timestamp prefix. Requests for static assets (see
/// [`ExtensionSet::default_ignored`]) are not logged.
#[derive(Clone)]
pub struct DefaultFormatter {
    sink: SharedSink,
    crash_sink: SharedSink,
    no_color: bool,
    no_color_tty_check: bool,
    ignore_extensions: ExtensionSet,
    truncate_uri: usize,
    real_ip: bool,
    palette: Arc<Palette>,
    parse: Arc<ParseOptions>,
    render: Arc<RenderOptions>,
}

impl DefaultFormatter {
    pub fn new() -> Self {
        Self {
            sink: Arc::new(StdoutSink::new()),
            crash_sink: Arc::new(StderrSink::new()),
            no_color: false,
            no_color_tty_check: false,
            ignore_extensions: ExtensionSet::default_ignored(),
            truncate_uri: 0,
            real_ip: false,
            palette: Arc::new(Palette::ansi()),
            parse: Arc::new(ParseOptions::default()),
            render: Arc::new(RenderOptions::default().env_hint(true)),
        }
    }

    pub fn with_sink<S: LogSink + 'static>(mut self, sink: S) -> Self {
        self.sink = Arc::new(sink);
        self
    }

    pub fn with_crash_sink<S: LogSink + 'static>(mut self, sink: S) -> Self {
        self.crash_sink = Arc::new(sink);
        self
    }

    /// Disable styling altogether.
    pub fn no_color(mut self, no_color: bool) -> Self {
        self.no_color = no_color;
        self
    }

    /// Style even when standard output is not a terminal.
    pub fn no_color_tty_check(mut self, skip: bool) -> Self {
        self.no_color_tty_check = skip;
        self
    }

    pub fn ignore_extensions(mut self, extensions: ExtensionSet) -> Self {
        self.ignore_extensions = extensions;
        self
    }

    pub fn truncate_uri(mut self, max: usize) -> Self {
        self.truncate_uri = max;
        self
    }

    /// Log the forwarded client IP instead of the socket peer.
    pub fn real_ip(mut self, real_ip: bool) -> Self {
        self.real_ip = real_ip;
        self
    }

    pub fn full_path(mut self, full_path: bool) -> Self {
        Arc::make_mut(&mut self.render).full_path = full_path;
        self
    }

    pub fn env_hint(mut self, env_hint: bool) -> Self {
        Arc::make_mut(&mut self.render).env_hint = env_hint;
        self
    }

    /// Leave out crash report buckets whose header matches `filter`.
    pub fn crash_filter(mut self, filter: Regex) -> Self {
        Arc::make_mut(&mut self.render).filter = Some(filter);
        self
    }

    /// Keep only crash report buckets whose header matches `matcher`.
    pub fn crash_matcher(mut self, matcher: Regex) -> Self {
        Arc::make_mut(&mut self.render).matcher = Some(matcher);
        self
    }

    pub fn palette(mut self, palette: Palette) -> Self {
        self.palette = Arc::new(palette);
        self
    }

    pub fn parse_options(mut self, options: ParseOptions) -> Self {
        self.parse = Arc::new(options);
        self
    }

    pub fn color_writer(&self) -> ColorWriter {
        if self.no_color_tty_check {
            ColorWriter::Always
        } else {
            ColorWriter::TtyChecked
        }
    }

    pub fn extensions(&self) -> &ExtensionSet {
        &self.ignore_extensions
    }

    fn address<'a>(&self, info: &'a RequestInfo) -> &'a str {
        let ip = if self.real_ip {
            info.client_ip.as_deref()
        } else {
            info.remote_ip.as_deref()
        };
        ip.unwrap_or_default()
    }

    fn preamble(&self, info: &RequestInfo) -> String {
        let mut buf = String::new();
        // Writing into a String cannot fail.
        let _ = write_request_preamble(
            &mut buf,
            self.color_writer(),
            !self.no_color,
            self.truncate_uri,
            self.address(info),
            info,
        );
        buf
    }
}

impl Default for DefaultFormatter {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for DefaultFormatter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DefaultFormatter")
            .field("no_color", &self.no_color)
            .field("no_color_tty_check", &self.no_color_tty_check)
            .field("ignore_extensions", &self.ignore_extensions.enabled())
            .field("truncate_uri", &self.truncate_uri)
            .field("real_ip", &self.real_ip)
            .field("render", &self.render)
            .finish()
    }
}

impl EntryFormatter for DefaultFormatter {
    fn accept(&self, req: &RequestInfo) -> bool {
        !self.ignore_extensions.matches_path(&req.path)
    }

    fn new_log_entry(&self, req: &RequestInfo) -> Box<dyn LogEntry> {
        Box::new(DefaultLogEntry {
            buf: self.preamble(req),
            writer: self.color_writer(),
            use_color: !self.no_color,
            sink: self.sink.clone(),
            closed: false,
        })
    }

    fn new_crash_entry(&self, req: &RequestInfo) -> Box<dyn CrashEntry> {
        Box::new(DefaultCrashEntry {
            preamble: self.preamble(req),
            writer: self.color_writer(),
            use_color: !self.no_color,
            sink: self.crash_sink.clone(),
            palette: self.palette.clone(),
            parse: self.parse.clone(),
            render: self.render.clone(),
            written: false,
        })
    }
}

struct DefaultLogEntry {
    buf: String,
    writer: ColorWriter,
    use_color: bool,
    sink: SharedSink,
    closed: bool,
}

impl LogEntry for DefaultLogEntry {
    fn write(&mut self, status: u16, bytes: u64, elapsed: Duration) {
        if self.closed {
            return;
        }
        self.closed = true;
        let _ = write_response_outcome(
            &mut self.buf,
            self.writer,
            self.use_color,
            status,
            bytes,
            elapsed,
        );
        self.sink.print(&self.buf);
    }

    fn with_sink(&self, sink: SharedSink) -> Box<dyn LogEntry> {
        Box::new(DefaultLogEntry {
            buf: self.buf.clone(),
            writer: self.writer,
            use_color: self.use_color,
            sink,
            closed: self.closed,
        })
    }
}

static PLAIN_PALETTE: Palette = Palette::PLAIN;

struct DefaultCrashEntry {
    preamble: String,
    writer: ColorWriter,
    use_color: bool,
    sink: SharedSink,
    palette: Arc<Palette>,
    parse: Arc<ParseOptions>,
    render: Arc<RenderOptions>,
    written: bool,
}

impl DefaultCrashEntry {
    fn report(&self, trace: &str) -> String {
        let palette = if self.writer.enabled(self.use_color) {
            &*self.palette
        } else {
            &PLAIN_PALETTE
        };
        let rendered = panic::catch_unwind(AssertUnwindSafe(|| {
            render_dump(trace, &self.parse, palette, &self.render)
        }));
        match rendered {
            Ok(Ok(report)) => report,
            Ok(Err(err)) => {
                tracing::debug!(error = %err, "stack dump not rendered, keeping raw trace");
                trace.to_string()
            }
            Err(_) => {
                tracing::warn!("stack renderer panicked, keeping raw trace");
                trace.to_string()
            }
        }
    }
}

impl CrashEntry for DefaultCrashEntry {
    fn write(&mut self, fault: &Fault, trace: &str) {
        if self.written {
            return;
        }
        self.written = true;

        let mut out = self.preamble.clone();
        let _ = cwrite!(self.writer, &mut out, self.use_color, &Style::BOLD_RED, "panic: {}", fault);
        out.push('\n');
        out.push_str(&self.report(trace));
        self.sink.print(&out);
    }

    fn with_sink(&self, sink: SharedSink) -> Box<dyn CrashEntry> {
        Box::new(DefaultCrashEntry {
            preamble: self.preamble.clone(),
            writer: self.writer,
            use_color: self.use_color,
            sink,
            palette: self.palette.clone(),
            parse: self.parse.clone(),
            render: self.render.clone(),
            written: self.written,
        })
    }
}

static DEFAULT_FORMATTER: Lazy<RwLock<Arc<dyn EntryFormatter>>> =
    Lazy::new(|| RwLock::new(Arc::new(DefaultFormatter::new())));

/// The process-wide formatter used when middleware has none of its own.
pub fn default_formatter() -> Arc<dyn EntryFormatter> {
    DEFAULT_FORMATTER.read().clone()
}

/// Replace the process-wide formatter, returning the previous one.
pub fn set_default_formatter(formatter: Arc<dyn EntryFormatter>) -> Arc<dyn EntryFormatter> {
    std::mem::replace(&mut *DEFAULT_FORMATTER.write(), formatter)
}

/// [`EntryFormatter::accept`] on the default formatter.
pub fn accept(req: &RequestInfo) -> bool {
    default_formatter().accept(req)
}

/// [`EntryFormatter::new_log_entry`] on the default formatter.
pub fn new_log_entry(req: &RequestInfo) -> Box<dyn LogEntry> {
    default_formatter().new_log_entry(req)
}

/// [`EntryFormatter::new_crash_entry`] on the default formatter.
pub fn new_crash_entry(req: &RequestInfo) -> Box<dyn CrashEntry> {
    default_formatter().new_crash_entry(req)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::MemorySink;

    fn info(uri: &str) -> RequestInfo {
        let req = HttpRequest::new("GET", uri)
            .with_header("Host", "example.com")
            .with_remote_addr("203.0.113.7:4711".parse().unwrap());
        RequestInfo::from_request(&req)
    }

    fn plain(sink: &Arc<MemorySink>) -> DefaultFormatter {
        DefaultFormatter::new().no_color(true).with_sink(sink.clone()).with_crash_sink(sink.clone())
    }

    #[test]
    fn test_plain_access_line() {
        let sink = MemorySink::shared();
        let mut entry = plain(&sink).new_log_entry(&info("/x?page=2"));
        entry.write(200, 42, Duration::from_millis(10));

        assert_eq!(
            sink.lines(),
            vec!["«203.0.113.7» \"GET http://example.com/x?page=2 HTTP/1.1\" → \"200 42B 10ms\""]
        );
    }

    #[test]
    fn test_entry_written_once() {
        let sink = MemorySink::shared();
        let mut entry = plain(&sink).new_log_entry(&info("/x"));
        entry.write(200, 1, Duration::from_millis(1));
        entry.write(500, 2, Duration::from_millis(2));
        assert_eq!(sink.len(), 1);
    }

    #[test]
    fn test_request_id_and_tls() {
        let mut req = HttpRequest::new("POST", "/submit").with_header("Host", "h");
        req.tls = true;
        req.extensions.insert(RequestId::new("abc-123"));
        let sink = MemorySink::shared();
        let mut entry = plain(&sink).new_log_entry(&RequestInfo::from_request(&req));
        entry.write(201, 0, Duration::from_micros(250));

        assert_eq!(
            sink.lines()[0],
            "« [abc-123]» \"POST https://h/submit HTTP/1.1\" → \"201 0B 250µs\""
        );
    }

    #[test]
    fn test_colored_access_line() {
        let sink = MemorySink::shared();
        let formatter = DefaultFormatter::new().no_color_tty_check(true).with_sink(sink.clone());
        let mut entry = formatter.new_log_entry(&info("/x"));
        entry.write(404, 9, Duration::from_secs(6));

        let line = &sink.lines()[0];
        assert!(line.starts_with("«203.0.113.7» \x1b[36m\"\x1b[0m\x1b[35;1mGET \x1b[0m"));
        assert!(line.contains("\x1b[33;1m404\x1b[0m"));
        assert!(line.contains("\x1b[34;1m 9B \x1b[0m"));
        assert!(line.ends_with("\x1b[31m6s\x1b[0m\""));
    }

    #[test]
    fn test_real_ip() {
        let req = HttpRequest::new("GET", "/")
            .with_remote_addr("10.0.0.2:1".parse().unwrap())
            .with_header("X-Forwarded-For", "198.51.100.9");
        let info = RequestInfo::from_request(&req);
        let sink = MemorySink::shared();

        plain(&sink).new_log_entry(&info).write(200, 0, Duration::ZERO);
        plain(&sink).real_ip(true).new_log_entry(&info).write(200, 0, Duration::ZERO);

        let lines = sink.lines();
        assert!(lines[0].starts_with("«10.0.0.2»"));
        assert!(lines[1].starts_with("«198.51.100.9»"));
    }

    #[test]
    fn test_truncate_uri() {
        assert_eq!(truncate_uri("/abcdefghij", 0), "/abcdefghij");
        assert_eq!(truncate_uri("/abcdefghij", 7), "/abcdefghij");
        assert_eq!(truncate_uri("/abcdefghijk", 7), "/abcdef ...");
        assert_eq!(truncate_uri("/ééééééé", 2), "/é ...");
    }

    #[test]
    fn test_accept_ignores_static_assets() {
        let formatter = DefaultFormatter::new();
        assert!(!formatter.accept(&info("/app.css")));
        assert!(!formatter.accept(&info("/img/logo.PNG?v=3")));
        assert!(formatter.accept(&info("/app.unknown")));
        assert!(formatter.accept(&info("/")));

        let custom = formatter.ignore_extensions(ExtensionSet::default_ignored().update_strings(["-css"]));
        assert!(custom.accept(&info("/app.css")));
    }

    #[test]
    fn test_with_sink_keeps_buffer() {
        let first = MemorySink::shared();
        let second = MemorySink::shared();
        let entry = plain(&first).new_log_entry(&info("/moved"));
        let mut moved = entry.with_sink(second.clone());
        moved.write(301, 0, Duration::from_millis(3));

        assert!(first.is_empty());
        assert!(second.lines()[0].contains("/moved HTTP/1.1\" → \"301 0B 3ms\""));
    }

    #[test]
    fn test_status_bands() {
        assert_eq!(StatusBand::of(199), StatusBand::Informational);
        assert_eq!(StatusBand::of(200), StatusBand::Success);
        assert_eq!(StatusBand::of(302), StatusBand::Redirect);
        assert_eq!(StatusBand::of(404), StatusBand::ClientError);
        assert_eq!(StatusBand::of(500), StatusBand::ServerError);
        assert_eq!(StatusBand::of(0), StatusBand::Informational);
    }

    #[test]
    fn test_band_styles() {
        let status: &'static Style = StatusBand::of(404).style();
        assert_eq!(status.code(), "\x1b[33;1m");
        assert_eq!(StatusBand::Informational.style().code(), "\x1b[34;1m");
        assert_eq!(StatusBand::ServerError.style().code(), "\x1b[31;1m");

        let latency: &'static Style = LatencyBand::of(Duration::from_secs(9)).style();
        assert_eq!(latency.code(), "\x1b[31m");
        assert_eq!(LatencyBand::Fast.style().code(), "\x1b[32m");
    }

    #[test]
    fn test_latency_bands() {
        assert_eq!(LatencyBand::of(Duration::from_millis(499)), LatencyBand::Fast);
        assert_eq!(LatencyBand::of(Duration::from_millis(500)), LatencyBand::Medium);
        assert_eq!(LatencyBand::of(Duration::from_millis(5000)), LatencyBand::Slow);
    }

    const DUMP: &str = "\
thread 'main' (1) panicked at src/main.rs:4:5:
boom
stack backtrace:
   0: app::handler
             at ./src/handler.rs:12:9
   1: app::main
             at ./src/main.rs:4:5
";

    #[test]
    fn test_crash_entry_renders_report() {
        let sink = MemorySink::shared();
        let formatter = plain(&sink).env_hint(false);
        let mut entry = formatter.new_crash_entry(&info("/boom"));
        entry.write(&Fault::new("boom"), DUMP);

        let out = &sink.lines()[0];
        assert!(out.starts_with("«203.0.113.7» \"GET http://example.com/boom HTTP/1.1\" panic: boom\n"));
        assert!(out.contains("handler.rs:12"));
        assert!(!out.contains("at ./src/handler.rs"));
    }

    #[test]
    fn test_crash_entry_falls_back_to_raw_trace() {
        let sink = MemorySink::shared();
        let mut entry = plain(&sink).new_crash_entry(&info("/boom"));
        entry.write(&Fault::new("bad"), "not a stack dump\nat all");

        assert!(sink.lines()[0].ends_with("panic: bad\nnot a stack dump\nat all"));
    }

    #[test]
    fn test_crash_entry_empty_trace() {
        let sink = MemorySink::shared();
        let mut entry = plain(&sink).new_crash_entry(&info("/"));
        entry.write(&Fault::new("empty"), "");
        entry.write(&Fault::new("again"), "");

        assert_eq!(sink.lines(), vec!["«203.0.113.7» \"GET http://example.com/ HTTP/1.1\" panic: empty\n"]);
    }
}
