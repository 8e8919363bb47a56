//! Destinations for formatted access and crash lines.
//!
//! A sink receives one fully formatted entry per call. Entries may span
//! several lines (crash reports do); sinks add a trailing newline when the
//! entry lacks one.

use parking_lot::{Condvar, Mutex};
use std::io::{self, Write};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Accepts fully formatted entries.
pub trait LogSink: Send + Sync {
    fn print(&self, line: &str);
}

/// Shared handle to a sink.
pub type SharedSink = Arc<dyn LogSink>;

impl<S: LogSink + ?Sized> LogSink for Arc<S> {
    fn print(&self, line: &str) {
        (**self).print(line)
    }
}

impl<S: LogSink + ?Sized> LogSink for Box<S> {
    fn print(&self, line: &str) {
        (**self).print(line)
    }
}

/// Layout of the timestamp prefix: `2026/10/14 09:30:00 `.
pub const TIMESTAMP_FORMAT: &str = "%Y/%m/%d %H:%M:%S";

fn write_entry<W: Write + ?Sized>(out: &mut W, timestamps: bool, line: &str) -> io::Result<()> {
    if timestamps {
        write!(out, "{} ", chrono::Local::now().format(TIMESTAMP_FORMAT))?;
    }
    out.write_all(line.as_bytes())?;
    if !line.ends_with('\n') {
        out.write_all(b"\n")?;
    }
    out.flush()
}

/// Writes to standard output.
#[derive(Debug, Clone, Copy)]
pub struct StdoutSink {
    pub timestamps: bool,
}

impl StdoutSink {
    /// With timestamp prefix.
    pub fn new() -> Self {
        Self { timestamps: true }
    }

    pub fn plain() -> Self {
        Self { timestamps: false }
    }
}

impl Default for StdoutSink {
    fn default() -> Self {
        Self::new()
    }
}

impl LogSink for StdoutSink {
    fn print(&self, line: &str) {
        let _ = write_entry(&mut io::stdout().lock(), self.timestamps, line);
    }
}

/// Writes to standard error.
#[derive(Debug, Clone, Copy)]
pub struct StderrSink {
    pub timestamps: bool,
}

impl StderrSink {
    /// With timestamp prefix.
    pub fn new() -> Self {
        Self { timestamps: true }
    }

    pub fn plain() -> Self {
        Self { timestamps: false }
    }
}

impl Default for StderrSink {
    fn default() -> Self {
        Self::new()
    }
}

impl LogSink for StderrSink {
    fn print(&self, line: &str) {
        let _ = write_entry(&mut io::stderr().lock(), self.timestamps, line);
    }
}

/// Writes to any `Write` implementation, one entry at a time.
pub struct WriterSink<W: Write + Send> {
    writer: Mutex<W>,
    timestamps: bool,
}

impl<W: Write + Send> WriterSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
            timestamps: false,
        }
    }

    pub fn with_timestamps(mut self, enabled: bool) -> Self {
        self.timestamps = enabled;
        self
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

impl<W: Write + Send> LogSink for WriterSink<W> {
    fn print(&self, line: &str) {
        let mut writer = self.writer.lock();
        if let Err(err) = write_entry(&mut *writer, self.timestamps, line) {
            tracing::warn!(error = %err, "failed to write log entry");
        }
    }
}

/// Emits each entry as a `tracing` event on target `scrivener::entry`.
#[derive(Debug, Clone, Copy)]
pub struct TracingSink {
    level: tracing::Level,
}

impl TracingSink {
    pub fn new(level: tracing::Level) -> Self {
        Self { level }
    }

    pub fn info() -> Self {
        Self::new(tracing::Level::INFO)
    }

    pub fn error() -> Self {
        Self::new(tracing::Level::ERROR)
    }
}

impl LogSink for TracingSink {
    fn print(&self, line: &str) {
        let line = line.trim_end_matches('\n');
        match self.level {
            tracing::Level::ERROR => tracing::error!(target: "scrivener::entry", "{}", line),
            tracing::Level::WARN => tracing::warn!(target: "scrivener::entry", "{}", line),
            tracing::Level::INFO => tracing::info!(target: "scrivener::entry", "{}", line),
            tracing::Level::DEBUG => tracing::debug!(target: "scrivener::entry", "{}", line),
            _ => tracing::trace!(target: "scrivener::entry", "{}", line),
        }
    }
}

/// Keeps entries in memory.
#[derive(Default)]
pub struct MemorySink {
    lines: Mutex<Vec<String>>,
    printed: Condvar,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Every entry printed so far.
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lines.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove and return every entry printed so far.
    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.lines.lock())
    }

    /// Block until at least `count` entries arrived or `timeout` passed.
    /// Returns whether the count was reached.
    pub fn wait_for(&self, count: usize, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut lines = self.lines.lock();
        while lines.len() < count {
            if self.printed.wait_until(&mut lines, deadline).timed_out() {
                return lines.len() >= count;
            }
        }
        true
    }
}

impl LogSink for MemorySink {
    fn print(&self, line: &str) {
        self.lines.lock().push(line.to_string());
        self.printed.notify_all();
    }
}

impl std::fmt::Debug for MemorySink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemorySink").field("len", &self.len()).finish()
    }
}
