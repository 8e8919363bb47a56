//! Structured view of a stack dump.

use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;

/// Crates shipped with the toolchain.
pub const STDLIB_CRATES: &[&str] = &["std", "core", "alloc", "proc_macro", "test"];

static SYMBOL_HASH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"::h[0-9a-f]{16}$").expect("symbol hash pattern is valid"));

/// Where a frame's code lives.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Location {
    pub file: String,
    pub line: u32,
    pub column: Option<u32>,
}

impl Location {
    /// `file.rs:42`, using only the file name.
    pub fn short(&self) -> String {
        let name = Path::new(&self.file)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(&self.file);
        format!("{}:{}", name, self.line)
    }

    /// `/full/path/file.rs:42`.
    pub fn full(&self) -> String {
        format!("{}:{}", self.file, self.line)
    }

    /// Whether the path points into a toolchain checkout.
    pub fn is_toolchain(&self) -> bool {
        let file = self.file.replace('\\', "/");
        file.starts_with("/rustc/")
            || file.contains("/rustc/")
            || ["library/std/", "library/core/", "library/alloc/"]
                .iter()
                .any(|dir| file.contains(dir))
    }
}

/// One call site of a thread's stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Symbol as printed in the dump, with the trailing hash removed.
    pub symbol: String,
    /// First path segment of the symbol; empty for bare symbols like `main`.
    pub crate_name: String,
    /// Symbol without the crate prefix. Qualified `<T as Trait>` forms keep
    /// the full symbol.
    pub function: String,
    pub location: Option<Location>,
    /// Raw argument text; the frame address in full-format dumps.
    pub args: String,
    pub is_stdlib: bool,
    pub is_exported: bool,
    pub is_main: bool,
}

impl Frame {
    /// Build a frame from a symbol as printed by the backtrace formatter.
    pub fn from_symbol(symbol: &str, args: impl Into<String>) -> Self {
        let symbol = SYMBOL_HASH.replace(symbol.trim(), "").into_owned();
        let (crate_name, function) = split_symbol(&symbol);
        let is_stdlib = STDLIB_CRATES.contains(&crate_name.as_str());
        let is_exported = !function
            .split("::")
            .any(|segment| segment.trim_start_matches('<').starts_with('_') || segment.contains("{{"));

        Self {
            symbol,
            crate_name,
            function,
            location: None,
            args: args.into(),
            is_stdlib,
            is_exported,
            is_main: false,
        }
    }

    /// Attach a source location; toolchain paths mark the frame as stdlib.
    pub fn set_location(&mut self, location: Location) {
        if location.is_toolchain() {
            self.is_stdlib = true;
        }
        self.location = Some(location);
    }

    pub fn with_location(mut self, file: &str, line: u32) -> Self {
        self.set_location(Location {
            file: file.to_string(),
            line,
            column: None,
        });
        self
    }

    /// Source column text, short or full path. `?` when the dump had none.
    pub fn src_line(&self, full_path: bool) -> String {
        match &self.location {
            Some(location) if full_path => location.full(),
            Some(location) => location.short(),
            None => "?".to_string(),
        }
    }

    /// Package column text.
    pub fn pkg_name(&self) -> &str {
        &self.crate_name
    }

    /// Whether two frames are the same call site, arguments aside.
    pub fn same_call(&self, other: &Frame) -> bool {
        self.crate_name == other.crate_name
            && self.function == other.function
            && self.location.as_ref().map(|l| (&l.file, l.line))
                == other.location.as_ref().map(|l| (&l.file, l.line))
    }
}

fn split_symbol(symbol: &str) -> (String, String) {
    if let Some(inner) = symbol.strip_prefix('<') {
        let crate_name = leading_crate(inner)
            .or_else(|| qualified_trait(inner).and_then(leading_crate))
            .unwrap_or("");
        return (crate_name.to_string(), symbol.to_string());
    }

    match symbol.split_once("::") {
        Some((crate_name, rest)) if !crate_name.is_empty() => {
            (crate_name.to_string(), rest.to_string())
        }
        _ => (String::new(), symbol.to_string()),
    }
}

/// First path segment of `path` when it is followed by `::`.
fn leading_crate(path: &str) -> Option<&str> {
    let end = path
        .find(|c: char| c == ':' || c == ' ' || c == '<' || c == '>' || c == '(')
        .unwrap_or(path.len());
    (end > 0 && path[end..].starts_with("::")).then(|| &path[..end])
}

/// The trait of a `<Self as Trait>` form, given the text after `<`.
fn qualified_trait(inner: &str) -> Option<&str> {
    let mut depth = 0usize;
    let mut prev = '\0';
    for (i, c) in inner.char_indices() {
        match c {
            '<' => depth += 1,
            '>' if prev != '-' => {
                if depth == 0 {
                    return None;
                }
                depth -= 1;
            }
            ' ' if depth == 0 && inner[i..].starts_with(" as ") => return Some(&inner[i + 4..]),
            _ => {}
        }
        prev = c;
    }
    None
}

/// Ordered call sites plus the dump's own truncation marker.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Stack {
    pub calls: Vec<Frame>,
    pub elided: bool,
}

/// Snapshot of one thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadRecord {
    pub id: u64,
    pub name: String,
    pub state: String,
    pub locked: bool,
    pub sleep_minutes: Option<u32>,
    pub created_by: Option<Frame>,
    pub stack: Stack,
    /// The thread that was running when the dump was captured.
    pub first: bool,
}

impl ThreadRecord {
    pub fn new(id: u64, name: impl Into<String>, state: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            state: state.into(),
            locked: false,
            sleep_minutes: None,
            created_by: None,
            stack: Stack::default(),
            first: false,
        }
    }
}

/// What a bucket's members have in common, plus the attributes merged
/// across them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub state: String,
    pub stack: Stack,
    pub created_by: Option<Frame>,
    /// Set when any member holds a lock.
    pub locked: bool,
    pub sleep_min: Option<u32>,
    pub sleep_max: Option<u32>,
}

/// Threads with an identical signature, rendered once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bucket {
    pub signature: Signature,
    pub ids: Vec<u64>,
    pub first: bool,
}

impl Bucket {
    pub fn count(&self) -> usize {
        self.ids.len()
    }

    /// `5 minutes`, `1~5 minutes`, or empty when no member was waiting.
    pub fn sleep_string(&self) -> String {
        match (self.signature.sleep_min, self.signature.sleep_max) {
            (Some(min), Some(max)) if min != max => format!("{}~{} minutes", min, max),
            (Some(min), _) => format!("{} minutes", min),
            _ => String::new(),
        }
    }

    /// `function @ file.rs:12` for the origin frame, or empty.
    pub fn created_by_string(&self, full_path: bool) -> String {
        match &self.signature.created_by {
            Some(frame) => {
                let name = if frame.crate_name.is_empty() || frame.symbol.starts_with('<') {
                    frame.symbol.clone()
                } else {
                    format!("{}::{}", frame.crate_name, frame.function)
                };
                if frame.location.is_some() {
                    format!("{} @ {}", name, frame.src_line(full_path))
                } else {
                    name
                }
            }
            None => String::new(),
        }
    }
}
