//! Styles used by the stack renderer.

use crate::color::Style;
use crate::types::{Bucket, Frame, Signature};

/// Line that stands in for frames the dump itself left out.
pub const ELIDED_PLACEHOLDER: &str = "    (...)";

/// Resets foreground and attributes but leaves the background alone.
const RESET_FG: Style = Style::from_static("\x1b[39m\x1b[m");

/// Style per semantic category of a rendered report.
///
/// [`Palette::PLAIN`] (also the `Default`) writes no escape codes at all.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Palette {
    pub eol_reset: Style,

    // Bucket header.
    pub routine_first: Style,
    pub routine: Style,
    pub created_by: Style,

    // Call line.
    pub package: Style,
    pub src_file: Style,
    pub func_stdlib: Style,
    pub func_stdlib_exported: Style,
    pub func_main: Style,
    pub func_other: Style,
    pub func_other_exported: Style,
    pub arguments: Style,
}

/// Shared default palette.
pub static DEFAULT_PALETTE: Palette = Palette::ansi();

impl Palette {
    pub const PLAIN: Palette = Palette {
        eol_reset: Style::PLAIN,
        routine_first: Style::PLAIN,
        routine: Style::PLAIN,
        created_by: Style::PLAIN,
        package: Style::PLAIN,
        src_file: Style::PLAIN,
        func_stdlib: Style::PLAIN,
        func_stdlib_exported: Style::PLAIN,
        func_main: Style::PLAIN,
        func_other: Style::PLAIN,
        func_other_exported: Style::PLAIN,
        arguments: Style::PLAIN,
    };

    /// The recommended terminal palette.
    pub const fn ansi() -> Self {
        Palette {
            eol_reset: RESET_FG,
            routine_first: Style::BOLD_MAGENTA,
            routine: Style::PLAIN,
            created_by: Style::from_static("\x1b[90m"),
            package: Style::from_static("\x1b[39;1m"),
            src_file: RESET_FG,
            func_stdlib: Style::GREEN,
            func_stdlib_exported: Style::BOLD_GREEN,
            func_main: Style::BOLD_YELLOW,
            func_other: Style::RED,
            func_other_exported: Style::BOLD_RED,
            arguments: RESET_FG,
        }
    }

    /// Style of a frame's function name, by where the function comes from.
    pub fn function_style(&self, frame: &Frame) -> &Style {
        if frame.is_stdlib {
            if frame.is_exported {
                &self.func_stdlib_exported
            } else {
                &self.func_stdlib
            }
        } else if frame.is_main {
            &self.func_main
        } else if frame.is_exported {
            &self.func_other_exported
        } else {
            &self.func_other
        }
    }

    /// The first bucket is only highlighted when there is more than one.
    pub fn routine_style(&self, bucket: &Bucket, multiple_buckets: bool) -> &Style {
        if bucket.first && multiple_buckets {
            &self.routine_first
        } else {
            &self.routine
        }
    }

    /// `<count>: <state>[ [sleep]][ [locked]][ [Created by ...]]`, newline
    /// terminated.
    pub fn bucket_header(&self, bucket: &Bucket, full_path: bool, multiple_buckets: bool) -> String {
        let mut extra = String::new();
        let sleep = bucket.sleep_string();
        if !sleep.is_empty() {
            extra.push_str(&format!(" [{}]", sleep));
        }
        if bucket.signature.locked {
            extra.push_str(" [locked]");
        }
        let created_by = bucket.created_by_string(full_path);
        if !created_by.is_empty() {
            extra.push_str(&format!("{} [Created by {}]", self.created_by, created_by));
        }
        format!(
            "{}{}: {}{}{}\n",
            self.routine_style(bucket, multiple_buckets),
            bucket.count(),
            bucket.signature.state,
            extra,
            self.eol_reset
        )
    }

    /// One aligned frame line, without the trailing newline.
    pub fn call_line(&self, frame: &Frame, src_len: usize, pkg_len: usize, full_path: bool) -> String {
        format!(
            "    {}{:<pkg_len$} {}{:<src_len$} {}{}{}({}){}",
            self.package,
            frame.pkg_name(),
            self.src_file,
            frame.src_line(full_path),
            self.function_style(frame),
            frame.function,
            self.arguments,
            frame.args,
            self.eol_reset,
        )
    }

    /// Every frame line of a signature, plus the placeholder when the dump
    /// truncated the stack.
    pub fn stack_lines(&self, signature: &Signature, src_len: usize, pkg_len: usize, full_path: bool) -> String {
        let mut lines: Vec<String> = signature
            .stack
            .calls
            .iter()
            .map(|frame| self.call_line(frame, src_len, pkg_len, full_path))
            .collect();
        if signature.stack.elided {
            lines.push(ELIDED_PLACEHOLDER.to_string());
        }
        let mut out = lines.join("\n");
        out.push('\n');
        out
    }
}
