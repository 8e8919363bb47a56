//! Conditional ANSI styling of text fragments.
//!
//! Every styled write goes through [`color_write`]: when styling is off the
//! fragment is written as-is, otherwise it is wrapped in the style's start
//! code and [`RESET`]. [`ColorWriter::TtyChecked`] additionally requires that
//! standard output is an interactive terminal; that check runs once per
//! process.

use crate::error::StyleError;
use colored::Color;
use once_cell::sync::Lazy;
use std::borrow::Cow;
use std::fmt;
use std::io::IsTerminal;

/// Code that ends a styled fragment.
pub const RESET: &str = "\x1b[0m";

/// A raw ANSI SGR start code. The empty style writes no codes at all.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Style(Cow<'static, str>);

impl Style {
    pub const PLAIN: Style = Style::from_static("");

    pub const BLACK: Style = Style::from_static("\x1b[30m");
    pub const RED: Style = Style::from_static("\x1b[31m");
    pub const GREEN: Style = Style::from_static("\x1b[32m");
    pub const YELLOW: Style = Style::from_static("\x1b[33m");
    pub const BLUE: Style = Style::from_static("\x1b[34m");
    pub const MAGENTA: Style = Style::from_static("\x1b[35m");
    pub const CYAN: Style = Style::from_static("\x1b[36m");
    pub const WHITE: Style = Style::from_static("\x1b[37m");

    pub const BOLD_BLACK: Style = Style::from_static("\x1b[30;1m");
    pub const BOLD_RED: Style = Style::from_static("\x1b[31;1m");
    pub const BOLD_GREEN: Style = Style::from_static("\x1b[32;1m");
    pub const BOLD_YELLOW: Style = Style::from_static("\x1b[33;1m");
    pub const BOLD_BLUE: Style = Style::from_static("\x1b[34;1m");
    pub const BOLD_MAGENTA: Style = Style::from_static("\x1b[35;1m");
    pub const BOLD_CYAN: Style = Style::from_static("\x1b[36;1m");
    pub const BOLD_WHITE: Style = Style::from_static("\x1b[37;1m");

    /// Wrap a static escape sequence.
    pub const fn from_static(code: &'static str) -> Self {
        Style(Cow::Borrowed(code))
    }

    /// Wrap an owned escape sequence.
    pub fn new(code: impl Into<String>) -> Self {
        Style(Cow::Owned(code.into()))
    }

    /// Parse a spec of the form `<color>[+<attributes>]`.
    ///
    /// The color is any name `colored` understands (`red`, `bright black`,
    /// ...) or `default` for the terminal's default foreground; it may be
    /// empty. Attributes are single letters: `b` bold, `d` dim, `i` italic,
    /// `u` underline, `k` blink, `r` reverse.
    ///
    /// ```rust
    /// use scrivener_stack::Style;
    ///
    /// assert_eq!(Style::parse("magenta+b").unwrap().code(), "\x1b[35;1m");
    /// assert_eq!(Style::parse("default").unwrap().code(), "\x1b[39m");
    /// assert!(Style::parse("").unwrap().is_plain());
    /// ```
    pub fn parse(spec: &str) -> Result<Self, StyleError> {
        let spec = spec.trim();
        if spec.is_empty() {
            return Ok(Style::PLAIN);
        }

        let (color, attributes) = spec.split_once('+').unwrap_or((spec, ""));
        let mut codes: Vec<Cow<'static, str>> = Vec::new();

        match color.trim() {
            "" => {}
            "default" => codes.push(Cow::Borrowed("39")),
            name => {
                let parsed: Color = name
                    .parse()
                    .map_err(|_| StyleError::UnknownColor(name.to_string()))?;
                codes.push(Cow::Owned(parsed.to_fg_str().to_string()));
            }
        }

        for attribute in attributes.chars() {
            let code = match attribute {
                'b' => "1",
                'd' => "2",
                'i' => "3",
                'u' => "4",
                'k' => "5",
                'r' => "7",
                other => return Err(StyleError::UnknownAttribute(other)),
            };
            codes.push(Cow::Borrowed(code));
        }

        if codes.is_empty() {
            return Ok(Style::PLAIN);
        }
        Ok(Style::new(format!("\x1b[{}m", codes.join(";"))))
    }

    pub fn code(&self) -> &str {
        &self.0
    }

    pub fn is_plain(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Style {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Write `args` to `out`, wrapped in `style` when `use_color` is set.
pub fn color_write<W>(
    out: &mut W,
    use_color: bool,
    style: &Style,
    args: fmt::Arguments<'_>,
) -> fmt::Result
where
    W: fmt::Write + ?Sized,
{
    if use_color && !style.is_plain() {
        out.write_str(style.code())?;
        out.write_fmt(args)?;
        out.write_str(RESET)
    } else {
        out.write_fmt(args)
    }
}

/// Like [`color_write`], but styling also requires [`stdout_is_terminal`].
pub fn color_write_tty_check<W>(
    out: &mut W,
    use_color: bool,
    style: &Style,
    args: fmt::Arguments<'_>,
) -> fmt::Result
where
    W: fmt::Write + ?Sized,
{
    color_write(out, use_color && stdout_is_terminal(), style, args)
}

static STDOUT_STYLABLE: Lazy<bool> =
    Lazy::new(|| std::io::stdout().is_terminal() && std::env::var_os("NO_COLOR").is_none());

/// Whether standard output is an interactive terminal that accepts styling.
///
/// Computed on first use and cached for the life of the process.
pub fn stdout_is_terminal() -> bool {
    *STDOUT_STYLABLE
}

/// Selects which styling predicate a writer honors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorWriter {
    /// Style whenever the caller asks for it.
    Always,
    /// Style only when standard output is a terminal.
    #[default]
    TtyChecked,
}

impl ColorWriter {
    /// Whether a write requested with `use_color` will actually be styled.
    pub fn enabled(&self, use_color: bool) -> bool {
        match self {
            ColorWriter::Always => use_color,
            ColorWriter::TtyChecked => use_color && stdout_is_terminal(),
        }
    }

    pub fn write<W>(
        &self,
        out: &mut W,
        use_color: bool,
        style: &Style,
        args: fmt::Arguments<'_>,
    ) -> fmt::Result
    where
        W: fmt::Write + ?Sized,
    {
        color_write(out, self.enabled(use_color), style, args)
    }
}

/// `cwrite!(writer, out, use_color, style, "fmt", args...)`
#[macro_export]
macro_rules! cwrite {
    ($writer:expr, $out:expr, $use_color:expr, $style:expr, $($arg:tt)+) => {
        $writer.write($out, $use_color, $style, format_args!($($arg)+))
    };
}
