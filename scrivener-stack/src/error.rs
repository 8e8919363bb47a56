// Error types for stack dump processing

use thiserror::Error;

/// The dump text could not be recognized as a stack dump.
///
/// Callers are expected to fall back to the raw text instead of surfacing
/// this to anyone.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("stack dump is empty")]
    Empty,

    #[error("no stack frames found in {lines} line(s) of dump text")]
    NoFrames { lines: usize },
}

/// Writing the rendered report failed.
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("failed to write crash report: {0}")]
    Write(#[from] std::fmt::Error),
}

/// A style spec such as `"magenta+b"` could not be understood.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StyleError {
    #[error("unknown color: {0}")]
    UnknownColor(String),

    #[error("unknown style attribute: {0}")]
    UnknownAttribute(char),
}

/// Any failure along the parse → aggregate → render pipeline.
#[derive(Error, Debug)]
pub enum StackError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Render(#[from] RenderError),
}
