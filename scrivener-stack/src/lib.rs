//! # Scrivener Stack
//!
//! Turns raw stack dumps into deduplicated, aligned crash reports.
//!
//! The pipeline is [`parse_dump`] → [`aggregate`] → [`write_to_console`]:
//! the parser builds one [`ThreadRecord`] per thread block, the aggregator
//! folds threads with identical stacks into [`Bucket`]s, and the renderer
//! prints each bucket once with its member count. [`render_dump`] runs all
//! three.
//!
//! ```rust
//! use scrivener_stack::{render_dump, Palette, ParseOptions, RenderOptions};
//!
//! let dump = "\
//! thread 'worker-1' (2) [parked]:
//!    0: app::pool::run
//!              at ./src/pool.rs:88:17
//! thread 'worker-2' (3) [parked]:
//!    0: app::pool::run
//!              at ./src/pool.rs:88:17
//! ";
//!
//! let report = render_dump(dump, &ParseOptions::default(), &Palette::PLAIN, &RenderOptions::default())?;
//! assert_eq!(report, "2: parked\n    app pool.rs:88 pool::run()\n");
//! # Ok::<(), scrivener_stack::StackError>(())
//! ```
//!
//! Colored output goes through the [`color`] module, which the request
//! logger shares.

pub mod aggregate;
pub mod color;
pub mod error;
pub mod palette;
pub mod parse;
pub mod render;
pub mod types;

pub use aggregate::aggregate;
pub use color::{ColorWriter, RESET, Style, color_write, color_write_tty_check, stdout_is_terminal};
pub use error::{ParseError, RenderError, StackError, StyleError};
pub use palette::{DEFAULT_PALETTE, ELIDED_PLACEHOLDER, Palette};
pub use parse::{DEFAULT_ELIDE_PREFIXES, ParseOptions, Snapshot, parse_dump};
pub use render::{ENV_HINT, RenderOptions, calc_lengths, render_buckets, write_to_console};
pub use types::{Bucket, Frame, Location, Signature, Stack, ThreadRecord};

use std::fmt::Write;

/// Parse, aggregate and render `raw` in one go.
///
/// Lines the parser could not classify are written first, unchanged, so a
/// panic message preceding the backtrace stays at the top of the report.
pub fn render_dump(
    raw: &str,
    parse: &ParseOptions,
    palette: &Palette,
    options: &RenderOptions,
) -> Result<String, StackError> {
    let snapshot = parse_dump(raw, parse)?;
    let buckets = aggregate(&snapshot.threads);

    let mut out = String::new();
    for line in &snapshot.unclassified {
        writeln!(out, "{}", line).map_err(RenderError::from)?;
    }
    write_to_console(&mut out, palette, &buckets, options)?;
    Ok(out)
}

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::{
        Bucket, ColorWriter, Frame, Palette, ParseOptions, RenderOptions, Style, ThreadRecord,
        aggregate, parse_dump, render_dump,
    };
}
