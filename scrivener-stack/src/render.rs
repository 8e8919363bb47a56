//! Aligned text rendering of buckets.

use crate::error::RenderError;
use crate::palette::Palette;
use crate::types::Bucket;
use regex::Regex;
use std::fmt::Write;

/// Printed before the report when [`RenderOptions::env_hint`] is set.
pub const ENV_HINT: &str =
    "\nTo see every frame, run with RUST_BACKTRACE=full (set RUST_LIB_BACKTRACE=1 for error traces)\n\n";

/// How buckets are written out.
#[derive(Debug, Clone, Default)]
pub struct RenderOptions {
    /// Show full source paths instead of file names.
    pub full_path: bool,
    /// Prefix the report with [`ENV_HINT`].
    pub env_hint: bool,
    /// Skip buckets whose header matches.
    pub filter: Option<Regex>,
    /// Skip buckets whose header does not match.
    pub matcher: Option<Regex>,
}

impl RenderOptions {
    pub fn full_path(mut self, full_path: bool) -> Self {
        self.full_path = full_path;
        self
    }

    pub fn env_hint(mut self, env_hint: bool) -> Self {
        self.env_hint = env_hint;
        self
    }

    pub fn filter(mut self, filter: Regex) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn matcher(mut self, matcher: Regex) -> Self {
        self.matcher = Some(matcher);
        self
    }

    fn keeps(&self, header: &str) -> bool {
        if self.filter.as_ref().is_some_and(|re| re.is_match(header)) {
            return false;
        }
        if self.matcher.as_ref().is_some_and(|re| !re.is_match(header)) {
            return false;
        }
        true
    }
}

/// Widest source column and widest package column across every frame of
/// every bucket, in characters.
pub fn calc_lengths(buckets: &[Bucket], full_path: bool) -> (usize, usize) {
    let mut src_len = 0;
    let mut pkg_len = 0;
    for frame in buckets.iter().flat_map(|b| b.signature.stack.calls.iter()) {
        src_len = src_len.max(frame.src_line(full_path).chars().count());
        pkg_len = pkg_len.max(frame.pkg_name().chars().count());
    }
    (src_len, pkg_len)
}

/// Write every kept bucket to `out`.
///
/// Filters see the header without any escape codes, so a palette never
/// changes which buckets are kept.
pub fn write_to_console<W: Write + ?Sized>(
    out: &mut W,
    palette: &Palette,
    buckets: &[Bucket],
    options: &RenderOptions,
) -> Result<(), RenderError> {
    if options.env_hint {
        out.write_str(ENV_HINT)?;
    }

    let (src_len, pkg_len) = calc_lengths(buckets, options.full_path);
    let multiple = buckets.len() > 1;
    for bucket in buckets {
        let plain = Palette::PLAIN.bucket_header(bucket, options.full_path, multiple);
        if !options.keeps(plain.trim_end()) {
            continue;
        }
        out.write_str(&palette.bucket_header(bucket, options.full_path, multiple))?;
        out.write_str(&palette.stack_lines(&bucket.signature, src_len, pkg_len, options.full_path))?;
    }
    Ok(())
}

/// [`write_to_console`] into a fresh string.
pub fn render_buckets(
    palette: &Palette,
    buckets: &[Bucket],
    options: &RenderOptions,
) -> Result<String, RenderError> {
    let mut out = String::new();
    write_to_console(&mut out, palette, buckets, options)?;
    Ok(out)
}
