//! Path extension sets.
//!
//! An [`ExtensionSet`] maps extensions (without the dot) to an enabled flag.
//! Updates come as strings: `"+css"` or `"css"` enables, `"-css"` disables.
//! Disabling keeps the key so a later merge can override an earlier enable.

use serde::Deserialize;
use std::collections::HashMap;

/// Extensions the access logger skips unless told otherwise.
pub const DEFAULT_IGNORED_EXTENSIONS: &[&str] = &[
    "css", "js", "jpg", "png", "gif", "ico", "ttf", "woff2", "svg", "svgz",
];

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(from = "Vec<String>")]
pub struct ExtensionSet {
    entries: HashMap<String, bool>,
}

impl ExtensionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// The static asset extensions ignored by default.
    pub fn default_ignored() -> Self {
        Self::from_strings(DEFAULT_IGNORED_EXTENSIONS.iter().copied())
    }

    pub fn from_strings<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::new().update_strings(values)
    }

    /// A copy with `+ext` / `-ext` / `ext` updates applied in order.
    pub fn update_strings<I, S>(&self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut next = self.clone();
        for value in values {
            let value = value.as_ref().trim();
            if let Some(ext) = value.strip_prefix('+') {
                next.set(ext, true);
            } else if let Some(ext) = value.strip_prefix('-') {
                next.set(ext, false);
            } else {
                next.set(value, true);
            }
        }
        next
    }

    /// A copy with every entry of `others` laid over this set.
    pub fn update<'a, I>(&self, others: I) -> Self
    where
        I: IntoIterator<Item = &'a ExtensionSet>,
    {
        let mut next = self.clone();
        for other in others {
            next.entries
                .extend(other.entries.iter().map(|(k, v)| (k.clone(), *v)));
        }
        next
    }

    pub fn set(&mut self, ext: &str, enabled: bool) {
        let ext = ext.trim_start_matches('.');
        if !ext.is_empty() {
            self.entries.insert(ext.to_ascii_lowercase(), enabled);
        }
    }

    pub fn is_enabled(&self, ext: &str) -> bool {
        self.entries
            .get(&ext.trim_start_matches('.').to_ascii_lowercase())
            .copied()
            .unwrap_or(false)
    }

    /// Whether the extension of `path` is in the set and enabled.
    pub fn matches_path(&self, path: &str) -> bool {
        path_extension(path).is_some_and(|ext| self.is_enabled(ext))
    }

    /// Enabled extensions, sorted.
    pub fn enabled(&self) -> Vec<&str> {
        let mut out: Vec<&str> = self
            .entries
            .iter()
            .filter(|(_, on)| **on)
            .map(|(k, _)| k.as_str())
            .collect();
        out.sort_unstable();
        out
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl From<Vec<String>> for ExtensionSet {
    fn from(values: Vec<String>) -> Self {
        Self::from_strings(values)
    }
}

impl<'a> FromIterator<&'a str> for ExtensionSet {
    fn from_iter<T: IntoIterator<Item = &'a str>>(iter: T) -> Self {
        Self::from_strings(iter)
    }
}

/// Extension of the last path segment, without the dot.
///
/// `/app.css` → `css`; `/dir.d/file`, `/file.` and `/.hidden` → none.
pub fn path_extension(path: &str) -> Option<&str> {
    let name = path.rsplit('/').next().unwrap_or(path);
    let dot = name.rfind('.')?;
    let ext = &name[dot + 1..];
    if dot == 0 || ext.is_empty() {
        return None;
    }
    Some(ext)
}
