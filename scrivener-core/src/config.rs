//! Formatter configuration.
//!
//! Loaded from TOML:
//!
//! ```toml
//! no_color = false
//! truncate_uri = 120
//! ignore_extensions = ["-svg", "map"]
//! real_ip = true
//! crash_filter = "^1: parked"
//! ```
//!
//! or from `SCRIVENER_*` environment variables (`SCRIVENER_NO_COLOR`,
//! `SCRIVENER_TRUNCATE_URI`, `SCRIVENER_IGNORE_EXTENSIONS=-svg,map`, ...),
//! then turned into a [`DefaultFormatter`] with [`FormatterConfig::build`].

use crate::error::ConfigError;
use crate::extension_set::ExtensionSet;
use crate::formatter::DefaultFormatter;
use crate::sink::{StderrSink, StdoutSink};
use regex::Regex;
use serde::Deserialize;
use std::path::Path;

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FormatterConfig {
    /// Never style output.
    pub no_color: bool,
    /// Style even when standard output is not a terminal.
    pub no_color_tty_check: bool,
    /// Maximum logged URI length, 0 for no limit.
    pub truncate_uri: usize,
    /// `+ext` / `-ext` / `ext` updates applied to the default ignore set.
    pub ignore_extensions: Vec<String>,
    /// Log the forwarded client IP instead of the socket peer.
    pub real_ip: bool,
    /// Full source paths in crash reports.
    pub full_path: bool,
    /// Print the backtrace hint above crash reports.
    pub env_hint: bool,
    /// Leave out crash report buckets whose header matches.
    pub crash_filter: Option<String>,
    /// Keep only crash report buckets whose header matches.
    pub crash_matcher: Option<String>,
    /// Prefix stdout and stderr lines with a timestamp.
    pub timestamps: bool,
}

impl Default for FormatterConfig {
    fn default() -> Self {
        Self {
            no_color: false,
            no_color_tty_check: false,
            truncate_uri: 0,
            ignore_extensions: Vec::new(),
            real_ip: false,
            full_path: false,
            env_hint: true,
            crash_filter: None,
            crash_matcher: None,
            timestamps: true,
        }
    }
}

impl FormatterConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| ConfigError::ParseError(format!("TOML parse error: {}", e)))
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            ConfigError::LoadError(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    /// Read `SCRIVENER_*` variables from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read `SCRIVENER_*` keys through `lookup`. Unset keys keep their
    /// defaults; malformed values are errors.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string());

        if let Some(v) = get("SCRIVENER_NO_COLOR") {
            config.no_color = parse_flag("SCRIVENER_NO_COLOR", &v)?;
        }
        if let Some(v) = get("SCRIVENER_NO_COLOR_TTY_CHECK") {
            config.no_color_tty_check = parse_flag("SCRIVENER_NO_COLOR_TTY_CHECK", &v)?;
        }
        if let Some(v) = get("SCRIVENER_TRUNCATE_URI") {
            config.truncate_uri = v.parse().map_err(|_| invalid("SCRIVENER_TRUNCATE_URI", &v))?;
        }
        if let Some(v) = get("SCRIVENER_IGNORE_EXTENSIONS") {
            config.ignore_extensions = v
                .split(',')
                .map(str::trim)
                .filter(|ext| !ext.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(v) = get("SCRIVENER_REAL_IP") {
            config.real_ip = parse_flag("SCRIVENER_REAL_IP", &v)?;
        }
        if let Some(v) = get("SCRIVENER_FULL_PATH") {
            config.full_path = parse_flag("SCRIVENER_FULL_PATH", &v)?;
        }
        if let Some(v) = get("SCRIVENER_ENV_HINT") {
            config.env_hint = parse_flag("SCRIVENER_ENV_HINT", &v)?;
        }
        if let Some(v) = get("SCRIVENER_TIMESTAMPS") {
            config.timestamps = parse_flag("SCRIVENER_TIMESTAMPS", &v)?;
        }
        config.crash_filter = get("SCRIVENER_CRASH_FILTER").filter(|v| !v.is_empty());
        config.crash_matcher = get("SCRIVENER_CRASH_MATCHER").filter(|v| !v.is_empty());

        Ok(config)
    }

    /// The ignore set: defaults with the configured updates applied.
    pub fn extension_set(&self) -> ExtensionSet {
        ExtensionSet::default_ignored().update_strings(&self.ignore_extensions)
    }

    /// A formatter writing to standard output and standard error.
    pub fn build(&self) -> Result<DefaultFormatter> {
        let (sink, crash_sink) = if self.timestamps {
            (StdoutSink::new(), StderrSink::new())
        } else {
            (StdoutSink::plain(), StderrSink::plain())
        };

        let mut formatter = DefaultFormatter::new()
            .with_sink(sink)
            .with_crash_sink(crash_sink)
            .no_color(self.no_color)
            .no_color_tty_check(self.no_color_tty_check)
            .truncate_uri(self.truncate_uri)
            .ignore_extensions(self.extension_set())
            .real_ip(self.real_ip)
            .full_path(self.full_path)
            .env_hint(self.env_hint);

        if let Some(pattern) = &self.crash_filter {
            formatter = formatter.crash_filter(compile("crash_filter", pattern)?);
        }
        if let Some(pattern) = &self.crash_matcher {
            formatter = formatter.crash_matcher(compile("crash_matcher", pattern)?);
        }
        Ok(formatter)
    }
}

fn compile(key: &str, pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|source| ConfigError::InvalidPattern {
        key: key.to_string(),
        source,
    })
}

fn invalid(key: &str, value: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    }
}

fn parse_flag(key: &str, value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(invalid(key, value)),
    }
}
