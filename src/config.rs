//! Runtime configuration: CLI and environment over an optional TOML file
//! over built-in defaults.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use serde::Deserialize;
use thiserror::Error;

use crate::cli::Cli;

pub const DEFAULT_INTERVAL: &str = "1m";
pub const DEFAULT_READ_FROM: &str = "/opt/image-janitor";
pub const DEFAULT_LOG_LEVEL: &str = "info";

#[allow(clippy::expect_used)]
static INTERVAL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:\d+(?:ms|s|m|h))+$").expect("valid interval pattern"));

#[allow(clippy::expect_used)]
static INTERVAL_GROUP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)(ms|s|m|h)").expect("valid interval group pattern"));

/// Configuration errors. All of them are fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file {path}: {reason}")]
    Parse { path: PathBuf, reason: String },

    #[error("invalid interval '{value}': expected groups like 90s, 1h30m or 500ms")]
    MalformedInterval { value: String },

    #[error("interval '{value}' must be greater than zero")]
    ZeroInterval { value: String },
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Keys accepted in the TOML config file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub interval: Option<String>,
    pub read_from: Option<PathBuf>,
    pub docker: Option<String>,
    pub dry_run: Option<bool>,
    pub events_log: Option<PathBuf>,
    pub log_level: Option<String>,
    pub log_format: Option<LogFormat>,
}

impl FileConfig {
    /// Read and parse a TOML config file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ReadFile` if the file cannot be read and
    /// `ConfigError::Parse` for invalid TOML or unknown keys.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(path, &text)
    }

    /// Parse TOML text. `path` is only used in error messages.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Parse` for invalid TOML or unknown keys.
    pub fn parse(path: &Path, text: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }
}

/// Fully resolved configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JanitorConfig {
    pub interval: Duration,
    pub read_from: PathBuf,
    pub docker: String,
    pub dry_run: bool,
    pub once: bool,
    pub events_log: Option<PathBuf>,
    pub log_level: String,
    pub log_format: LogFormat,
}

impl JanitorConfig {
    /// Resolve from parsed CLI arguments, loading `--config` if given.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be loaded or the interval
    /// is malformed or zero.
    pub fn resolve(cli: &Cli) -> Result<Self, ConfigError> {
        let file = match &cli.config {
            Some(path) => FileConfig::load(path)?,
            None => FileConfig::default(),
        };
        Self::merge(cli, file)
    }

    /// Merge CLI values over file values over defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the resulting interval is malformed or zero.
    pub fn merge(cli: &Cli, file: FileConfig) -> Result<Self, ConfigError> {
        let interval_text = cli
            .interval
            .clone()
            .or(file.interval)
            .unwrap_or_else(|| DEFAULT_INTERVAL.to_string());

        Ok(Self {
            interval: parse_interval(&interval_text)?,
            read_from: cli
                .read_from
                .clone()
                .or(file.read_from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_READ_FROM)),
            docker: cli
                .docker
                .clone()
                .or(file.docker)
                .unwrap_or_else(|| janitor_docker::DEFAULT_ENDPOINT.to_string()),
            dry_run: cli.dry_run || file.dry_run.unwrap_or(false),
            once: cli.once,
            events_log: cli.events_log.clone().or(file.events_log),
            log_level: cli
                .log_level
                .clone()
                .or(file.log_level)
                .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()),
            log_format: cli.log_format.or(file.log_format).unwrap_or_default(),
        })
    }
}

/// Parse a duration made of `<integer><unit>` groups, units `ms`, `s`, `m`
/// and `h`.
///
/// # Errors
///
/// Returns `ConfigError::MalformedInterval` for anything else (including
/// overflow) and `ConfigError::ZeroInterval` when the total is zero.
pub fn parse_interval(text: &str) -> Result<Duration, ConfigError> {
    let malformed = || ConfigError::MalformedInterval {
        value: text.to_string(),
    };

    let value = text.trim();
    if !INTERVAL_PATTERN.is_match(value) {
        return Err(malformed());
    }

    let total_ms = INTERVAL_GROUP
        .captures_iter(value)
        .try_fold(0u64, |total, caps| {
            let amount: u64 = caps.get(1)?.as_str().parse().ok()?;
            let unit_ms = match caps.get(2)?.as_str() {
                "ms" => 1,
                "s" => 1_000,
                "m" => 60_000,
                _ => 3_600_000,
            };
            total.checked_add(amount.checked_mul(unit_ms)?)
        })
        .ok_or_else(malformed)?;

    if total_ms == 0 {
        return Err(ConfigError::ZeroInterval {
            value: text.to_string(),
        });
    }
    Ok(Duration::from_millis(total_ms))
}
