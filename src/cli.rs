//! CLI definitions using clap.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

use std::path::PathBuf;

use clap::Parser;

use crate::config::LogFormat;

/// image-janitor - removes container images no pending job references
#[derive(Parser, Debug, Default)]
#[command(name = "image-janitor")]
#[command(version)]
#[command(about = "Removes container images that no job file in the job directory references")]
#[command(
    long_about = "image-janitor periodically scans a directory of job files, collects every container image they reference, and removes all other tagged images plus dangling images from the local Docker daemon. Images listed in the directory's `excludes` file are never removed."
)]
pub struct Cli {
    /// Interval between passes (e.g. 90s, 1h30m, 500ms) [default: 1m]
    #[arg(short, long, env = "JANITOR_INTERVAL")]
    pub interval: Option<String>,

    /// Directory holding job files and the `excludes` file [default: /opt/image-janitor]
    #[arg(short, long, env = "JANITOR_READ_FROM")]
    pub read_from: Option<PathBuf>,

    /// Docker endpoint (unix:///path, /path, tcp://host:port) [default: unix:///var/run/docker.sock]
    #[arg(short, long, env = "JANITOR_DOCKER")]
    pub docker: Option<String>,

    /// TOML configuration file
    #[arg(short, long, env = "JANITOR_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log removal decisions without removing anything
    #[arg(long, env = "JANITOR_DRY_RUN", default_value_t = false)]
    pub dry_run: bool,

    /// Run a single pass immediately and exit
    #[arg(long, default_value_t = false)]
    pub once: bool,

    /// Append a JSON line per removal attempt to this file
    #[arg(long, env = "JANITOR_EVENTS_LOG")]
    pub events_log: Option<PathBuf>,

    /// Log level filter, overridden by RUST_LOG [default: info]
    #[arg(long, env = "JANITOR_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Log output format [default: text]
    #[arg(long, value_enum, env = "JANITOR_LOG_FORMAT")]
    pub log_format: Option<LogFormat>,
}
