#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

//! # image-janitor
//!
//! Periodically removes container images that no job file references.
//!
//! The reconciliation engine lives in `janitor-reconciler`; the Docker
//! client in `janitor-docker`. This crate holds the command line, the
//! configuration layering and the startup checks.

pub mod cli;
pub mod config;
pub mod startup;

pub use cli::Cli;
pub use config::{ConfigError, FileConfig, JanitorConfig, LogFormat, parse_interval};
