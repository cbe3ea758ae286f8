//! Error types for the reconciler crate.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for reconciler operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Reconciler error types.
///
/// `JobDirUnreadable`, `JobFileUnreadable` and `RuntimeQuery` abort a pass.
/// The remaining variants are recorded against a single item.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum Error {
    /// Job directory could not be listed.
    #[error("job directory '{path}' is unreadable: {reason}")]
    JobDirUnreadable { path: PathBuf, reason: String },

    /// A listed job file could not be read.
    #[error("job file '{path}' is unreadable: {reason}")]
    JobFileUnreadable { path: PathBuf, reason: String },

    /// A job file could not be decoded.
    #[error("failed to parse job file '{path}': {reason}")]
    JobParseFailed { path: PathBuf, reason: String },

    /// Exclusion file could not be opened or read.
    #[error("excludes file '{path}' is unreadable: {reason}")]
    ExcludesUnreadable { path: PathBuf, reason: String },

    /// Runtime listing call failed.
    #[error("runtime query failed: {reason}")]
    RuntimeQuery { reason: String },

    /// Removal of a single image failed.
    #[error("failed to remove image '{target}': {reason}")]
    Removal { target: String, reason: String },

    /// Removal notification could not be delivered.
    #[error("failed to publish removal event: {reason}")]
    Notify { reason: String },

    /// Invalid configuration.
    #[error("invalid configuration: {reason}")]
    InvalidConfig { reason: String },
}

impl Error {
    /// Create a job directory error.
    pub fn job_dir_unreadable(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::JobDirUnreadable {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a job file read error.
    pub fn job_file_unreadable(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::JobFileUnreadable {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a job parse error.
    pub fn job_parse_failed(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::JobParseFailed {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create an excludes read error.
    pub fn excludes_unreadable(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::ExcludesUnreadable {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a runtime query error.
    pub fn runtime_query(reason: impl Into<String>) -> Self {
        Self::RuntimeQuery {
            reason: reason.into(),
        }
    }

    /// Create a removal error.
    pub fn removal(target: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Removal {
            target: target.into(),
            reason: reason.into(),
        }
    }

    /// Create a notification error.
    pub fn notify(reason: impl Into<String>) -> Self {
        Self::Notify {
            reason: reason.into(),
        }
    }

    /// Create an invalid config error.
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Whether this error aborts the whole reconciliation pass.
    #[must_use]
    pub const fn is_fatal_to_pass(&self) -> bool {
        matches!(
            self,
            Self::JobDirUnreadable { .. } | Self::JobFileUnreadable { .. } | Self::RuntimeQuery { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::removal("alpine:latest", "conflict");
        assert!(err.to_string().contains("alpine:latest"));
        assert!(err.to_string().contains("conflict"));
    }

    #[test]
    fn test_fatal_classification() {
        assert!(Error::job_dir_unreadable("/opt/jobs", "denied").is_fatal_to_pass());
        assert!(Error::job_file_unreadable("/opt/jobs/a.json", "is a directory").is_fatal_to_pass());
        assert!(Error::runtime_query("connection refused").is_fatal_to_pass());
        assert!(!Error::job_parse_failed("/opt/jobs/a.json", "eof").is_fatal_to_pass());
        assert!(!Error::removal("a:b", "in use").is_fatal_to_pass());
        assert!(!Error::excludes_unreadable("/opt/jobs/excludes", "missing").is_fatal_to_pass());
    }
}
