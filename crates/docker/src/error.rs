//! Errors raised while establishing the Docker connection.

use thiserror::Error;

pub type DockerResult<T> = Result<T, DockerError>;

/// Startup-time Docker failures. Per-call failures are reported through the
/// reconciler's error type instead.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DockerError {
    #[error("unsupported docker endpoint '{endpoint}'")]
    UnsupportedEndpoint { endpoint: String },

    #[error("failed to connect to docker at '{endpoint}': {reason}")]
    Connect { endpoint: String, reason: String },

    #[error("docker daemon did not answer ping: {reason}")]
    Ping { reason: String },
}

impl DockerError {
    pub fn unsupported_endpoint(endpoint: impl Into<String>) -> Self {
        Self::UnsupportedEndpoint {
            endpoint: endpoint.into(),
        }
    }

    pub fn connect(endpoint: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Connect {
            endpoint: endpoint.into(),
            reason: reason.into(),
        }
    }

    pub fn ping(reason: impl Into<String>) -> Self {
        Self::Ping {
            reason: reason.into(),
        }
    }
}

/// Whether the daemon answered 404 (image already gone).
pub(crate) fn is_not_found(err: &bollard::errors::Error) -> bool {
    matches!(
        err,
        bollard::errors::Error::DockerResponseServerError {
            status_code: 404,
            ..
        }
    )
}
