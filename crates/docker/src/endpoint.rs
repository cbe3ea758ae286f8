//! Parsing of the Docker connection URI.

use crate::error::{DockerError, DockerResult};

/// Default daemon socket.
pub const DEFAULT_ENDPOINT: &str = "unix:///var/run/docker.sock";

/// Where to reach the Docker daemon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// Unix socket path.
    Unix(String),
    /// `tcp://` or `http://` address, passed through to the client.
    Http(String),
    /// `DOCKER_HOST` or the platform default socket.
    LocalDefaults,
}

impl Endpoint {
    /// Parse a connection URI.
    ///
    /// Accepts `unix:///path`, a bare absolute socket path, `tcp://host:port`,
    /// `http://host:port`, or an empty string for the local defaults.
    ///
    /// # Errors
    ///
    /// Returns `DockerError::UnsupportedEndpoint` for anything else.
    pub fn parse(uri: &str) -> DockerResult<Self> {
        let uri = uri.trim();
        if uri.is_empty() {
            return Ok(Self::LocalDefaults);
        }
        if let Some(path) = uri.strip_prefix("unix://") {
            if path.is_empty() {
                return Err(DockerError::unsupported_endpoint(uri));
            }
            return Ok(Self::Unix(path.to_string()));
        }
        if uri.starts_with('/') {
            return Ok(Self::Unix(uri.to_string()));
        }
        if uri.starts_with("tcp://") || uri.starts_with("http://") {
            return Ok(Self::Http(uri.to_string()));
        }
        Err(DockerError::unsupported_endpoint(uri))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_unix_uri() {
        assert_eq!(
            Endpoint::parse(DEFAULT_ENDPOINT).ok(),
            Some(Endpoint::Unix("/var/run/docker.sock".to_string()))
        );
    }

    #[test]
    fn test_parse_bare_path() {
        assert_eq!(
            Endpoint::parse("/run/user/1000/docker.sock").ok(),
            Some(Endpoint::Unix("/run/user/1000/docker.sock".to_string()))
        );
    }

    #[test]
    fn test_parse_tcp() {
        assert_eq!(
            Endpoint::parse("tcp://10.0.0.5:2375").ok(),
            Some(Endpoint::Http("tcp://10.0.0.5:2375".to_string()))
        );
    }

    #[test]
    fn test_parse_empty_uses_defaults() {
        assert_eq!(Endpoint::parse("").ok(), Some(Endpoint::LocalDefaults));
    }

    #[test]
    fn test_parse_rejects_unknown() {
        assert!(Endpoint::parse("npipe:////./pipe/docker_engine").is_err());
        assert!(Endpoint::parse("unix://").is_err());
    }
}
