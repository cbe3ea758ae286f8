//! Docker Engine implementation of the reconciler's runtime client.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod endpoint;
pub mod error;

use std::collections::HashMap;

use async_trait::async_trait;
use bollard::image::{ListImagesOptions, RemoveImageOptions};
use bollard::{API_DEFAULT_VERSION, Docker};
use janitor_reconciler::{Error as ReconcileError, Result as ReconcileResult, RuntimeClient};
use tracing::debug;

pub use endpoint::{DEFAULT_ENDPOINT, Endpoint};
pub use error::{DockerError, DockerResult};

/// Seconds to wait for a single Docker API call.
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Removal options shared by both removal paths: never forced, never
/// pruning parent layers.
const SAFE_REMOVE: RemoveImageOptions = RemoveImageOptions {
    force: false,
    noprune: true,
};

/// Runtime client talking to the Docker Engine API.
#[derive(Debug, Clone)]
pub struct BollardRuntime {
    docker: Docker,
}

impl BollardRuntime {
    /// Build a client for `uri` (see [`Endpoint::parse`]).
    ///
    /// No request is made; use [`BollardRuntime::ping`] to verify the
    /// daemon answers.
    ///
    /// # Errors
    ///
    /// Returns `DockerError::UnsupportedEndpoint` for an unknown scheme and
    /// `DockerError::Connect` if the client cannot be constructed.
    pub fn connect(uri: &str, timeout_secs: u64) -> DockerResult<Self> {
        let endpoint = Endpoint::parse(uri)?;
        let connect_error = |e: bollard::errors::Error| DockerError::connect(uri, e.to_string());

        let docker = match &endpoint {
            Endpoint::Unix(path) => {
                Docker::connect_with_unix(path, timeout_secs, API_DEFAULT_VERSION)
                    .map_err(connect_error)?
            }
            Endpoint::Http(addr) => {
                Docker::connect_with_http(addr, timeout_secs, API_DEFAULT_VERSION)
                    .map_err(connect_error)?
            }
            Endpoint::LocalDefaults => Docker::connect_with_local_defaults().map_err(connect_error)?,
        };

        debug!(endpoint = ?endpoint, "Docker client created");
        Ok(Self { docker })
    }

    /// Check that the daemon is reachable.
    ///
    /// # Errors
    ///
    /// Returns `DockerError::Ping` if the daemon does not answer.
    pub async fn ping(&self) -> DockerResult<()> {
        self.docker
            .ping()
            .await
            .map(|_| ())
            .map_err(|e| DockerError::ping(e.to_string()))
    }

    async fn remove(&self, reference: &str) -> ReconcileResult<()> {
        match self
            .docker
            .remove_image(reference, Some(SAFE_REMOVE), None)
            .await
        {
            Ok(deleted) => {
                debug!(image = %reference, entries = deleted.len(), "Image removed");
                Ok(())
            }
            Err(e) if error::is_not_found(&e) => {
                debug!(image = %reference, "Image already absent");
                Ok(())
            }
            Err(e) => Err(ReconcileError::removal(reference, e.to_string())),
        }
    }
}

#[async_trait]
impl RuntimeClient for BollardRuntime {
    async fn list_images(&self) -> ReconcileResult<Vec<String>> {
        let options = ListImagesOptions::<String> {
            all: true,
            ..Default::default()
        };
        let images = self
            .docker
            .list_images(Some(options))
            .await
            .map_err(|e| ReconcileError::runtime_query(e.to_string()))?;

        Ok(images
            .into_iter()
            .flat_map(|summary| summary.repo_tags)
            .collect())
    }

    async fn list_dangling_image_ids(&self) -> ReconcileResult<Vec<String>> {
        let options = ListImagesOptions::<String> {
            filters: HashMap::from([("dangling".to_string(), vec!["true".to_string()])]),
            ..Default::default()
        };
        let images = self
            .docker
            .list_images(Some(options))
            .await
            .map_err(|e| ReconcileError::runtime_query(e.to_string()))?;

        Ok(images.into_iter().map(|summary| summary.id).collect())
    }

    async fn remove_image_by_tag(&self, name: &str, tag: &str) -> ReconcileResult<()> {
        self.remove(&format!("{name}:{tag}")).await
    }

    async fn remove_image_by_id(&self, id: &str) -> ReconcileResult<()> {
        self.remove(id).await
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::expect_used)]
    #![allow(clippy::panic)]

    use super::*;

    #[tokio::test]
    async fn test_connect_is_lazy() {
        let runtime = BollardRuntime::connect("unix:///nonexistent/docker.sock", 5);
        assert!(runtime.is_ok());
    }

    #[tokio::test]
    async fn test_ping_unreachable_socket() {
        let runtime = BollardRuntime::connect("unix:///nonexistent/docker.sock", 5).unwrap();
        let result = runtime.ping().await;
        assert!(matches!(result, Err(DockerError::Ping { .. })));
    }

    #[tokio::test]
    async fn test_list_images_unreachable_is_query_error() {
        let runtime = BollardRuntime::connect("unix:///nonexistent/docker.sock", 5).unwrap();
        let result = runtime.list_images().await;
        assert!(matches!(result, Err(ReconcileError::RuntimeQuery { .. })));
    }

    #[tokio::test]
    async fn test_remove_unreachable_is_removal_error() {
        let runtime = BollardRuntime::connect("unix:///nonexistent/docker.sock", 5).unwrap();
        let result = runtime.remove_image_by_tag("alpine", "latest").await;
        assert!(matches!(result, Err(ReconcileError::Removal { .. })));
    }

    #[test]
    fn test_unsupported_scheme() {
        let result = BollardRuntime::connect("ssh://host", 5);
        assert!(matches!(result, Err(DockerError::UnsupportedEndpoint { .. })));
    }
}
