//! Container runtime capability boundary.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::{Error, Result};

/// The runtime operations the reconciler depends on.
///
/// Removal must be idempotent: removing an image that is already gone is
/// not an error. Neither removal prunes dependent layers.
#[async_trait]
pub trait RuntimeClient: Send + Sync {
    /// Every `name:tag` the runtime knows, untagged sentinel included.
    async fn list_images(&self) -> Result<Vec<String>>;

    /// Ids of untagged, unreferenced images.
    async fn list_dangling_image_ids(&self) -> Result<Vec<String>>;

    /// Remove an image by name and tag.
    async fn remove_image_by_tag(&self, name: &str, tag: &str) -> Result<()>;

    /// Remove an image by id without forcing.
    async fn remove_image_by_id(&self, id: &str) -> Result<()>;
}

#[derive(Debug, Default)]
struct RuntimeState {
    /// id -> `name:tag`
    images: BTreeMap<String, String>,
    dangling: BTreeSet<String>,
    fail_removal: BTreeSet<String>,
    fail_queries: bool,
    removed: Vec<String>,
    removed_ids: Vec<String>,
}

/// In-memory runtime used by tests and dry environments.
#[derive(Debug, Default)]
pub struct InMemoryRuntime {
    state: Mutex<RuntimeState>,
}

impl InMemoryRuntime {
    /// Create an empty runtime.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a runtime holding `images`, with generated ids.
    pub fn with_images<I, S>(images: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let images = images
            .into_iter()
            .enumerate()
            .map(|(i, image)| (format!("sha256:{i:064x}"), image.into()))
            .collect();
        Self {
            state: Mutex::new(RuntimeState {
                images,
                ..RuntimeState::default()
            }),
        }
    }

    /// Add dangling image ids.
    pub async fn add_dangling<I, S>(&self, ids: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.state
            .lock()
            .await
            .dangling
            .extend(ids.into_iter().map(Into::into));
    }

    /// Make removal of `target` (a `name:tag` or an id) fail.
    pub async fn fail_removal_of(&self, target: impl Into<String>) {
        self.state.lock().await.fail_removal.insert(target.into());
    }

    /// Make every listing call fail.
    pub async fn fail_queries(&self, fail: bool) {
        self.state.lock().await.fail_queries = fail;
    }

    /// `name:tag` references removed so far, in call order.
    pub async fn removed(&self) -> Vec<String> {
        self.state.lock().await.removed.clone()
    }

    /// Ids removed so far, in call order.
    pub async fn removed_ids(&self) -> Vec<String> {
        self.state.lock().await.removed_ids.clone()
    }

    /// Current tagged inventory.
    pub async fn images(&self) -> Vec<String> {
        self.state.lock().await.images.values().cloned().collect()
    }
}

#[async_trait]
impl RuntimeClient for InMemoryRuntime {
    async fn list_images(&self) -> Result<Vec<String>> {
        let state = self.state.lock().await;
        if state.fail_queries {
            return Err(Error::runtime_query("runtime unavailable"));
        }
        Ok(state.images.values().cloned().collect())
    }

    async fn list_dangling_image_ids(&self) -> Result<Vec<String>> {
        let state = self.state.lock().await;
        if state.fail_queries {
            return Err(Error::runtime_query("runtime unavailable"));
        }
        Ok(state.dangling.iter().cloned().collect())
    }

    async fn remove_image_by_tag(&self, name: &str, tag: &str) -> Result<()> {
        let reference = format!("{name}:{tag}");
        let mut state = self.state.lock().await;
        if state.fail_removal.contains(&reference) {
            return Err(Error::removal(reference, "conflict: image is in use"));
        }
        state.images.retain(|_, image| *image != reference);
        state.removed.push(reference);
        Ok(())
    }

    async fn remove_image_by_id(&self, id: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        if state.fail_removal.contains(id) {
            return Err(Error::removal(id, "conflict: image has dependent children"));
        }
        state.dangling.remove(id);
        state.images.remove(id);
        state.removed_ids.push(id.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::expect_used)]
    #![allow(clippy::panic)]

    use super::*;

    #[tokio::test]
    async fn test_remove_by_tag_drops_from_inventory() {
        let runtime = InMemoryRuntime::with_images(["alpine:latest", "test00:tag00"]);
        runtime.remove_image_by_tag("alpine", "latest").await.unwrap();
        let images = runtime.list_images().await.unwrap();
        assert_eq!(images, vec!["test00:tag00".to_string()]);
    }

    #[tokio::test]
    async fn test_remove_absent_image_is_ok() {
        let runtime = InMemoryRuntime::new();
        assert!(runtime.remove_image_by_tag("ghost", "1").await.is_ok());
    }

    #[tokio::test]
    async fn test_injected_failures() {
        let runtime = InMemoryRuntime::with_images(["a:1"]);
        runtime.fail_removal_of("a:1").await;
        runtime.fail_queries(true).await;
        assert!(runtime.remove_image_by_tag("a", "1").await.is_err());
        assert!(matches!(
            runtime.list_images().await,
            Err(Error::RuntimeQuery { .. })
        ));
    }

    #[tokio::test]
    async fn test_dangling_removal() {
        let runtime = InMemoryRuntime::new();
        runtime.add_dangling(["sha256:aa", "sha256:bb"]).await;
        runtime.remove_image_by_id("sha256:aa").await.unwrap();
        assert_eq!(
            runtime.list_dangling_image_ids().await.unwrap(),
            vec!["sha256:bb".to_string()]
        );
        assert_eq!(runtime.removed_ids().await, vec!["sha256:aa".to_string()]);
    }
}
