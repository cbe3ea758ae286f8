//! Removal event side channel.
//!
//! The engine reports every removal attempt to a [`RemovalNotifier`].
//! Delivery failures are logged by the engine and never affect a pass.

use std::path::PathBuf;
use std::sync::LazyLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;

use crate::error::{Error, Result};
use crate::types::RemovalOutcome;

/// Event name for removal by tag.
pub const REMOVE_IMAGE_EVENT: &str = "remove-image";

/// Event name for removal of a dangling image by id.
pub const REMOVE_DANGLING_EVENT: &str = "remove-dangling-image";

/// One removal attempt, as published to the side channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemovalEvent {
    pub event_name: String,
    pub message: String,
    pub host: String,
    /// `name:tag` or image id.
    pub image: String,
    pub outcome: RemovalOutcome,
    pub timestamp: DateTime<Utc>,
}

impl RemovalEvent {
    /// Build an event stamped with the current host and time.
    pub fn new(event_name: &str, image: impl Into<String>, outcome: RemovalOutcome) -> Self {
        let image = image.into();
        let message = match &outcome {
            RemovalOutcome::Removed => format!("removed image {image}"),
            RemovalOutcome::Failed(reason) => format!("failed to remove image {image}: {reason}"),
            RemovalOutcome::DryRun => format!("would remove image {image}"),
        };
        Self {
            event_name: event_name.to_string(),
            message,
            host: hostname().to_string(),
            image,
            outcome,
            timestamp: Utc::now(),
        }
    }
}

static HOSTNAME: LazyLock<String> = LazyLock::new(|| {
    std::env::var("HOSTNAME")
        .ok()
        .filter(|h| !h.is_empty())
        .or_else(|| {
            std::fs::read_to_string("/etc/hostname")
                .ok()
                .map(|h| h.trim().to_string())
                .filter(|h| !h.is_empty())
        })
        .unwrap_or_else(|| "unknown".to_string())
});

/// Best-effort host name for event attribution, resolved once per process.
#[must_use]
pub fn hostname() -> &'static str {
    HOSTNAME.as_str()
}

/// Port invoked after each removal attempt.
#[async_trait]
pub trait RemovalNotifier: Send + Sync {
    /// Publish one event.
    async fn notify(&self, event: &RemovalEvent) -> Result<()>;
}

/// Notifier that drops every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

#[async_trait]
impl RemovalNotifier for NoopNotifier {
    async fn notify(&self, _event: &RemovalEvent) -> Result<()> {
        Ok(())
    }
}

/// Appends one JSON object per line to a file.
#[derive(Debug, Clone)]
pub struct JsonLinesNotifier {
    path: PathBuf,
}

impl JsonLinesNotifier {
    /// Create a notifier writing to `path`; the file is created on first use.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl RemovalNotifier for JsonLinesNotifier {
    async fn notify(&self, event: &RemovalEvent) -> Result<()> {
        let mut line = serde_json::to_vec(event).map_err(|e| Error::notify(e.to_string()))?;
        line.push(b'\n');

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| Error::notify(format!("{}: {e}", self.path.display())))?;
        file.write_all(&line)
            .await
            .map_err(|e| Error::notify(format!("{}: {e}", self.path.display())))?;
        file.flush()
            .await
            .map_err(|e| Error::notify(format!("{}: {e}", self.path.display())))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::expect_used)]
    #![allow(clippy::panic)]
    #![allow(clippy::indexing_slicing)]

    use super::*;

    #[test]
    fn test_event_message() {
        let event = RemovalEvent::new(REMOVE_IMAGE_EVENT, "alpine:latest", RemovalOutcome::Removed);
        assert_eq!(event.event_name, "remove-image");
        assert!(event.message.contains("alpine:latest"));
        assert!(!event.host.is_empty());
    }

    #[test]
    fn test_hostname_resolved_once() {
        let first = hostname();
        let second = hostname();
        assert!(!first.is_empty());
        assert!(std::ptr::eq(first, second));

        let a = RemovalEvent::new(REMOVE_IMAGE_EVENT, "a:1", RemovalOutcome::DryRun);
        let b = RemovalEvent::new(REMOVE_DANGLING_EVENT, "sha256:00", RemovalOutcome::Removed);
        assert_eq!(a.host, first);
        assert_eq!(a.host, b.host);
    }

    #[tokio::test]
    async fn test_json_lines_notifier_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.jsonl");
        let notifier = JsonLinesNotifier::new(&path);

        notifier
            .notify(&RemovalEvent::new(REMOVE_IMAGE_EVENT, "a:1", RemovalOutcome::Removed))
            .await
            .unwrap();
        notifier
            .notify(&RemovalEvent::new(
                REMOVE_DANGLING_EVENT,
                "sha256:aa",
                RemovalOutcome::Failed("conflict".to_string()),
            ))
            .await
            .unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let events: Vec<RemovalEvent> = contents
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].image, "a:1");
        assert_eq!(events[1].outcome, RemovalOutcome::Failed("conflict".to_string()));
    }

    #[tokio::test]
    async fn test_json_lines_notifier_bad_path() {
        let notifier = JsonLinesNotifier::new("/nonexistent/dir/events.jsonl");
        let result = notifier
            .notify(&RemovalEvent::new(REMOVE_IMAGE_EVENT, "a:1", RemovalOutcome::DryRun))
            .await;
        assert!(matches!(result, Err(Error::Notify { .. })));
    }
}
