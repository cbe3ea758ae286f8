//! Startup checks and wiring performed before the first pass.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, ensure};
use janitor_docker::{BollardRuntime, DEFAULT_TIMEOUT_SECS};
use janitor_reconciler::{JsonLinesNotifier, NoopNotifier, RemovalNotifier};
use tracing::info;

use crate::config::JanitorConfig;

/// Ensure the job directory exists, is a directory and can be listed.
///
/// # Errors
///
/// Returns an error describing which of the three checks failed.
pub async fn check_job_dir(dir: &Path) -> Result<()> {
    let metadata = tokio::fs::metadata(dir)
        .await
        .with_context(|| format!("Job directory {} does not exist", dir.display()))?;
    ensure!(
        metadata.is_dir(),
        "Job directory {} is not a directory",
        dir.display()
    );
    tokio::fs::read_dir(dir)
        .await
        .with_context(|| format!("Job directory {} is not readable", dir.display()))?;
    Ok(())
}

/// Connect to the Docker daemon and confirm it answers.
///
/// # Errors
///
/// Returns an error if the endpoint is unsupported or the ping fails.
pub async fn connect_runtime(endpoint: &str) -> Result<BollardRuntime> {
    let runtime = BollardRuntime::connect(endpoint, DEFAULT_TIMEOUT_SECS)
        .with_context(|| format!("Failed to create Docker client for {endpoint}"))?;
    runtime
        .ping()
        .await
        .with_context(|| format!("Docker daemon at {endpoint} is not reachable"))?;
    info!(endpoint = %endpoint, "Docker daemon reachable");
    Ok(runtime)
}

/// Pick the removal notifier for this configuration.
pub fn build_notifier(config: &JanitorConfig) -> Arc<dyn RemovalNotifier> {
    match &config.events_log {
        Some(path) => {
            info!(path = %path.display(), "Writing removal events");
            Arc::new(JsonLinesNotifier::new(path.clone()))
        }
        None => Arc::new(NoopNotifier),
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::expect_used)]
    #![allow(clippy::panic)]

    use super::*;

    #[tokio::test]
    async fn test_check_job_dir_accepts_directory() {
        let dir = tempfile::tempdir().unwrap();
        assert!(check_job_dir(dir.path()).await.is_ok());
    }

    #[tokio::test]
    async fn test_check_job_dir_rejects_missing() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing");
        let err = check_job_dir(&missing).await.unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[tokio::test]
    async fn test_check_job_dir_rejects_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("job.json");
        std::fs::write(&file, b"{}").unwrap();
        let err = check_job_dir(&file).await.unwrap_err();
        assert!(err.to_string().contains("is not a directory"));
    }

    #[tokio::test]
    async fn test_connect_runtime_unreachable() {
        let result = connect_runtime("unix:///nonexistent/docker.sock").await;
        assert!(result.is_err());
    }
}
