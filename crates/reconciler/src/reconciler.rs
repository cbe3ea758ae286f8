//! Reconciliation engine.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use itertools::Itertools;
use janitor_core::ResultExt;
use tracing::{debug, error, info, warn};

use crate::error::{Error, Result};
use crate::excludes::load_excludes;
use crate::jobs::{JobScanner, referenced_images};
use crate::notify::{
    NoopNotifier, REMOVE_DANGLING_EVENT, REMOVE_IMAGE_EVENT, RemovalEvent, RemovalNotifier,
};
use crate::runtime::RuntimeClient;
use crate::types::{ExcludeSet, ImageRef, ImageSet, PassReport, RemovalOutcome, UNTAGGED_SENTINEL};

/// Configuration for the reconciler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcilerConfig {
    /// Directory holding job files and the `excludes` file.
    pub job_dir: PathBuf,
    /// Decide and report without removing anything.
    pub dry_run: bool,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            job_dir: PathBuf::from("/opt/image-janitor"),
            dry_run: false,
        }
    }
}

/// Images present in `inventory`, not referenced by a job, and not the
/// untagged sentinel.
///
/// Referenced images absent from the inventory are ignored. Matching is
/// exact string identity.
#[must_use]
pub fn removable_images<S: AsRef<str>>(in_use: &ImageSet, inventory: &[S]) -> ImageSet {
    inventory
        .iter()
        .map(AsRef::as_ref)
        .filter(|image| *image != UNTAGGED_SENTINEL && !in_use.contains(*image))
        .map(str::to_string)
        .collect()
}

/// Removes images no job references, then dangling images.
pub struct Reconciler {
    runtime: Arc<dyn RuntimeClient>,
    notifier: Arc<dyn RemovalNotifier>,
    scanner: JobScanner,
    config: ReconcilerConfig,
}

impl Reconciler {
    /// Create a new reconciler.
    pub fn new(
        runtime: Arc<dyn RuntimeClient>,
        notifier: Arc<dyn RemovalNotifier>,
        config: ReconcilerConfig,
    ) -> Self {
        Self {
            runtime,
            notifier,
            scanner: JobScanner::new(config.job_dir.clone()),
            config,
        }
    }

    /// Create a reconciler that publishes no events.
    pub fn without_notifier(runtime: Arc<dyn RuntimeClient>, config: ReconcilerConfig) -> Self {
        Self::new(runtime, Arc::new(NoopNotifier), config)
    }

    /// Run one full pass: scan, extract, diff, exclude, remove, clean
    /// dangling images.
    ///
    /// # Errors
    ///
    /// Returns an error, with no removals attempted, when the job directory
    /// or a job file cannot be read, or when the runtime inventory query
    /// fails. Per-item failures are recorded in the report instead.
    pub async fn run_pass(&self) -> Result<PassReport> {
        let started = Instant::now();
        info!(
            job_dir = %self.config.job_dir.display(),
            dry_run = self.config.dry_run,
            "Starting reconciliation pass"
        );

        let batch = self.scanner.scan().await?;
        let in_use = referenced_images(&batch.jobs);
        let inventory = self.runtime.list_images().await?;
        let candidates = removable_images(&in_use, &inventory);

        debug!(
            jobs = batch.jobs.len(),
            in_use = in_use.len(),
            inventory = inventory.len(),
            candidates = %candidates.iter().join(", "),
            "Computed removable set"
        );

        let excludes = load_excludes(&self.config.job_dir)
            .await
            .or_default_warned("Could not load excludes file");

        let mut report = PassReport {
            jobs_parsed: batch.jobs.len(),
            jobs_skipped: batch.skipped,
            in_use_count: in_use.len(),
            inventory_count: inventory.len(),
            candidates: candidates.iter().cloned().collect(),
            ..PassReport::default()
        };

        self.remove_candidates(&candidates, &excludes, &mut report)
            .await;
        self.remove_dangling(&mut report).await;

        report.elapsed = started.elapsed();
        if report.converged() {
            info!(elapsed = ?report.elapsed, "No unused images found");
        } else {
            info!(
                candidates = report.candidates.len(),
                removed = report.removed.len(),
                excluded = report.excluded.len(),
                skipped = report.skipped.len(),
                failed = report.failed.len(),
                dry_run = report.dry_run.len(),
                dangling_dry_run = report.dangling_dry_run.len(),
                dangling_removed = report.dangling_removed.len(),
                dangling_failed = report.dangling_failed.len(),
                elapsed = ?report.elapsed,
                "Reconciliation pass complete"
            );
        }

        Ok(report)
    }

    /// Remove each candidate not in `excludes`, continuing past failures.
    async fn remove_candidates(
        &self,
        candidates: &ImageSet,
        excludes: &ExcludeSet,
        report: &mut PassReport,
    ) {
        for candidate in candidates {
            if excludes.contains(candidate) {
                debug!(image = %candidate, "Image is excluded, keeping it");
                report.excluded.push(candidate.clone());
                continue;
            }

            let Some(image) = ImageRef::parse(candidate) else {
                warn!(image = %candidate, "Image has no tag, cannot remove by tag");
                report.skipped.push(candidate.clone());
                continue;
            };

            let outcome = if self.config.dry_run {
                info!(image = %candidate, "Dry run: would remove image");
                report.dry_run.push(candidate.clone());
                RemovalOutcome::DryRun
            } else {
                match self.runtime.remove_image_by_tag(&image.name, &image.tag).await {
                    Ok(()) => {
                        info!(image = %candidate, "Removed unused image");
                        report.removed.push(candidate.clone());
                        RemovalOutcome::Removed
                    }
                    Err(e) => {
                        error!(image = %candidate, error = %e, "Error removing image");
                        report.failed.push((candidate.clone(), e.to_string()));
                        RemovalOutcome::Failed(e.to_string())
                    }
                }
            };

            self.publish(RemovalEvent::new(REMOVE_IMAGE_EVENT, candidate.clone(), outcome))
                .await;
        }
    }

    /// Remove dangling images by id, continuing past failures.
    async fn remove_dangling(&self, report: &mut PassReport) {
        let dangling = self
            .runtime
            .list_dangling_image_ids()
            .await
            .or_default_warned("Could not list dangling images");

        for id in dangling {
            let outcome = if self.config.dry_run {
                info!(id = %id, "Dry run: would remove dangling image");
                report.dangling_dry_run.push(id.clone());
                RemovalOutcome::DryRun
            } else {
                match self.runtime.remove_image_by_id(&id).await {
                    Ok(()) => {
                        info!(id = %id, "Removed dangling image");
                        report.dangling_removed.push(id.clone());
                        RemovalOutcome::Removed
                    }
                    Err(e) => {
                        error!(id = %id, error = %e, "Error removing dangling image");
                        report.dangling_failed.push((id.clone(), e.to_string()));
                        RemovalOutcome::Failed(e.to_string())
                    }
                }
            };

            self.publish(RemovalEvent::new(REMOVE_DANGLING_EVENT, id, outcome))
                .await;
        }
    }

    async fn publish(&self, event: RemovalEvent) {
        if let Err(e) = self.notifier.notify(&event).await {
            warn!(image = %event.image, error = %e, "Removal event not published");
        }
    }

    /// Get the configuration.
    pub fn config(&self) -> &ReconcilerConfig {
        &self.config
    }
}

/// Builder for Reconciler.
pub struct ReconcilerBuilder {
    runtime: Option<Arc<dyn RuntimeClient>>,
    notifier: Option<Arc<dyn RemovalNotifier>>,
    config: ReconcilerConfig,
}

impl ReconcilerBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self {
            runtime: None,
            notifier: None,
            config: ReconcilerConfig::default(),
        }
    }

    /// Set the runtime client.
    pub fn with_runtime(mut self, runtime: Arc<dyn RuntimeClient>) -> Self {
        self.runtime = Some(runtime);
        self
    }

    /// Set a removal notifier.
    pub fn with_notifier(mut self, notifier: Arc<dyn RemovalNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Set the configuration.
    pub fn with_config(mut self, config: ReconcilerConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the job directory.
    pub fn job_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.job_dir = dir.into();
        self
    }

    /// Enable/disable dry-run.
    pub fn dry_run(mut self, enabled: bool) -> Self {
        self.config.dry_run = enabled;
        self
    }

    /// Build the reconciler.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidConfig` if no runtime client was set.
    pub fn build(self) -> Result<Reconciler> {
        let runtime = self
            .runtime
            .ok_or_else(|| Error::invalid_config("Runtime client is required"))?;

        let notifier = self
            .notifier
            .unwrap_or_else(|| Arc::new(NoopNotifier));

        Ok(Reconciler::new(runtime, notifier, self.config))
    }
}

impl Default for ReconcilerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::expect_used)]
    #![allow(clippy::panic)]

    use super::*;
    use crate::runtime::InMemoryRuntime;

    fn set(items: &[&str]) -> ImageSet {
        items.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_removable_images_drops_sentinel_and_in_use() {
        let in_use = set(&["img-a:latest"]);
        let inventory = ["img-a:latest", "img-b:latest", UNTAGGED_SENTINEL];
        assert_eq!(removable_images(&in_use, &inventory), set(&["img-b:latest"]));
    }

    #[test]
    fn test_removable_images_ignores_jobs_missing_from_runtime() {
        let in_use = set(&["ghost:1"]);
        let inventory = ["a:1"];
        assert_eq!(removable_images(&in_use, &inventory), set(&["a:1"]));
    }

    #[test]
    fn test_removable_images_no_normalization() {
        let in_use = set(&["alpine:latest"]);
        let inventory = ["alpine:Latest", "docker.io/library/alpine:latest", "alpine:latest"];
        assert_eq!(
            removable_images(&in_use, &inventory),
            set(&["alpine:Latest", "docker.io/library/alpine:latest"])
        );
    }

    #[tokio::test]
    async fn test_run_pass_empty_directory_removes_everything() {
        let dir = tempfile::tempdir().unwrap();
        let runtime = Arc::new(InMemoryRuntime::with_images([
            "alpine:latest",
            "test00:tag00",
            "test01:tag01",
            "test02:tag02",
        ]));
        let reconciler = ReconcilerBuilder::new()
            .with_runtime(runtime.clone())
            .job_dir(dir.path())
            .build()
            .unwrap();

        let report = reconciler.run_pass().await.unwrap();
        assert_eq!(report.removed.len(), 4);
        assert!(runtime.images().await.is_empty());
    }

    #[tokio::test]
    async fn test_run_pass_aborts_on_missing_directory() {
        let runtime = Arc::new(InMemoryRuntime::with_images(["alpine:latest"]));
        let reconciler = ReconcilerBuilder::new()
            .with_runtime(runtime.clone())
            .job_dir("/nonexistent/image-janitor")
            .build()
            .unwrap();

        let result = reconciler.run_pass().await;
        assert!(matches!(result, Err(Error::JobDirUnreadable { .. })));
        assert!(runtime.removed().await.is_empty());
    }

    #[tokio::test]
    async fn test_dry_run_removes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let runtime = Arc::new(InMemoryRuntime::with_images(["a:1", "b:2"]));
        runtime.add_dangling(["sha256:dd"]).await;
        let reconciler = ReconcilerBuilder::new()
            .with_runtime(runtime.clone())
            .job_dir(dir.path())
            .dry_run(true)
            .build()
            .unwrap();

        let report = reconciler.run_pass().await.unwrap();
        assert_eq!(report.dry_run, vec!["a:1", "b:2"]);
        assert_eq!(report.dangling_dry_run, vec!["sha256:dd"]);
        assert!(report.removed.is_empty());
        assert!(runtime.removed().await.is_empty());
        assert!(runtime.removed_ids().await.is_empty());
    }

    #[tokio::test]
    async fn test_untagged_candidate_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let runtime = Arc::new(InMemoryRuntime::with_images(["not-listed"]));
        let reconciler = Reconciler::without_notifier(
            runtime.clone(),
            ReconcilerConfig {
                job_dir: dir.path().to_path_buf(),
                dry_run: false,
            },
        );

        let report = reconciler.run_pass().await.unwrap();
        assert_eq!(report.skipped, vec!["not-listed".to_string()]);
        assert!(report.failed.is_empty());
        assert!(runtime.removed().await.is_empty());
    }

    #[test]
    fn test_builder_requires_runtime() {
        let result = ReconcilerBuilder::new().build();
        assert!(matches!(result, Err(Error::InvalidConfig { .. })));
    }

    #[test]
    fn test_builder() {
        let reconciler = ReconcilerBuilder::new()
            .with_runtime(Arc::new(InMemoryRuntime::new()))
            .job_dir("/srv/jobs")
            .dry_run(true)
            .build()
            .unwrap();
        assert_eq!(reconciler.config().job_dir, PathBuf::from("/srv/jobs"));
        assert!(reconciler.config().dry_run);
    }
}
