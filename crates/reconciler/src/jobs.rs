//! Job discovery: directory scanning, descriptor decoding and image
//! extraction.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, error, warn};

use crate::error::{Error, Result};
use crate::types::{ImageRef, ImageSet};

/// File names that identify a job descriptor: a UUID with a `.json` suffix.
#[allow(clippy::expect_used)]
static JOB_FILE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}\.json$",
    )
    .expect("valid job file regex (verified by tests)")
});

/// Whether `file_name` names a job descriptor.
#[must_use]
pub fn is_job_file_name(file_name: &str) -> bool {
    JOB_FILE_PATTERN.is_match(file_name)
}

/// Decode a missing key or a JSON `null` as the default value.
fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

/// Like [`null_as_default`] for lists, also defaulting `null` elements.
fn null_as_default_list<'de, D, T>(deserializer: D) -> std::result::Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<Vec<Option<T>>>::deserialize(deserializer).map(|items| {
        items
            .unwrap_or_default()
            .into_iter()
            .map(Option::unwrap_or_default)
            .collect()
    })
}

/// A submitted job as written by the job-submission system.
///
/// Only the container images are consumed; every other field of the
/// on-disk record is ignored. Absent keys and `null` values both decode to
/// the empty default, matching what the writer emits for unset fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobDescriptor {
    #[serde(rename = "uuid", default)]
    pub invocation_id: Option<String>,
    #[serde(default, deserialize_with = "null_as_default_list")]
    pub steps: Vec<JobStep>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStep {
    #[serde(default, deserialize_with = "null_as_default")]
    pub component: StepComponent,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepComponent {
    #[serde(default, deserialize_with = "null_as_default")]
    pub container: StepContainer,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepContainer {
    #[serde(default, deserialize_with = "null_as_default")]
    pub image: ContainerImage,
    /// Data containers mounted into the step container.
    #[serde(
        rename = "container_volumes_from",
        default,
        deserialize_with = "null_as_default_list"
    )]
    pub volumes_from: Vec<ContainerImage>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerImage {
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tag: String,
}

impl JobDescriptor {
    /// Images the job needs: step images first, then data containers.
    ///
    /// Entries with an empty name are dropped. Tags are taken verbatim.
    #[must_use]
    pub fn container_images(&self) -> Vec<ImageRef> {
        let step_images = self.steps.iter().map(|s| &s.component.container.image);
        let data_images = self
            .steps
            .iter()
            .flat_map(|s| s.component.container.volumes_from.iter());

        step_images
            .chain(data_images)
            .filter(|image| !image.name.is_empty())
            .map(|image| ImageRef::new(image.name.clone(), image.tag.clone()))
            .collect()
    }
}

/// Decode a job descriptor from raw file contents.
///
/// # Errors
///
/// Returns `Error::JobParseFailed` if the bytes are not a job record.
pub fn parse_job(path: &Path, bytes: &[u8]) -> Result<JobDescriptor> {
    serde_json::from_slice(bytes).map_err(|e| Error::job_parse_failed(path, e.to_string()))
}

/// De-duplicated `name:tag` set referenced by `jobs`.
#[must_use]
pub fn referenced_images(jobs: &[JobDescriptor]) -> ImageSet {
    jobs.iter()
        .flat_map(JobDescriptor::container_images)
        .map(|image| image.to_string())
        .collect()
}

/// Keep a directory entry lookup, skip an entry that vanished, and treat any
/// other failure as an unreadable job directory.
fn entry_or_skip<T>(lookup: std::io::Result<T>, dir: &Path) -> Result<Option<T>> {
    match lookup {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(Error::job_dir_unreadable(dir, e.to_string())),
    }
}

/// Job descriptors loaded in one pass.
#[derive(Debug, Clone, Default)]
pub struct JobBatch {
    pub jobs: Vec<JobDescriptor>,
    /// Files that failed to decode or disappeared before being read.
    pub skipped: usize,
}

/// Scans a directory for job descriptor files.
#[derive(Debug, Clone)]
pub struct JobScanner {
    dir: PathBuf,
}

impl JobScanner {
    /// Create a scanner rooted at `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The scanned directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// List regular files in the directory whose names match the job pattern.
    ///
    /// Symlinks, subdirectories and special files are skipped. Paths are
    /// returned sorted.
    ///
    /// # Errors
    ///
    /// Returns `Error::JobDirUnreadable` if the directory cannot be listed.
    pub async fn job_files(&self) -> Result<Vec<PathBuf>> {
        let dir_error = |e: std::io::Error| Error::job_dir_unreadable(&self.dir, e.to_string());

        let mut entries = tokio::fs::read_dir(&self.dir).await.map_err(dir_error)?;
        let mut files = Vec::new();

        while let Some(entry) = entries.next_entry().await.map_err(dir_error)? {
            let Some(file_type) = entry_or_skip(entry.file_type().await, &self.dir)? else {
                debug!(path = %entry.path().display(), "Directory entry vanished, skipping");
                continue;
            };
            if !file_type.is_file() {
                continue;
            }
            let file_name = entry.file_name();
            if file_name.to_str().is_some_and(is_job_file_name) {
                files.push(entry.path());
            }
        }

        files.sort();
        Ok(files)
    }

    /// Read and decode every job file listed in `paths`.
    ///
    /// A file that fails to decode is logged and skipped. A file removed
    /// after listing is skipped as well, since its job is gone.
    ///
    /// # Errors
    ///
    /// Returns `Error::JobFileUnreadable` for any other read failure; an
    /// unread job could still reference images.
    pub async fn load_jobs(&self, paths: &[PathBuf]) -> Result<JobBatch> {
        let mut batch = JobBatch::default();

        for path in paths {
            let bytes = match tokio::fs::read(path).await {
                Ok(bytes) => bytes,
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    debug!(path = %path.display(), "Job file vanished before read, skipping");
                    batch.skipped = batch.skipped.saturating_add(1);
                    continue;
                }
                Err(e) => return Err(Error::job_file_unreadable(path, e.to_string())),
            };

            match parse_job(path, &bytes) {
                Ok(job) => batch.jobs.push(job),
                Err(e) => {
                    error!(error = %e, "Skipping unparseable job file");
                    batch.skipped = batch.skipped.saturating_add(1);
                }
            }
        }

        if batch.skipped > 0 {
            warn!(skipped = batch.skipped, "Some job files were skipped");
        }

        Ok(batch)
    }

    /// List and load all jobs in the directory.
    ///
    /// # Errors
    ///
    /// Propagates `job_files` and `load_jobs` errors.
    pub async fn scan(&self) -> Result<JobBatch> {
        let paths = self.job_files().await?;
        debug!(dir = %self.dir.display(), files = paths.len(), "Listed job files");
        self.load_jobs(&paths).await
    }
}
