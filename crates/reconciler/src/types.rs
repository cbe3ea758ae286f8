//! Core types for the reconciler.

use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Inventory value the runtime reports for an untagged image.
///
/// Never removed by tag; untagged layers go through the dangling-image path.
pub const UNTAGGED_SENTINEL: &str = "<none>:<none>";

/// Set of rendered `name:tag` references.
pub type ImageSet = BTreeSet<String>;

/// A container image reference, rendered canonically as `name:tag`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ImageRef {
    pub name: String,
    pub tag: String,
}

impl ImageRef {
    /// Create a new image reference.
    pub fn new(name: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tag: tag.into(),
        }
    }

    /// Split a rendered reference at its last `:`.
    ///
    /// The name keeps any registry port (`host:5000/app:1.0` has name
    /// `host:5000/app`). Returns `None` when there is no `:` at all.
    #[must_use]
    pub fn parse(reference: &str) -> Option<Self> {
        reference
            .rsplit_once(':')
            .map(|(name, tag)| Self::new(name, tag))
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.name, self.tag)
    }
}

/// Image references that must never be removed.
///
/// Matching is exact string identity against the rendered candidate.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExcludeSet {
    entries: HashSet<String>,
}

impl ExcludeSet {
    /// Create an empty exclusion set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `image` is excluded from removal.
    #[must_use]
    pub fn contains(&self, image: &str) -> bool {
        self.entries.contains(image)
    }

    /// Add an entry.
    pub fn insert(&mut self, image: impl Into<String>) {
        self.entries.insert(image.into());
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over the entries in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.entries.iter()
    }
}

impl<S: Into<String>> FromIterator<S> for ExcludeSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().map(Into::into).collect(),
        }
    }
}

/// Outcome of one removal attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status", content = "reason")]
pub enum RemovalOutcome {
    Removed,
    Failed(String),
    DryRun,
}

impl RemovalOutcome {
    /// Short label used in logs and events.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Removed => "removed",
            Self::Failed(_) => "failed",
            Self::DryRun => "dry_run",
        }
    }
}

/// Result of a single reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassReport {
    /// Job descriptors that decoded successfully.
    pub jobs_parsed: usize,
    /// Job files skipped because they failed to decode or vanished.
    pub jobs_skipped: usize,
    /// Size of the in-use image set.
    pub in_use_count: usize,
    /// Size of the runtime inventory snapshot.
    pub inventory_count: usize,
    /// Removable set before exclusions are applied.
    pub candidates: Vec<String>,
    /// Images removed by tag.
    pub removed: Vec<String>,
    /// Candidates left alone because they are in the exclusion set.
    pub excluded: Vec<String>,
    /// Candidates with no `:` that cannot be removed by tag.
    pub skipped: Vec<String>,
    /// Candidates whose removal failed, with the reason.
    pub failed: Vec<(String, String)>,
    /// Dangling image ids removed.
    pub dangling_removed: Vec<String>,
    /// Dangling image ids whose removal failed, with the reason.
    pub dangling_failed: Vec<(String, String)>,
    /// Candidates that would have been removed in dry-run mode.
    pub dry_run: Vec<String>,
    /// Dangling image ids that would have been removed in dry-run mode.
    pub dangling_dry_run: Vec<String>,
    /// Wall-clock duration of the pass.
    pub elapsed: Duration,
}

impl PassReport {
    /// True when the runtime held nothing removable by tag.
    #[must_use]
    pub fn converged(&self) -> bool {
        self.candidates.is_empty()
    }

    /// True when no removal attempt failed.
    #[must_use]
    pub fn all_succeeded(&self) -> bool {
        self.failed.is_empty() && self.dangling_failed.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_ref_display() {
        let image = ImageRef::new("alpine", "latest");
        assert_eq!(image.to_string(), "alpine:latest");
    }

    #[test]
    fn test_image_ref_parse_keeps_registry_port() {
        let image = ImageRef::parse("gims.example.org:5000/backwards-compat:latest");
        assert_eq!(
            image,
            Some(ImageRef::new("gims.example.org:5000/backwards-compat", "latest"))
        );
    }

    #[test]
    fn test_image_ref_parse_without_tag() {
        assert_eq!(ImageRef::parse("not-listed"), None);
    }

    #[test]
    fn test_exclude_set_exact_match() {
        let excludes: ExcludeSet = ["img-b:latest"].into_iter().collect();
        assert!(excludes.contains("img-b:latest"));
        assert!(!excludes.contains("img-b:Latest"));
        assert!(!excludes.contains("img-b"));
        assert_eq!(excludes.len(), 1);
    }

    #[test]
    fn test_report_converged() {
        let mut report = PassReport::default();
        assert!(report.converged());
        report.candidates.push("a:b".to_string());
        assert!(!report.converged());
    }

    #[test]
    fn test_outcome_labels() {
        assert_eq!(RemovalOutcome::Removed.label(), "removed");
        assert_eq!(RemovalOutcome::Failed("x".to_string()).label(), "failed");
        assert_eq!(RemovalOutcome::DryRun.label(), "dry_run");
    }
}
