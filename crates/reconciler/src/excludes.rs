//! Operator-maintained exclusion list.
//!
//! The file lives next to the job files and is re-read on every pass.

use std::path::{Path, PathBuf};

use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::{Error, Result};
use crate::types::ExcludeSet;

/// Name of the exclusion file inside the job directory.
pub const EXCLUDES_FILE_NAME: &str = "excludes";

/// Path of the exclusion file for a job directory.
#[must_use]
pub fn excludes_path(job_dir: &Path) -> PathBuf {
    job_dir.join(EXCLUDES_FILE_NAME)
}

/// Build an exclusion set from raw file contents.
///
/// Every non-empty `\n`-separated line is one entry, taken verbatim.
#[must_use]
pub fn parse_excludes(contents: &[u8]) -> ExcludeSet {
    contents
        .split(|b| *b == b'\n')
        .filter(|line| !line.is_empty())
        .map(|line| String::from_utf8_lossy(line).into_owned())
        .collect()
}

/// Read an exclusion set from `reader`.
///
/// # Errors
///
/// Returns `Error::ExcludesUnreadable` if reading fails part way.
pub async fn read_excludes<R>(path: &Path, mut reader: R) -> Result<ExcludeSet>
where
    R: AsyncRead + Unpin,
{
    let mut contents = Vec::new();
    reader
        .read_to_end(&mut contents)
        .await
        .map_err(|e| Error::excludes_unreadable(path, e.to_string()))?;
    Ok(parse_excludes(&contents))
}

/// Load the exclusion file for `job_dir`.
///
/// Callers treat an error as an empty set: exclusions protect images, they
/// never make removal safe.
///
/// # Errors
///
/// Returns `Error::ExcludesUnreadable` if the file is missing or unreadable.
pub async fn load_excludes(job_dir: &Path) -> Result<ExcludeSet> {
    let path = excludes_path(job_dir);
    let file = tokio::fs::File::open(&path)
        .await
        .map_err(|e| Error::excludes_unreadable(&path, e.to_string()))?;
    read_excludes(&path, file).await
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::expect_used)]
    #![allow(clippy::panic)]

    use super::*;

    #[test]
    fn test_parse_excludes_never_yields_empty_entries() {
        let contents: [&[u8]; 4] = [
            b"line1",
            b"line1\nline2\n",
            b"line1\nline2\nline3",
            b"\nline1\nline2\nline3\n",
        ];
        for content in contents {
            let excludes = parse_excludes(content);
            assert!(excludes.iter().all(|e| !e.is_empty()));
            assert!(excludes.contains("line1"));
        }
    }

    #[test]
    fn test_parse_excludes_no_trimming() {
        let excludes = parse_excludes(b" alpine:latest\r\nimg-b:latest\n# comment\n");
        assert!(excludes.contains(" alpine:latest\r"));
        assert!(!excludes.contains("alpine:latest"));
        assert!(excludes.contains("img-b:latest"));
        assert!(excludes.contains("# comment"));
        assert_eq!(excludes.len(), 3);
    }

    #[tokio::test]
    async fn test_read_excludes_from_reader() {
        let data: &[u8] = b"img-a:1\nimg-b:2\n";
        let excludes = read_excludes(Path::new("excludes"), data).await.unwrap();
        assert_eq!(excludes.len(), 2);
    }

    #[tokio::test]
    async fn test_load_excludes_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = load_excludes(dir.path()).await;
        assert!(matches!(result, Err(Error::ExcludesUnreadable { .. })));
    }

    #[tokio::test]
    async fn test_load_excludes_from_job_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(EXCLUDES_FILE_NAME), "img-b:latest\n").unwrap();
        let excludes = load_excludes(dir.path()).await.unwrap();
        assert!(excludes.contains("img-b:latest"));
    }
}
