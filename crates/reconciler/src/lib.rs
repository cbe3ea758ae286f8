//! Reconciliation of container images against pending jobs.
//!
//! Each pass:
//! 1. Scans the job directory for job descriptor files
//! 2. Reduces the jobs to the set of `name:tag` images they need
//! 3. Diffs that set against the runtime inventory
//! 4. Removes every unreferenced image not in the `excludes` file
//! 5. Removes dangling (untagged) images by id
//!
//! Nothing is cached between passes; the job directory and the runtime are
//! re-read every time.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use std::time::Duration;
//! use janitor_reconciler::{
//!     InMemoryRuntime, LoopConfig, ReconcilerBuilder, ReconciliationLoop,
//! };
//!
//! #[tokio::main]
//! async fn main() -> janitor_reconciler::Result<()> {
//!     let reconciler = Arc::new(
//!         ReconcilerBuilder::new()
//!             .with_runtime(Arc::new(InMemoryRuntime::new()))
//!             .job_dir("/opt/image-janitor")
//!             .build()?,
//!     );
//!
//!     let (runner, stopper) =
//!         ReconciliationLoop::new(reconciler, LoopConfig::new(Duration::from_secs(60))?);
//!     // stopper.stop() from a signal handler
//!     let _summary = runner.run().await;
//!     Ok(())
//! }
//! ```

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod error;
pub mod excludes;
pub mod jobs;
pub mod r#loop;
pub mod notify;
pub mod reconciler;
pub mod runtime;
pub mod types;

// Re-export main types
pub use error::{Error, Result};
pub use excludes::{EXCLUDES_FILE_NAME, load_excludes, parse_excludes, read_excludes};
pub use jobs::{JobBatch, JobDescriptor, JobScanner, is_job_file_name, parse_job, referenced_images};
pub use notify::{JsonLinesNotifier, NoopNotifier, RemovalEvent, RemovalNotifier};
pub use r#loop::{LoopConfig, LoopStopper, LoopSummary, ReconciliationLoop};
pub use reconciler::{Reconciler, ReconcilerBuilder, ReconcilerConfig, removable_images};
pub use runtime::{InMemoryRuntime, RuntimeClient};
pub use types::{ExcludeSet, ImageRef, ImageSet, PassReport, RemovalOutcome, UNTAGGED_SENTINEL};
