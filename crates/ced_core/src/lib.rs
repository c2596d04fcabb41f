//! CED Core Library
//!
//! Content editing and job orchestration for course repositories:
//! - Path-scoped editors (modify, rename, copy, delete, add, multi)
//! - Durable job sequences with per-step status
//! - Per-course mutual exclusion
//! - Content-addressed snapshots synced to a remote
//!
//! # Quick Start
//!
//! ```
//! use ced_core::{
//!     ContentFingerprint, Course, CourseLocks, EditorRunner, ModifyEditor, PathScope, RedbJobStore,
//!     RepositoryConfig, RequestContext, SnapshotRepository, StaticPermissions, UserId,
//! };
//! use std::sync::Arc;
//! use std::time::Duration;
//! use tempfile::TempDir;
//!
//! let tmp = TempDir::new().unwrap();
//! let course = Course::new("demo", tmp.path().join("demo"));
//! std::fs::create_dir_all(&course.path).unwrap();
//!
//! let repository = Arc::new(SnapshotRepository::new(RepositoryConfig::default()));
//! repository.init(&course).unwrap();
//!
//! let runner = EditorRunner::new(
//!     Arc::new(StaticPermissions::allow_all()),
//!     Arc::new(RedbJobStore::open(tmp.path().join("jobs.redb")).unwrap()),
//!     repository,
//!     Arc::new(CourseLocks::new(Duration::from_secs(5), Duration::from_millis(10))),
//! );
//!
//! // Create a file that did not exist before.
//! let editor = ModifyEditor::new(
//!     PathScope::course(),
//!     "README.md",
//!     ContentFingerprint::absent(),
//!     b"# Demo course\n".to_vec(),
//! );
//! let ctx = RequestContext::new(UserId::new("alice"), course);
//! let outcome = runner.run(&ctx, &editor.into()).unwrap();
//! assert_eq!(outcome.resource.path, "README.md");
//! ```
//!
//! # Snapshot Storage
//!
//! Snapshots live in a BLAKE3 content-addressed store with zstd compression:
//!
//! ```
//! use ced_core::ObjectStore;
//! use tempfile::TempDir;
//!
//! let tmp = TempDir::new().unwrap();
//! let store = ObjectStore::new(tmp.path().join("objects"));
//!
//! // Same content = same ID (deduplication)
//! let id1 = store.put_blob(b"content").unwrap();
//! let id2 = store.put_blob(b"content").unwrap();
//! assert_eq!(id1, id2);
//! ```

mod config;
mod context;
mod editor;
mod error;
mod fingerprint;
mod format;
mod job;
mod job_store;
mod lock;
mod object_id;
mod object_store;
mod permissions;
mod refs;
mod repository;
mod runner;
mod types;
mod working_copy;

pub use config::{
    Config, EditorConfig, JobsConfig, LockConfig, PermissionsConfig, RepositoryConfig,
    CONFIG_FILE,
};
pub use context::{Course, CourseId, RequestContext, UserId};
pub use editor::{
    AddEditor, CopyEditor, DeleteEditor, Editor, EntityKind, Executed, ExecutionEnv,
    ModifyEditor, MultiEditor, RenameEditor, ResourceId, StepOutcome, DEFAULT_MAX_COPY_SUFFIX,
    DEFAULT_MAX_NEW_SUFFIX,
};
pub use error::{EditError, ErrorKind, Result};
pub use fingerprint::{fingerprint, fingerprint_file, verify, ContentFingerprint};
pub use format::{
    is_info_file, property_value_with_default, ContentFormat, InfoFile, ID_FIELD,
    INFO_FILE_PREFIX, TITLE_FIELD, UUID_FIELD,
};
pub use job::{
    JobError, JobPatch, JobSequence, JobSequenceId, JobStatus, JobStep, NewJobSequence,
    StepPatch, StepStatus,
};
pub use job_store::{JobStore, RedbJobStore};
pub use lock::{CourseLockGuard, CourseLocks, LOCK_FILE};
pub use object_id::ObjectId;
pub use object_store::ObjectStore;
pub use permissions::{PermissionOracle, StaticPermissions};
pub use refs::{Refs, MAIN_REF};
pub use repository::{CommitReceipt, ContentRepository, SnapshotRepository};
pub use runner::{EditorRunner, JobFailure, RunFailure, RunHandle, SuccessOutcome};
pub use types::*;
pub use working_copy::{validate_relative_path, PathScope, WorkingCopy, META_DIR};

/// Time provider trait for testing.
///
/// Job timestamps and snapshot commits read the clock through this trait so
/// tests can pin time. Any `Fn() -> i64` closure works.
pub trait TimeProvider: Send + Sync {
    /// Returns the current Unix timestamp in seconds.
    fn now(&self) -> i64;
}

impl<F> TimeProvider for F
where
    F: Fn() -> i64 + Send + Sync,
{
    fn now(&self) -> i64 {
        self()
    }
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl TimeProvider for SystemClock {
    fn now(&self) -> i64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0)
    }
}
