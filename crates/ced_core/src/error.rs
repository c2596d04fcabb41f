//! Error types for ced_core operations.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Core error type for editing and job orchestration.
#[derive(Error, Debug)]
pub enum EditError {
    /// Bad input shape or path. Raised before any job sequence exists.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The caller may not edit this course. Raised before any job sequence exists.
    #[error("not authorized: {0}")]
    Authorization(String),

    /// The file changed since the caller read it.
    #[error("{path} was modified concurrently (expected {expected}, found {actual})")]
    ConcurrentModification {
        /// Path of the file, relative to the course root
        path: String,
        /// Fingerprint supplied by the caller
        expected: String,
        /// Fingerprint found on disk
        actual: String,
    },

    /// The destination of a rename or copy already exists.
    #[error("path already exists: {0}")]
    PathConflict(String),

    /// The target of a mutation does not exist.
    #[error("path not found: {0}")]
    NotFound(String),

    /// Commit or push failed after working-copy changes were applied.
    #[error("repository sync failed: {0}")]
    RepositorySync(String),

    /// New content is not well-formed for its format.
    #[error("malformed content for {path}: {reason}")]
    MalformedContent {
        /// Path of the file being written
        path: String,
        /// Parser message
        reason: String,
    },

    /// Invalid job or step state transition.
    #[error("invalid state transition from {from} to {to}")]
    InvalidStateTransition {
        /// Source state
        from: String,
        /// Target state
        to: String,
    },

    /// Job sequence with the given id does not exist.
    #[error("job sequence not found: {0}")]
    JobNotFound(u64),

    /// The durable job store failed.
    #[error("job store error: {0}")]
    JobStore(String),

    /// The course lock could not be taken in time.
    #[error("timed out waiting for lock on course {course}")]
    LockTimeout {
        /// Course identifier
        course: String,
    },

    /// Object with the given ID was not found in the store.
    #[error("object not found: {0}")]
    ObjectNotFound(String),

    /// Hash verification failed during object read.
    #[error("hash mismatch: expected {expected}, got {actual}")]
    HashMismatch {
        /// The expected object ID
        expected: String,
        /// The actual computed hash
        actual: String,
    },

    /// The object file is corrupted or has invalid format.
    #[error("corrupted object at {}: {}", path.display(), reason)]
    CorruptedObject {
        /// Path to the corrupted object
        path: PathBuf,
        /// Description of the corruption
        reason: String,
    },

    /// Invalid hex string for ObjectId parsing.
    #[error("invalid hex string: {0}")]
    InvalidHex(String),

    /// Reference not found.
    #[error("ref not found: {0}")]
    RefNotFound(String),

    /// Invalid ref file content or format.
    #[error("invalid ref at {}: {}", path.display(), reason)]
    InvalidRef {
        /// Path to the invalid ref file
        path: PathBuf,
        /// Description of what's invalid
        reason: String,
    },

    /// Compression or decompression failed.
    #[error("compression error: {0}")]
    Compression(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Deserialization error.
    #[error("deserialization error: {0}")]
    Deserialization(String),

    /// Configuration error (loading, parsing, invalid values).
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O error during file operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Stable, serializable classification of an [`EditError`].
///
/// Stored in job records so that a status viewer can show the failure class
/// without holding the live error value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Authorization,
    ConcurrentModification,
    PathConflict,
    NotFound,
    RepositorySync,
    LockTimeout,
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Validation => "validation",
            Self::Authorization => "authorization",
            Self::ConcurrentModification => "concurrent_modification",
            Self::PathConflict => "path_conflict",
            Self::NotFound => "not_found",
            Self::RepositorySync => "repository_sync",
            Self::LockTimeout => "lock_timeout",
            Self::Internal => "internal",
        };
        f.write_str(s)
    }
}

impl EditError {
    /// Returns the stable classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) | Self::MalformedContent { .. } => ErrorKind::Validation,
            Self::Authorization(_) => ErrorKind::Authorization,
            Self::ConcurrentModification { .. } => ErrorKind::ConcurrentModification,
            Self::PathConflict(_) => ErrorKind::PathConflict,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::RepositorySync(_) => ErrorKind::RepositorySync,
            Self::LockTimeout { .. } => ErrorKind::LockTimeout,
            _ => ErrorKind::Internal,
        }
    }

    /// Returns true for errors that are raised before a job sequence exists.
    pub fn is_rejection(&self) -> bool {
        matches!(self.kind(), ErrorKind::Validation | ErrorKind::Authorization)
    }

    /// Returns a user-friendly recovery suggestion for the error, if available.
    pub fn recovery_suggestion(&self) -> Option<&'static str> {
        match self {
            Self::ConcurrentModification { .. } => {
                Some("Someone else changed this file. Reload it and re-apply your edit.")
            }
            Self::PathConflict(_) => Some("Choose a different destination path."),
            Self::LockTimeout { .. } => {
                Some("Another edit to this course is still running. Try again shortly.")
            }
            Self::RepositorySync(_) => Some(
                "Local changes were applied but not synced. Inspect the course repository before retrying.",
            ),
            Self::JobStore(_) => Some("Check that the job database is writable."),
            Self::CorruptedObject { .. } | Self::HashMismatch { .. } => {
                Some("The course snapshot store is damaged. Restore .course/objects from the remote.")
            }
            _ => None,
        }
    }
}

/// Convenience Result type for ced_core operations.
pub type Result<T> = std::result::Result<T, EditError>;
