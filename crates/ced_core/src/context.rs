//! Request context passed explicitly into every orchestration.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Identifier of the user on whose behalf an edit runs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of a course. Edits to the same course are serialized.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CourseId(String);

impl CourseId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CourseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A course and the location of its working copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Course {
    /// Course identifier.
    pub id: CourseId,
    /// Root of the course working copy on disk.
    pub path: PathBuf,
    /// Read-only example course. Never editable.
    pub example_course: bool,
}

impl Course {
    pub fn new(id: impl Into<String>, path: impl AsRef<Path>) -> Self {
        Self {
            id: CourseId::new(id),
            path: path.as_ref().to_path_buf(),
            example_course: false,
        }
    }

    /// Marks the course as the protected example course.
    pub fn as_example(mut self) -> Self {
        self.example_course = true;
        self
    }
}

/// Who is editing what. Built once per request and passed by reference.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub user: UserId,
    pub course: Course,
}

impl RequestContext {
    pub fn new(user: UserId, course: Course) -> Self {
        Self { user, course }
    }
}
