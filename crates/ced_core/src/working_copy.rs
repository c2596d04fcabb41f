//! Path-scoped access to a course working copy.
//!
//! Editors never touch the filesystem directly. They go through a
//! [`WorkingCopy`], which only accepts paths that passed
//! [`validate_relative_path`], and writes files atomically.

use crate::error::{EditError, Result};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Directory holding course metadata (snapshots, refs, lock file).
pub const META_DIR: &str = ".course";

/// Checks that `path` is a safe, relative, `/`-separated course path.
///
/// Allowed characters are ASCII letters, digits, `-`, `_`, `.` and `/`.
/// Components may not be empty, `.`/`..`, or start with a dot.
pub fn validate_relative_path(path: &str) -> Result<()> {
    if path.is_empty() {
        return Err(EditError::Validation("path is empty".to_string()));
    }
    if path.starts_with('/') {
        return Err(EditError::Validation(format!("path must be relative: {}", path)));
    }
    if let Some(c) = path
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '/')))
    {
        return Err(EditError::Validation(format!(
            "invalid character {:?} in path {} (only letters, numbers, dashes, underscores, dots and slashes)",
            c, path
        )));
    }
    for component in path.split('/') {
        if component.is_empty() {
            return Err(EditError::Validation(format!("empty path component in {}", path)));
        }
        if component.starts_with('.') {
            return Err(EditError::Validation(format!(
                "path component {:?} in {} may not start with a dot",
                component, path
            )));
        }
    }
    Ok(())
}

/// Returns true if `path` equals `ancestor` or lies below it.
pub(crate) fn is_same_or_below(path: &str, ancestor: &str) -> bool {
    ancestor.is_empty()
        || path == ancestor
        || (path.len() > ancestor.len()
            && path.starts_with(ancestor)
            && path.as_bytes()[ancestor.len()] == b'/')
}

/// Returns the parent of a relative path, or `""` for top-level entries.
pub(crate) fn parent_of(path: &str) -> &str {
    path.rfind('/').map(|i| &path[..i]).unwrap_or("")
}

/// Joins two relative paths, treating `""` as the course root.
pub(crate) fn join(base: &str, name: &str) -> String {
    if base.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", base, name)
    }
}

/// The set of paths an editor may touch.
///
/// A path is in scope when it lies strictly below `root` (any path when
/// `root` is empty) and is not equal to or below any of `invalid_roots`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathScope {
    root: String,
    invalid_roots: Vec<String>,
}

impl PathScope {
    /// Scope covering the whole course.
    pub fn course() -> Self {
        Self::default()
    }

    /// Scope covering everything below `root`.
    pub fn under(root: impl Into<String>) -> Self {
        Self {
            root: root.into().trim_end_matches('/').to_string(),
            invalid_roots: Vec::new(),
        }
    }

    /// Excludes `path` (and everything below it) from the scope.
    pub fn deny(mut self, path: impl Into<String>) -> Self {
        self.invalid_roots
            .push(path.into().trim_end_matches('/').to_string());
        self
    }

    /// Returns the scope root (`""` for the whole course).
    pub fn root(&self) -> &str {
        &self.root
    }

    /// Checks that `path` is a valid path inside this scope.
    pub fn check(&self, path: &str) -> Result<()> {
        validate_relative_path(path)?;

        let below_root = self.root.is_empty() || (path != self.root && is_same_or_below(path, &self.root));
        if !below_root {
            return Err(EditError::Validation(format!(
                "{} is outside the editable root {}",
                path, self.root
            )));
        }
        if let Some(denied) = self
            .invalid_roots
            .iter()
            .find(|denied| is_same_or_below(path, denied))
        {
            return Err(EditError::Validation(format!(
                "{} is inside the protected path {}",
                path, denied
            )));
        }
        Ok(())
    }

    /// Returns the entity name recorded in info files (`id` field).
    ///
    /// Paths under a content kind directory are named relative to that
    /// directory whatever the editing scope; other paths are named relative
    /// to the scope root.
    pub fn entity_name<'a>(&self, path: &'a str) -> &'a str {
        if let Some(name) = kind_relative_name(path) {
            return name;
        }
        if self.root.is_empty() {
            path
        } else {
            path.strip_prefix(self.root.as_str())
                .map(|rest| rest.trim_start_matches('/'))
                .unwrap_or(path)
        }
    }
}

/// Top-level directories whose descendants are named entities.
const KIND_ROOTS: &[&str] = &["questions/", "assessments/"];

/// `questions/calc/limits` -> `calc/limits`;
/// `courseInstances/Fa24/assessments/hw1` -> `hw1`.
fn kind_relative_name(path: &str) -> Option<&str> {
    if let Some(rest) = path.strip_prefix("courseInstances/") {
        return Some(match rest.split_once("/assessments/") {
            Some((_, name)) => name,
            None => rest,
        })
        .filter(|name| !name.is_empty());
    }
    KIND_ROOTS
        .iter()
        .find_map(|root| path.strip_prefix(root))
        .filter(|name| !name.is_empty())
}

/// Filesystem handle for one course working copy.
#[derive(Debug, Clone)]
pub struct WorkingCopy {
    root: PathBuf,
}

impl WorkingCopy {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Returns the working-copy root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolves a validated relative path to an absolute one.
    pub fn resolve(&self, rel: &str) -> PathBuf {
        rel.split('/')
            .filter(|c| !c.is_empty())
            .fold(self.root.clone(), |acc, c| acc.join(c))
    }

    pub fn exists(&self, rel: &str) -> bool {
        self.resolve(rel).exists()
    }

    pub fn is_dir(&self, rel: &str) -> bool {
        self.resolve(rel).is_dir()
    }

    /// Reads a file.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the file does not exist.
    pub fn read(&self, rel: &str) -> Result<Vec<u8>> {
        fs::read(self.resolve(rel)).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => EditError::NotFound(rel.to_string()),
            _ => EditError::Io(e),
        })
    }

    /// Writes a file atomically (temp file + fsync + rename).
    ///
    /// Creates parent directories as needed.
    pub fn write_atomic(&self, rel: &str, content: &[u8]) -> Result<()> {
        let path = self.resolve(rel);
        let dir = match path.parent() {
            Some(dir) => dir.to_path_buf(),
            None => self.root.clone(),
        };
        fs::create_dir_all(&dir)?;

        let tmp_path = dir.join(format!(
            ".{}.tmp",
            path.file_name().and_then(|n| n.to_str()).unwrap_or("write")
        ));
        {
            let mut file = File::create(&tmp_path)?;
            file.write_all(content)?;
            file.sync_all()?;
        }
        fs::rename(&tmp_path, &path)?;

        #[cfg(unix)]
        {
            if let Ok(dir_file) = File::open(&dir) {
                let _ = dir_file.sync_all();
            }
        }

        Ok(())
    }

    /// Removes a file or a whole directory tree.
    pub fn remove(&self, rel: &str) -> Result<()> {
        let path = self.resolve(rel);
        if path.is_dir() {
            fs::remove_dir_all(&path)?;
        } else {
            fs::remove_file(&path)?;
        }
        Ok(())
    }

    /// Moves a file or directory, creating the destination's parents.
    pub fn move_path(&self, from: &str, to: &str) -> Result<()> {
        let dest = self.resolve(to);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::rename(self.resolve(from), dest)?;
        Ok(())
    }

    /// Recursively copies a file or directory to a new location.
    pub fn copy_tree(&self, from: &str, to: &str) -> Result<()> {
        let src = self.resolve(from);
        let dst = self.resolve(to);
        if let Some(parent) = dst.parent() {
            fs::create_dir_all(parent)?;
        }
        if src.is_dir() {
            copy_dir_recursive(&src, &dst)
        } else {
            fs::copy(&src, &dst)?;
            Ok(())
        }
    }

    /// Lists every file at or below `rel`, as sorted relative paths.
    pub fn walk_files(&self, rel: &str) -> Result<Vec<String>> {
        let mut out = Vec::new();
        let path = self.resolve(rel);
        if path.is_file() {
            out.push(rel.to_string());
        } else if path.is_dir() {
            collect_files(&path, rel, &mut out)?;
        }
        out.sort();
        Ok(out)
    }
}

fn copy_dir_recursive(src: &Path, dst: &Path) -> Result<()> {
    fs::create_dir_all(dst)?;
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir_recursive(&src_path, &dst_path)?;
        } else {
            fs::copy(&src_path, &dst_path)?;
        }
    }
    Ok(())
}

fn collect_files(dir: &Path, rel: &str, out: &mut Vec<String>) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let Some(name) = entry.file_name().to_str().map(str::to_string) else {
            continue;
        };
        if name.starts_with('.') {
            continue;
        }
        let child = join(rel, &name);
        if entry.file_type()?.is_dir() {
            collect_files(&entry.path(), &child, out)?;
        } else {
            out.push(child);
        }
    }
    Ok(())
}
