//! HEAD and named ref management for course snapshots.

use crate::error::{EditError, Result};
use crate::ObjectId;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Name of the branch every course commits to.
pub const MAIN_REF: &str = "main";

/// Manages references to snapshot commits.
///
/// References are single-line text files containing a hex-encoded
/// ObjectId. All writes are atomic (temp file + fsync + rename).
#[derive(Debug, Clone)]
pub struct Refs {
    root: PathBuf,
}

impl Refs {
    /// Creates a ref manager rooted at a `.course` (or remote) directory.
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Reads HEAD, or `None` if no commit was ever recorded.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRef` if the content is malformed.
    pub fn read_head(&self) -> Result<Option<ObjectId>> {
        let path = self.root.join("HEAD");
        if !path.exists() {
            return Ok(None);
        }
        self.read_ref_file(&path).map(Some)
    }

    /// Writes HEAD atomically.
    pub fn write_head(&self, id: ObjectId) -> Result<()> {
        fs::create_dir_all(&self.root)?;
        self.write_ref_file(&self.root.join("HEAD"), id)
    }

    /// Reads a named reference (e.g. "main").
    ///
    /// # Errors
    ///
    /// Returns `RefNotFound` if the ref doesn't exist.
    pub fn read_ref(&self, name: &str) -> Result<ObjectId> {
        let path = self.root.join("refs").join(name);
        if !path.exists() {
            return Err(EditError::RefNotFound(name.to_string()));
        }
        self.read_ref_file(&path)
    }

    /// Writes a named reference atomically, creating parent directories.
    pub fn write_ref(&self, name: &str, id: ObjectId) -> Result<()> {
        let path = self.root.join("refs").join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        self.write_ref_file(&path, id)
    }

    fn read_ref_file(&self, path: &Path) -> Result<ObjectId> {
        let content = fs::read_to_string(path)?;
        let trimmed = content.trim();

        if trimmed.len() != ObjectId::HEX_LEN {
            return Err(EditError::InvalidRef {
                path: path.to_path_buf(),
                reason: format!("expected 64 hex chars, got {}", trimmed.len()),
            });
        }

        ObjectId::from_hex(trimmed).map_err(|_| EditError::InvalidRef {
            path: path.to_path_buf(),
            reason: "invalid hex string".to_string(),
        })
    }

    fn write_ref_file(&self, path: &Path, id: ObjectId) -> Result<()> {
        let tmp_path = path.with_extension("tmp");
        {
            let mut file = File::create(&tmp_path)?;
            writeln!(file, "{}", id.as_hex())?;
            file.sync_all()?;
        }
        fs::rename(&tmp_path, path)?;

        #[cfg(unix)]
        {
            if let Some(parent) = path.parent() {
                if let Ok(dir_file) = File::open(parent) {
                    let _ = dir_file.sync_all();
                }
            }
        }

        Ok(())
    }
}
