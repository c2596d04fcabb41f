use anyhow::{Context, Result};
use ced_core::{Config, Course, RepositoryConfig, SnapshotRepository};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Name of the course directory inside the workspace
pub const COURSE_DIR: &str = "course";

/// Isolated environment: one course working copy, a remote store and
/// a job database, all inside a temp dir.
pub struct TestWorkspace {
    dir: TempDir,
}

impl TestWorkspace {
    /// Create a workspace with an empty course directory
    pub fn empty() -> Result<Self> {
        let dir = TempDir::new().context("Failed to create temp directory")?;
        fs::create_dir_all(dir.path().join(COURSE_DIR))?;
        Ok(Self { dir })
    }

    /// Create workspace with initial course files
    pub fn with_files(files: HashMap<String, Vec<u8>>) -> Result<Self> {
        let workspace = Self::empty()?;
        for (path, content) in files {
            workspace.write_file(&path, &content)?;
        }
        Ok(workspace)
    }

    /// Load the course from a fixtures directory
    pub fn from_fixture(name: &str) -> Result<Self> {
        let workspace = Self::empty()?;
        let fixture_path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("fixtures")
            .join(name);

        if !fixture_path.exists() {
            anyhow::bail!("Fixture not found: {}", fixture_path.display());
        }

        copy_dir_recursive(&fixture_path, &workspace.course_path())?;

        Ok(workspace)
    }

    /// Get workspace path
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn course_path(&self) -> PathBuf {
        self.path().join(COURSE_DIR)
    }

    pub fn remote_root(&self) -> PathBuf {
        self.path().join("remote")
    }

    pub fn jobs_path(&self) -> PathBuf {
        self.path().join("jobs.redb")
    }

    pub fn course(&self, id: &str) -> Course {
        Course::new(id, self.course_path())
    }

    /// Configuration pointing at this workspace's remote and job database
    pub fn config(&self) -> Config {
        let mut config = Config::default();
        config.jobs.database = self.jobs_path();
        config.repository = RepositoryConfig {
            remote_root: Some(self.remote_root()),
            ..RepositoryConfig::default()
        };
        config
    }

    /// Take the initial snapshot of the course
    pub fn init_course(&self, course: &Course) -> Result<SnapshotRepository> {
        let repo = SnapshotRepository::new(self.config().repository);
        repo.init(course)?;
        Ok(repo)
    }

    /// Write a course file directly, bypassing the editors
    pub fn write_file(&self, path: &str, content: &[u8]) -> Result<()> {
        let full_path = self.course_path().join(path);

        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directories for {}", path))?;
        }

        fs::write(&full_path, content)
            .with_context(|| format!("Failed to write file: {}", path))?;

        Ok(())
    }

    /// Read a course file
    pub fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        let full_path = self.course_path().join(path);
        fs::read(&full_path).with_context(|| format!("Failed to read file: {}", path))
    }

    /// Check if a course path exists
    pub fn file_exists(&self, path: &str) -> bool {
        self.course_path().join(path).exists()
    }
}

/// Recursively copy directory contents
fn copy_dir_recursive(src: &Path, dst: &Path) -> Result<()> {
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let file_type = entry.file_type()?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());

        if file_type.is_dir() {
            fs::create_dir_all(&dst_path)?;
            copy_dir_recursive(&src_path, &dst_path)?;
        } else {
            fs::copy(&src_path, &dst_path)?;
        }
    }
    Ok(())
}
