//! CLI commands.

pub mod edit;
pub mod fingerprint;
pub mod history;
pub mod init;
pub mod jobs;

use anyhow::{Context, Result};
use ced_core::{
    Config, Course, CourseLocks, EditorRunner, RedbJobStore, RequestContext, SnapshotRepository,
    StaticPermissions, UserId, META_DIR,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

/// Global flags shared by every command.
pub struct Globals {
    pub course: PathBuf,
    pub course_id: Option<String>,
    pub user: Option<String>,
    pub config_dir: Option<PathBuf>,
}

/// A course opened from the command line, with its configuration.
pub struct CourseEnv {
    pub course: Course,
    pub user: UserId,
    pub config: Config,
    pub config_dir: PathBuf,
}

impl CourseEnv {
    pub fn open(globals: &Globals) -> Result<Self> {
        let path = globals.course.canonicalize().with_context(|| {
            format!("Course directory {} not found", globals.course.display())
        })?;
        let id = match &globals.course_id {
            Some(id) => id.clone(),
            None => path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .context("Cannot infer course id from the directory; pass --course-id")?,
        };
        let config_dir = globals
            .config_dir
            .clone()
            .unwrap_or_else(|| path.join(META_DIR));
        let config = Config::load(&config_dir).context("Failed to load configuration")?;
        let user = globals
            .user
            .clone()
            .or_else(|| std::env::var("USER").ok())
            .unwrap_or_else(|| config.repository.author_fallback.clone());

        debug!(course = %id, user = %user, config_dir = %config_dir.display(), "opened course");

        Ok(Self {
            course: Course::new(id, path),
            user: UserId::new(user),
            config,
            config_dir,
        })
    }

    pub fn context(&self) -> RequestContext {
        RequestContext::new(self.user.clone(), self.course.clone())
    }

    pub fn repository(&self) -> SnapshotRepository {
        SnapshotRepository::new(self.config.repository.clone())
    }

    pub fn jobs(&self) -> Result<RedbJobStore> {
        let path = self.config.jobs.database_path(&self.config_dir);
        RedbJobStore::open(&path)
            .with_context(|| format!("Failed to open job database {}", path.display()))
    }

    pub fn runner(&self) -> Result<EditorRunner> {
        Ok(EditorRunner::new(
            Arc::new(StaticPermissions::from_config(&self.config.permissions)),
            Arc::new(self.jobs()?),
            Arc::new(self.repository()),
            Arc::new(CourseLocks::new(
                self.config.locks.timeout(),
                self.config.locks.poll_interval(),
            )),
        ))
    }
}
