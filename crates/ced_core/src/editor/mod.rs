//! Content editors and their execution.
//!
//! An [`Editor`] describes one mutation (or an ordered group of them) and
//! owns no shared state. [`Editor::prepare`] checks static preconditions and
//! persists a `pending` job sequence with one step per mutation.
//! [`Editor::execute`] then takes the course lock, applies the steps in
//! order, commits once, and records every transition in the job store.

mod add;
mod copy;
mod delete;
mod modify;
mod multi;
mod rename;

pub use add::{AddEditor, EntityKind, DEFAULT_MAX_NEW_SUFFIX};
pub use copy::{CopyEditor, DEFAULT_MAX_COPY_SUFFIX};
pub use delete::DeleteEditor;
pub use modify::ModifyEditor;
pub use multi::MultiEditor;
pub use rename::RenameEditor;

use crate::context::RequestContext;
use crate::error::{EditError, Result};
use crate::format::{is_info_file, InfoFile};
use crate::job::{JobError, JobPatch, JobSequence, JobSequenceId, JobStatus, NewJobSequence, StepPatch};
use crate::job_store::JobStore;
use crate::lock::CourseLocks;
use crate::repository::ContentRepository;
use crate::working_copy::{parent_of, WorkingCopy};
use crate::{ObjectId, TimeProvider};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::slice;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// The entity an edit produced, for the caller to redirect to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceId {
    /// Path relative to the course root.
    pub path: String,
    /// Uuid from the entity's info file, when it has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<Uuid>,
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let path = if self.path.is_empty() { "/" } else { self.path.as_str() };
        match self.uuid {
            Some(uuid) => write!(f, "{} ({})", path, uuid),
            None => f.write_str(path),
        }
    }
}

/// What one step did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepOutcome {
    /// False when the requested state already held.
    pub changed: bool,
    /// Human-readable log line recorded in the job step.
    pub output: String,
    pub resource: ResourceId,
}

/// Result of a successful execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Executed {
    /// Resource of the last step.
    pub resource: ResourceId,
    /// Commit produced, or `None` if every step was a no-op.
    pub commit: Option<ObjectId>,
}

/// Collaborators an execution needs. Borrowed for one call.
pub struct ExecutionEnv<'a> {
    pub jobs: &'a dyn JobStore,
    pub repository: &'a dyn ContentRepository,
    pub locks: &'a CourseLocks,
    pub clock: &'a dyn TimeProvider,
}

/// A content mutation.
#[derive(Debug, Clone)]
pub enum Editor {
    Modify(ModifyEditor),
    Rename(RenameEditor),
    Copy(CopyEditor),
    Delete(DeleteEditor),
    Add(AddEditor),
    Multi(MultiEditor),
}

impl From<ModifyEditor> for Editor {
    fn from(e: ModifyEditor) -> Self {
        Self::Modify(e)
    }
}

impl From<RenameEditor> for Editor {
    fn from(e: RenameEditor) -> Self {
        Self::Rename(e)
    }
}

impl From<CopyEditor> for Editor {
    fn from(e: CopyEditor) -> Self {
        Self::Copy(e)
    }
}

impl From<DeleteEditor> for Editor {
    fn from(e: DeleteEditor) -> Self {
        Self::Delete(e)
    }
}

impl From<AddEditor> for Editor {
    fn from(e: AddEditor) -> Self {
        Self::Add(e)
    }
}

impl From<MultiEditor> for Editor {
    fn from(e: MultiEditor) -> Self {
        Self::Multi(e)
    }
}

/// Failure inside `execute`, and whether a step already recorded it.
struct Failure {
    error: EditError,
    in_step: bool,
}

impl Failure {
    fn job_level(error: EditError) -> Self {
        Self {
            error,
            in_step: false,
        }
    }
}

impl Editor {
    /// Step label, or the group description for a multi-editor.
    pub fn label(&self) -> String {
        match self {
            Self::Modify(e) => e.label(),
            Self::Rename(e) => e.label(),
            Self::Copy(e) => e.label(),
            Self::Delete(e) => e.label(),
            Self::Add(e) => e.label(),
            Self::Multi(e) => e.description().to_string(),
        }
    }

    /// Description recorded on the job sequence and used as commit message.
    pub fn description(&self) -> String {
        self.label()
    }

    /// The steps this editor runs: its children, or itself.
    pub fn steps(&self) -> &[Editor] {
        match self {
            Self::Multi(m) => m.children(),
            _ => slice::from_ref(self),
        }
    }

    /// Checks static preconditions. Nothing is touched on disk.
    ///
    /// # Errors
    ///
    /// `Validation` for paths outside the scope or with unsafe characters,
    /// for the protected example course, and for malformed new content.
    pub fn validate(&self, ctx: &RequestContext) -> Result<()> {
        match self {
            Self::Modify(e) => e.validate(ctx),
            Self::Rename(e) => e.validate(ctx),
            Self::Copy(e) => e.validate(ctx),
            Self::Delete(e) => e.validate(ctx),
            Self::Add(e) => e.validate(ctx),
            Self::Multi(e) => e.validate(ctx),
        }
    }

    fn apply(&self, wc: &WorkingCopy) -> Result<StepOutcome> {
        match self {
            Self::Modify(e) => e.apply(wc),
            Self::Rename(e) => e.apply(wc),
            Self::Copy(e) => e.apply(wc),
            Self::Delete(e) => e.apply(wc),
            Self::Add(e) => e.apply(wc),
            Self::Multi(_) => Err(EditError::Validation(
                "multi-editors cannot be nested".to_string(),
            )),
        }
    }

    /// Validates, then persists a `pending` job sequence with one step per
    /// child. No job exists if validation fails.
    pub fn prepare(
        &self,
        ctx: &RequestContext,
        jobs: &dyn JobStore,
        now: i64,
    ) -> Result<JobSequence> {
        self.validate(ctx)?;
        let job = jobs.create(NewJobSequence {
            course_id: ctx.course.id.clone(),
            user_id: ctx.user.clone(),
            description: self.description(),
            started_at: now,
            step_labels: self.steps().iter().map(Editor::label).collect(),
        })?;
        info!(job = %job.id, course = %ctx.course.id, steps = job.steps.len(), "job prepared");
        Ok(job)
    }

    /// Runs the steps of a prepared job and drives it to a terminal state.
    ///
    /// The error is recorded in the job (on the failing step, or on the job
    /// itself for lock and repository failures) before it is returned.
    /// Steps that ran before a failure are not rolled back, and no commit
    /// is made.
    pub fn execute(
        &self,
        ctx: &RequestContext,
        job: JobSequenceId,
        env: &ExecutionEnv<'_>,
    ) -> Result<Executed> {
        env.jobs.update(job, JobPatch::status(JobStatus::Running))?;
        info!(job = %job, course = %ctx.course.id, "job running");

        match self.run_steps(ctx, job, env) {
            Ok(executed) => {
                let mut patch = JobPatch::status(JobStatus::Succeeded).finished_at(env.clock.now());
                if let Some(commit) = executed.commit {
                    patch = patch.with_commit(commit.as_hex());
                }
                env.jobs.update(job, patch)?;
                info!(job = %job, course = %ctx.course.id, resource = %executed.resource, "job succeeded");
                Ok(executed)
            }
            Err(Failure { error, in_step }) => {
                let mut patch = JobPatch::status(JobStatus::Failed).finished_at(env.clock.now());
                if !in_step {
                    patch = patch.with_error(JobError::from(&error));
                }
                if let Err(store_err) = env.jobs.update(job, patch) {
                    warn!(job = %job, error = %store_err, "failed to record job failure");
                }
                warn!(job = %job, course = %ctx.course.id, kind = %error.kind(), error = %error, "job failed");
                Err(error)
            }
        }
    }

    fn run_steps(
        &self,
        ctx: &RequestContext,
        job: JobSequenceId,
        env: &ExecutionEnv<'_>,
    ) -> std::result::Result<Executed, Failure> {
        let _guard = env.locks.acquire(&ctx.course).map_err(Failure::job_level)?;
        let wc = WorkingCopy::new(&ctx.course.path);

        let mut changed = false;
        let mut resource = None;
        for (index, step) in self.steps().iter().enumerate() {
            env.jobs
                .update(job, JobPatch::step(index, StepPatch::running()))
                .map_err(Failure::job_level)?;
            debug!(job = %job, step = index, label = %step.label(), "step running");

            match step.apply(&wc) {
                Ok(outcome) => {
                    env.jobs
                        .update(job, JobPatch::step(index, StepPatch::succeeded(outcome.output)))
                        .map_err(Failure::job_level)?;
                    changed |= outcome.changed;
                    resource = Some(outcome.resource);
                }
                Err(error) => {
                    warn!(job = %job, step = index, error = %error, "step failed");
                    let recorded = env
                        .jobs
                        .update(job, JobPatch::step(index, StepPatch::failed(JobError::from(&error))));
                    return Err(Failure {
                        error,
                        in_step: recorded.is_ok(),
                    });
                }
            }
        }

        let commit = if changed {
            let receipt = env
                .repository
                .commit_and_sync(&ctx.course, &self.description(), &ctx.user)
                .map_err(Failure::job_level)?;
            Some(receipt.commit)
        } else {
            debug!(job = %job, "no changes, skipping commit");
            None
        };

        let resource = resource.ok_or_else(|| {
            Failure::job_level(EditError::Validation("no edits to apply".to_string()))
        })?;
        Ok(Executed { resource, commit })
    }
}

/// Rejects edits to the read-only example course.
pub(crate) fn check_course_editable(ctx: &RequestContext) -> Result<()> {
    if ctx.course.example_course {
        return Err(EditError::Validation(format!(
            "course {} is the example course and cannot be edited",
            ctx.course.id
        )));
    }
    Ok(())
}

/// Uuid of the entity at `path`: the info file itself, or the info file
/// directly inside the directory.
pub(crate) fn entity_uuid(wc: &WorkingCopy, path: &str) -> Option<Uuid> {
    let info_path = if wc.is_dir(path) {
        wc.walk_files(path)
            .ok()?
            .into_iter()
            .find(|f| parent_of(f) == path && is_info_file(f))?
    } else if is_info_file(path) {
        path.to_string()
    } else {
        return None;
    };
    let bytes = wc.read(&info_path).ok()?;
    InfoFile::parse(&info_path, &bytes).ok()?.uuid()
}

/// Applies `rewrite` to every info file at or below `root`, writing back the
/// ones it reports as changed. Returns how many were written.
///
/// Info files that do not parse are left alone.
pub(crate) fn rewrite_info_files(
    wc: &WorkingCopy,
    root: &str,
    mut rewrite: impl FnMut(&mut InfoFile) -> bool,
) -> Result<usize> {
    let mut written = 0;
    for path in wc.walk_files(root)?.into_iter().filter(|p| is_info_file(p)) {
        let bytes = wc.read(&path)?;
        let mut info = match InfoFile::parse(&path, &bytes) {
            Ok(info) => info,
            Err(e) => {
                warn!(path = %path, error = %e, "skipping unreadable info file");
                continue;
            }
        };
        if rewrite(&mut info) {
            wc.write_atomic(&path, &info.to_bytes()?)?;
            written += 1;
        }
    }
    Ok(written)
}
