//! Orchestration entry point.
//!
//! [`EditorRunner::run`] is what a request handler calls: it checks
//! permissions, prepares the job sequence, executes the editor, and returns
//! either the affected resource or the id of the failed job. Rejections
//! (validation, authorization) happen before any job exists.

use crate::context::RequestContext;
use crate::editor::{Editor, ExecutionEnv, ResourceId};
use crate::error::{EditError, ErrorKind, Result};
use crate::job::{JobError, JobPatch, JobSequence, JobSequenceId, JobStatus};
use crate::job_store::JobStore;
use crate::lock::CourseLocks;
use crate::permissions::PermissionOracle;
use crate::repository::ContentRepository;
use crate::{ObjectId, SystemClock, TimeProvider};
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, warn};

/// A completed edit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuccessOutcome {
    pub job_sequence_id: JobSequenceId,
    /// Where the caller should send the user next.
    pub resource: ResourceId,
    /// `None` when nothing changed.
    pub commit: Option<ObjectId>,
}

/// An edit that ran and failed. Details live in the job sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobFailure {
    pub job_sequence_id: JobSequenceId,
}

/// Why [`EditorRunner::run`] did not succeed.
#[derive(Debug, Error)]
pub enum RunFailure {
    /// Rejected before a job sequence was created.
    #[error("edit rejected: {0}")]
    Rejected(EditError),

    /// Execution failed; see the job sequence.
    #[error("job {} failed", .0.job_sequence_id)]
    JobFailed(JobFailure),
}

impl RunFailure {
    pub fn job_sequence_id(&self) -> Option<JobSequenceId> {
        match self {
            Self::Rejected(_) => None,
            Self::JobFailed(f) => Some(f.job_sequence_id),
        }
    }
}

/// Runs editors against courses.
///
/// Cheap to clone; all collaborators are shared. Build one at startup and
/// hand clones to request handlers.
#[derive(Clone)]
pub struct EditorRunner {
    permissions: Arc<dyn PermissionOracle>,
    jobs: Arc<dyn JobStore>,
    repository: Arc<dyn ContentRepository>,
    locks: Arc<CourseLocks>,
    clock: Arc<dyn TimeProvider>,
}

impl EditorRunner {
    pub fn new(
        permissions: Arc<dyn PermissionOracle>,
        jobs: Arc<dyn JobStore>,
        repository: Arc<dyn ContentRepository>,
        locks: Arc<CourseLocks>,
    ) -> Self {
        Self {
            permissions,
            jobs,
            repository,
            locks,
            clock: Arc::new(SystemClock),
        }
    }

    /// Sets a custom time provider for job timestamps.
    pub fn with_time_provider(mut self, clock: Arc<dyn TimeProvider>) -> Self {
        self.clock = clock;
        self
    }

    pub fn jobs(&self) -> &dyn JobStore {
        self.jobs.as_ref()
    }

    /// Asks the permission oracle whether the edit may proceed.
    pub fn authorize(&self, ctx: &RequestContext) -> Result<()> {
        if self.permissions.is_protected_example_course(&ctx.course) {
            return Err(EditError::Authorization(format!(
                "course {} is a protected example course",
                ctx.course.id
            )));
        }
        if !self
            .permissions
            .can_edit_course_content(&ctx.user, &ctx.course)
        {
            return Err(EditError::Authorization(format!(
                "user {} may not edit content of course {}",
                ctx.user, ctx.course.id
            )));
        }
        Ok(())
    }

    /// Authorizes and prepares. No job exists if this fails.
    pub fn prepare(&self, ctx: &RequestContext, editor: &Editor) -> Result<JobSequence> {
        self.authorize(ctx)?;
        editor.prepare(ctx, self.jobs.as_ref(), self.clock.now())
    }

    /// Executes a prepared job.
    pub fn execute(
        &self,
        ctx: &RequestContext,
        editor: &Editor,
        job: JobSequenceId,
    ) -> std::result::Result<SuccessOutcome, JobFailure> {
        let env = ExecutionEnv {
            jobs: self.jobs.as_ref(),
            repository: self.repository.as_ref(),
            locks: self.locks.as_ref(),
            clock: self.clock.as_ref(),
        };
        match editor.execute(ctx, job, &env) {
            Ok(executed) => Ok(SuccessOutcome {
                job_sequence_id: job,
                resource: executed.resource,
                commit: executed.commit,
            }),
            Err(e) => {
                error!(job = %job, course = %ctx.course.id, kind = %e.kind(), error = %e, "edit failed");
                Err(JobFailure {
                    job_sequence_id: job,
                })
            }
        }
    }

    /// Authorizes, prepares and executes on the calling thread.
    pub fn run(
        &self,
        ctx: &RequestContext,
        editor: &Editor,
    ) -> std::result::Result<SuccessOutcome, RunFailure> {
        let job = self.prepare(ctx, editor).map_err(|e| {
            info!(course = %ctx.course.id, user = %ctx.user, error = %e, "edit rejected");
            RunFailure::Rejected(e)
        })?;
        self.execute(ctx, editor, job.id)
            .map_err(RunFailure::JobFailed)
    }

    /// Authorizes and prepares on the calling thread, then executes on a
    /// worker thread.
    ///
    /// Dropping the handle or timing out while waiting does not cancel the
    /// job; it still reaches a terminal state.
    pub fn spawn(&self, ctx: RequestContext, editor: Editor) -> Result<RunHandle> {
        let job = self.prepare(&ctx, &editor)?;
        let id = job.id;
        let runner = self.clone();
        let (tx, rx) = mpsc::channel();

        let spawned = thread::Builder::new()
            .name(format!("ced-job-{}", id))
            .spawn(move || {
                let result = panic::catch_unwind(AssertUnwindSafe(|| {
                    runner.execute(&ctx, &editor, id)
                }));
                let result = result.unwrap_or_else(|_| {
                    runner.record_crash(id);
                    Err(JobFailure {
                        job_sequence_id: id,
                    })
                });
                let _ = tx.send(result);
            });

        match spawned {
            Ok(thread) => Ok(RunHandle {
                job_sequence_id: id,
                rx,
                thread: Some(thread),
                result: None,
            }),
            Err(e) => {
                let err = EditError::Io(e);
                self.record_failure(id, JobError::from(&err));
                Err(err)
            }
        }
    }

    fn record_crash(&self, id: JobSequenceId) {
        self.record_failure(
            id,
            JobError {
                kind: ErrorKind::Internal,
                message: "edit worker panicked".to_string(),
            },
        );
    }

    /// Moves a job that never finished normally to `failed`.
    fn record_failure(&self, id: JobSequenceId, error: JobError) {
        let now = self.clock.now();
        let current = match self.jobs.get(id) {
            Ok(job) => job.status,
            Err(e) => {
                warn!(job = %id, error = %e, "cannot load job to record failure");
                return;
            }
        };
        if current == JobStatus::Pending {
            if let Err(e) = self.jobs.update(id, JobPatch::status(JobStatus::Running)) {
                warn!(job = %id, error = %e, "failed to mark job running before failing it");
            }
        }
        let patch = JobPatch::status(JobStatus::Failed)
            .finished_at(now)
            .with_error(error);
        if let Err(e) = self.jobs.update(id, patch) {
            warn!(job = %id, error = %e, "failed to record job failure");
        }
    }
}

/// Handle to an edit running on a worker thread.
pub struct RunHandle {
    job_sequence_id: JobSequenceId,
    rx: Receiver<std::result::Result<SuccessOutcome, JobFailure>>,
    thread: Option<JoinHandle<()>>,
    result: Option<std::result::Result<SuccessOutcome, JobFailure>>,
}

impl RunHandle {
    pub fn job_sequence_id(&self) -> JobSequenceId {
        self.job_sequence_id
    }

    /// Blocks until the job finishes.
    pub fn wait(mut self) -> std::result::Result<SuccessOutcome, JobFailure> {
        let result = match self.result.take() {
            Some(result) => result,
            None => self.rx.recv().unwrap_or(Err(JobFailure {
                job_sequence_id: self.job_sequence_id,
            })),
        };
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
        result
    }

    /// Waits up to `timeout`. `None` means the job is still running.
    pub fn wait_timeout(
        &mut self,
        timeout: Duration,
    ) -> Option<std::result::Result<SuccessOutcome, JobFailure>> {
        if self.result.is_none() {
            match self.rx.recv_timeout(timeout) {
                Ok(result) => self.result = Some(result),
                Err(RecvTimeoutError::Timeout) => return None,
                Err(RecvTimeoutError::Disconnected) => {
                    self.result = Some(Err(JobFailure {
                        job_sequence_id: self.job_sequence_id,
                    }))
                }
            }
        }
        self.result.clone()
    }
}
