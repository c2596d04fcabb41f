//! Job sequence records and their state machine.
//!
//! A job sequence is created in `pending` when an edit is prepared, moves to
//! `running` when execution starts, and ends in `succeeded` or `failed`.
//! Terminal records never change again. Every mutation goes through
//! [`JobSequence::apply`], which enforces this.

use crate::context::{CourseId, UserId};
use crate::error::{EditError, ErrorKind, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Store-allocated identifier of a job sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobSequenceId(u64);

impl JobSequenceId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for JobSequenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Overall status of a job sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
}

impl JobStatus {
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    /// Returns true for forward edges of `pending -> running -> {succeeded | failed}`.
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Running)
                | (Self::Running, Self::Succeeded)
                | (Self::Running, Self::Failed)
        )
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of one step. Same lifecycle as the job itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
}

impl StepStatus {
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Running)
                | (Self::Running, Self::Succeeded)
                | (Self::Running, Self::Failed)
        )
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A recorded failure: its class and message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobError {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&EditError> for JobError {
    fn from(err: &EditError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

impl fmt::Display for JobError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// One step of a job sequence. One per child editor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStep {
    pub label: String,
    pub status: StepStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JobError>,
}

/// Durable record of one orchestration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSequence {
    pub id: JobSequenceId,
    pub course_id: CourseId,
    pub user_id: UserId,
    /// Human-readable description, used as the commit message.
    pub description: String,
    pub status: JobStatus,
    /// Unix seconds.
    pub started_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<i64>,
    pub steps: Vec<JobStep>,
    /// Failure outside any step (lock timeout, repository sync).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JobError>,
    /// Hex id of the snapshot commit produced on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit: Option<String>,
}

impl JobSequence {
    /// Builds the initial `pending` record for a freshly allocated id.
    pub fn from_new(id: JobSequenceId, new: NewJobSequence) -> Self {
        Self {
            id,
            course_id: new.course_id,
            user_id: new.user_id,
            description: new.description,
            status: JobStatus::Pending,
            started_at: new.started_at,
            finished_at: None,
            steps: new
                .step_labels
                .into_iter()
                .map(|label| JobStep {
                    label,
                    status: StepStatus::Pending,
                    output: None,
                    error: None,
                })
                .collect(),
            error: None,
            commit: None,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.status.is_terminal()
    }

    /// The first failure recorded, step errors before job-level ones.
    pub fn failure(&self) -> Option<&JobError> {
        self.steps
            .iter()
            .find_map(|s| s.error.as_ref())
            .or(self.error.as_ref())
    }

    /// Applies a patch, or rejects it without changing anything.
    ///
    /// # Errors
    ///
    /// Returns `InvalidStateTransition` if the record is already terminal, or
    /// if the patch moves the job or a step anything but forward.
    pub fn apply(&mut self, patch: JobPatch) -> Result<()> {
        if self.status.is_terminal() {
            return Err(EditError::InvalidStateTransition {
                from: self.status.to_string(),
                to: patch.status.unwrap_or(self.status).to_string(),
            });
        }
        if let Some(next) = patch.status {
            if next != self.status && !self.status.can_transition_to(next) {
                return Err(EditError::InvalidStateTransition {
                    from: self.status.to_string(),
                    to: next.to_string(),
                });
            }
        }
        if let Some((index, step_patch)) = &patch.step {
            let step = self.steps.get(*index).ok_or_else(|| {
                EditError::JobStore(format!("job {} has no step {}", self.id, index))
            })?;
            if let Some(next) = step_patch.status {
                if step.status.is_terminal()
                    || (next != step.status && !step.status.can_transition_to(next))
                {
                    return Err(EditError::InvalidStateTransition {
                        from: format!("step {} {}", index, step.status),
                        to: next.to_string(),
                    });
                }
            }
        }

        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(finished_at) = patch.finished_at {
            self.finished_at = Some(finished_at);
        }
        if let Some(error) = patch.error {
            self.error = Some(error);
        }
        if let Some(commit) = patch.commit {
            self.commit = Some(commit);
        }
        if let Some((index, step_patch)) = patch.step {
            if let Some(step) = self.steps.get_mut(index) {
                if let Some(status) = step_patch.status {
                    step.status = status;
                }
                if let Some(output) = step_patch.output {
                    step.output = Some(output);
                }
                if let Some(error) = step_patch.error {
                    step.error = Some(error);
                }
            }
        }
        Ok(())
    }

    /// One-line rendering for logs and listings.
    pub fn summary(&self) -> String {
        let done = self
            .steps
            .iter()
            .filter(|s| s.status == StepStatus::Succeeded)
            .count();
        format!(
            "#{} {} [{}] {}/{} steps: {}",
            self.id,
            self.status,
            self.course_id,
            done,
            self.steps.len(),
            self.description
        )
    }
}

/// Input for allocating a new job sequence.
#[derive(Debug, Clone)]
pub struct NewJobSequence {
    pub course_id: CourseId,
    pub user_id: UserId,
    pub description: String,
    pub started_at: i64,
    pub step_labels: Vec<String>,
}

/// Partial update of a job sequence. Unset fields are left alone.
#[derive(Debug, Clone, Default)]
pub struct JobPatch {
    pub status: Option<JobStatus>,
    pub finished_at: Option<i64>,
    pub error: Option<JobError>,
    pub commit: Option<String>,
    pub step: Option<(usize, StepPatch)>,
}

impl JobPatch {
    pub fn status(status: JobStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn step(index: usize, patch: StepPatch) -> Self {
        Self {
            step: Some((index, patch)),
            ..Self::default()
        }
    }

    pub fn finished_at(mut self, at: i64) -> Self {
        self.finished_at = Some(at);
        self
    }

    pub fn with_error(mut self, error: JobError) -> Self {
        self.error = Some(error);
        self
    }

    pub fn with_commit(mut self, commit: impl Into<String>) -> Self {
        self.commit = Some(commit.into());
        self
    }
}

/// Partial update of one step.
#[derive(Debug, Clone, Default)]
pub struct StepPatch {
    pub status: Option<StepStatus>,
    pub output: Option<String>,
    pub error: Option<JobError>,
}

impl StepPatch {
    pub fn running() -> Self {
        Self {
            status: Some(StepStatus::Running),
            ..Self::default()
        }
    }

    pub fn succeeded(output: impl Into<String>) -> Self {
        Self {
            status: Some(StepStatus::Succeeded),
            output: Some(output.into()),
            error: None,
        }
    }

    pub fn failed(error: JobError) -> Self {
        Self {
            status: Some(StepStatus::Failed),
            output: None,
            error: Some(error),
        }
    }
}
