use super::assertions::Assertion;
use super::clock::MockClock;
use super::scenario::CourseSetup;
use super::steps::{Edit, ScenarioStep};
use super::workspace::TestWorkspace;
use anyhow::{anyhow, Context, Result};
use ced_core::{
    fingerprint_file, AddEditor, ContentFingerprint, CopyEditor, Course, CourseLocks, DeleteEditor, EditError,
    Editor, ErrorKind, InfoFile, JobSequence, JobStore, ModifyEditor, MultiEditor, PathScope,
    RedbJobStore, RenameEditor, RequestContext, RunFailure, SnapshotRepository, StaticPermissions,
    SuccessOutcome, UserId,
};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// What happened to the last submitted edit
enum LastRun {
    Succeeded(SuccessOutcome),
    Rejected(EditError),
    Failed(JobSequence),
}

/// Executes scenarios against a real course directory
pub struct ScenarioRunner {
    workspace: TestWorkspace,
    course: Course,
    permissions: StaticPermissions,
    repository: Arc<SnapshotRepository>,
    jobs: Option<Arc<RedbJobStore>>,
    clock: MockClock,
    user: UserId,
    scope: PathScope,
    reads: HashMap<String, ContentFingerprint>,
    last: Option<LastRun>,
    current_step: usize,
}

impl ScenarioRunner {
    /// Create a new runner: lay out the course and take the first snapshot
    pub fn new(setup: &CourseSetup, initial_files: HashMap<String, Vec<u8>>) -> Result<Self> {
        let workspace = match &setup.fixture {
            Some(name) => TestWorkspace::from_fixture(name)?,
            None => TestWorkspace::empty()?,
        };
        for (path, content) in &initial_files {
            workspace.write_file(path, content)?;
        }

        let mut course = workspace.course(&setup.course_id);
        if setup.example_course {
            course = course.as_example();
        }

        let clock = MockClock::default();
        let repository = Arc::new(
            SnapshotRepository::new(workspace.config().repository)
                .with_time_provider(Arc::new(clock.as_provider())),
        );
        repository.init(&course)?;
        let jobs = Arc::new(RedbJobStore::open(workspace.jobs_path())?);

        Ok(Self {
            workspace,
            course,
            permissions: StaticPermissions::from_config(&setup.permissions),
            repository,
            jobs: Some(jobs),
            clock,
            user: UserId::new("instructor"),
            scope: PathScope::course(),
            reads: HashMap::new(),
            last: None,
            current_step: 0,
        })
    }

    /// Get current step number
    pub fn current_step(&self) -> usize {
        self.current_step
    }

    /// Execute all steps in sequence
    pub fn execute(&mut self, steps: &[ScenarioStep]) -> Result<()> {
        for (i, step) in steps.iter().enumerate() {
            self.current_step = i;
            self.execute_step(step)
                .with_context(|| format!("Step {}: {:?}", i, step))?;
        }
        Ok(())
    }

    fn execute_step(&mut self, step: &ScenarioStep) -> Result<()> {
        match step {
            ScenarioStep::ActAs { user } => {
                self.user = UserId::new(user.as_str());
                Ok(())
            }
            ScenarioStep::Scope { scope } => {
                self.scope = scope.clone();
                Ok(())
            }
            ScenarioStep::Read { path } => self.handle_read(path),
            ScenarioStep::Submit { edit } => self.handle_submit(edit),
            ScenarioStep::ExternalWrite { path, content } => {
                self.workspace.write_file(path, content)
            }
            ScenarioStep::ExternalDelete { path } => {
                std::fs::remove_file(self.workspace.course_path().join(path))
                    .with_context(|| format!("Failed to delete {}", path))
            }
            ScenarioStep::Wait { duration } => {
                self.clock.advance(*duration);
                Ok(())
            }
            ScenarioStep::Restart => self.handle_restart(),
            ScenarioStep::Assert { assertion } => self.handle_assertion(assertion),
        }
    }

    fn jobs(&self) -> Result<Arc<RedbJobStore>> {
        self.jobs
            .clone()
            .ok_or_else(|| anyhow!("Job store not open"))
    }

    // ===== Action handlers =====

    fn handle_read(&mut self, path: &str) -> Result<()> {
        let fp = fingerprint_file(&self.course.path.join(path))?;
        self.reads.insert(path.to_string(), fp);
        Ok(())
    }

    fn handle_submit(&mut self, edit: &Edit) -> Result<()> {
        let editor = self.build_editor(edit)?;
        let runner = ced_core::EditorRunner::new(
            Arc::new(self.permissions.clone()),
            self.jobs()?,
            self.repository.clone(),
            Arc::new(CourseLocks::new(Duration::from_secs(5), Duration::from_millis(5))),
        )
        .with_time_provider(Arc::new(self.clock.as_provider()));

        let ctx = RequestContext::new(self.user.clone(), self.course.clone());
        self.last = Some(match runner.run(&ctx, &editor) {
            Ok(outcome) => LastRun::Succeeded(outcome),
            Err(RunFailure::Rejected(e)) => LastRun::Rejected(e),
            Err(RunFailure::JobFailed(f)) => LastRun::Failed(self.jobs()?.get(f.job_sequence_id)?),
        });
        Ok(())
    }

    fn build_editor(&self, edit: &Edit) -> Result<Editor> {
        let scope = self.scope.clone();
        Ok(match edit {
            Edit::Write { path, content } => {
                let origin = self
                    .reads
                    .get(path)
                    .cloned()
                    .ok_or_else(|| anyhow!("{} was written without being read", path))?;
                ModifyEditor::new(scope, path.as_str(), origin, content.clone()).into()
            }
            Edit::Create { path, content } => {
                ModifyEditor::new(scope, path.as_str(), ContentFingerprint::absent(), content.clone())
                    .into()
            }
            Edit::Rename { from, to } => RenameEditor::new(scope, from.as_str(), to.as_str()).into(),
            Edit::Copy { from, to } => {
                let editor = CopyEditor::new(scope, from.as_str());
                match to {
                    Some(to) => editor.to(to.as_str()).into(),
                    None => editor.into(),
                }
            }
            Edit::Delete {
                path,
                tolerate_missing,
            } => DeleteEditor::new(scope, path.as_str())
                .tolerate_missing(*tolerate_missing)
                .into(),
            Edit::Add { kind, parent } => AddEditor::new(scope, *kind, parent.as_str()).into(),
            Edit::Multi {
                description,
                children,
            } => {
                let children = children
                    .iter()
                    .map(|child| self.build_editor(child))
                    .collect::<Result<Vec<_>>>()?;
                MultiEditor::new(description.as_str(), children).into()
            }
        })
    }

    fn handle_restart(&mut self) -> Result<()> {
        // redb refuses a second handle on the same file
        self.jobs = None;
        self.jobs = Some(Arc::new(RedbJobStore::open(self.workspace.jobs_path())?));
        Ok(())
    }

    // ===== Assertion handlers =====

    fn handle_assertion(&self, assertion: &Assertion) -> Result<()> {
        match assertion {
            Assertion::Succeeded => self.success().map(|_| ()),
            Assertion::Rejected(kind) => self.assert_rejected(*kind),
            Assertion::JobFailed(kind) => self.assert_job_failed(*kind),
            Assertion::ResourcePath(path) => {
                let outcome = self.success()?;
                if outcome.resource.path != *path {
                    return Err(anyhow!(
                        "Resource mismatch: expected {}, got {}",
                        path,
                        outcome.resource.path
                    ));
                }
                Ok(())
            }
            Assertion::ResourceHasUuid => match self.success()?.resource.uuid {
                Some(_) => Ok(()),
                None => Err(anyhow!("Resource has no uuid")),
            },
            Assertion::NoCommit => match self.success()?.commit {
                None => Ok(()),
                Some(id) => Err(anyhow!("Expected no commit, got {}", id.short())),
            },

            Assertion::JobStatus(expected) => {
                let job = self.latest_job()?;
                if job.status != *expected {
                    return Err(anyhow!(
                        "Job status mismatch: expected {}, got {} ({})",
                        expected,
                        job.status,
                        job.summary()
                    ));
                }
                Ok(())
            }
            Assertion::StepStatuses(expected) => {
                let job = self.latest_job()?;
                let actual: Vec<_> = job.steps.iter().map(|s| s.status).collect();
                if actual != *expected {
                    return Err(anyhow!(
                        "Step statuses mismatch: expected {:?}, got {:?}",
                        expected,
                        actual
                    ));
                }
                Ok(())
            }
            Assertion::JobDescription(expected) => {
                let job = self.latest_job()?;
                if job.description != *expected {
                    return Err(anyhow!(
                        "Job description mismatch: expected {:?}, got {:?}",
                        expected,
                        job.description
                    ));
                }
                Ok(())
            }
            Assertion::JobStartedAt(expected) => {
                let job = self.latest_job()?;
                if job.started_at != *expected {
                    return Err(anyhow!(
                        "Job start mismatch: expected {}, got {}",
                        expected,
                        job.started_at
                    ));
                }
                Ok(())
            }
            Assertion::JobDurationSecs(expected) => {
                let job = self.latest_job()?;
                let finished = job
                    .finished_at
                    .ok_or_else(|| anyhow!("Job #{} has not finished", job.id))?;
                if finished - job.started_at != *expected {
                    return Err(anyhow!(
                        "Job duration mismatch: expected {}s, got {}s",
                        expected,
                        finished - job.started_at
                    ));
                }
                Ok(())
            }
            Assertion::JobCount(expected) => {
                let count = self.jobs()?.list(Some(&self.course.id), usize::MAX)?.len();
                if count != *expected {
                    return Err(anyhow!(
                        "Job count mismatch: expected {}, got {}",
                        expected,
                        count
                    ));
                }
                Ok(())
            }

            Assertion::FileContent { path, content } => {
                let actual = self.workspace.read_file(path)?;
                if actual != *content {
                    return Err(anyhow!(
                        "File '{}' content mismatch: expected {:?}, got {:?}",
                        path,
                        String::from_utf8_lossy(content),
                        String::from_utf8_lossy(&actual)
                    ));
                }
                Ok(())
            }
            Assertion::FileExists(path) => {
                if !self.workspace.file_exists(path) {
                    return Err(anyhow!("Expected '{}' to exist", path));
                }
                Ok(())
            }
            Assertion::FileMissing(path) => {
                if self.workspace.file_exists(path) {
                    return Err(anyhow!("Expected '{}' to be gone", path));
                }
                Ok(())
            }
            Assertion::InfoField { path, field, value } => {
                let actual = self.info_field(path, field)?;
                if actual != *value {
                    return Err(anyhow!(
                        "Field '{}' of {} mismatch: expected {}, got {}",
                        field,
                        path,
                        value,
                        actual
                    ));
                }
                Ok(())
            }
            Assertion::InfoFieldDiffers { a, b, field } => {
                let (va, vb) = (self.info_field(a, field)?, self.info_field(b, field)?);
                if va == vb {
                    return Err(anyhow!(
                        "Field '{}' is {} in both {} and {}",
                        field,
                        va,
                        a,
                        b
                    ));
                }
                Ok(())
            }

            Assertion::CommitCount(expected) => {
                let count = self.repository.history(&self.course, usize::MAX)?.len();
                if count != *expected {
                    return Err(anyhow!(
                        "Commit count mismatch: expected {}, got {}",
                        expected,
                        count
                    ));
                }
                Ok(())
            }
            Assertion::HeadMessageContains(text) => {
                let history = self.repository.history(&self.course, 1)?;
                let (_, head) = history
                    .first()
                    .ok_or_else(|| anyhow!("Course has no commits"))?;
                if !head.message.contains(text.as_str()) {
                    return Err(anyhow!(
                        "HEAD message doesn't contain '{}': {}",
                        text,
                        head.message
                    ));
                }
                Ok(())
            }
            Assertion::FileInHead(path) => {
                if self.repository.head_file(&self.course, path)?.is_none() {
                    return Err(anyhow!("File '{}' not found in HEAD commit", path));
                }
                Ok(())
            }
            Assertion::FileNotInHead(path) => {
                if self.repository.head_file(&self.course, path)?.is_some() {
                    return Err(anyhow!("File '{}' unexpectedly found in HEAD commit", path));
                }
                Ok(())
            }
            Assertion::RemoteAtHead => {
                let history = self.repository.history(&self.course, 1)?;
                let head = history.first().map(|(id, _)| *id);
                let remote = self.repository.remote_head(&self.course)?;
                if head != remote || remote.is_none() {
                    return Err(anyhow!(
                        "Remote not in sync: HEAD {:?}, remote {:?}",
                        head.map(|id| id.short()),
                        remote.map(|id| id.short())
                    ));
                }
                Ok(())
            }
        }
    }

    fn success(&self) -> Result<&SuccessOutcome> {
        match &self.last {
            Some(LastRun::Succeeded(outcome)) => Ok(outcome),
            Some(LastRun::Rejected(e)) => Err(anyhow!("Edit was rejected: {}", e)),
            Some(LastRun::Failed(job)) => Err(anyhow!(
                "Job failed: {} {:?}",
                job.summary(),
                job.failure()
            )),
            None => Err(anyhow!("No edit submitted yet")),
        }
    }

    fn assert_rejected(&self, kind: ErrorKind) -> Result<()> {
        match &self.last {
            Some(LastRun::Rejected(e)) if e.kind() == kind => Ok(()),
            Some(LastRun::Rejected(e)) => Err(anyhow!(
                "Rejected with {} instead of {}: {}",
                e.kind(),
                kind,
                e
            )),
            _ => Err(anyhow!("Expected a rejection with {}", kind)),
        }
    }

    fn assert_job_failed(&self, kind: ErrorKind) -> Result<()> {
        match &self.last {
            Some(LastRun::Failed(job)) => match job.failure() {
                Some(err) if err.kind == kind => Ok(()),
                other => Err(anyhow!(
                    "Job failed with {:?} instead of {}",
                    other,
                    kind
                )),
            },
            _ => Err(anyhow!("Expected a failed job with {}", kind)),
        }
    }

    fn latest_job(&self) -> Result<JobSequence> {
        self.jobs()?
            .list(Some(&self.course.id), 1)?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("No job sequences recorded"))
    }

    fn info_field(&self, path: &str, field: &str) -> Result<Value> {
        let bytes = self.workspace.read_file(path)?;
        let info = InfoFile::parse(path, &bytes)?;
        Ok(info.get(field).cloned().unwrap_or(Value::Null))
    }
}
