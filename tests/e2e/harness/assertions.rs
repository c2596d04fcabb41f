use ced_core::{ErrorKind, JobStatus, StepStatus};
use serde_json::Value;

/// Declarative assertions on course, job and repository state
#[derive(Debug)]
pub enum Assertion {
    // Outcome of the last submitted edit
    Succeeded,
    Rejected(ErrorKind),
    JobFailed(ErrorKind),
    ResourcePath(String),
    ResourceHasUuid,
    NoCommit,

    // Most recent job sequence of the course
    JobStatus(JobStatus),
    StepStatuses(Vec<StepStatus>),
    JobDescription(String),
    JobStartedAt(i64),
    JobDurationSecs(i64),
    JobCount(usize),

    // Working copy
    FileContent { path: String, content: Vec<u8> },
    FileExists(String),
    FileMissing(String),
    InfoField { path: String, field: String, value: Value },
    InfoFieldDiffers { a: String, b: String, field: String },

    // Repository
    CommitCount(usize),
    HeadMessageContains(String),
    FileInHead(String),
    FileNotInHead(String),
    RemoteAtHead,
}
