//! Durable job sequence storage.
//!
//! Job sequences outlive the request that created them and are never
//! deleted here. Each create or update is a single redb write transaction,
//! so the read-modify-write of a record is atomic and durable before the
//! call returns, and status viewers reading concurrently see either the old
//! or the new record.

use crate::context::CourseId;
use crate::error::{EditError, Result};
use crate::job::{JobPatch, JobSequence, JobSequenceId, NewJobSequence};
use redb::{Database, ReadableTable, TableDefinition};
use std::fmt::Display;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Job store schema version.
pub const JOB_STORE_SCHEMA_VERSION: u64 = 1;

const METADATA_TABLE: TableDefinition<&str, u64> = TableDefinition::new("metadata");
const JOBS_TABLE: TableDefinition<u64, &[u8]> = TableDefinition::new("job_sequences");

const SCHEMA_VERSION_KEY: &str = "schema_version";
const NEXT_ID_KEY: &str = "next_id";

/// Durable store of job sequences.
pub trait JobStore: Send + Sync {
    /// Allocates an id and persists a `pending` record.
    fn create(&self, new: NewJobSequence) -> Result<JobSequence>;

    /// Applies a patch and persists the result.
    ///
    /// # Errors
    ///
    /// Returns `JobNotFound` for unknown ids and `InvalidStateTransition`
    /// when the patch is not allowed; the stored record is left untouched.
    fn update(&self, id: JobSequenceId, patch: JobPatch) -> Result<JobSequence>;

    fn get(&self, id: JobSequenceId) -> Result<JobSequence>;

    /// Lists job sequences newest first, optionally for one course.
    fn list(&self, course: Option<&CourseId>, limit: usize) -> Result<Vec<JobSequence>>;
}

fn store_err<E: Display>(what: &'static str) -> impl FnOnce(E) -> EditError {
    move |e| EditError::JobStore(format!("{}: {}", what, e))
}

fn encode(job: &JobSequence) -> Result<Vec<u8>> {
    serde_json::to_vec(job).map_err(|e| EditError::Serialization(e.to_string()))
}

fn decode(bytes: &[u8]) -> Result<JobSequence> {
    serde_json::from_slice(bytes).map_err(|e| EditError::Deserialization(e.to_string()))
}

/// Job store backed by a redb database file.
pub struct RedbJobStore {
    db: Database,
    path: PathBuf,
}

impl RedbJobStore {
    /// Opens the database at `path`, creating and initializing it if needed.
    ///
    /// # Errors
    ///
    /// Returns `JobStore` if the database can't be opened or was written
    /// with a different schema version.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db = Database::create(&path).map_err(store_err("failed to open job database"))?;

        let txn = db
            .begin_write()
            .map_err(store_err("failed to begin write transaction"))?;
        {
            let mut meta = txn
                .open_table(METADATA_TABLE)
                .map_err(store_err("failed to open metadata table"))?;
            let version = meta
                .get(SCHEMA_VERSION_KEY)
                .map_err(store_err("failed to read schema version"))?
                .map(|v| v.value());
            match version {
                Some(found) if found != JOB_STORE_SCHEMA_VERSION => {
                    return Err(EditError::JobStore(format!(
                        "job store schema version mismatch: found {}, expected {}",
                        found, JOB_STORE_SCHEMA_VERSION
                    )));
                }
                Some(_) => {}
                None => {
                    meta.insert(SCHEMA_VERSION_KEY, JOB_STORE_SCHEMA_VERSION)
                        .map_err(store_err("failed to write schema version"))?;
                }
            }
        }
        txn.open_table(JOBS_TABLE)
            .map_err(store_err("failed to open job table"))?;
        txn.commit().map_err(store_err("failed to commit"))?;

        debug!(path = %path.display(), "opened job store");
        Ok(Self { db, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn begin_read(&self) -> Result<redb::ReadTransaction> {
        self.db
            .begin_read()
            .map_err(store_err("failed to begin read transaction"))
    }

    fn begin_write(&self) -> Result<redb::WriteTransaction> {
        self.db
            .begin_write()
            .map_err(store_err("failed to begin write transaction"))
    }
}

impl JobStore for RedbJobStore {
    fn create(&self, new: NewJobSequence) -> Result<JobSequence> {
        let txn = self.begin_write()?;
        let job = {
            let mut meta = txn
                .open_table(METADATA_TABLE)
                .map_err(store_err("failed to open metadata table"))?;
            let id = meta
                .get(NEXT_ID_KEY)
                .map_err(store_err("failed to read next id"))?
                .map(|v| v.value())
                .unwrap_or(1);
            meta.insert(NEXT_ID_KEY, id + 1)
                .map_err(store_err("failed to advance next id"))?;

            let job = JobSequence::from_new(JobSequenceId::new(id), new);
            let bytes = encode(&job)?;
            let mut jobs = txn
                .open_table(JOBS_TABLE)
                .map_err(store_err("failed to open job table"))?;
            jobs.insert(id, bytes.as_slice())
                .map_err(store_err("failed to insert job"))?;
            job
        };
        txn.commit().map_err(store_err("failed to commit"))?;

        debug!(job = %job.id, course = %job.course_id, steps = job.steps.len(), "created job sequence");
        Ok(job)
    }

    fn update(&self, id: JobSequenceId, patch: JobPatch) -> Result<JobSequence> {
        let txn = self.begin_write()?;
        let job = {
            let mut jobs = txn
                .open_table(JOBS_TABLE)
                .map_err(store_err("failed to open job table"))?;
            let mut job = match jobs
                .get(id.get())
                .map_err(store_err("failed to read job"))?
            {
                Some(bytes) => decode(bytes.value())?,
                None => return Err(EditError::JobNotFound(id.get())),
            };
            // Dropping the transaction on error discards the attempt.
            job.apply(patch)?;
            let bytes = encode(&job)?;
            jobs.insert(id.get(), bytes.as_slice())
                .map_err(store_err("failed to write job"))?;
            job
        };
        txn.commit().map_err(store_err("failed to commit"))?;

        debug!(job = %id, status = %job.status, "updated job sequence");
        Ok(job)
    }

    fn get(&self, id: JobSequenceId) -> Result<JobSequence> {
        let txn = self.begin_read()?;
        let jobs = txn
            .open_table(JOBS_TABLE)
            .map_err(store_err("failed to open job table"))?;
        let entry = jobs.get(id.get()).map_err(store_err("failed to read job"))?;
        match entry {
            Some(bytes) => decode(bytes.value()),
            None => Err(EditError::JobNotFound(id.get())),
        }
    }

    fn list(&self, course: Option<&CourseId>, limit: usize) -> Result<Vec<JobSequence>> {
        let mut out = Vec::new();
        if limit == 0 {
            return Ok(out);
        }

        let txn = self.begin_read()?;
        let jobs = txn
            .open_table(JOBS_TABLE)
            .map_err(store_err("failed to open job table"))?;
        for entry in jobs.iter().map_err(store_err("failed to scan jobs"))?.rev() {
            let (_, bytes) = entry.map_err(store_err("failed to read job"))?;
            let job = decode(bytes.value())?;
            if course.is_some_and(|c| c != &job.course_id) {
                continue;
            }
            out.push(job);
            if out.len() >= limit {
                break;
            }
        }
        Ok(out)
    }
}
