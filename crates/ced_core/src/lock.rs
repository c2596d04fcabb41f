//! Per-course exclusion.
//!
//! Orchestrations against the same course run one at a time. Within a
//! process, waiters block on a condition variable keyed by course id; across
//! processes, an advisory `flock(2)` on `<course>/.course/LOCK` (via `fs2`)
//! does the same. Courses never share a lock.

use crate::context::{Course, CourseId};
use crate::error::{EditError, Result};
use crate::working_copy::META_DIR;
use fs2::FileExt;
use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::sync::{Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Name of the advisory lock file inside the course metadata directory.
pub const LOCK_FILE: &str = "LOCK";

/// Registry of courses currently being edited in this process.
///
/// Construct once at startup and share it (behind an `Arc`) with every runner.
#[derive(Debug)]
pub struct CourseLocks {
    held: Mutex<HashSet<CourseId>>,
    released: Condvar,
    timeout: Duration,
    poll_interval: Duration,
}

impl CourseLocks {
    pub fn new(timeout: Duration, poll_interval: Duration) -> Self {
        Self {
            held: Mutex::new(HashSet::new()),
            released: Condvar::new(),
            timeout,
            poll_interval,
        }
    }

    /// Waits until `course` is free, then takes it.
    ///
    /// # Errors
    ///
    /// Returns `LockTimeout` if the course is still held by another
    /// orchestration (in this or another process) after the timeout.
    pub fn acquire(&self, course: &Course) -> Result<CourseLockGuard<'_>> {
        let deadline = Instant::now() + self.timeout;

        {
            let held = self.held.lock().unwrap_or_else(PoisonError::into_inner);
            let (mut held, wait) = self
                .released
                .wait_timeout_while(held, self.timeout, |held| held.contains(&course.id))
                .unwrap_or_else(PoisonError::into_inner);
            if wait.timed_out() && held.contains(&course.id) {
                warn!(course = %course.id, "timed out waiting for in-process course lock");
                return Err(EditError::LockTimeout {
                    course: course.id.to_string(),
                });
            }
            held.insert(course.id.clone());
        }

        match self.lock_file(course, deadline) {
            Ok(file) => {
                debug!(course = %course.id, "course lock acquired");
                Ok(CourseLockGuard {
                    locks: self,
                    course: course.id.clone(),
                    file,
                })
            }
            Err(e) => {
                self.release(&course.id);
                Err(e)
            }
        }
    }

    fn lock_file(&self, course: &Course, deadline: Instant) -> Result<File> {
        let dir = course.path.join(META_DIR);
        fs::create_dir_all(&dir)?;
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(dir.join(LOCK_FILE))?;

        loop {
            match file.try_lock_exclusive() {
                Ok(()) => return Ok(file),
                Err(_) if Instant::now() >= deadline => {
                    warn!(course = %course.id, "timed out waiting for course lock file");
                    return Err(EditError::LockTimeout {
                        course: course.id.to_string(),
                    });
                }
                Err(_) => std::thread::sleep(self.poll_interval),
            }
        }
    }

    fn release(&self, course: &CourseId) {
        let mut held = self.held.lock().unwrap_or_else(PoisonError::into_inner);
        held.remove(course);
        self.released.notify_all();
    }

    /// Returns true if an orchestration in this process holds `course`.
    pub fn is_held(&self, course: &CourseId) -> bool {
        self.held
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(course)
    }
}

/// Exclusive hold on one course. Dropping it releases the course.
#[derive(Debug)]
pub struct CourseLockGuard<'a> {
    locks: &'a CourseLocks,
    course: CourseId,
    file: File,
}

impl CourseLockGuard<'_> {
    pub fn course(&self) -> &CourseId {
        &self.course
    }
}

impl Drop for CourseLockGuard<'_> {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
        self.locks.release(&self.course);
        debug!(course = %self.course, "course lock released");
    }
}
