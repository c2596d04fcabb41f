//! Durable recording of working-copy changes.
//!
//! After an orchestration applied its changes, the runner calls
//! [`ContentRepository::commit_and_sync`] once. [`SnapshotRepository`]
//! snapshots the whole working copy into the course's content-addressed
//! object store, advances `HEAD` and `refs/main`, and pushes every object
//! the remote is missing.
//!
//! Layout inside a course:
//!
//! ```text
//! <course>/.course/objects/ab/abcd...   blobs, trees, commits
//! <course>/.course/HEAD                 current commit
//! <course>/.course/refs/main            same, as a named ref
//! <remote_root>/<course-id>/objects/    pushed objects
//! <remote_root>/<course-id>/refs/main   last pushed commit
//! ```

use crate::config::RepositoryConfig;
use crate::context::{Course, UserId};
use crate::error::{EditError, Result};
use crate::refs::{Refs, MAIN_REF};
use crate::types::{Commit, Tree, TreeEntry, TreeEntryKind};
use crate::working_copy::META_DIR;
use crate::{ObjectId, ObjectStore, SystemClock, TimeProvider};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Result of a successful commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitReceipt {
    pub commit: ObjectId,
    /// True if the commit was pushed to a remote.
    pub synced: bool,
}

/// Durable persistence of a course working copy.
pub trait ContentRepository: Send + Sync {
    /// Records every working-copy change since the last commit and pushes it.
    ///
    /// # Errors
    ///
    /// Any failure is reported as `RepositorySync`; the working copy is left
    /// as it is.
    fn commit_and_sync(&self, course: &Course, message: &str, author: &UserId)
        -> Result<CommitReceipt>;
}

/// Snapshot-based repository stored under `<course>/.course`.
pub struct SnapshotRepository {
    config: RepositoryConfig,
    clock: Arc<dyn TimeProvider>,
}

impl SnapshotRepository {
    pub fn new(config: RepositoryConfig) -> Self {
        Self {
            config,
            clock: Arc::new(SystemClock),
        }
    }

    /// Sets a custom time provider for commit timestamps.
    pub fn with_time_provider(mut self, clock: Arc<dyn TimeProvider>) -> Self {
        self.clock = clock;
        self
    }

    /// Creates course metadata and records the initial snapshot.
    ///
    /// Does nothing if the course already has a commit.
    pub fn init(&self, course: &Course) -> Result<ObjectId> {
        fs::create_dir_all(course.path.join(META_DIR).join("objects"))?;
        if let Some(head) = self.refs(course).read_head()? {
            return Ok(head);
        }
        let author = UserId::new(self.config.author_fallback.clone());
        let receipt = self.commit_and_sync(course, "Initial snapshot", &author)?;
        Ok(receipt.commit)
    }

    /// Returns up to `limit` commits, newest first, following first parents.
    pub fn history(&self, course: &Course, limit: usize) -> Result<Vec<(ObjectId, Commit)>> {
        let store = self.store(course);
        let mut out = Vec::new();
        let mut next = self.refs(course).read_head()?;
        while let Some(id) = next {
            if out.len() >= limit {
                break;
            }
            let commit: Commit = store.get_typed(id)?;
            next = commit.parents.first().copied();
            out.push((id, commit));
        }
        Ok(out)
    }

    /// Lists every file path recorded in the HEAD snapshot, sorted.
    pub fn head_tree_paths(&self, course: &Course) -> Result<Vec<String>> {
        let Some(head) = self.refs(course).read_head()? else {
            return Ok(Vec::new());
        };
        let store = self.store(course);
        let commit: Commit = store.get_typed(head)?;
        let mut out = Vec::new();
        collect_tree_paths(&store, commit.root_tree, "", &mut out)?;
        out.sort();
        Ok(out)
    }

    /// Reads one file from the HEAD snapshot.
    pub fn head_file(&self, course: &Course, path: &str) -> Result<Option<Vec<u8>>> {
        let Some(head) = self.refs(course).read_head()? else {
            return Ok(None);
        };
        let store = self.store(course);
        let commit: Commit = store.get_typed(head)?;
        let mut tree_id = commit.root_tree;
        let mut components = path.split('/').peekable();
        while let Some(name) = components.next() {
            let tree: Tree = store.get_typed(tree_id)?;
            let Some(entry) = tree.entries.iter().find(|e| e.name == name) else {
                return Ok(None);
            };
            match (entry.kind, components.peek().is_some()) {
                (TreeEntryKind::Tree, true) => tree_id = entry.id,
                (TreeEntryKind::Blob, false) => return store.get_blob(entry.id).map(Some),
                _ => return Ok(None),
            }
        }
        Ok(None)
    }

    /// Returns the commit last pushed to the remote, if any.
    pub fn remote_head(&self, course: &Course) -> Result<Option<ObjectId>> {
        let Some(remote) = self.remote_dir(course) else {
            return Ok(None);
        };
        match Refs::new(remote).read_ref(MAIN_REF) {
            Ok(id) => Ok(Some(id)),
            Err(EditError::RefNotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn store(&self, course: &Course) -> ObjectStore {
        ObjectStore::new(course.path.join(META_DIR).join("objects"))
    }

    fn refs(&self, course: &Course) -> Refs {
        Refs::new(course.path.join(META_DIR))
    }

    fn remote_dir(&self, course: &Course) -> Option<PathBuf> {
        let root = self.config.remote_root.as_ref()?;
        Some(root.join(course.id.as_str().replace(['/', '\\'], "_")))
    }

    fn commit(&self, course: &Course, message: &str, author: &UserId) -> Result<ObjectId> {
        let store = self.store(course);
        let refs = self.refs(course);

        let root_tree = snapshot_dir(&store, &course.path)?;
        let parents: Vec<ObjectId> = refs.read_head()?.into_iter().collect();
        let author = if author.as_str().is_empty() {
            self.config.author_fallback.clone()
        } else {
            author.to_string()
        };
        let commit = Commit {
            parents,
            timestamp_unix: self.clock.now().max(0) as u64,
            message: message.to_string(),
            author,
            root_tree,
        };
        let id = store.put_typed(&commit)?;

        refs.write_head(id)?;
        refs.write_ref(MAIN_REF, id)?;

        info!(course = %course.id, commit = %id.short(), "recorded snapshot");
        Ok(id)
    }

    fn sync(&self, course: &Course, commit: ObjectId) -> Result<bool> {
        let Some(remote_dir) = self.remote_dir(course) else {
            return Ok(false);
        };
        let local = self.store(course);
        let remote = ObjectStore::new(remote_dir.join("objects"));

        let copied = push_commits(&local, &remote, commit)?;
        Refs::new(&remote_dir).write_ref(MAIN_REF, commit)?;

        info!(course = %course.id, commit = %commit.short(), commits = copied, "synced to remote");
        Ok(true)
    }
}

impl ContentRepository for SnapshotRepository {
    fn commit_and_sync(
        &self,
        course: &Course,
        message: &str,
        author: &UserId,
    ) -> Result<CommitReceipt> {
        let result = self.commit(course, message, author).and_then(|commit| {
            self.sync(course, commit)
                .map(|synced| CommitReceipt { commit, synced })
        });
        result.map_err(|e| {
            warn!(course = %course.id, error = %e, "commit and sync failed");
            match e {
                EditError::RepositorySync(_) => e,
                other => EditError::RepositorySync(other.to_string()),
            }
        })
    }
}

/// Stores a directory recursively and returns its tree id.
///
/// Dot entries (the metadata directory, temp files) are skipped.
fn snapshot_dir(store: &ObjectStore, dir: &Path) -> Result<ObjectId> {
    let mut entries = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let Some(name) = entry.file_name().to_str().map(str::to_string) else {
            continue;
        };
        if name.starts_with('.') {
            continue;
        }
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            entries.push(TreeEntry {
                name,
                kind: TreeEntryKind::Tree,
                id: snapshot_dir(store, &entry.path())?,
            });
        } else if file_type.is_file() {
            let data = fs::read(entry.path())?;
            entries.push(TreeEntry {
                name,
                kind: TreeEntryKind::Blob,
                id: store.put_blob(&data)?,
            });
        }
    }
    store.put_typed(&Tree::new(entries))
}

fn collect_tree_paths(
    store: &ObjectStore,
    tree_id: ObjectId,
    prefix: &str,
    out: &mut Vec<String>,
) -> Result<()> {
    let tree: Tree = store.get_typed(tree_id)?;
    for entry in tree.entries {
        let path = if prefix.is_empty() {
            entry.name
        } else {
            format!("{}/{}", prefix, entry.name)
        };
        match entry.kind {
            TreeEntryKind::Blob => out.push(path),
            TreeEntryKind::Tree => collect_tree_paths(store, entry.id, &path, out)?,
        }
    }
    Ok(())
}

/// Copies every commit reachable from `head` that the remote lacks.
///
/// Objects are written children first, so a commit present on the remote
/// always has its complete history and trees.
fn push_commits(local: &ObjectStore, remote: &ObjectStore, head: ObjectId) -> Result<usize> {
    let mut pending = vec![head];
    let mut missing: Vec<(ObjectId, Commit)> = Vec::new();
    while let Some(id) = pending.pop() {
        if remote.exists(id) || missing.iter().any(|(m, _)| *m == id) {
            continue;
        }
        let commit: Commit = local.get_typed(id)?;
        pending.extend(commit.parents.iter().copied());
        missing.push((id, commit));
    }

    for (id, commit) in missing.iter().rev() {
        push_tree(local, remote, commit.root_tree)?;
        local.copy_to(*id, remote)?;
        debug!(commit = %id.short(), "pushed commit");
    }
    Ok(missing.len())
}

fn push_tree(local: &ObjectStore, remote: &ObjectStore, tree_id: ObjectId) -> Result<()> {
    if remote.exists(tree_id) {
        return Ok(());
    }
    let tree: Tree = local.get_typed(tree_id)?;
    for entry in &tree.entries {
        match entry.kind {
            TreeEntryKind::Blob => local.copy_to(entry.id, remote)?,
            TreeEntryKind::Tree => push_tree(local, remote, entry.id)?,
        }
    }
    local.copy_to(tree_id, remote)
}
