//! Snapshot data types stored in the course object store.

use crate::ObjectId;
use serde::{Deserialize, Serialize};

/// One recorded state of a course working copy.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Commit {
    /// Parent commit IDs. Empty for the initial commit.
    pub parents: Vec<ObjectId>,
    /// Timestamp (Unix seconds).
    pub timestamp_unix: u64,
    /// Commit message, usually the orchestration description.
    pub message: String,
    /// User on whose behalf the commit was made.
    pub author: String,
    /// Root tree snapshot.
    pub root_tree: ObjectId,
}

/// File hierarchy tree.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Tree {
    /// Sorted list of entries (MUST be sorted by name for determinism).
    pub entries: Vec<TreeEntry>,
}

impl Tree {
    /// Creates a new tree, sorting entries by name.
    pub fn new(mut entries: Vec<TreeEntry>) -> Self {
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Self { entries }
    }
}

/// Entry in a tree.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    /// File or directory name.
    pub name: String,
    pub kind: TreeEntryKind,
    /// Blob or subtree id.
    pub id: ObjectId,
}

#[repr(u8)]
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeEntryKind {
    /// Regular file (blob).
    Blob = 1,
    /// Directory (subtree).
    Tree = 2,
}
