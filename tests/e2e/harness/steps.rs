use std::time::Duration;

use super::assertions::Assertion;
use ced_core::{EntityKind, PathScope};

/// One edit request, turned into an editor when the step runs.
#[derive(Debug, Clone)]
pub enum Edit {
    /// Overwrite a file, based on the last `read` of it
    Write { path: String, content: Vec<u8> },
    /// Create a file that must not exist yet
    Create { path: String, content: Vec<u8> },
    Rename { from: String, to: String },
    Copy { from: String, to: Option<String> },
    Delete { path: String, tolerate_missing: bool },
    /// Scaffold a new entity in `parent`
    Add { kind: EntityKind, parent: String },
    Multi { description: String, children: Vec<Edit> },
}

impl Edit {
    pub fn write(path: &str, content: &[u8]) -> Self {
        Self::Write {
            path: path.to_string(),
            content: content.to_vec(),
        }
    }

    pub fn create(path: &str, content: &[u8]) -> Self {
        Self::Create {
            path: path.to_string(),
            content: content.to_vec(),
        }
    }

    pub fn rename(from: &str, to: &str) -> Self {
        Self::Rename {
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    pub fn copy(from: &str) -> Self {
        Self::Copy {
            from: from.to_string(),
            to: None,
        }
    }

    pub fn copy_to(from: &str, to: &str) -> Self {
        Self::Copy {
            from: from.to_string(),
            to: Some(to.to_string()),
        }
    }

    pub fn delete(path: &str) -> Self {
        Self::Delete {
            path: path.to_string(),
            tolerate_missing: false,
        }
    }

    pub fn add(kind: EntityKind, parent: &str) -> Self {
        Self::Add {
            kind,
            parent: parent.to_string(),
        }
    }
}

/// All possible actions in a test scenario
#[derive(Debug)]
pub enum ScenarioStep {
    // Request context
    ActAs { user: String },
    Scope { scope: PathScope },

    // Client actions
    Read { path: String },
    Submit { edit: Edit },

    // Outside interference
    ExternalWrite { path: String, content: Vec<u8> },
    ExternalDelete { path: String },

    // Time control
    Wait { duration: Duration },

    // Drop the runner and reopen the job store
    Restart,

    // Assertions (can be interspersed)
    Assert { assertion: Assertion },
}
