use super::{check_course_editable, ResourceId, StepOutcome};
use crate::context::RequestContext;
use crate::error::{EditError, Result};
use crate::working_copy::{parent_of, PathScope, WorkingCopy};
use tracing::debug;

/// Removes a file or directory.
#[derive(Debug, Clone)]
pub struct DeleteEditor {
    scope: PathScope,
    path: String,
    tolerate_missing: bool,
}

impl DeleteEditor {
    pub fn new(scope: PathScope, path: impl Into<String>) -> Self {
        Self {
            scope,
            path: path.into(),
            tolerate_missing: false,
        }
    }

    /// Treat an already missing path as a no-op instead of `NotFound`.
    pub fn tolerate_missing(mut self, tolerate: bool) -> Self {
        self.tolerate_missing = tolerate;
        self
    }

    pub fn label(&self) -> String {
        format!("Delete {}", self.path)
    }

    pub fn validate(&self, ctx: &RequestContext) -> Result<()> {
        check_course_editable(ctx)?;
        self.scope.check(&self.path)
    }

    pub fn apply(&self, wc: &WorkingCopy) -> Result<StepOutcome> {
        let resource = ResourceId {
            path: parent_of(&self.path).to_string(),
            uuid: None,
        };

        if !wc.exists(&self.path) {
            if self.tolerate_missing {
                return Ok(StepOutcome {
                    changed: false,
                    output: format!("{} already absent", self.path),
                    resource,
                });
            }
            return Err(EditError::NotFound(self.path.clone()));
        }

        wc.remove(&self.path)?;
        debug!(path = %self.path, "delete applied");

        Ok(StepOutcome {
            changed: true,
            output: format!("deleted {}", self.path),
            resource,
        })
    }
}
