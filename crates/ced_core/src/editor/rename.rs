use super::{check_course_editable, entity_uuid, rewrite_info_files, ResourceId, StepOutcome};
use crate::context::RequestContext;
use crate::error::{EditError, Result};
use crate::working_copy::{is_same_or_below, PathScope, WorkingCopy};
use tracing::debug;

/// Moves a file or directory and rewrites the `id` fields that name it.
#[derive(Debug, Clone)]
pub struct RenameEditor {
    scope: PathScope,
    from: String,
    to: String,
}

impl RenameEditor {
    pub fn new(scope: PathScope, from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            scope,
            from: from.into(),
            to: to.into(),
        }
    }

    pub fn label(&self) -> String {
        format!("Rename {} to {}", self.from, self.to)
    }

    pub fn validate(&self, ctx: &RequestContext) -> Result<()> {
        check_course_editable(ctx)?;
        self.scope.check(&self.from)?;
        self.scope.check(&self.to)?;
        if self.to != self.from && is_same_or_below(&self.to, &self.from) {
            return Err(EditError::Validation(format!(
                "cannot move {} inside itself ({})",
                self.from, self.to
            )));
        }
        Ok(())
    }

    pub fn apply(&self, wc: &WorkingCopy) -> Result<StepOutcome> {
        if !wc.exists(&self.from) {
            return Err(EditError::NotFound(self.from.clone()));
        }
        if self.from == self.to {
            return Ok(StepOutcome {
                changed: false,
                output: format!("{} already at requested path", self.from),
                resource: ResourceId {
                    path: self.to.clone(),
                    uuid: entity_uuid(wc, &self.to),
                },
            });
        }
        if wc.exists(&self.to) {
            return Err(EditError::PathConflict(self.to.clone()));
        }

        wc.move_path(&self.from, &self.to)?;

        let old_name = self.scope.entity_name(&self.from);
        let new_name = self.scope.entity_name(&self.to);
        let rewritten = rewrite_info_files(wc, &self.to, |info| info.rename_id(old_name, new_name))?;
        debug!(from = %self.from, to = %self.to, rewritten, "rename applied");

        Ok(StepOutcome {
            changed: true,
            output: format!(
                "moved {} to {} ({} info files updated)",
                self.from, self.to, rewritten
            ),
            resource: ResourceId {
                path: self.to.clone(),
                uuid: entity_uuid(wc, &self.to),
            },
        })
    }
}
