use super::{check_course_editable, entity_uuid, ResourceId, StepOutcome};
use crate::context::RequestContext;
use crate::error::{EditError, Result};
use crate::fingerprint::{fingerprint, fingerprint_file, ContentFingerprint};
use crate::format::ContentFormat;
use crate::working_copy::{PathScope, WorkingCopy};
use tracing::debug;

/// Replaces one file's contents, guarded by the fingerprint the caller read.
#[derive(Debug, Clone)]
pub struct ModifyEditor {
    scope: PathScope,
    path: String,
    origin: ContentFingerprint,
    content: Vec<u8>,
}

impl ModifyEditor {
    /// `origin` is the fingerprint of the file as the caller last saw it.
    /// Pass [`ContentFingerprint::absent`] to create a new file.
    pub fn new(
        scope: PathScope,
        path: impl Into<String>,
        origin: ContentFingerprint,
        content: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            scope,
            path: path.into(),
            origin,
            content: content.into(),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn label(&self) -> String {
        format!("Modify {}", self.path)
    }

    pub fn validate(&self, ctx: &RequestContext) -> Result<()> {
        check_course_editable(ctx)?;
        self.scope.check(&self.path)?;
        ContentFormat::from_path(&self.path).validate(&self.path, &self.content)
    }

    pub fn apply(&self, wc: &WorkingCopy) -> Result<StepOutcome> {
        let current = fingerprint_file(&wc.resolve(&self.path))?;
        if current != self.origin {
            return Err(EditError::ConcurrentModification {
                path: self.path.clone(),
                expected: self.origin.to_string(),
                actual: current.to_string(),
            });
        }

        let changed = fingerprint(&self.content) != current;
        let output = if changed {
            wc.write_atomic(&self.path, &self.content)?;
            format!("wrote {} ({} bytes)", self.path, self.content.len())
        } else {
            format!("{} already up to date", self.path)
        };
        debug!(path = %self.path, changed, "modify applied");

        Ok(StepOutcome {
            changed,
            output,
            resource: ResourceId {
                path: self.path.clone(),
                uuid: entity_uuid(wc, &self.path),
            },
        })
    }
}
