use super::{check_course_editable, ResourceId, StepOutcome};
use crate::context::RequestContext;
use crate::error::{EditError, Result};
use crate::format::InfoFile;
use crate::working_copy::{PathScope, WorkingCopy};
use serde_json::{json, Value};
use std::fmt;
use tracing::debug;
use uuid::Uuid;

/// Highest `New_N` suffix tried when no name is given.
pub const DEFAULT_MAX_NEW_SUFFIX: u32 = 100;

/// Kind of entity an [`AddEditor`] creates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    CourseInstance,
    Assessment,
    Question,
}

impl EntityKind {
    /// Name of the info file at the top of the entity directory.
    pub fn info_file(self) -> &'static str {
        match self {
            Self::CourseInstance => "infoCourseInstance.json",
            Self::Assessment => "infoAssessment.json",
            Self::Question => "info.json",
        }
    }

    fn scaffold(self, uuid: Uuid, title: &str, number: &str) -> Value {
        match self {
            Self::CourseInstance => json!({
                "uuid": uuid.to_string(),
                "longName": title,
            }),
            Self::Assessment => json!({
                "uuid": uuid.to_string(),
                "type": "Homework",
                "title": title,
                "set": "Homework",
                "number": number,
                "allowAccess": [],
                "zones": [],
            }),
            Self::Question => json!({
                "uuid": uuid.to_string(),
                "title": title,
                "topic": "Default",
                "type": "v3",
            }),
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::CourseInstance => "course instance",
            Self::Assessment => "assessment",
            Self::Question => "question",
        })
    }
}

/// Creates a new entity directory holding a scaffold info file.
///
/// The uuid is fixed at construction so the caller can look the new entity
/// up by it once the job has run.
#[derive(Debug, Clone)]
pub struct AddEditor {
    scope: PathScope,
    kind: EntityKind,
    parent: String,
    name: Option<String>,
    uuid: Uuid,
    max_suffix: u32,
}

impl AddEditor {
    /// Adds a `New_<N>` entity inside `parent`, e.g. `courseInstances`.
    pub fn new(scope: PathScope, kind: EntityKind, parent: impl Into<String>) -> Self {
        Self {
            scope,
            kind,
            parent: parent.into().trim_end_matches('/').to_string(),
            name: None,
            uuid: Uuid::new_v4(),
            max_suffix: DEFAULT_MAX_NEW_SUFFIX,
        }
    }

    /// Uses `name` instead of the first free `New_<N>`.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn max_suffix(mut self, max: u32) -> Self {
        self.max_suffix = max;
        self
    }

    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    pub fn label(&self) -> String {
        match &self.name {
            Some(name) => format!("Add {} {}", self.kind, self.child(name)),
            None => format!("Add {} in {}", self.kind, self.parent),
        }
    }

    pub fn validate(&self, ctx: &RequestContext) -> Result<()> {
        check_course_editable(ctx)?;
        match &self.name {
            Some(name) if name.contains('/') => Err(EditError::Validation(format!(
                "entity name {} must be a single path component",
                name
            ))),
            Some(name) => self.scope.check(&self.child(name)),
            None => self.scope.check(&self.child("New_1")),
        }
    }

    pub fn apply(&self, wc: &WorkingCopy) -> Result<StepOutcome> {
        let (dest, title, number) = match &self.name {
            Some(name) => {
                let dest = self.child(name);
                if wc.exists(&dest) {
                    return Err(EditError::PathConflict(dest));
                }
                (dest, name.clone(), "1".to_string())
            }
            None => {
                let n = self.free_number(wc)?;
                (
                    self.child(&format!("New_{}", n)),
                    format!("New ({})", n),
                    n.to_string(),
                )
            }
        };

        let info = InfoFile::new(self.kind.scaffold(self.uuid, &title, &number));
        let info_path = format!("{}/{}", dest, self.kind.info_file());
        wc.write_atomic(&info_path, &info.to_bytes()?)?;
        debug!(kind = %self.kind, path = %dest, uuid = %self.uuid, "add applied");

        Ok(StepOutcome {
            changed: true,
            output: format!("created {} {} ({})", self.kind, dest, self.uuid),
            resource: ResourceId {
                path: dest,
                uuid: Some(self.uuid),
            },
        })
    }

    fn child(&self, name: &str) -> String {
        if self.parent.is_empty() {
            name.to_string()
        } else {
            format!("{}/{}", self.parent, name)
        }
    }

    fn free_number(&self, wc: &WorkingCopy) -> Result<u32> {
        (1..=self.max_suffix)
            .find(|n| !wc.exists(&self.child(&format!("New_{}", n))))
            .ok_or_else(|| {
                EditError::PathConflict(format!(
                    "no free name in {} after {} attempts",
                    self.parent, self.max_suffix
                ))
            })
    }
}
