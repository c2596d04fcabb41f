use super::{check_course_editable, entity_uuid, rewrite_info_files, ResourceId, StepOutcome};
use crate::context::RequestContext;
use crate::error::{EditError, Result};
use crate::working_copy::{is_same_or_below, PathScope, WorkingCopy};
use tracing::debug;

/// Default highest `_copyN` suffix tried when no destination is given.
pub const DEFAULT_MAX_COPY_SUFFIX: u32 = 100;

/// Duplicates a file or directory. Every info file in the copy gets a fresh
/// `uuid` and an `id` naming the new location.
#[derive(Debug, Clone)]
pub struct CopyEditor {
    scope: PathScope,
    from: String,
    to: Option<String>,
    max_suffix: u32,
}

impl CopyEditor {
    /// Copies `from` to the first free `<name>_copy<N>` sibling.
    pub fn new(scope: PathScope, from: impl Into<String>) -> Self {
        Self {
            scope,
            from: from.into(),
            to: None,
            max_suffix: DEFAULT_MAX_COPY_SUFFIX,
        }
    }

    /// Copies to an explicit destination instead.
    pub fn to(mut self, to: impl Into<String>) -> Self {
        self.to = Some(to.into());
        self
    }

    pub fn max_suffix(mut self, max: u32) -> Self {
        self.max_suffix = max;
        self
    }

    pub fn label(&self) -> String {
        match &self.to {
            Some(to) => format!("Copy {} to {}", self.from, to),
            None => format!("Copy {}", self.from),
        }
    }

    pub fn validate(&self, ctx: &RequestContext) -> Result<()> {
        check_course_editable(ctx)?;
        self.scope.check(&self.from)?;
        if let Some(to) = &self.to {
            self.scope.check(to)?;
            if is_same_or_below(to, &self.from) {
                return Err(EditError::Validation(format!(
                    "cannot copy {} onto or inside itself ({})",
                    self.from, to
                )));
            }
        }
        Ok(())
    }

    pub fn apply(&self, wc: &WorkingCopy) -> Result<StepOutcome> {
        if !wc.exists(&self.from) {
            return Err(EditError::NotFound(self.from.clone()));
        }

        let (dest, suffix) = match &self.to {
            Some(to) if wc.exists(to) => return Err(EditError::PathConflict(to.clone())),
            Some(to) => (to.clone(), None),
            None => {
                let (dest, n) = self.free_copy_name(wc)?;
                (dest, Some(n))
            }
        };

        wc.copy_tree(&self.from, &dest)?;

        let old_name = self.scope.entity_name(&self.from);
        let new_name = self.scope.entity_name(&dest);
        let title_suffix = suffix.map(|n| format!(" (copy {})", n));
        let rewritten = rewrite_info_files(wc, &dest, |info| {
            let mut changed = info.regenerate_uuid().is_some();
            changed |= info.rename_id(old_name, new_name);
            if let Some(s) = &title_suffix {
                changed |= info.suffix_title(s);
            }
            changed
        })?;
        debug!(from = %self.from, to = %dest, rewritten, "copy applied");

        Ok(StepOutcome {
            changed: true,
            output: format!(
                "copied {} to {} ({} info files updated)",
                self.from, dest, rewritten
            ),
            resource: ResourceId {
                uuid: entity_uuid(wc, &dest),
                path: dest,
            },
        })
    }

    fn free_copy_name(&self, wc: &WorkingCopy) -> Result<(String, u32)> {
        let is_dir = wc.is_dir(&self.from);
        for n in 1..=self.max_suffix {
            let candidate = copy_name(&self.from, n, is_dir);
            if !wc.exists(&candidate) && self.scope.check(&candidate).is_ok() {
                return Ok((candidate, n));
            }
        }
        Err(EditError::PathConflict(format!(
            "no free copy name for {} after {} attempts",
            self.from, self.max_suffix
        )))
    }
}

/// `hw1` -> `hw1_copy2`; `notes.md` -> `notes_copy2.md`.
fn copy_name(path: &str, n: u32, is_dir: bool) -> String {
    let (parent, name) = match path.rfind('/') {
        Some(i) => (&path[..=i], &path[i + 1..]),
        None => ("", path),
    };
    match name.rfind('.').filter(|&i| i > 0 && !is_dir) {
        Some(i) => format!("{}{}_copy{}{}", parent, &name[..i], n, &name[i..]),
        None => format!("{}{}_copy{}", parent, name, n),
    }
}
