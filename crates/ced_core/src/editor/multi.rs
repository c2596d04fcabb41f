use super::Editor;
use crate::context::RequestContext;
use crate::error::{EditError, Result};

/// An ordered group of editors that shares one job sequence and one commit.
///
/// Children run strictly in declaration order. The first failure stops the
/// group; changes made by earlier children stay in the working copy.
#[derive(Debug, Clone)]
pub struct MultiEditor {
    description: String,
    children: Vec<Editor>,
}

impl MultiEditor {
    pub fn new(description: impl Into<String>, children: Vec<Editor>) -> Self {
        Self {
            description: description.into(),
            children,
        }
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn children(&self) -> &[Editor] {
        &self.children
    }

    pub fn validate(&self, ctx: &RequestContext) -> Result<()> {
        if self.children.is_empty() {
            return Err(EditError::Validation(format!(
                "{}: no edits to apply",
                self.description
            )));
        }
        for child in &self.children {
            if matches!(child, Editor::Multi(_)) {
                return Err(EditError::Validation(
                    "multi-editors cannot be nested".to_string(),
                ));
            }
            child.validate(ctx)?;
        }
        Ok(())
    }
}
