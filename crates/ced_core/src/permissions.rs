//! Permission oracle consumed by the runner.

use crate::config::PermissionsConfig;
use crate::context::{Course, UserId};
use std::collections::HashSet;

/// Answers the two questions the runner asks before creating a job.
///
/// Policy evaluation lives elsewhere; implementations only report results.
pub trait PermissionOracle: Send + Sync {
    fn can_edit_course_content(&self, user: &UserId, course: &Course) -> bool;

    fn is_protected_example_course(&self, course: &Course) -> bool;
}

/// Permissions read from the `[permissions]` config section.
#[derive(Debug, Clone, Default)]
pub struct StaticPermissions {
    allow_all: bool,
    editors: HashSet<String>,
    protected: HashSet<String>,
}

impl StaticPermissions {
    pub fn from_config(config: &PermissionsConfig) -> Self {
        Self {
            allow_all: config.allow_all,
            editors: config.editors.iter().cloned().collect(),
            protected: config.protected_courses.iter().cloned().collect(),
        }
    }

    /// Every user may edit every course that is not protected.
    pub fn allow_all() -> Self {
        Self::from_config(&PermissionsConfig::default())
    }
}

impl PermissionOracle for StaticPermissions {
    fn can_edit_course_content(&self, user: &UserId, _course: &Course) -> bool {
        self.allow_all || self.editors.contains(user.as_str())
    }

    fn is_protected_example_course(&self, course: &Course) -> bool {
        course.example_course || self.protected.contains(course.id.as_str())
    }
}
