//! Feedback DTOs exchanged with the source-control host

use serde::{Deserialize, Serialize};

use crate::domain::environment::EnvironmentStatus;
use crate::domain::task::{RecyclePolicy, TaskStatus};

/// One entry of a changeset between two revisions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDiff {
    pub old_path: String,
    pub new_path: String,
}

/// Discussion created on a merge request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedDiscussion {
    pub discussion_id: String,
    /// First note of the discussion, if the host returned one
    pub note_id: Option<i64>,
}

/// Partial edit of a discussion note
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteUpdate {
    pub body: Option<String>,
    pub resolved: Option<bool>,
}

/// Environment and task progress pushed to a merge request thread
///
/// Every field except the product may be missing while the environment is
/// still being created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSummary {
    pub product_name: String,
    pub env_name: Option<String>,
    pub env_status: Option<String>,
    pub recycle_policy: RecyclePolicy,
    pub task_id: Option<u64>,
    pub task_status: Option<TaskStatus>,
}

impl StatusSummary {
    pub fn new(product_name: impl Into<String>, recycle_policy: RecyclePolicy) -> Self {
        Self {
            product_name: product_name.into(),
            env_name: None,
            env_status: None,
            recycle_policy,
            task_id: None,
            task_status: None,
        }
    }

    pub fn with_env(mut self, env_name: impl Into<String>) -> Self {
        self.env_name = Some(env_name.into());
        self
    }

    pub fn with_env_status(mut self, status: EnvironmentStatus) -> Self {
        self.env_status = Some(status.to_string());
        self
    }

    /// Sets a free-form environment status, e.g. `completed` after deletion
    pub fn with_env_status_label(mut self, label: impl Into<String>) -> Self {
        self.env_status = Some(label.into());
        self
    }

    pub fn with_task(mut self, task_id: u64, status: TaskStatus) -> Self {
        self.task_id = Some(task_id);
        self.task_status = Some(status);
        self
    }
}
