//! Pipeline task domain types

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What happens to an ephemeral environment once its pipeline run ends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecyclePolicy {
    /// Delete regardless of the run's outcome
    Always,
    /// Delete only when the run passed
    #[serde(rename = "success")]
    OnSuccess,
    /// Keep the environment until an operator deletes it
    #[default]
    Never,
}

impl RecyclePolicy {
    /// Whether an environment should be deleted after a run ending in `status`
    pub fn should_recycle(self, status: TaskStatus) -> bool {
        match self {
            RecyclePolicy::Always => true,
            RecyclePolicy::OnSuccess => status == TaskStatus::Passed,
            RecyclePolicy::Never => false,
        }
    }
}

/// Origin of a task invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskSource {
    #[default]
    Manual,
    Gitlab,
}

/// Repository checked out by a build target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryRef {
    pub codehost_id: i64,
    pub repo_owner: String,
    pub repo_name: String,
    pub branch: String,
    #[serde(default)]
    pub pr: u64,
}

impl RepositoryRef {
    /// Whether `self` points at the same repository as `other`
    pub fn same_repository(&self, other: &RepositoryRef) -> bool {
        self.codehost_id == other.codehost_id
            && self.repo_owner == other.repo_owner
            && self.repo_name == other.repo_name
    }
}

/// Service build selected by a pipeline invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildTarget {
    pub service_name: String,
    #[serde(default)]
    pub repos: Vec<RepositoryRef>,
}

/// Arguments of a single pipeline invocation
///
/// Stored on a trigger hook as a template; the trigger engine copies it and
/// overlays the resolved event identity before creating the run.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TaskInvocationArgs {
    pub pipeline_name: String,
    pub product_tmpl_name: String,
    /// Target environment; may list several, comma separated
    pub namespace: String,
    /// Environment cloned per merge request; empty disables ephemeral mode
    #[serde(default)]
    pub base_namespace: String,
    #[serde(default)]
    pub env_recycle_policy: RecyclePolicy,
    #[serde(default)]
    pub request_id: String,
    #[serde(default)]
    pub codehost_id: i64,
    #[serde(default)]
    pub repo_owner: String,
    #[serde(default)]
    pub repo_name: String,
    #[serde(default)]
    pub branch: String,
    /// Merge request number, zero when not applicable
    #[serde(default)]
    pub pr_id: u64,
    #[serde(default)]
    pub commit_id: String,
    #[serde(default)]
    pub merge_request_id: String,
    #[serde(default)]
    pub source: TaskSource,
    #[serde(default)]
    pub notification_id: Option<Uuid>,
    #[serde(default)]
    pub targets: Vec<BuildTarget>,
}

impl TaskInvocationArgs {
    /// First environment listed in `namespace`
    pub fn primary_namespace(&self) -> &str {
        self.namespace.split(',').next().unwrap_or_default().trim()
    }

    /// Whether runs of this template get their own cloned environment
    pub fn is_ephemeral(&self) -> bool {
        !self.base_namespace.trim().is_empty()
    }
}

/// Pipeline execution status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Created,
    Queued,
    Running,
    Passed,
    Failed,
    Timeout,
    Cancelled,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskStatus::Passed | TaskStatus::Failed | TaskStatus::Timeout | TaskStatus::Cancelled
        )
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TaskStatus::Created => "created",
            TaskStatus::Queued => "queued",
            TaskStatus::Running => "running",
            TaskStatus::Passed => "passed",
            TaskStatus::Failed => "failed",
            TaskStatus::Timeout => "timeout",
            TaskStatus::Cancelled => "cancelled",
        };
        write!(f, "{}", s)
    }
}

/// In-flight pipeline run as seen by the auto-cancel coordinator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunningExecution {
    pub task_id: u64,
    pub pipeline_name: String,
    pub status: TaskStatus,
    pub merge_request_id: String,
    pub commit_id: String,
    pub codehost_id: i64,
    pub repo_owner: String,
    pub repo_name: String,
}
