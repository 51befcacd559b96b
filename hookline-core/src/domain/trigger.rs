//! Trigger rule domain types

use serde::{Deserialize, Serialize};

/// Event kinds a trigger rule can be enabled for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookEvent {
    Push,
    PullRequest,
    Tag,
}

/// Filter binding a repository, branch and path pattern to a pipeline
///
/// `branch` is either an exact branch name or, when `is_regular` is set,
/// a regular expression. A successful match overwrites `branch` with the
/// concrete branch of the event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerRule {
    pub codehost_id: i64,
    pub repo_owner: String,
    pub repo_name: String,
    pub branch: String,
    #[serde(default)]
    pub is_regular: bool,
    #[serde(default)]
    pub events: Vec<HookEvent>,
    /// Path prefixes that qualify a change; `!`-prefixed entries exclude
    #[serde(default)]
    pub match_folders: Vec<String>,
    #[serde(default = "default_auto_cancel")]
    pub auto_cancel: bool,
}

fn default_auto_cancel() -> bool {
    true
}

impl TriggerRule {
    /// `owner/name` path, comparable with an event's project path
    pub fn project_path(&self) -> String {
        format!("{}/{}", self.repo_owner, self.repo_name)
    }

    /// Whether the rule is enabled for the given event kind
    pub fn is_enabled_for(&self, event: HookEvent) -> bool {
        self.events.contains(&event)
    }
}
