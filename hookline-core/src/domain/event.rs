//! Source-control event types
//!
//! One value per webhook delivery, already authenticated and parsed by the
//! transport layer. Deliveries may be duplicated.

use serde::{Deserialize, Serialize};

/// Prefix carried by branch refs in push payloads
const BRANCH_REF_PREFIX: &str = "refs/heads/";

/// A source-control webhook delivery
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "object_kind", rename_all = "snake_case")]
pub enum SourceEvent {
    Push(PushEvent),
    MergeRequest(MergeRequestEvent),
}

impl SourceEvent {
    /// `owner/name` path of the repository the event belongs to
    pub fn project_path(&self) -> &str {
        match self {
            SourceEvent::Push(ev) => &ev.path_with_namespace,
            SourceEvent::MergeRequest(ev) => &ev.target_path_with_namespace,
        }
    }

    /// Branch the event resolves to for filtering purposes
    ///
    /// Push events resolve to the pushed branch, merge requests to their
    /// target branch.
    pub fn resolved_branch(&self) -> &str {
        match self {
            SourceEvent::Push(ev) => branch_from_ref(&ev.git_ref),
            SourceEvent::MergeRequest(ev) => &ev.target_branch,
        }
    }

    /// Returns the merge request payload if this is a merge request event
    pub fn as_merge_request(&self) -> Option<&MergeRequestEvent> {
        match self {
            SourceEvent::MergeRequest(ev) => Some(ev),
            SourceEvent::Push(_) => None,
        }
    }
}

/// Push to a branch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushEvent {
    pub project_id: i64,
    pub path_with_namespace: String,
    #[serde(rename = "ref")]
    pub git_ref: String,
    pub before: String,
    pub after: String,
}

/// Merge request opened or updated
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeRequestEvent {
    pub project_id: i64,
    pub target_path_with_namespace: String,
    pub iid: u64,
    pub source_branch: String,
    pub target_branch: String,
    pub state: MergeRequestState,
    pub last_commit_id: String,
}

/// State reported by the host for a merge request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeRequestState {
    Opened,
    Closed,
    Merged,
    Locked,
    #[serde(other)]
    Unknown,
}

/// Strips the `refs/heads/` prefix from a ref, leaving other refs untouched
pub fn branch_from_ref(git_ref: &str) -> &str {
    git_ref.strip_prefix(BRANCH_REF_PREFIX).unwrap_or(git_ref)
}
