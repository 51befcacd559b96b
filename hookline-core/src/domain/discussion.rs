//! Feedback discussion thread domain types

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identity of a merge request on a code host
///
/// At most one live discussion thread exists per key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ThreadKey {
    pub codehost_id: i64,
    pub project_path: String,
    pub merge_request_iid: u64,
}

/// Discussion thread mirrored on the source-control host
///
/// The external identifiers never change once created; only the content
/// and the synchronized commit do.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscussionThread {
    pub id: Uuid,
    pub key: ThreadKey,
    pub discussion_id: String,
    pub note_id: Option<i64>,
    pub commit_id: String,
    pub body: String,
    pub resolved: bool,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}
