//! Source-control host client port

use async_trait::async_trait;
use hookline_core::dto::feedback::{CreatedDiscussion, FileDiff, NoteUpdate};

use crate::error::CodehostError;

/// Client for the source-control host (GitLab-class API)
///
/// `project` is always the `owner/name` path of the repository.
#[async_trait]
pub trait CodehostClient: Send + Sync {
    /// Diff entries between two revisions of a project
    async fn compare(
        &self,
        codehost_id: i64,
        project: &str,
        before: &str,
        after: &str,
    ) -> Result<Vec<FileDiff>, CodehostError>;

    /// Paths changed by a merge request
    async fn merge_request_changes(
        &self,
        codehost_id: i64,
        project: &str,
        merge_request_iid: u64,
    ) -> Result<Vec<String>, CodehostError>;

    /// Opens a new discussion on a merge request
    async fn create_discussion(
        &self,
        codehost_id: i64,
        project: &str,
        merge_request_iid: u64,
        body: &str,
    ) -> Result<CreatedDiscussion, CodehostError>;

    /// Edits the body and/or resolved flag of a discussion note
    async fn update_discussion_note(
        &self,
        codehost_id: i64,
        project: &str,
        merge_request_iid: u64,
        discussion_id: &str,
        note_id: i64,
        update: NoteUpdate,
    ) -> Result<(), CodehostError>;

    /// Posts a standalone comment on a merge request
    async fn create_merge_request_note(
        &self,
        codehost_id: i64,
        project: &str,
        merge_request_iid: u64,
        body: &str,
    ) -> Result<(), CodehostError>;
}
