//! Feedback synchronization
//!
//! Keeps one discussion thread per merge request on the code host reflecting
//! trigger, environment and task progress. Thread creation is find-or-create
//! under a per-merge-request lock, so redelivered events reuse the thread.
//! Status pushes and failure comments are best-effort.

use std::sync::Arc;

use hookline_core::domain::discussion::{DiscussionThread, ThreadKey};
use hookline_core::domain::event::MergeRequestEvent;
use hookline_core::domain::trigger::TriggerRule;
use hookline_core::dto::feedback::{NoteUpdate, StatusSummary};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{FeedbackError, RepositoryError};
use crate::repository::{CodehostClient, DiscussionStore};
use crate::service::keyed_lock::KeyedLock;

/// Body of a thread whose head commit has not been processed yet
pub const PENDING_BODY: &str = "Hookline CI is running...";

/// Mirrors trigger progress onto merge request discussions
pub struct FeedbackSynchronizer {
    codehost: Arc<dyn CodehostClient>,
    discussions: Arc<dyn DiscussionStore>,
    base_uri: Option<String>,
    thread_locks: KeyedLock,
}

impl FeedbackSynchronizer {
    pub fn new(
        codehost: Arc<dyn CodehostClient>,
        discussions: Arc<dyn DiscussionStore>,
        base_uri: Option<String>,
    ) -> Self {
        Self {
            codehost,
            discussions,
            base_uri,
            thread_locks: KeyedLock::new(),
        }
    }

    /// Finds or creates the discussion thread of a merge request
    ///
    /// A thread already synchronized to the event's head commit is returned
    /// untouched. A stale one has its note reset to [`PENDING_BODY`] and
    /// re-opened in place. Otherwise a new discussion is opened and recorded.
    pub async fn ensure_thread(
        &self,
        rule: &TriggerRule,
        event: &MergeRequestEvent,
    ) -> Result<DiscussionThread, FeedbackError> {
        let key = ThreadKey {
            codehost_id: rule.codehost_id,
            project_path: rule.project_path(),
            merge_request_iid: event.iid,
        };
        let _guard = self.thread_locks.lock(&lock_key(&key)).await;

        match self.discussions.find_thread(&key).await? {
            Some(thread) if thread.commit_id == event.last_commit_id => Ok(thread),
            Some(thread) => self.reset_thread(thread, &event.last_commit_id).await,
            None => self.create_thread(key, &event.last_commit_id).await,
        }
    }

    async fn reset_thread(
        &self,
        mut thread: DiscussionThread,
        commit_id: &str,
    ) -> Result<DiscussionThread, FeedbackError> {
        match thread.note_id {
            Some(note_id) => {
                self.codehost
                    .update_discussion_note(
                        thread.key.codehost_id,
                        &thread.key.project_path,
                        thread.key.merge_request_iid,
                        &thread.discussion_id,
                        note_id,
                        NoteUpdate {
                            body: Some(PENDING_BODY.to_string()),
                            resolved: Some(false),
                        },
                    )
                    .await?;
            }
            None => warn!(
                discussion = %thread.discussion_id,
                "Discussion has no note to update, keeping remote content"
            ),
        }

        self.discussions
            .update_thread(thread.id, commit_id, PENDING_BODY, false)
            .await?;

        debug!(
            discussion = %thread.discussion_id,
            old_commit = %thread.commit_id,
            new_commit = %commit_id,
            "Discussion thread moved to new head commit"
        );

        thread.commit_id = commit_id.to_string();
        thread.body = PENDING_BODY.to_string();
        thread.resolved = false;
        thread.updated_at = chrono::Utc::now();
        Ok(thread)
    }

    async fn create_thread(
        &self,
        key: ThreadKey,
        commit_id: &str,
    ) -> Result<DiscussionThread, FeedbackError> {
        let created = self
            .codehost
            .create_discussion(
                key.codehost_id,
                &key.project_path,
                key.merge_request_iid,
                PENDING_BODY,
            )
            .await?;

        let thread = DiscussionThread {
            id: Uuid::new_v4(),
            key,
            discussion_id: created.discussion_id,
            note_id: created.note_id,
            commit_id: commit_id.to_string(),
            body: PENDING_BODY.to_string(),
            resolved: false,
            updated_at: chrono::Utc::now(),
        };

        match self.discussions.create_thread(thread.clone()).await {
            Ok(()) => {}
            // Another process recorded the thread first; theirs wins.
            Err(RepositoryError::Rejected(reason)) => {
                warn!(
                    discussion = %thread.discussion_id,
                    "Thread already recorded ({}), reusing existing record", reason
                );
                if let Some(existing) = self.discussions.find_thread(&thread.key).await? {
                    return Ok(existing);
                }
                return Err(RepositoryError::Rejected(reason).into());
            }
            Err(e) => return Err(e.into()),
        }

        info!(
            project = %thread.key.project_path,
            merge_request = thread.key.merge_request_iid,
            discussion = %thread.discussion_id,
            "Created discussion thread"
        );

        Ok(thread)
    }

    /// Pushes environment/task progress to a thread
    ///
    /// Failures are logged and swallowed. Without a thread this is a no-op,
    /// as is a thread that has since moved on to a newer head commit.
    pub async fn sync_status(&self, thread: Option<&DiscussionThread>, summary: &StatusSummary) {
        let Some(thread) = thread else {
            debug!(product = %summary.product_name, "No discussion thread, skipping status sync");
            return;
        };

        if let Err(e) = self.push_status(thread, summary).await {
            warn!(
                discussion = %thread.discussion_id,
                "Failed to sync status to discussion: {}", e
            );
        }
    }

    async fn push_status(
        &self,
        thread: &DiscussionThread,
        summary: &StatusSummary,
    ) -> Result<(), FeedbackError> {
        let _guard = self.thread_locks.lock(&lock_key(&thread.key)).await;

        let current = match self.discussions.find_thread(&thread.key).await? {
            Some(current) if current.commit_id == thread.commit_id => current,
            _ => {
                debug!(
                    discussion = %thread.discussion_id,
                    commit = %thread.commit_id,
                    "Thread moved to another head commit, dropping stale status"
                );
                return Ok(());
            }
        };

        let body = render_status(summary, self.base_uri.as_deref());

        if let Some(note_id) = current.note_id {
            self.codehost
                .update_discussion_note(
                    current.key.codehost_id,
                    &current.key.project_path,
                    current.key.merge_request_iid,
                    &current.discussion_id,
                    note_id,
                    NoteUpdate {
                        body: Some(body.clone()),
                        resolved: None,
                    },
                )
                .await?;
        }

        self.discussions
            .update_thread(current.id, &current.commit_id, &body, current.resolved)
            .await?;

        Ok(())
    }

    /// Posts a failure comment on the merge request a rule fired for
    ///
    /// Pushes have no merge request (`pr_id == 0`) and are skipped.
    pub async fn post_failure(
        &self,
        rule: &TriggerRule,
        pipeline_name: &str,
        error: &(dyn std::error::Error + Send + Sync),
        pr_id: u64,
    ) -> Result<(), FeedbackError> {
        if pr_id == 0 {
            debug!(pipeline = %pipeline_name, "No merge request to report failure on");
            return Ok(());
        }

        let mut body = format!(
            "Pipeline **{}** could not be triggered.\n\n```\n{}\n```",
            pipeline_name, error
        );
        if let Some(base_uri) = &self.base_uri {
            body.push_str(&format!("\n\n[Open Hookline]({})", base_uri));
        }

        self.codehost
            .create_merge_request_note(rule.codehost_id, &rule.project_path(), pr_id, &body)
            .await?;

        Ok(())
    }
}

fn lock_key(key: &ThreadKey) -> String {
    format!("{}:{}!{}", key.codehost_id, key.project_path, key.merge_request_iid)
}

/// Renders a status summary as the markdown body of a thread note
pub fn render_status(summary: &StatusSummary, base_uri: Option<&str>) -> String {
    let mut body = String::from("| Product | Environment | Status | Recycle | Task |\n");
    body.push_str("|---|---|---|---|---|\n");

    let task = match (summary.task_id, summary.task_status) {
        (Some(id), Some(status)) => format!("#{} {}", id, status),
        _ => "-".to_string(),
    };

    body.push_str(&format!(
        "| {} | {} | {} | {:?} | {} |",
        summary.product_name,
        summary.env_name.as_deref().unwrap_or("-"),
        summary.env_status.as_deref().unwrap_or("pending"),
        summary.recycle_policy,
        task,
    ));

    if let (Some(base_uri), Some(env_name)) = (base_uri, summary.env_name.as_deref()) {
        body.push_str(&format!(
            "\n\n[View environment]({}/products/{}/envs/{})",
            base_uri.trim_end_matches('/'),
            summary.product_name,
            env_name
        ));
    }

    body
}
