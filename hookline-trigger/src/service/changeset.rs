//! Change-set resolution and path filtering
//!
//! Resolves the files an event touched through the code host and decides
//! whether they qualify for a trigger rule's path filter.

use std::sync::Arc;

use hookline_core::domain::event::{MergeRequestEvent, PushEvent};

use crate::error::CodehostError;
use crate::repository::CodehostClient;

/// Path filter entry that includes every file
const ROOT_FOLDER: &str = "/";

/// Resolves changed files for source-control events
pub struct ChangesetResolver {
    codehost: Arc<dyn CodehostClient>,
}

impl ChangesetResolver {
    pub fn new(codehost: Arc<dyn CodehostClient>) -> Self {
        Self { codehost }
    }

    /// Files touched between the `before` and `after` revisions of a push
    ///
    /// Both sides of every diff entry are reported so that renames and moves
    /// qualify on either path.
    pub async fn push_changes(
        &self,
        codehost_id: i64,
        event: &PushEvent,
    ) -> Result<Vec<String>, CodehostError> {
        let diffs = self
            .codehost
            .compare(
                codehost_id,
                &event.path_with_namespace,
                &event.before,
                &event.after,
            )
            .await?;

        let mut files = Vec::with_capacity(diffs.len() * 2);
        for diff in diffs {
            if diff.old_path != diff.new_path {
                files.push(diff.old_path);
            }
            files.push(diff.new_path);
        }

        Ok(files)
    }

    /// Files touched by a merge request
    pub async fn merge_request_changes(
        &self,
        codehost_id: i64,
        event: &MergeRequestEvent,
    ) -> Result<Vec<String>, CodehostError> {
        self.codehost
            .merge_request_changes(codehost_id, &event.target_path_with_namespace, event.iid)
            .await
    }
}

/// Whether a changeset qualifies for a rule's `match_folders` filter
///
/// Entries prefixed with `!` exclude; the rest include by path prefix. No
/// include entries, or a `/` entry, includes every file. An exclusion hits a
/// file when it is `/` or a prefix or suffix of the path, so `!.md` excludes
/// markdown files and `!docs/` a directory. The changeset qualifies when at
/// least one file is included and not excluded.
pub fn match_changes(match_folders: &[String], files: &[String]) -> bool {
    let (excludes, includes): (Vec<&str>, Vec<&str>) = match_folders
        .iter()
        .map(|folder| folder.trim())
        .filter(|folder| !folder.is_empty())
        .partition(|folder| folder.starts_with('!'));

    let excludes: Vec<&str> = excludes
        .into_iter()
        .map(|exclude| &exclude[1..])
        .filter(|exclude| !exclude.is_empty())
        .collect();

    let include_all = includes.is_empty() || includes.contains(&ROOT_FOLDER);

    files.iter().any(|file| {
        let included = include_all || includes.iter().any(|prefix| file.starts_with(prefix));
        included && !excludes.iter().any(|exclude| is_excluded(file, exclude))
    })
}

fn is_excluded(file: &str, exclude: &str) -> bool {
    exclude == ROOT_FOLDER || file.starts_with(exclude) || file.ends_with(exclude)
}
