//! Hook matching
//!
//! Decides whether one trigger rule fires for one source-control event.
//! The matcher is resolved once per delivery from the event variant; every
//! rule is then evaluated against it.

use hookline_core::domain::event::{
    MergeRequestEvent, MergeRequestState, PushEvent, SourceEvent, branch_from_ref,
};
use hookline_core::domain::trigger::{HookEvent, TriggerRule};
use regex::Regex;
use tracing::{debug, warn};

use crate::error::TriggerError;
use crate::service::changeset::{ChangesetResolver, match_changes};

/// Result of evaluating a rule against an event
#[derive(Debug)]
pub enum MatchOutcome {
    Matched,
    NotMatched,
    /// The changeset could not be retrieved; the rule was not decided
    Failed(TriggerError),
}

impl MatchOutcome {
    pub fn is_matched(&self) -> bool {
        matches!(self, MatchOutcome::Matched)
    }
}

/// Event-specific matcher
#[derive(Debug, Clone, Copy)]
pub enum HookMatcher<'a> {
    Push(&'a PushEvent),
    MergeRequest(&'a MergeRequestEvent),
}

impl<'a> HookMatcher<'a> {
    pub fn for_event(event: &'a SourceEvent) -> Self {
        match event {
            SourceEvent::Push(ev) => HookMatcher::Push(ev),
            SourceEvent::MergeRequest(ev) => HookMatcher::MergeRequest(ev),
        }
    }

    /// Event kind a rule must be enabled for
    pub fn hook_event(&self) -> HookEvent {
        match self {
            HookMatcher::Push(_) => HookEvent::Push,
            HookMatcher::MergeRequest(_) => HookEvent::PullRequest,
        }
    }

    pub fn project_path(&self) -> &'a str {
        match self {
            HookMatcher::Push(ev) => &ev.path_with_namespace,
            HookMatcher::MergeRequest(ev) => &ev.target_path_with_namespace,
        }
    }

    pub fn resolved_branch(&self) -> &'a str {
        match self {
            HookMatcher::Push(ev) => branch_from_ref(&ev.git_ref),
            HookMatcher::MergeRequest(ev) => &ev.target_branch,
        }
    }

    pub fn merge_request(&self) -> Option<&'a MergeRequestEvent> {
        match self {
            HookMatcher::Push(_) => None,
            HookMatcher::MergeRequest(ev) => Some(ev),
        }
    }

    /// Merge request number, zero for pushes
    pub fn pr_id(&self) -> u64 {
        self.merge_request().map(|ev| ev.iid).unwrap_or(0)
    }

    /// Head commit the event was delivered for
    pub fn commit_id(&self) -> &'a str {
        match self {
            HookMatcher::Push(ev) => &ev.after,
            HookMatcher::MergeRequest(ev) => &ev.last_commit_id,
        }
    }

    /// Evaluates `rule` against the event
    ///
    /// On a branch match the rule's `branch` is overwritten with the event's
    /// concrete branch, even if the changeset later disqualifies it.
    pub async fn evaluate(
        &self,
        rule: &mut TriggerRule,
        changes: &ChangesetResolver,
    ) -> MatchOutcome {
        if rule.project_path() != self.project_path() {
            return MatchOutcome::NotMatched;
        }

        if !rule.is_enabled_for(self.hook_event()) {
            return MatchOutcome::NotMatched;
        }

        let branch = self.resolved_branch();
        if !branch_matches(rule, branch) {
            return MatchOutcome::NotMatched;
        }
        rule.branch = branch.to_string();

        let changed = match self {
            HookMatcher::Push(ev) => changes.push_changes(rule.codehost_id, ev).await,
            HookMatcher::MergeRequest(ev) => {
                if ev.state != MergeRequestState::Opened {
                    return MatchOutcome::NotMatched;
                }
                changes.merge_request_changes(rule.codehost_id, ev).await
            }
        };

        match changed {
            Ok(files) => {
                debug!(
                    project = %self.project_path(),
                    files = files.len(),
                    "Resolved changeset"
                );
                if match_changes(&rule.match_folders, &files) {
                    MatchOutcome::Matched
                } else {
                    MatchOutcome::NotMatched
                }
            }
            Err(e) => {
                warn!(
                    project = %self.project_path(),
                    "Failed to get changes of event: {}", e
                );
                MatchOutcome::Failed(TriggerError::Changeset(e))
            }
        }
    }
}

/// Applies a rule's branch filter to a resolved branch
///
/// A pattern that does not compile never matches.
pub fn branch_matches(rule: &TriggerRule, branch: &str) -> bool {
    if !rule.is_regular {
        return rule.branch == branch;
    }

    match Regex::new(&rule.branch) {
        Ok(re) => re.is_match(branch),
        Err(e) => {
            warn!(
                pattern = %rule.branch,
                project = %rule.project_path(),
                "Invalid branch pattern, treating as no match: {}", e
            );
            false
        }
    }
}
