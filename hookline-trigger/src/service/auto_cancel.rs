//! Auto-cancel of superseded merge request runs

use std::sync::Arc;

use hookline_core::domain::task::RunningExecution;
use hookline_core::domain::trigger::TriggerRule;
use tracing::{error, info};

use crate::error::TriggerError;
use crate::repository::ExecutionStore;

/// Identity of the run about to be created
#[derive(Debug, Clone, Copy)]
pub struct AutoCancelRequest<'a> {
    pub merge_request_id: &'a str,
    pub commit_id: &'a str,
    pub pipeline_name: &'a str,
    pub rule: &'a TriggerRule,
}

/// Cancels in-flight runs superseded by a new merge request event
pub struct AutoCancelCoordinator {
    executions: Arc<dyn ExecutionStore>,
}

impl AutoCancelCoordinator {
    pub fn new(executions: Arc<dyn ExecutionStore>) -> Self {
        Self { executions }
    }

    /// Cancels every in-flight run of the pipeline for the same merge request
    ///
    /// Runs for an older commit are stale; runs for the same commit come from
    /// a redelivered event and are superseded by the run about to be created.
    /// Cancellation is signalled, not awaited. Every candidate is attempted;
    /// the first failure is returned.
    ///
    /// # Returns
    /// Number of runs signalled
    pub async fn cancel_stale(&self, req: AutoCancelRequest<'_>) -> Result<usize, TriggerError> {
        if !req.rule.auto_cancel {
            return Ok(0);
        }

        let in_flight = self.executions.list_in_flight(req.pipeline_name).await?;

        let mut cancelled = 0;
        let mut first_error = None;

        for execution in in_flight
            .iter()
            .filter(|execution| is_superseded(execution, &req))
        {
            let reason = if execution.commit_id == req.commit_id {
                "redelivered"
            } else {
                "stale"
            };

            match self
                .executions
                .cancel_task(execution.task_id, &execution.pipeline_name)
                .await
            {
                Ok(()) => {
                    info!(
                        pipeline = %execution.pipeline_name,
                        task_id = execution.task_id,
                        merge_request = %req.merge_request_id,
                        old_commit = %execution.commit_id,
                        new_commit = %req.commit_id,
                        "Cancelled {} run", reason
                    );
                    cancelled += 1;
                }
                Err(source) => {
                    error!(
                        pipeline = %execution.pipeline_name,
                        task_id = execution.task_id,
                        "Failed to cancel {} run: {}", reason, source
                    );
                    first_error.get_or_insert(TriggerError::AutoCancel {
                        pipeline: execution.pipeline_name.clone(),
                        task_id: execution.task_id,
                        source,
                    });
                }
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(cancelled),
        }
    }
}

/// Any in-flight run of the same merge request and pipeline, whatever its
/// commit. The latest delivery wins; commit ancestry is not consulted.
fn is_superseded(execution: &RunningExecution, req: &AutoCancelRequest<'_>) -> bool {
    !execution.status.is_terminal()
        && execution.pipeline_name == req.pipeline_name
        && execution.merge_request_id == req.merge_request_id
        && execution.codehost_id == req.rule.codehost_id
        && execution.repo_owner == req.rule.repo_owner
        && execution.repo_name == req.rule.repo_name
}
