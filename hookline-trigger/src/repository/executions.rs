//! Execution repository

use async_trait::async_trait;
use hookline_core::domain::task::{RunningExecution, TaskInvocationArgs, TaskStatus};
use hookline_core::dto::task::CreatedTask;

use crate::error::RepositoryError;

/// Access to pipeline executions
#[async_trait]
pub trait ExecutionStore: Send + Sync {
    /// Creates a pipeline run
    ///
    /// # Arguments
    /// * `args` - Fully resolved invocation arguments
    /// * `creator` - Identity recorded as the run's creator
    async fn create_task(
        &self,
        args: TaskInvocationArgs,
        creator: &str,
    ) -> Result<CreatedTask, RepositoryError>;

    /// Current status of a run
    async fn task_status(
        &self,
        task_id: u64,
        pipeline_name: &str,
    ) -> Result<TaskStatus, RepositoryError>;

    /// Runs of a pipeline that have not reached a terminal status
    async fn list_in_flight(
        &self,
        pipeline_name: &str,
    ) -> Result<Vec<RunningExecution>, RepositoryError>;

    /// Signals a run to stop; does not wait for it to do so
    async fn cancel_task(&self, task_id: u64, pipeline_name: &str) -> Result<(), RepositoryError>;
}
