//! Environment repositories
//!
//! The store holds environment records; the runtime creates, deletes and
//! reports on the workloads behind them. Status is always re-derived from
//! the runtime, never from cached records.

use async_trait::async_trait;
use hookline_core::domain::environment::{Environment, EnvironmentStatus, RenderSet};

use crate::error::RepositoryError;

/// Read access to environment records
#[async_trait]
pub trait EnvironmentStore: Send + Sync {
    /// Finds an environment by product and environment name
    ///
    /// # Returns
    /// `None` when no such environment exists
    async fn find_environment(
        &self,
        product_name: &str,
        env_name: &str,
    ) -> Result<Option<Environment>, RepositoryError>;

    /// Finds a revision of a render-variable set
    async fn find_render_set(
        &self,
        name: &str,
        revision: i64,
    ) -> Result<Option<RenderSet>, RepositoryError>;
}

/// Runtime/cluster collaborator
#[async_trait]
pub trait EnvironmentRuntime: Send + Sync {
    /// Submits creation of an environment; does not wait for readiness
    ///
    /// # Arguments
    /// * `created_by` - Identity recorded as the creator
    /// * `request_id` - Correlation id of the triggering delivery
    /// * `environment` - Full environment record to create
    async fn create_environment(
        &self,
        created_by: &str,
        request_id: &str,
        environment: Environment,
    ) -> Result<(), RepositoryError>;

    /// Submits deletion of an environment; does not wait for removal
    async fn delete_environment(
        &self,
        deleted_by: &str,
        product_name: &str,
        env_name: &str,
        request_id: &str,
    ) -> Result<(), RepositoryError>;

    /// Current status of an environment
    ///
    /// Returns [`EnvironmentStatus::Absent`] or an error when it cannot be found.
    async fn environment_status(
        &self,
        product_name: &str,
        env_name: &str,
    ) -> Result<EnvironmentStatus, RepositoryError>;
}
