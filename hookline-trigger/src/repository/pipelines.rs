//! Pipeline definition repository

use async_trait::async_trait;
use hookline_core::domain::pipeline::PipelineDefinition;

use crate::error::RepositoryError;

/// Read access to operator-managed pipeline definitions
#[async_trait]
pub trait PipelineStore: Send + Sync {
    /// Lists every pipeline definition, including ones with triggers disabled
    async fn list_pipelines(&self) -> Result<Vec<PipelineDefinition>, RepositoryError>;
}
