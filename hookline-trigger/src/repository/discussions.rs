//! Discussion thread repository

use async_trait::async_trait;
use hookline_core::domain::discussion::{DiscussionThread, ThreadKey};
use uuid::Uuid;

use crate::error::RepositoryError;

/// Local records of the discussion threads mirrored on the code host
#[async_trait]
pub trait DiscussionStore: Send + Sync {
    async fn find_thread(&self, key: &ThreadKey) -> Result<Option<DiscussionThread>, RepositoryError>;

    /// Persists a new thread record
    ///
    /// Fails with [`RepositoryError::Rejected`] if a thread already exists for the key.
    async fn create_thread(&self, thread: DiscussionThread) -> Result<(), RepositoryError>;

    /// Updates the synchronized commit and content of an existing thread
    async fn update_thread(
        &self,
        id: Uuid,
        commit_id: &str,
        body: &str,
        resolved: bool,
    ) -> Result<(), RepositoryError>;
}
