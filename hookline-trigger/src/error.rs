//! Error types for the trigger engine

use std::time::Duration;

use thiserror::Error;

/// Errors reported by the document stores and the environment runtime
#[derive(Debug, Clone, Error)]
pub enum RepositoryError {
    /// The requested record does not exist
    #[error("Record not found: {0}")]
    NotFound(String),

    /// The store could not be reached or timed out
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// The store refused the operation
    #[error("Operation rejected: {0}")]
    Rejected(String),
}

impl RepositoryError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Errors reported by the source-control host client
#[derive(Debug, Clone, Error)]
pub enum CodehostError {
    /// Project, merge request or discussion does not exist
    #[error("Code host resource not found: {0}")]
    NotFound(String),

    /// Credentials were missing, expired or lacked scope
    #[error("Code host rejected credentials: {0}")]
    Unauthorized(String),

    /// The host throttled the request
    #[error("Code host rate limit hit (retry after {retry_after:?})")]
    RateLimited {
        /// Back-off advertised by the host, if any
        retry_after: Option<Duration>,
    },

    /// Network failure or 5xx response
    #[error("Code host request failed: {0}")]
    Transient(String),

    /// Any other 4xx response
    #[error("Code host rejected request: {0}")]
    Rejected(String),
}

impl CodehostError {
    /// Whether repeating the request may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited { .. } | Self::Transient(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Errors raised while mirroring feedback on the code host
///
/// Always logged and swallowed by callers; feedback never fails a trigger.
#[derive(Debug, Error)]
pub enum FeedbackError {
    #[error(transparent)]
    Codehost(#[from] CodehostError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Failure classes, used to decide whether an error is fatal for an invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Dangling configuration; skipped and logged
    ConfigurationGap,
    /// Upstream API or store failure
    UpstreamTransient,
    /// A wait exceeded its deadline
    Timeout,
    /// Auto-cancel or feedback failure; never fails a trigger
    BestEffort,
}

/// Errors raised while triggering pipelines for one event
#[derive(Debug, Error)]
pub enum TriggerError {
    #[error("Configuration gap: {0}")]
    ConfigurationGap(String),

    #[error("Failed to resolve changed files: {0}")]
    Changeset(#[source] CodehostError),

    #[error("Store operation failed: {0}")]
    Repository(#[from] RepositoryError),

    #[error("Failed to create task for pipeline {pipeline}: {source}")]
    TaskCreation {
        pipeline: String,
        #[source]
        source: RepositoryError,
    },

    #[error("Failed to cancel task {task_id} of pipeline {pipeline}: {source}")]
    AutoCancel {
        pipeline: String,
        task_id: u64,
        #[source]
        source: RepositoryError,
    },

    #[error("Timed out after {}s waiting for environment {env_name} of {product} to {action}", .timeout.as_secs())]
    Timeout {
        product: String,
        env_name: String,
        action: &'static str,
        timeout: Duration,
    },

    #[error("Wait for {0} was cancelled")]
    Cancelled(String),
}

impl TriggerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TriggerError::ConfigurationGap(_) => ErrorKind::ConfigurationGap,
            TriggerError::Changeset(_)
            | TriggerError::Repository(_)
            | TriggerError::TaskCreation { .. }
            | TriggerError::Cancelled(_) => ErrorKind::UpstreamTransient,
            TriggerError::AutoCancel { .. } => ErrorKind::BestEffort,
            TriggerError::Timeout { .. } => ErrorKind::Timeout,
        }
    }
}

/// Every per-rule failure of one dispatch
///
/// A failing rule never stops evaluation of its siblings, so failures are
/// collected and reported together.
#[derive(Debug, Default)]
pub struct DispatchError {
    errors: Vec<TriggerError>,
}

impl DispatchError {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, error: TriggerError) {
        self.errors.push(error);
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TriggerError> {
        self.errors.iter()
    }

    pub fn into_errors(self) -> Vec<TriggerError> {
        self.errors
    }

    /// `Ok(())` when nothing was collected
    pub fn into_result(self) -> Result<(), DispatchError> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl std::fmt::Display for DispatchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.errors.len() {
            1 => write!(f, "1 error occurred:")?,
            n => write!(f, "{} errors occurred:", n)?,
        }
        for err in &self.errors {
            write!(f, "\n\t* {}", err)?;
        }
        Ok(())
    }
}

impl std::error::Error for DispatchError {}
