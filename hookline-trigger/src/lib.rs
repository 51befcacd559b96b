//! Hookline Trigger
//!
//! Webhook-driven build triggering for the Hookline CI/CD platform.
//!
//! Architecture:
//! - Configuration: timeouts, poll intervals and identities from the environment
//! - Repositories: trait-based ports to the stores, the runtime and the code host
//! - Services: hook matching, auto-cancel, feedback synchronization, ephemeral
//!   environment orchestration and the trigger engine tying them together
//!
//! The hosting process parses and authenticates webhook deliveries, then hands
//! each [`SourceEvent`](hookline_core::domain::event::SourceEvent) to
//! [`TriggerEngine::dispatch`](service::TriggerEngine::dispatch).

pub mod config;
pub mod error;
pub mod repository;
pub mod service;
pub mod telemetry;

#[cfg(test)]
pub(crate) mod testing;

pub use config::TriggerConfig;
pub use error::{DispatchError, ErrorKind, TriggerError};
pub use service::{Collaborators, TriggerEngine};
