//! Repository layer
//!
//! Ports to the collaborators the trigger engine does not own: the
//! configuration and document stores, the environment runtime and the
//! source-control host. They provide focused interfaces without any
//! business logic.
//!
//! All repositories are trait-based so the hosting process can plug in its
//! own persistence and clients, and tests can substitute fakes.

mod codehost;
mod discussions;
mod environments;
mod executions;
mod pipelines;

pub use codehost::CodehostClient;
pub use discussions::DiscussionStore;
pub use environments::{EnvironmentRuntime, EnvironmentStore};
pub use executions::ExecutionStore;
pub use pipelines::PipelineStore;
