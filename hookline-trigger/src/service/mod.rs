//! Service layer
//!
//! Business logic of the trigger engine, built on the repository ports.
//!
//! Flow for one delivery: changeset resolution and hook matching, then for
//! each match auto-cancel, feedback thread, task arguments and finally either
//! direct run creation or an ephemeral environment.

pub mod args_factory;
pub mod auto_cancel;
pub mod changeset;
pub mod engine;
pub mod ephemeral;
pub mod feedback;
pub mod keyed_lock;
pub mod matcher;

pub use auto_cancel::{AutoCancelCoordinator, AutoCancelRequest};
pub use changeset::ChangesetResolver;
pub use engine::{Collaborators, TriggerEngine};
pub use ephemeral::{
    EnvState, EphemeralOrchestrator, EphemeralOutcome, EphemeralRequest, ProvisionedRun,
};
pub use feedback::FeedbackSynchronizer;
pub use keyed_lock::KeyedLock;
pub use matcher::{HookMatcher, MatchOutcome};
