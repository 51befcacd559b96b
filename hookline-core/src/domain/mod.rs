//! Core domain types
//!
//! These types represent the entities the trigger engine reasons about.
//! They carry structure only: persistence belongs to the stores and
//! behaviour to the trigger services.

pub mod discussion;
pub mod environment;
pub mod event;
pub mod pipeline;
pub mod task;
pub mod trigger;
