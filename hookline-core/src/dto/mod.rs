//! Data Transfer Objects
//!
//! Payloads exchanged between the trigger services and their collaborators
//! (execution engine, source-control host, feedback channel).

pub mod feedback;
pub mod task;
