//! Hookline Core
//!
//! Core types shared by the Hookline build-trigger engine.
//!
//! This crate contains:
//! - Domain types: source-control events, trigger rules, pipeline definitions,
//!   task invocations, discussion threads and environments
//! - DTOs: lightweight payloads exchanged with external collaborators

pub mod domain;
pub mod dto;
