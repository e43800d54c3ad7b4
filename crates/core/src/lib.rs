//! `duewatch-core` — identifier and error primitives shared across the
//! workspace.
//!
//! This crate contains **pure domain** building blocks (no infrastructure
//! concerns).

pub mod error;
pub mod id;

pub use error::DomainError;
pub use id::{ItemId, ProjectId, RunId, UserId};
