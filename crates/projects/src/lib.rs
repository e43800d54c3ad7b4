//! `duewatch-projects` — typed records for projects and their work items.
//!
//! The surrounding application persists projects as loosely-typed metadata
//! blobs. This crate owns the validated record types (`Project`, `Item`,
//! `Reminder`), the closed item-kind and reminder lead-time tables, and the
//! normalization layer that converts store blobs into records and back.

pub mod item;
pub mod metadata;
pub mod project;

pub use item::{Item, ItemKind, Reminder, ReminderKind};
pub use project::Project;
