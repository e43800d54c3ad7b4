//! `duewatch-infra` — in-memory collaborator implementations and the
//! interval runner that fires the reminder batch.
//!
//! The metadata store here mirrors the shape of a CMS metadata table:
//! item collections live as loosely-typed JSON blobs and are normalized
//! through `duewatch-projects::metadata` on every read and write.

pub mod mailer;
pub mod metadata_store;
pub mod runner;

pub use mailer::{RecordingMailer, StaticSiteInfo};
pub use metadata_store::{InMemoryMetadataStore, ProjectRecord};
pub use runner::{ReminderRunner, ReminderRunnerHandle};
