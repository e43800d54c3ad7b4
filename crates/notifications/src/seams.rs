//! Collaborator seams the batch processor runs against.
//!
//! The surrounding application owns the real implementations (a CMS-style
//! metadata store, the outbound mail transport, site settings). The batch
//! only depends on these traits; `duewatch-infra` provides in-memory
//! implementations for tests and development.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use duewatch_core::{ItemId, ProjectId, UserId};
use duewatch_directory::{Role, User};
use duewatch_projects::{Item, ItemKind, Project};

/// Persistence collaborator error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    #[error("project not found: {0}")]
    ProjectNotFound(ProjectId),
    #[error("storage error: {0}")]
    Backend(String),
}

/// Mail collaborator error. Delivery failure is the only modeled failure;
/// it is handled per recipient and never aborts a run.
#[derive(Debug, Clone, thiserror::Error)]
pub enum MailError {
    #[error("delivery failed: {0}")]
    Delivery(String),
}

/// Read/write access to project records and their item collections.
pub trait ProjectStore: Send + Sync {
    /// All published projects, normalized into typed records. Projects keep
    /// their `notifications_disabled` flag; filtering happens in the batch.
    fn published_projects(&self) -> Result<Vec<Project>, StoreError>;

    /// Site-wide milestone display titles, keyed by milestone reference.
    fn milestone_titles(&self) -> Result<HashMap<String, String>, StoreError>;

    /// Per-user per-project opt-out flag.
    fn user_muted(&self, project_id: ProjectId, user_id: UserId) -> Result<bool, StoreError>;

    /// Replace one item collection wholesale.
    fn replace_items(
        &self,
        project_id: ProjectId,
        kind: ItemKind,
        items: &BTreeMap<ItemId, Item>,
    ) -> Result<(), StoreError>;
}

impl<T: ProjectStore + ?Sized> ProjectStore for Arc<T> {
    fn published_projects(&self) -> Result<Vec<Project>, StoreError> {
        self.as_ref().published_projects()
    }

    fn milestone_titles(&self) -> Result<HashMap<String, String>, StoreError> {
        self.as_ref().milestone_titles()
    }

    fn user_muted(&self, project_id: ProjectId, user_id: UserId) -> Result<bool, StoreError> {
        self.as_ref().user_muted(project_id, user_id)
    }

    fn replace_items(
        &self,
        project_id: ProjectId,
        kind: ItemKind,
        items: &BTreeMap<ItemId, Item>,
    ) -> Result<(), StoreError> {
        self.as_ref().replace_items(project_id, kind, items)
    }
}

/// Read access to user accounts.
pub trait UserDirectory: Send + Sync {
    /// All users holding any of the given roles.
    fn users_in_roles(&self, roles: &[Role]) -> Result<Vec<User>, StoreError>;
}

impl<T: UserDirectory + ?Sized> UserDirectory for Arc<T> {
    fn users_in_roles(&self, roles: &[Role]) -> Result<Vec<User>, StoreError> {
        self.as_ref().users_in_roles(roles)
    }
}

/// An assembled digest email, ready for the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundEmail {
    pub from: String,
    pub to: String,
    pub recipient_name: String,
    pub subject: String,
    pub html_body: String,
}

/// Outbound mail transport.
pub trait Mailer: Send + Sync {
    fn send(&self, email: &OutboundEmail) -> Result<(), MailError>;
}

impl<T: Mailer + ?Sized> Mailer for Arc<T> {
    fn send(&self, email: &OutboundEmail) -> Result<(), MailError> {
        self.as_ref().send(email)
    }
}

/// Site-level configuration lookups: name, admin sender address, and the
/// (possibly relabeled) plural headings for item kinds.
pub trait SiteInfo: Send + Sync {
    fn site_name(&self) -> String;

    fn admin_email(&self) -> String;

    fn item_label_plural(&self, kind: ItemKind) -> String {
        kind.default_label_plural().to_string()
    }
}
