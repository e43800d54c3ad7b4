//! In-memory metadata store for tests/dev.
//!
//! Persists item collections as raw JSON blobs, the way the real store
//! does, so the normalization layer in `duewatch-projects::metadata` is
//! exercised on every read and write.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, RwLock};

use serde_json::Value;

use duewatch_core::{ItemId, ProjectId, UserId};
use duewatch_directory::{Role, User};
use duewatch_notifications::{ProjectStore, StoreError, UserDirectory};
use duewatch_projects::{metadata, Item, ItemKind, Project};

/// A project row, minus its item collections.
#[derive(Debug, Clone)]
pub struct ProjectRecord {
    pub id: ProjectId,
    pub title: String,
    pub url: String,
    pub published: bool,
    pub notifications_disabled: bool,
}

impl ProjectRecord {
    pub fn published(id: ProjectId, title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            url: url.into(),
            published: true,
            notifications_disabled: false,
        }
    }
}

#[derive(Debug, Default)]
struct Inner {
    records: Vec<ProjectRecord>,
    // Item collections keyed by (project, metadata key), stored as the raw
    // blob the collection was last written as.
    metadata: HashMap<(ProjectId, &'static str), Value>,
    milestone_titles: HashMap<String, String>,
    muted: HashSet<(ProjectId, UserId)>,
    users: Vec<User>,
}

/// In-memory store backing both the project and user seams.
#[derive(Debug, Default)]
pub struct InMemoryMetadataStore {
    inner: RwLock<Inner>,
}

impl InMemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    pub fn insert_project(&self, record: ProjectRecord) {
        self.inner.write().unwrap().records.push(record);
    }

    /// Seed one item collection with an arbitrary blob.
    pub fn set_item_blob(&self, project_id: ProjectId, kind: ItemKind, blob: Value) {
        self.inner
            .write()
            .unwrap()
            .metadata
            .insert((project_id, kind.metadata_key()), blob);
    }

    /// The raw blob currently stored for one collection.
    pub fn item_blob(&self, project_id: ProjectId, kind: ItemKind) -> Option<Value> {
        self.inner
            .read()
            .unwrap()
            .metadata
            .get(&(project_id, kind.metadata_key()))
            .cloned()
    }

    pub fn set_milestone_title(&self, reference: impl Into<String>, title: impl Into<String>) {
        self.inner
            .write()
            .unwrap()
            .milestone_titles
            .insert(reference.into(), title.into());
    }

    pub fn mute(&self, project_id: ProjectId, user_id: UserId) {
        self.inner.write().unwrap().muted.insert((project_id, user_id));
    }

    pub fn insert_user(&self, user: User) {
        self.inner.write().unwrap().users.push(user);
    }
}

impl ProjectStore for InMemoryMetadataStore {
    fn published_projects(&self) -> Result<Vec<Project>, StoreError> {
        let inner = self.inner.read().unwrap();
        let mut projects = Vec::new();

        for record in inner.records.iter().filter(|r| r.published) {
            let mut project = Project::new(record.id, record.title.clone(), record.url.clone());
            project.notifications_disabled = record.notifications_disabled;

            for kind in ItemKind::ALL {
                if let Some(blob) = inner.metadata.get(&(record.id, kind.metadata_key())) {
                    project.set_items(kind, metadata::decode_items(kind, blob));
                }
            }

            projects.push(project);
        }

        Ok(projects)
    }

    fn milestone_titles(&self) -> Result<HashMap<String, String>, StoreError> {
        Ok(self.inner.read().unwrap().milestone_titles.clone())
    }

    fn user_muted(&self, project_id: ProjectId, user_id: UserId) -> Result<bool, StoreError> {
        Ok(self
            .inner
            .read()
            .unwrap()
            .muted
            .contains(&(project_id, user_id)))
    }

    fn replace_items(
        &self,
        project_id: ProjectId,
        kind: ItemKind,
        items: &BTreeMap<ItemId, Item>,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.write().unwrap();
        if !inner.records.iter().any(|r| r.id == project_id) {
            return Err(StoreError::ProjectNotFound(project_id));
        }
        inner
            .metadata
            .insert((project_id, kind.metadata_key()), metadata::encode_items(items));
        Ok(())
    }
}

impl UserDirectory for InMemoryMetadataStore {
    fn users_in_roles(&self, roles: &[Role]) -> Result<Vec<User>, StoreError> {
        Ok(self
            .inner
            .read()
            .unwrap()
            .users
            .iter()
            .filter(|u| roles.contains(&u.role))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unpublished_projects_are_not_returned() {
        let store = InMemoryMetadataStore::new();
        store.insert_project(ProjectRecord::published(
            ProjectId::new(1),
            "Live",
            "https://pm.example/live",
        ));
        store.insert_project(ProjectRecord {
            published: false,
            ..ProjectRecord::published(ProjectId::new(2), "Draft", "https://pm.example/draft")
        });

        let projects = store.published_projects().unwrap();
        assert_eq!(projects.len(), 1);
        assert_eq!(projects[0].title, "Live");
    }

    #[test]
    fn item_blobs_are_normalized_on_read() {
        let store = InMemoryMetadataStore::new();
        store.insert_project(ProjectRecord::published(
            ProjectId::new(1),
            "Website",
            "https://pm.example/website",
        ));
        store.set_item_blob(
            ProjectId::new(1),
            ItemKind::Task,
            json!([{
                "id": "t-1",
                "title": "Ship login",
                "due_date": 1_700_000_000i64,
                "assigned_to": 3,
                "reminders": ["{\"reminder\":3,\"sent\":false,\"sent_at\":null}"],
            }]),
        );

        let projects = store.published_projects().unwrap();
        let item = projects[0]
            .item(ItemKind::Task, &ItemId::from("t-1"))
            .unwrap();
        assert_eq!(item.assigned_to, vec![UserId::new(3)]);
        assert_eq!(item.reminders.len(), 1);
        assert!(!item.reminders[0].sent);
    }

    #[test]
    fn replace_items_rewrites_the_blob() {
        let store = InMemoryMetadataStore::new();
        store.insert_project(ProjectRecord::published(
            ProjectId::new(1),
            "Website",
            "https://pm.example/website",
        ));

        let mut item = Item::new("t-1", ItemKind::Task);
        item.title = Some("Ship login".to_string());
        let items: BTreeMap<ItemId, Item> = [(item.id.clone(), item)].into();

        store
            .replace_items(ProjectId::new(1), ItemKind::Task, &items)
            .unwrap();

        let blob = store.item_blob(ProjectId::new(1), ItemKind::Task).unwrap();
        assert_eq!(blob[0]["id"], "t-1");
        assert_eq!(blob[0]["title"], "Ship login");
    }

    #[test]
    fn replace_items_on_unknown_project_fails() {
        let store = InMemoryMetadataStore::new();
        let err = store
            .replace_items(ProjectId::new(9), ItemKind::Bug, &BTreeMap::new())
            .unwrap_err();
        assert!(matches!(err, StoreError::ProjectNotFound(id) if id == ProjectId::new(9)));
    }
}
