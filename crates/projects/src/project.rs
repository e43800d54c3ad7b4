//! Project record: the container milestones, tasks and bugs live in.

use std::collections::BTreeMap;

use duewatch_core::{ItemId, ProjectId};

use crate::item::{Item, ItemKind};

/// A project as the batch job sees it.
///
/// Loaded once per run from the metadata store and mutated in place as
/// reminders are marked sent; only collections that actually changed are
/// persisted back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Project {
    pub id: ProjectId,
    pub title: String,
    pub url: String,
    /// Project-wide kill switch: when set, no user gets reminded about
    /// anything in this project.
    pub notifications_disabled: bool,
    milestones: BTreeMap<ItemId, Item>,
    tasks: BTreeMap<ItemId, Item>,
    bugs: BTreeMap<ItemId, Item>,
}

impl Project {
    pub fn new(id: ProjectId, title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            url: url.into(),
            notifications_disabled: false,
            milestones: BTreeMap::new(),
            tasks: BTreeMap::new(),
            bugs: BTreeMap::new(),
        }
    }

    pub fn items(&self, kind: ItemKind) -> &BTreeMap<ItemId, Item> {
        match kind {
            ItemKind::Milestone => &self.milestones,
            ItemKind::Task => &self.tasks,
            ItemKind::Bug => &self.bugs,
        }
    }

    pub fn items_mut(&mut self, kind: ItemKind) -> &mut BTreeMap<ItemId, Item> {
        match kind {
            ItemKind::Milestone => &mut self.milestones,
            ItemKind::Task => &mut self.tasks,
            ItemKind::Bug => &mut self.bugs,
        }
    }

    /// Replace the whole collection for one kind (used when loading).
    pub fn set_items(&mut self, kind: ItemKind, items: BTreeMap<ItemId, Item>) {
        *self.items_mut(kind) = items;
    }

    /// Insert a single item into the collection matching its kind.
    pub fn insert_item(&mut self, item: Item) {
        self.items_mut(item.kind).insert(item.id.clone(), item);
    }

    pub fn item(&self, kind: ItemKind, id: &ItemId) -> Option<&Item> {
        self.items(kind).get(id)
    }

    pub fn is_empty(&self) -> bool {
        ItemKind::ALL.iter().all(|k| self.items(*k).is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_routes_by_kind() {
        let mut project = Project::new(ProjectId::new(7), "Website", "https://pm.example/website");
        project.insert_item(Item::new("m1", ItemKind::Milestone));
        project.insert_item(Item::new("t1", ItemKind::Task));
        project.insert_item(Item::new("b1", ItemKind::Bug));

        assert_eq!(project.items(ItemKind::Milestone).len(), 1);
        assert_eq!(project.items(ItemKind::Task).len(), 1);
        assert_eq!(project.items(ItemKind::Bug).len(), 1);
        assert!(project.item(ItemKind::Task, &ItemId::from("t1")).is_some());
        assert!(!project.is_empty());
    }

    #[test]
    fn fresh_project_is_empty() {
        let project = Project::new(ProjectId::new(1), "Empty", "https://pm.example/empty");
        assert!(project.is_empty());
    }
}
