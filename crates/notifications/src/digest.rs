//! Run-scoped aggregation of due and overdue items.
//!
//! Classification builds an explicit table from `(user, project)` to a
//! digest record, instead of mutating shared user state from inside the
//! scan loops. A run-scoped claimed-item set gives the global
//! first-claim-wins dedup: an item id lands in at most one bucket of at
//! most one user per run, no matter how many unsent reminders or eligible
//! assignees it has.
//!
//! Two quirks of the long-standing production behavior are preserved on
//! purpose (and pinned by tests):
//!
//! - with several eligible assignees, only the first one in iteration
//!   order receives the item;
//! - a past-due reminder can only claim an item at the moment a user's
//!   digest for that project is first created.

use std::collections::{BTreeMap, HashSet};

use duewatch_core::{ItemId, ProjectId, UserId};
use duewatch_directory::User;
use duewatch_projects::{Item, ItemKind, Project};

/// What the renderer needs to show one item: id, title sources and dates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestEntry {
    pub item_id: ItemId,
    pub title: Option<String>,
    pub milestone: Option<String>,
    pub due_date: Option<i64>,
    pub end_date: Option<i64>,
}

impl DigestEntry {
    pub fn from_item(item: &Item) -> Self {
        Self {
            item_id: item.id.clone(),
            title: item.title.clone(),
            milestone: item.milestone.clone(),
            due_date: item.due_date,
            end_date: item.end_date,
        }
    }

    /// Timestamp shown next to the item.
    ///
    /// Display rules differ from classification (which prefers the due
    /// date): milestones show their end date or nothing, tasks and bugs
    /// fall back from end date to due date.
    pub fn display_timestamp(&self, kind: ItemKind) -> Option<i64> {
        match kind {
            ItemKind::Milestone => self.end_date,
            ItemKind::Task | ItemKind::Bug => self.end_date.or(self.due_date),
        }
    }
}

/// One bucket per item kind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KindBuckets {
    milestones: Vec<DigestEntry>,
    tasks: Vec<DigestEntry>,
    bugs: Vec<DigestEntry>,
}

impl KindBuckets {
    pub fn entries(&self, kind: ItemKind) -> &[DigestEntry] {
        match kind {
            ItemKind::Milestone => &self.milestones,
            ItemKind::Task => &self.tasks,
            ItemKind::Bug => &self.bugs,
        }
    }

    fn push(&mut self, kind: ItemKind, entry: DigestEntry) {
        match kind {
            ItemKind::Milestone => self.milestones.push(entry),
            ItemKind::Task => self.tasks.push(entry),
            ItemKind::Bug => self.bugs.push(entry),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.milestones.is_empty() && self.tasks.is_empty() && self.bugs.is_empty()
    }
}

/// Digest for one user and one project: upcoming buckets plus the past-due
/// section with its count.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectDigest {
    pub upcoming: KindBuckets,
    pub past_due: KindBuckets,
    pub past_due_count: usize,
}

impl ProjectDigest {
    pub fn is_empty(&self) -> bool {
        self.upcoming.is_empty() && self.past_due_count == 0
    }
}

/// The per-run aggregation table.
#[derive(Debug, Clone, Default)]
pub struct DigestTable {
    users: BTreeMap<UserId, BTreeMap<ProjectId, ProjectDigest>>,
    claimed: HashSet<ItemId>,
}

impl DigestTable {
    pub fn iter(&self) -> impl Iterator<Item = (&UserId, &BTreeMap<ProjectId, ProjectDigest>)> {
        self.users.iter()
    }

    pub fn for_user(&self, user_id: UserId) -> Option<&BTreeMap<ProjectId, ProjectDigest>> {
        self.users.get(&user_id)
    }

    pub fn is_claimed(&self, item_id: &ItemId) -> bool {
        self.claimed.contains(item_id)
    }

    fn has_digest(&self, user_id: UserId, project_id: ProjectId) -> bool {
        self.users
            .get(&user_id)
            .is_some_and(|p| p.contains_key(&project_id))
    }

    fn ensure_digest(&mut self, user_id: UserId, project_id: ProjectId) {
        self.users
            .entry(user_id)
            .or_default()
            .entry(project_id)
            .or_default();
    }

    /// First-claim-wins: true exactly once per item id per run.
    fn try_claim(&mut self, item_id: &ItemId) -> bool {
        self.claimed.insert(item_id.clone())
    }

    fn push_upcoming(&mut self, user_id: UserId, project_id: ProjectId, entry: DigestEntry, kind: ItemKind) {
        self.ensure_digest(user_id, project_id);
        if let Some(digest) = self
            .users
            .get_mut(&user_id)
            .and_then(|p| p.get_mut(&project_id))
        {
            digest.upcoming.push(kind, entry);
        }
    }

    fn push_past_due(&mut self, user_id: UserId, project_id: ProjectId, entry: DigestEntry, kind: ItemKind) {
        self.ensure_digest(user_id, project_id);
        if let Some(digest) = self
            .users
            .get_mut(&user_id)
            .and_then(|p| p.get_mut(&project_id))
        {
            digest.past_due.push(kind, entry);
            digest.past_due_count += 1;
        }
    }
}

/// Classify every eligible item of every project into the digest table.
///
/// Items are skipped when they have no resolvable due timestamp, no known
/// assignee, or no reminders; reminders are skipped when already sent or
/// carrying an unknown lead-time code.
pub fn classify(projects: &[Project], users: &BTreeMap<UserId, User>, now: i64) -> DigestTable {
    let mut table = DigestTable::default();

    for project in projects {
        for kind in ItemKind::ALL {
            for item in project.items(kind).values() {
                let Some(due) = item.due_timestamp() else {
                    continue;
                };

                let assignees: Vec<UserId> = item
                    .assigned_to
                    .iter()
                    .filter(|id| users.contains_key(id))
                    .copied()
                    .collect();
                if assignees.is_empty() {
                    continue;
                }

                if item.reminders.is_empty() {
                    continue;
                }

                for reminder in &item.reminders {
                    if reminder.sent {
                        continue;
                    }
                    let Some(reminder_kind) = reminder.kind() else {
                        continue;
                    };

                    if now >= due {
                        // Past due. Claiming is tied to digest creation:
                        // an assignee whose digest for this project already
                        // exists does not receive the item.
                        for user_id in &assignees {
                            if !table.has_digest(*user_id, project.id) {
                                table.ensure_digest(*user_id, project.id);
                                if table.try_claim(&item.id) {
                                    table.push_past_due(
                                        *user_id,
                                        project.id,
                                        DigestEntry::from_item(item),
                                        kind,
                                    );
                                }
                            }
                        }
                    } else if now + reminder_kind.lead_seconds() >= due {
                        // Inside the lead-time window.
                        for user_id in &assignees {
                            table.ensure_digest(*user_id, project.id);
                            if table.try_claim(&item.id) {
                                table.push_upcoming(
                                    *user_id,
                                    project.id,
                                    DigestEntry::from_item(item),
                                    kind,
                                );
                            }
                        }
                    }
                }
            }
        }
    }

    table
}
