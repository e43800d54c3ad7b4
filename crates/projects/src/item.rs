//! Work items and their reminders.

use serde::{Deserialize, Serialize};

use duewatch_core::{ItemId, UserId};

/// Closed set of work item kinds a project carries.
///
/// Each kind maps to a fixed metadata key in the store and to its own
/// title-resolution rule: milestones reference a shared milestone-title
/// lookup, tasks and bugs carry their own title field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Milestone,
    Task,
    Bug,
}

impl ItemKind {
    /// All kinds, in the order the store and the rendered digest use.
    pub const ALL: [ItemKind; 3] = [ItemKind::Milestone, ItemKind::Task, ItemKind::Bug];

    /// Key of the per-project metadata collection holding items of this kind.
    pub fn metadata_key(&self) -> &'static str {
        match self {
            ItemKind::Milestone => "milestones",
            ItemKind::Task => "tasks",
            ItemKind::Bug => "bugs",
        }
    }

    /// Default plural heading used when the site does not override labels.
    pub fn default_label_plural(&self) -> &'static str {
        match self {
            ItemKind::Milestone => "Milestones",
            ItemKind::Task => "Tasks",
            ItemKind::Bug => "Bugs",
        }
    }
}

impl core::fmt::Display for ItemKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.metadata_key())
    }
}

/// Reminder lead-time table.
///
/// Reminder records store a small integer code; only these five codes are
/// meaningful. Unknown codes are preserved in storage but never fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReminderKind {
    OneDay,
    TwoDays,
    ThreeDays,
    OneWeek,
    TwoWeeks,
}

impl ReminderKind {
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(ReminderKind::OneDay),
            2 => Some(ReminderKind::TwoDays),
            3 => Some(ReminderKind::ThreeDays),
            4 => Some(ReminderKind::OneWeek),
            5 => Some(ReminderKind::TwoWeeks),
            _ => None,
        }
    }

    /// Days of lead time before the due date at which this reminder fires.
    pub fn lead_days(&self) -> i64 {
        match self {
            ReminderKind::OneDay => 1,
            ReminderKind::TwoDays => 2,
            ReminderKind::ThreeDays => 3,
            ReminderKind::OneWeek => 7,
            ReminderKind::TwoWeeks => 14,
        }
    }

    /// Lead time in seconds, the unit due timestamps are stored in.
    pub fn lead_seconds(&self) -> i64 {
        self.lead_days() * 86_400
    }
}

/// A reminder configured on an item.
///
/// `reminder` is the raw lead-time code as stored; it is kept verbatim so
/// collections round-trip even when a record carries a code this version
/// does not understand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reminder {
    pub reminder: i64,
    pub sent: bool,
    #[serde(default)]
    pub sent_at: Option<i64>,
}

impl Reminder {
    pub fn unsent(code: i64) -> Self {
        Self {
            reminder: code,
            sent: false,
            sent_at: None,
        }
    }

    pub fn kind(&self) -> Option<ReminderKind> {
        ReminderKind::from_code(self.reminder)
    }

    pub fn mark_sent(&mut self, now: i64) {
        self.sent = true;
        self.sent_at = Some(now);
    }
}

/// A work item: milestone, task or bug.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    pub id: ItemId,
    pub kind: ItemKind,
    /// Own title; tasks and bugs always have one, milestones usually not.
    pub title: Option<String>,
    /// Milestone label reference, resolved through the site's milestone
    /// title lookup at render time.
    pub milestone: Option<String>,
    pub due_date: Option<i64>,
    pub end_date: Option<i64>,
    pub assigned_to: Vec<UserId>,
    pub reminders: Vec<Reminder>,
}

impl Item {
    pub fn new(id: impl Into<ItemId>, kind: ItemKind) -> Self {
        Self {
            id: id.into(),
            kind,
            title: None,
            milestone: None,
            due_date: None,
            end_date: None,
            assigned_to: Vec::new(),
            reminders: Vec::new(),
        }
    }

    /// The timestamp the item is due at: due date when present, end date as
    /// fallback. `None` means the item never becomes due.
    pub fn due_timestamp(&self) -> Option<i64> {
        self.due_date.or(self.end_date)
    }

    pub fn has_unsent_reminders(&self) -> bool {
        self.reminders.iter().any(|r| !r.sent)
    }

    /// Flip every reminder on the item to sent.
    ///
    /// Delivery confirmation covers the whole item, so all reminders are
    /// marked together, including ones that did not trigger this digest.
    pub fn mark_all_reminders_sent(&mut self, now: i64) {
        for reminder in &mut self.reminders {
            reminder.mark_sent(now);
        }
    }
}
