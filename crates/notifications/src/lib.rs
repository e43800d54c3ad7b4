//! `duewatch-notifications` — the reminder batch processor.
//!
//! One sequential pass per run: load published projects and notifiable
//! users, classify due/overdue items into per-user per-project digests,
//! render one HTML email per user, deliver it, and mark the touched
//! reminders as sent once delivery is confirmed.
//!
//! Persistence, mail transport and site configuration are collaborators
//! behind the trait seams in [`seams`]; the crate itself is storage- and
//! transport-agnostic.

pub mod batch;
pub mod digest;
pub mod render;
pub mod seams;

pub use batch::{ReminderBatch, RunSummary};
pub use digest::{DigestEntry, DigestTable, KindBuckets, ProjectDigest};
pub use seams::{MailError, Mailer, OutboundEmail, ProjectStore, SiteInfo, StoreError, UserDirectory};
