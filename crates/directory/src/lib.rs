//! `duewatch-directory` — the read-only view of user accounts the
//! notification layer works with.
//!
//! User management itself lives elsewhere in the application; the batch job
//! only needs to know who holds a notifiable role and where to email them.

pub mod user;

pub use user::{Role, User, NOTIFIABLE_ROLES};
