//! User accounts and the role set eligible for reminder digests.

use serde::{Deserialize, Serialize};

use duewatch_core::UserId;

/// Roles a user can hold in the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Administrator,
    Manager,
    Member,
}

/// Roles whose holders receive reminder digests.
pub const NOTIFIABLE_ROLES: [Role; 3] = [Role::Administrator, Role::Manager, Role::Member];

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Administrator => "administrator",
            Role::Manager => "manager",
            Role::Member => "member",
        }
    }

    pub fn is_notifiable(&self) -> bool {
        NOTIFIABLE_ROLES.contains(self)
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A user account, as the notification layer sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub role: Role,
}

impl User {
    pub fn new(
        id: UserId,
        name: impl Into<String>,
        email: impl Into<String>,
        role: Role,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            email: email.into(),
            role,
        }
    }
}
