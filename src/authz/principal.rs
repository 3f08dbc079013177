use std::collections::HashSet;

use serde::Serialize;
use uuid::Uuid;

/// The closed set of roles. `User` is the provider baseline every
/// authenticated caller holds; the other three mirror the account's
/// capability flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Student,
    Professor,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Student => "student",
            Role::Professor => "professor",
            Role::Admin => "admin",
        }
    }
}

/// The caller's effective authorization context for one request: immutable,
/// built once by the resolver, and passed explicitly into handlers.
#[derive(Debug, Clone)]
pub struct Principal {
    pub account_id: Uuid,
    pub email: String,
    pub roles: HashSet<Role>,
}

impl Principal {
    pub fn new(account_id: Uuid, email: impl Into<String>) -> Self {
        Self {
            account_id,
            email: email.into(),
            roles: HashSet::new(),
        }
    }

    pub fn with_roles(mut self, roles: impl IntoIterator<Item = Role>) -> Self {
        self.roles = roles.into_iter().collect();
        self
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    pub fn is_admin(&self) -> bool {
        self.has_role(Role::Admin)
    }
}
