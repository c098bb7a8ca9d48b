//! Signed-in user as reported by `/auth/login` and `/auth/me`.

use serde::{Deserialize, Serialize};

use super::id::{StoreId, UserId};

/// Primary account role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Customer,
    /// Store staff (owner, manager or staff of one store).
    Store,
    /// Any role this client has no special handling for.
    #[serde(other)]
    Other,
}

/// Name of a store-level role such as `owner` or `staff`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleName {
    pub name: String,
}

/// One store role granted to a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRoleAssignment {
    pub role: RoleName,
}

/// A user account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    #[serde(default)]
    pub full_name: Option<String>,
    pub role: Role,
    #[serde(default)]
    pub store_id: Option<StoreId>,
    #[serde(default, rename = "user_roles")]
    pub roles: Vec<UserRoleAssignment>,
}

impl User {
    #[must_use]
    pub fn is_customer(&self) -> bool {
        self.role == Role::Customer
    }

    #[must_use]
    pub fn is_store_staff(&self) -> bool {
        self.role == Role::Store
    }

    /// Whether the user holds the named store role.
    #[must_use]
    pub fn has_role(&self, name: &str) -> bool {
        self.roles.iter().any(|r| r.role.name == name)
    }

    /// Full name when set, username otherwise.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.full_name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or(&self.username)
    }
}
