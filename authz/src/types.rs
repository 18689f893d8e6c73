//! Core authorization types: principals, roles and permissions.
//!
//! The permission set and the two built-in roles are closed. They are seeded
//! once into the store and never created at request time.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::AuthzError;

/// An action kind a role may be granted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    Read,
    Create,
    Update,
    Delete,
}

impl Permission {
    /// Every permission, in seeding order.
    pub const ALL: [Permission; 4] = [
        Permission::Read,
        Permission::Create,
        Permission::Update,
        Permission::Delete,
    ];

    /// Stored name of the permission (`access_type` column).
    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::Read => "read",
            Permission::Create => "create",
            Permission::Update => "update",
            Permission::Delete => "delete",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Permission {
    type Err = AuthzError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "read" => Ok(Permission::Read),
            "create" => Ok(Permission::Create),
            "update" => Ok(Permission::Update),
            "delete" => Ok(Permission::Delete),
            other => Err(AuthzError::UnknownPermission(other.to_string())),
        }
    }
}

/// One of the built-in roles.
///
/// Serialized as its numeric id so it can travel inside token claims.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub const USER_ID: i64 = 1;
    pub const ADMIN_ID: i64 = 2;

    /// Stable numeric id used in the store and in tokens.
    pub fn id(&self) -> i64 {
        match self {
            Role::User => Self::USER_ID,
            Role::Admin => Self::ADMIN_ID,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Role::User => "USER",
            Role::Admin => "ADMIN",
        }
    }

    /// Permissions granted to this role when the store is first seeded.
    pub fn default_permissions(&self) -> &'static [Permission] {
        match self {
            Role::User => &[Permission::Read],
            Role::Admin => &Permission::ALL,
        }
    }
}

impl TryFrom<i64> for Role {
    type Error = AuthzError;

    fn try_from(id: i64) -> Result<Self, Self::Error> {
        match id {
            Self::USER_ID => Ok(Role::User),
            Self::ADMIN_ID => Ok(Role::Admin),
            other => Err(AuthzError::UnknownRole(other)),
        }
    }
}

impl From<Role> for i64 {
    fn from(role: Role) -> Self {
        role.id()
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An authenticated identity making a request.
///
/// `role` is the snapshot taken when the token was issued. It is a display
/// hint only: authorization always re-reads the live role from the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Principal {
    pub id: Uuid,
    pub role: Role,
}

impl Principal {
    pub fn new(id: Uuid, role: Role) -> Self {
        Self { id, role }
    }
}
