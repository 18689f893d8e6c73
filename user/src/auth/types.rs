//! Account types

use authz::{Principal, Role};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A stored user account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub avatar_url: Option<String>,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserRecord {
    /// The principal this account authenticates as right now.
    pub fn principal(&self) -> Principal {
        Principal::new(self.id, self.role)
    }
}

/// Data for creating an account. The password is already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub username: String,
    pub password_hash: String,
    pub avatar_url: Option<String>,
    pub role: Role,
}

/// Replacement values for an existing account. The password is already hashed.
#[derive(Debug, Clone)]
pub struct UserChanges {
    pub email: String,
    pub username: String,
    pub password_hash: String,
    pub avatar_url: Option<String>,
}

/// Profile update data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserUpdate {
    pub email: String,
    pub password: String,
    pub username: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

/// User registration data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRegistration {
    pub email: String,
    pub password: String,
    pub username: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

/// Login credentials
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}
