//! Identity lookup used during login and registration.

use async_trait::async_trait;
use uuid::Uuid;

use super::types::{NewUser, UserChanges, UserRecord};
use crate::error::Result;

/// Storage for user accounts.
///
/// A missing account is `Ok(None)`; `Err` is reserved for store failures.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserRecord>>;

    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>>;

    /// Inserts a new account. Fails with `EmailTaken` if the email exists.
    async fn create_user(&self, user: NewUser) -> Result<UserRecord>;

    /// Overwrites the account's profile fields. `Ok(None)` if there is no
    /// such account; `EmailTaken` if another account holds the new email.
    async fn update_user(&self, id: Uuid, changes: UserChanges) -> Result<Option<UserRecord>>;
}
