//! Registration and login.

use std::sync::Arc;

use authz::Role;
use tracing::{info, warn};
use uuid::Uuid;

use super::identity::IdentityStore;
use super::password::{hash_password, verify_password};
use super::token::TokenService;
use super::types::{Credentials, NewUser, UserChanges, UserRecord, UserRegistration, UserUpdate};
use crate::error::{Result, UserError};

const PASSWORD_MIN_LEN: usize = 6;
const PASSWORD_SPECIAL_CHARS: &str = "@#!&$*";
const USERNAME_MIN_LEN: usize = 6;
const USERNAME_MAX_LEN: usize = 20;

/// Account operations on top of an identity store.
#[derive(Clone)]
pub struct AccountService {
    store: Arc<dyn IdentityStore>,
    tokens: TokenService,
}

impl AccountService {
    pub fn new(store: Arc<dyn IdentityStore>, tokens: TokenService) -> Self {
        Self { store, tokens }
    }

    /// Creates an account with the USER role.
    pub async fn register(&self, registration: UserRegistration) -> Result<UserRecord> {
        validate_profile(
            &registration.email,
            &registration.password,
            &registration.username,
        )?;
        let email = registration.email.trim().to_lowercase();

        if self.store.find_by_email(&email).await?.is_some() {
            warn!("Registration rejected: email already registered");
            return Err(UserError::EmailTaken);
        }

        let password_hash = hash_password(&registration.password)?;
        let user = self
            .store
            .create_user(NewUser {
                email,
                username: registration.username.trim().to_string(),
                password_hash,
                avatar_url: registration.avatar_url,
                role: Role::User,
            })
            .await?;

        info!("Registered user {}", user.id);
        Ok(user)
    }

    /// Replaces the profile of account `id`, re-hashing the password.
    ///
    /// Applies the registration rules. The role is left unchanged.
    pub async fn update(&self, id: Uuid, update: UserUpdate) -> Result<UserRecord> {
        validate_profile(&update.email, &update.password, &update.username)?;
        let email = update.email.trim().to_lowercase();

        if let Some(holder) = self.store.find_by_email(&email).await? {
            if holder.id != id {
                warn!("Update of user {} rejected: email already registered", id);
                return Err(UserError::EmailTaken);
            }
        }

        let password_hash = hash_password(&update.password)?;
        let user = self
            .store
            .update_user(
                id,
                UserChanges {
                    email,
                    username: update.username.trim().to_string(),
                    password_hash,
                    avatar_url: update.avatar_url,
                },
            )
            .await?
            .ok_or(UserError::UserNotFound(id))?;

        info!("Updated user {}", user.id);
        Ok(user)
    }

    /// Checks credentials and issues a session token.
    ///
    /// An unknown email and a wrong password fail the same way.
    pub async fn login(&self, credentials: Credentials) -> Result<(UserRecord, String)> {
        let email = credentials.email.trim().to_lowercase();

        let Some(user) = self.store.find_by_email(&email).await? else {
            warn!("Login failed: invalid credentials");
            return Err(UserError::InvalidCredentials);
        };

        if !verify_password(&user.password_hash, &credentials.password) {
            warn!("Login failed for user {}: invalid credentials", user.id);
            return Err(UserError::InvalidCredentials);
        }

        let token = self
            .tokens
            .issue_token(user.id, user.role)
            .map_err(|e| UserError::Token(e.to_string()))?;

        info!("User {} logged in", user.id);
        Ok((user, token))
    }
}

fn validate_profile(email: &str, password: &str, username: &str) -> Result<()> {
    if !is_valid_email(email.trim()) {
        return Err(UserError::Validation("email is not valid".to_string()));
    }

    if password.chars().count() < PASSWORD_MIN_LEN {
        return Err(UserError::Validation(format!(
            "password must be at least {} characters",
            PASSWORD_MIN_LEN
        )));
    }
    if !password.chars().any(|c| PASSWORD_SPECIAL_CHARS.contains(c)) {
        return Err(UserError::Validation(format!(
            "password must contain one of {}",
            PASSWORD_SPECIAL_CHARS
        )));
    }

    let username_len = username.trim().chars().count();
    if !(USERNAME_MIN_LEN..=USERNAME_MAX_LEN).contains(&username_len) {
        return Err(UserError::Validation(format!(
            "username must be {} to {} characters",
            USERNAME_MIN_LEN, USERNAME_MAX_LEN
        )));
    }

    Ok(())
}

/// `local@label.label[...]`: one `@`, no whitespace, every domain label non-empty.
fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }

    let Some((local, domain)) = email.rsplit_once('@') else {
        return false;
    };

    !local.is_empty()
        && !local.contains('@')
        && domain.contains('.')
        && domain.split('.').all(|label| !label.is_empty())
}
