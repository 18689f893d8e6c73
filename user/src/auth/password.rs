//! Salted password hashing.
//!
//! Hashes are Argon2id PHC strings; the salt and parameters travel inside the
//! stored string, so verification needs nothing but the hash itself.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

use crate::error::{Result, UserError};

/// Hashes `secret` with a fresh random salt.
///
/// Only fails if the hashing primitive itself fails.
pub fn hash_password(secret: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(secret.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| UserError::Hashing(e.to_string()))
}

/// Checks `candidate` against a stored hash.
///
/// Returns `false` on mismatch and on a malformed stored hash; never errors.
pub fn verify_password(hashed: &str, candidate: &str) -> bool {
    match PasswordHash::new(hashed) {
        Ok(parsed) => Argon2::default()
            .verify_password(candidate.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}
