//! Error types for the authorization system.
//!
//! # Security Note
//! A denied decision and a failed lookup are different outcomes and must stay
//! different all the way to the HTTP boundary: the first is a 403, the second
//! a 500. Neither message carries role or permission layout details.

use thiserror::Error;

/// Errors that can occur during authorization operations.
#[derive(Debug, Error)]
pub enum AuthzError {
    /// The principal is authenticated but its live role lacks the permission.
    #[error("Forbidden")]
    Forbidden,

    /// The permission graph could not be queried.
    ///
    /// Raised for store failures and for lookups that miss the caller's
    /// deadline. Never reported as `Forbidden`.
    #[error("Permission store unavailable: {0}")]
    StoreUnavailable(String),

    /// A permission name did not match the closed set.
    #[error("Unknown permission: {0}")]
    UnknownPermission(String),

    /// A role id did not match a built-in role.
    #[error("Unknown role id: {0}")]
    UnknownRole(i64),
}

/// A specialized Result type for authorization operations.
pub type Result<T> = std::result::Result<T, AuthzError>;
