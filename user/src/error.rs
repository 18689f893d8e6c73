use thiserror::Error;

#[derive(Error, Debug)]
pub enum UserError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("User not found: {0}")]
    UserNotFound(uuid::Uuid),

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Email already registered")]
    EmailTaken,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Corrupt record: {0}")]
    CorruptRecord(String),

    #[error("Hashing error: {0}")]
    Hashing(String),

    #[error("Token error: {0}")]
    Token(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Initialization error: {0}")]
    Initialization(String),
}

pub type Result<T> = std::result::Result<T, UserError>;

/// Failures of the per-request authentication and authorization pipeline.
///
/// `NoSession` and `InvalidToken` are both presented to clients as
/// "unauthenticated"; the distinction exists for logging only.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("No session")]
    NoSession,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Forbidden")]
    Forbidden,

    #[error("Permission store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Internal authentication error: {0}")]
    Internal(String),
}

impl AuthError {
    /// True for the failures a client sees as "not logged in".
    pub fn is_unauthenticated(&self) -> bool {
        matches!(self, AuthError::NoSession | AuthError::InvalidToken)
    }
}

impl From<authz::error::AuthzError> for AuthError {
    fn from(err: authz::error::AuthzError) -> Self {
        use authz::error::AuthzError;
        match err {
            AuthzError::Forbidden => AuthError::Forbidden,
            AuthzError::StoreUnavailable(msg) => AuthError::StoreUnavailable(msg),
            other => AuthError::Internal(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use authz::error::AuthzError;

    #[test]
    fn test_unauthenticated_grouping() {
        assert!(AuthError::NoSession.is_unauthenticated());
        assert!(AuthError::InvalidToken.is_unauthenticated());
        assert!(!AuthError::Forbidden.is_unauthenticated());
        assert!(!AuthError::StoreUnavailable("down".into()).is_unauthenticated());
        assert!(!AuthError::Internal("boom".into()).is_unauthenticated());
    }

    #[test]
    fn test_authz_error_mapping() {
        assert!(matches!(
            AuthError::from(AuthzError::Forbidden),
            AuthError::Forbidden
        ));
        assert!(matches!(
            AuthError::from(AuthzError::StoreUnavailable("down".into())),
            AuthError::StoreUnavailable(msg) if msg == "down"
        ));
        assert!(matches!(
            AuthError::from(AuthzError::UnknownRole(9)),
            AuthError::Internal(_)
        ));
    }
}
