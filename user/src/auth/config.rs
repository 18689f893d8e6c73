//! Session configuration

use std::env;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{Result, UserError};

/// Name of the cookie carrying the session token.
pub const SESSION_COOKIE_NAME: &str = "my_game_list_id";

/// Environment variable holding the token signing secret.
pub const SECRET_KEY_VAR: &str = "JWT_SECRET_KEY";

/// Session configuration
#[derive(Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Session cookie name
    pub cookie_name: String,
    /// Token and cookie lifetime in seconds
    pub timeout_seconds: i64,
    /// Whether to use secure cookies (HTTPS only)
    pub secure: bool,
    /// SameSite cookie attribute
    pub same_site: SameSiteConfig,
    /// HTTP only cookie (not accessible via JavaScript)
    pub http_only: bool,
    /// Token signing secret
    #[serde(skip_serializing)]
    pub secret_key: Vec<u8>,
}

impl SessionConfig {
    /// Load session configuration from the environment.
    ///
    /// Fails if `JWT_SECRET_KEY` is missing or empty; callers treat that as
    /// fatal at startup.
    pub fn new() -> Result<Self> {
        let secret_key = Self::load_secret_key()?;
        let secure = env::var("COOKIE_SECURE")
            .map(|v| matches!(v.as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        info!("Session configuration loaded (secure cookies: {})", secure);

        Ok(Self::with_secret(secret_key).secure(secure))
    }

    /// Configuration with the default cookie attributes and the given secret.
    pub fn with_secret(secret_key: impl Into<Vec<u8>>) -> Self {
        Self {
            cookie_name: SESSION_COOKIE_NAME.to_string(),
            timeout_seconds: 86400, // 24 hours
            secure: false,
            same_site: SameSiteConfig::Strict,
            http_only: true,
            secret_key: secret_key.into(),
        }
    }

    /// Set whether cookies are marked `Secure`
    pub fn secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    fn load_secret_key() -> Result<Vec<u8>> {
        let key = env::var(SECRET_KEY_VAR)
            .map_err(|_| UserError::Configuration(format!("{} not set", SECRET_KEY_VAR)))?;

        if key.trim().is_empty() {
            return Err(UserError::Configuration(format!(
                "{} must not be empty",
                SECRET_KEY_VAR
            )));
        }

        Ok(key.into_bytes())
    }
}

impl std::fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionConfig")
            .field("cookie_name", &self.cookie_name)
            .field("timeout_seconds", &self.timeout_seconds)
            .field("secure", &self.secure)
            .field("same_site", &self.same_site)
            .field("http_only", &self.http_only)
            .field("secret_key", &"<redacted>")
            .finish()
    }
}

/// SameSite cookie configuration
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub enum SameSiteConfig {
    Strict,
    Lax,
    None,
}

impl From<SameSiteConfig> for cookie::SameSite {
    fn from(config: SameSiteConfig) -> Self {
        match config {
            SameSiteConfig::Strict => cookie::SameSite::Strict,
            SameSiteConfig::Lax => cookie::SameSite::Lax,
            SameSiteConfig::None => cookie::SameSite::None,
        }
    }
}
