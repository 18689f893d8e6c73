//! Cookie transport for session tokens.
//!
//! The carrier only moves an opaque string in and out of HTTP headers. It
//! knows nothing about what the token contains.

use cookie::{
    time::{Duration, OffsetDateTime},
    Cookie,
};
use http::{
    header::{COOKIE, SET_COOKIE},
    HeaderMap, HeaderValue,
};
use tracing::debug;

use super::config::{SameSiteConfig, SessionConfig};
use crate::error::AuthError;

/// Binds a token to the session cookie.
#[derive(Debug, Clone)]
pub struct SessionCarrier {
    cookie_name: String,
    max_age_seconds: i64,
    secure: bool,
    http_only: bool,
    same_site: SameSiteConfig,
}

impl SessionCarrier {
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            cookie_name: config.cookie_name.clone(),
            max_age_seconds: config.timeout_seconds,
            secure: config.secure,
            http_only: config.http_only,
            same_site: config.same_site,
        }
    }

    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    /// Appends a `Set-Cookie` header carrying `token`.
    pub fn set_session(&self, headers: &mut HeaderMap, token: &str) -> Result<(), AuthError> {
        let max_age = Duration::seconds(self.max_age_seconds);
        let cookie = self
            .builder(token.to_string())
            .max_age(max_age)
            .expires(OffsetDateTime::now_utc() + max_age)
            .build();

        self.append(headers, cookie)
    }

    /// Reads the session token from the request's `Cookie` headers.
    ///
    /// Fails with `NoSession` if the cookie is absent or empty.
    pub fn read_session(&self, headers: &HeaderMap) -> Result<String, AuthError> {
        let token = headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|value| Cookie::split_parse(value))
            .filter_map(|parsed| parsed.ok())
            .find(|c| c.name() == self.cookie_name)
            .map(|c| c.value().to_string());

        match token {
            Some(token) if !token.is_empty() => Ok(token),
            _ => {
                debug!("No usable {} cookie on request", self.cookie_name);
                Err(AuthError::NoSession)
            }
        }
    }

    /// Overwrites the cookie with an empty, already-expired value.
    pub fn clear_session(&self, headers: &mut HeaderMap) -> Result<(), AuthError> {
        let cookie = self
            .builder(String::new())
            .max_age(Duration::ZERO)
            .expires(OffsetDateTime::UNIX_EPOCH)
            .build();

        self.append(headers, cookie)
    }

    fn builder(&self, value: String) -> cookie::CookieBuilder<'static> {
        Cookie::build((self.cookie_name.clone(), value))
            .path("/")
            .http_only(self.http_only)
            .secure(self.secure)
            .same_site(cookie::SameSite::from(self.same_site))
    }

    fn append(&self, headers: &mut HeaderMap, cookie: Cookie<'static>) -> Result<(), AuthError> {
        let value = HeaderValue::from_str(&cookie.to_string())
            .map_err(|e| AuthError::Internal(format!("Invalid cookie header: {}", e)))?;
        headers.append(SET_COOKIE, value);
        Ok(())
    }
}
