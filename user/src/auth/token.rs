//! Signed session tokens.
//!
//! Tokens are HS256 JWTs carrying `{id, role_id, exp}`. Nothing about an
//! issued token is stored server-side: a token is valid iff its signature
//! verifies against the process secret and `now < exp`.

use authz::{Principal, Role};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::error::AuthError;

/// Default token lifetime.
pub const TOKEN_LIFETIME_HOURS: i64 = 24;

/// Claims embedded in every token.
///
/// `role_id` is a snapshot taken at login. It is returned as part of the
/// principal for display, never used for authorization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub id: Uuid,
    pub role_id: Role,
    /// Unix timestamp, seconds.
    pub exp: i64,
}

/// The only claim `verify_token` needs to read.
#[derive(Debug, Deserialize)]
struct Expiry {
    exp: i64,
}

/// Issues and verifies session tokens with a fixed secret.
///
/// The secret is injected at construction and never changes for the life of
/// the service.
#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    lifetime: Duration,
}

impl TokenService {
    /// Creates a service signing with `secret`.
    pub fn new(secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp"]);

        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
            lifetime: Duration::hours(TOKEN_LIFETIME_HOURS),
        }
    }

    /// Overrides the token lifetime.
    pub fn with_lifetime(mut self, lifetime: Duration) -> Self {
        self.lifetime = lifetime;
        self
    }

    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }

    /// Issues a token for `principal_id` with a snapshot of `role`.
    pub fn issue_token(&self, principal_id: Uuid, role: Role) -> Result<String, AuthError> {
        let claims = Claims {
            id: principal_id,
            role_id: role,
            exp: (Utc::now() + self.lifetime).timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AuthError::Internal(format!("Failed to sign token: {}", e)))
    }

    /// Checks structure, algorithm, signature and expiry.
    pub fn verify_token(&self, token: &str) -> Result<(), AuthError> {
        self.decode_checked::<Expiry>(token, |claims| claims.exp)
            .map(|_| ())
    }

    /// Verifies the token and decodes the principal it identifies.
    pub fn extract_claims(&self, token: &str) -> Result<Principal, AuthError> {
        let claims = self.decode_checked::<Claims>(token, |claims| claims.exp)?;
        Ok(Principal::new(claims.id, claims.role_id))
    }

    /// Decodes `token` into `T` and rejects it if expired.
    ///
    /// Every failure collapses into `InvalidToken`; the reason is only logged.
    fn decode_checked<T: DeserializeOwned>(
        &self,
        token: &str,
        exp_of: impl Fn(&T) -> i64,
    ) -> Result<T, AuthError> {
        let claims = decode::<T>(token, &self.decoding_key, &self.validation)
            .map_err(|e| {
                debug!("Token rejected: {}", e);
                AuthError::InvalidToken
            })?
            .claims;

        // The library accepts exp == now; expiry is exclusive here.
        if exp_of(&claims) <= Utc::now().timestamp() {
            debug!("Token rejected: expired");
            return Err(AuthError::InvalidToken);
        }

        Ok(claims)
    }
}
