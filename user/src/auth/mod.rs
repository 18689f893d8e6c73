//! Authentication module for the game list backend
//!
//! This module provides authentication functionality including:
//! - Password hashing and account registration/login
//! - Signed session tokens
//! - Cookie transport for tokens
//! - The per-request authentication and authorization pipeline

pub mod account;
pub mod config;
pub mod identity;
pub mod password;
pub mod session;
pub mod token;
pub mod types;

use authz::{AccessControl, Permission, Principal};
use http::HeaderMap;
use tracing::{debug, warn};

pub use account::AccountService;
pub use config::{SameSiteConfig, SessionConfig};
pub use identity::IdentityStore;
pub use session::SessionCarrier;
pub use token::{Claims, TokenService};
pub use types::{Credentials, UserRecord, UserRegistration, UserUpdate};

use crate::error::AuthError;

/// Per-request authentication and authorization.
///
/// Authentication only reads the cookie and verifies the token; it never
/// touches the store. Authorization always asks the store for the
/// principal's live role.
#[derive(Clone)]
pub struct Authenticator {
    tokens: TokenService,
    carrier: SessionCarrier,
    access: AccessControl,
}

impl Authenticator {
    pub fn new(tokens: TokenService, carrier: SessionCarrier, access: AccessControl) -> Self {
        Self {
            tokens,
            carrier,
            access,
        }
    }

    /// Resolves the principal for a request from its `Cookie` headers.
    pub fn authenticate(&self, headers: &HeaderMap) -> Result<Principal, AuthError> {
        let token = self.carrier.read_session(headers)?;
        let principal = self.tokens.extract_claims(&token).map_err(|e| {
            warn!("Rejected session token: {}", e);
            e
        })?;

        debug!("Authenticated principal {}", principal.id);
        Ok(principal)
    }

    /// Fails with `Forbidden` unless the principal's current role holds `permission`.
    pub async fn authorize(
        &self,
        principal: &Principal,
        permission: Permission,
    ) -> Result<(), AuthError> {
        self.access
            .authorize(principal, permission)
            .await
            .map_err(AuthError::from)
    }

    /// Writes a fresh session cookie carrying `token`.
    pub fn start_session(&self, headers: &mut HeaderMap, token: &str) -> Result<(), AuthError> {
        self.carrier.set_session(headers, token)
    }

    /// Writes an expired session cookie. Works whether or not a session exists.
    pub fn end_session(&self, headers: &mut HeaderMap) -> Result<(), AuthError> {
        self.carrier.clear_session(headers)
    }

    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    pub fn carrier(&self) -> &SessionCarrier {
        &self.carrier
    }

    pub fn access(&self) -> &AccessControl {
        &self.access
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use authz::{InMemoryPermissionGraph, PermissionStore, Role};
    use http::header::{COOKIE, SET_COOKIE};
    use http::HeaderValue;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use uuid::Uuid;

    const SECRET: &[u8] = b"authenticator-test-secret";

    fn authenticator(graph: Arc<InMemoryPermissionGraph>) -> Authenticator {
        let config = SessionConfig::with_secret(SECRET);
        Authenticator::new(
            TokenService::new(SECRET),
            SessionCarrier::new(&config),
            AccessControl::new(graph),
        )
    }

    fn request_with_token(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_str(&format!("my_game_list_id={}", token)).unwrap(),
        );
        headers
    }

    #[tokio::test]
    async fn test_user_cannot_create() {
        let graph = Arc::new(InMemoryPermissionGraph::new());
        let user_id = Uuid::new_v4();
        graph.assign_role(user_id, Role::User).await;
        let auth = authenticator(graph);

        let token = auth.tokens().issue_token(user_id, Role::User).unwrap();
        let principal = auth.authenticate(&request_with_token(&token)).unwrap();
        assert_eq!(principal, Principal::new(user_id, Role::User));

        auth.authorize(&principal, Permission::Read).await.unwrap();
        let denied = auth.authorize(&principal, Permission::Create).await;
        assert!(matches!(denied, Err(AuthError::Forbidden)));
    }

    #[tokio::test]
    async fn test_missing_cookie_is_no_session() {
        let auth = authenticator(Arc::new(InMemoryPermissionGraph::new()));
        assert!(matches!(
            auth.authenticate(&HeaderMap::new()),
            Err(AuthError::NoSession)
        ));
    }

    /// Answers every lookup with `true` and counts how often it was asked.
    #[derive(Default)]
    struct CountingStore {
        lookups: AtomicUsize,
    }

    #[async_trait]
    impl PermissionStore for CountingStore {
        async fn has_edge(
            &self,
            _principal_id: Uuid,
            _permission: Permission,
        ) -> authz::error::Result<bool> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            Ok(true)
        }
    }

    #[tokio::test]
    async fn test_rejected_session_never_reaches_store() {
        let store = Arc::new(CountingStore::default());
        let config = SessionConfig::with_secret(SECRET);
        let auth = Authenticator::new(
            TokenService::new(SECRET),
            SessionCarrier::new(&config),
            AccessControl::new(store.clone()),
        );

        // Same order as the request pipeline: authorize only after authenticate succeeds.
        for headers in [HeaderMap::new(), request_with_token("not.a.token")] {
            let outcome = match auth.authenticate(&headers) {
                Ok(principal) => auth.authorize(&principal, Permission::Read).await,
                Err(e) => Err(e),
            };
            assert!(matches!(
                outcome,
                Err(AuthError::NoSession) | Err(AuthError::InvalidToken)
            ));
        }
        assert_eq!(store.lookups.load(Ordering::SeqCst), 0);

        let token = auth.tokens().issue_token(Uuid::new_v4(), Role::User).unwrap();
        let principal = auth.authenticate(&request_with_token(&token)).unwrap();
        auth.authorize(&principal, Permission::Read).await.unwrap();
        assert_eq!(store.lookups.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_foreign_token_is_invalid() {
        let auth = authenticator(Arc::new(InMemoryPermissionGraph::new()));
        let forged = TokenService::new(b"someone-else")
            .issue_token(Uuid::new_v4(), Role::Admin)
            .unwrap();

        assert!(matches!(
            auth.authenticate(&request_with_token(&forged)),
            Err(AuthError::InvalidToken)
        ));
    }

    #[tokio::test]
    async fn test_demoted_admin_token_loses_access() {
        let graph = Arc::new(InMemoryPermissionGraph::new());
        let admin_id = Uuid::new_v4();
        graph.assign_role(admin_id, Role::Admin).await;
        let auth = authenticator(graph.clone());

        let token = auth.tokens().issue_token(admin_id, Role::Admin).unwrap();
        let principal = auth.authenticate(&request_with_token(&token)).unwrap();
        auth.authorize(&principal, Permission::Delete).await.unwrap();

        graph.assign_role(admin_id, Role::User).await;
        let denied = auth.authorize(&principal, Permission::Delete).await;
        assert!(matches!(denied, Err(AuthError::Forbidden)));
    }

    #[tokio::test]
    async fn test_offline_store_is_not_forbidden() {
        let graph = Arc::new(InMemoryPermissionGraph::new());
        let user_id = Uuid::new_v4();
        graph.assign_role(user_id, Role::Admin).await;
        graph.set_offline(true).await;
        let auth = authenticator(graph);

        let result = auth
            .authorize(&Principal::new(user_id, Role::Admin), Permission::Read)
            .await;
        assert!(matches!(result, Err(AuthError::StoreUnavailable(_))));
    }

    #[tokio::test]
    async fn test_session_cookies() {
        let auth = authenticator(Arc::new(InMemoryPermissionGraph::new()));

        let mut started = HeaderMap::new();
        auth.start_session(&mut started, "tok").unwrap();
        assert!(started
            .get(SET_COOKIE)
            .unwrap()
            .to_str()
            .unwrap()
            .starts_with("my_game_list_id=tok"));

        let mut ended = HeaderMap::new();
        auth.end_session(&mut ended).unwrap();
        assert!(ended
            .get(SET_COOKIE)
            .unwrap()
            .to_str()
            .unwrap()
            .starts_with("my_game_list_id=;"));
    }
}
