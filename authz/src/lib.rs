//! Role-based access control for the game list backend.
//!
//! This crate decides whether an authenticated principal may perform an
//! action. It defines the closed permission set, the built-in roles and an
//! [`AccessControl`] engine that answers access questions through a
//! [`PermissionStore`].
//!
//! # Architecture Overview
//!
//! 1. **Request arrives** at the API layer
//! 2. **Authentication** verifies the session token and yields a [`Principal`]
//! 3. **Authorization middleware** names the [`Permission`] the route needs
//! 4. **AccessControl** asks the store whether the principal's live role holds it
//! 5. **Decision**: allow, `Forbidden`, or `StoreUnavailable`
//!
//! The role id carried inside a token is never consulted here. A demoted user
//! keeps a valid token until it expires, but loses access on the next request.

pub mod error;
pub mod store;
pub mod types;

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};
use uuid::Uuid;

use error::{AuthzError, Result};
pub use store::{InMemoryPermissionGraph, PermissionStore};
pub use types::{Permission, Principal, Role};

/// The access-control engine.
///
/// Holds no mutable state; clones share the same store and can be used from
/// any number of concurrent requests.
///
/// # Example
///
/// ```rust
/// use authz::{AccessControl, InMemoryPermissionGraph, Permission, Role};
/// use std::sync::Arc;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let graph = Arc::new(InMemoryPermissionGraph::new());
/// let user = uuid::Uuid::new_v4();
/// graph.assign_role(user, Role::User).await;
///
/// let engine = AccessControl::new(graph);
/// assert!(engine.has_access(user, Permission::Read).await.unwrap());
/// assert!(!engine.has_access(user, Permission::Delete).await.unwrap());
/// # }
/// ```
#[derive(Clone)]
pub struct AccessControl {
    store: Arc<dyn PermissionStore>,
    lookup_timeout: Option<Duration>,
}

impl AccessControl {
    /// Creates an engine over the given permission store.
    pub fn new(store: Arc<dyn PermissionStore>) -> Self {
        Self {
            store,
            lookup_timeout: None,
        }
    }

    /// Bounds every store lookup. A lookup that misses the deadline is
    /// reported as [`AuthzError::StoreUnavailable`].
    pub fn with_lookup_timeout(mut self, timeout: Duration) -> Self {
        self.lookup_timeout = Some(timeout);
        self
    }

    /// Whether the principal's current role holds `permission`.
    ///
    /// # Returns
    ///
    /// - `Ok(true)` if a role-permission edge exists for the live role
    /// - `Ok(false)` if it does not (including unknown principals)
    /// - `Err(AuthzError::StoreUnavailable)` if the store could not answer
    pub async fn has_access(&self, principal_id: Uuid, permission: Permission) -> Result<bool> {
        let lookup = self.store.has_edge(principal_id, permission);

        let result = match self.lookup_timeout {
            Some(limit) => match tokio::time::timeout(limit, lookup).await {
                Ok(result) => result,
                Err(_) => Err(AuthzError::StoreUnavailable(format!(
                    "permission lookup exceeded {}ms",
                    limit.as_millis()
                ))),
            },
            None => lookup.await,
        };

        match result {
            Ok(allowed) => {
                debug!(
                    "Access check for {} on {}: {}",
                    principal_id,
                    permission,
                    if allowed { "allowed" } else { "denied" }
                );
                Ok(allowed)
            }
            Err(e) => {
                error!(
                    "Access check for {} on {} failed: {}",
                    principal_id, permission, e
                );
                Err(match e {
                    AuthzError::StoreUnavailable(_) => e,
                    other => AuthzError::StoreUnavailable(other.to_string()),
                })
            }
        }
    }

    /// Authorizes `principal` for `permission`.
    ///
    /// Only `principal.id` is used; the role snapshot is ignored.
    pub async fn authorize(&self, principal: &Principal, permission: Permission) -> Result<()> {
        if self.has_access(principal.id, permission).await? {
            Ok(())
        } else {
            warn!(
                "Principal {} is forbidden to {}",
                principal.id, permission
            );
            Err(AuthzError::Forbidden)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use rstest::rstest;

    struct SlowStore;

    #[async_trait]
    impl PermissionStore for SlowStore {
        async fn has_edge(&self, _principal_id: Uuid, _permission: Permission) -> Result<bool> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(true)
        }
    }

    async fn engine_with(role: Role) -> (AccessControl, Arc<InMemoryPermissionGraph>, Uuid) {
        let graph = Arc::new(InMemoryPermissionGraph::new());
        let id = Uuid::new_v4();
        graph.assign_role(id, role).await;
        (AccessControl::new(graph.clone()), graph, id)
    }

    #[rstest]
    #[case(Role::User, Permission::Read, true)]
    #[case(Role::User, Permission::Create, false)]
    #[case(Role::User, Permission::Update, false)]
    #[case(Role::User, Permission::Delete, false)]
    #[case(Role::Admin, Permission::Read, true)]
    #[case(Role::Admin, Permission::Create, true)]
    #[case(Role::Admin, Permission::Update, true)]
    #[case(Role::Admin, Permission::Delete, true)]
    #[tokio::test]
    async fn test_default_role_grants(
        #[case] role: Role,
        #[case] permission: Permission,
        #[case] expected: bool,
    ) {
        let (engine, _, id) = engine_with(role).await;
        assert_eq!(engine.has_access(id, permission).await.unwrap(), expected);
    }

    #[tokio::test]
    async fn test_user_role_forbidden_to_create() {
        let (engine, _, id) = engine_with(Role::User).await;
        let principal = Principal::new(id, Role::User);

        let result = engine.authorize(&principal, Permission::Create).await;
        assert!(matches!(result, Err(AuthzError::Forbidden)));
        assert!(engine.authorize(&principal, Permission::Read).await.is_ok());
    }

    #[tokio::test]
    async fn test_live_permission_changes_apply_immediately() {
        let (engine, graph, id) = engine_with(Role::User).await;
        let principal = Principal::new(id, Role::User);

        graph.grant(Role::User, Permission::Create).await;
        assert!(engine.authorize(&principal, Permission::Create).await.is_ok());

        graph.revoke(Role::User, Permission::Create).await;
        assert!(matches!(
            engine.authorize(&principal, Permission::Create).await,
            Err(AuthzError::Forbidden)
        ));
    }

    #[tokio::test]
    async fn test_token_role_snapshot_is_not_trusted() {
        let (engine, graph, id) = engine_with(Role::Admin).await;
        // Token still says admin, but the user was demoted.
        let principal = Principal::new(id, Role::Admin);
        graph.assign_role(id, Role::User).await;

        assert!(matches!(
            engine.authorize(&principal, Permission::Delete).await,
            Err(AuthzError::Forbidden)
        ));
    }

    #[tokio::test]
    async fn test_store_failure_is_not_forbidden() {
        let (engine, graph, id) = engine_with(Role::Admin).await;
        graph.set_offline(true).await;

        let result = engine
            .authorize(&Principal::new(id, Role::Admin), Permission::Read)
            .await;
        assert!(matches!(result, Err(AuthzError::StoreUnavailable(_))));
    }

    #[tokio::test]
    async fn test_lookup_timeout_reports_store_unavailable() {
        let engine = AccessControl::new(Arc::new(SlowStore))
            .with_lookup_timeout(Duration::from_millis(20));

        let result = engine.has_access(Uuid::new_v4(), Permission::Read).await;
        assert!(matches!(result, Err(AuthzError::StoreUnavailable(_))));
    }

    /// Collects formatted log output for assertions.
    #[derive(Clone, Default)]
    struct CapturedLog(Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedLog {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_lookup_timeout_is_logged() {
        let log = CapturedLog::default();
        let writer = log.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let engine = AccessControl::new(Arc::new(SlowStore))
            .with_lookup_timeout(Duration::from_millis(20));
        let id = Uuid::new_v4();
        assert!(engine.has_access(id, Permission::Read).await.is_err());

        let output = String::from_utf8(log.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains("ERROR"));
        assert!(output.contains(&format!("Access check for {} on read failed", id)));
        assert!(output.contains("permission lookup exceeded 20ms"));
    }

    #[tokio::test]
    async fn test_concurrent_checks() {
        let (engine, _, id) = engine_with(Role::User).await;

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let engine = engine.clone();
                let permission = Permission::ALL[i % 4];
                tokio::spawn(async move { (permission, engine.has_access(id, permission).await) })
            })
            .collect();

        for handle in handles {
            let (permission, result) = handle.await.unwrap();
            assert_eq!(result.unwrap(), permission == Permission::Read);
        }
    }
}
