//! The permission graph seen by the engine.
//!
//! The engine only ever asks one question of storage: is there a path from
//! this user, through its current role, to this permission? How the edges are
//! stored is up to the implementation.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{AuthzError, Result};
use crate::types::{Permission, Role};

/// Backing query for access checks.
#[async_trait]
pub trait PermissionStore: Send + Sync {
    /// Returns `Ok(true)` iff the principal's live role has an edge to
    /// `permission`. An unknown principal has no edges.
    ///
    /// Failures to reach the store must be reported as
    /// [`AuthzError::StoreUnavailable`].
    async fn has_edge(&self, principal_id: Uuid, permission: Permission) -> Result<bool>;
}

/// In-memory adjacency for user → role → permission.
///
/// Seeded with the built-in role grants. Useful wherever a real database is
/// not wanted, and as a reference for what `has_edge` must answer.
#[derive(Debug)]
pub struct InMemoryPermissionGraph {
    inner: RwLock<Graph>,
}

#[derive(Debug, Default)]
struct Graph {
    user_roles: HashMap<Uuid, Role>,
    role_permissions: HashMap<Role, HashSet<Permission>>,
    offline: bool,
}

impl InMemoryPermissionGraph {
    /// Creates a graph with the default grants for every built-in role.
    pub fn new() -> Self {
        let mut graph = Graph::default();
        for role in [Role::User, Role::Admin] {
            graph
                .role_permissions
                .insert(role, role.default_permissions().iter().copied().collect());
        }
        Self {
            inner: RwLock::new(graph),
        }
    }

    pub async fn assign_role(&self, user_id: Uuid, role: Role) {
        self.inner.write().await.user_roles.insert(user_id, role);
    }

    pub async fn grant(&self, role: Role, permission: Permission) {
        self.inner
            .write()
            .await
            .role_permissions
            .entry(role)
            .or_default()
            .insert(permission);
    }

    pub async fn revoke(&self, role: Role, permission: Permission) {
        if let Some(permissions) = self.inner.write().await.role_permissions.get_mut(&role) {
            permissions.remove(&permission);
        }
    }

    /// Simulates an unreachable store: every lookup fails until set back.
    pub async fn set_offline(&self, offline: bool) {
        self.inner.write().await.offline = offline;
    }
}

impl Default for InMemoryPermissionGraph {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PermissionStore for InMemoryPermissionGraph {
    async fn has_edge(&self, principal_id: Uuid, permission: Permission) -> Result<bool> {
        let graph = self.inner.read().await;
        if graph.offline {
            return Err(AuthzError::StoreUnavailable(
                "in-memory graph is offline".to_string(),
            ));
        }

        Ok(graph
            .user_roles
            .get(&principal_id)
            .and_then(|role| graph.role_permissions.get(role))
            .is_some_and(|permissions| permissions.contains(&permission)))
    }
}
