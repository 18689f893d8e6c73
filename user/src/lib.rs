pub mod auth;
pub mod database;
pub mod error;

use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use authz::AccessControl;
use auth::{AccountService, Authenticator, SessionCarrier, TokenService};
use database::UserDatabase;

/// Upper bound on a single permission lookup during a request.
const PERMISSION_LOOKUP_TIMEOUT: Duration = Duration::from_secs(5);

/// User management system with authentication
pub struct UserManager {
    database: Arc<UserDatabase>,
    authenticator: Authenticator,
    accounts: AccountService,
    session_config: SessionConfig,
}

impl UserManager {
    /// Create a new user manager with the provided configuration
    pub async fn new(
        db_config: database::UserDatabaseConfig,
        session_config: SessionConfig,
    ) -> error::Result<Self> {
        info!("Initializing user management system with authentication");

        let database = Arc::new(UserDatabase::new(db_config).await?);

        let tokens = TokenService::new(&session_config.secret_key)
            .with_lifetime(chrono::Duration::seconds(session_config.timeout_seconds));
        let access = AccessControl::new(database.clone())
            .with_lookup_timeout(PERMISSION_LOOKUP_TIMEOUT);

        let authenticator = Authenticator::new(
            tokens.clone(),
            SessionCarrier::new(&session_config),
            access,
        );
        let accounts = AccountService::new(database.clone(), tokens);

        info!("User management system initialized successfully");

        Ok(Self {
            database,
            authenticator,
            accounts,
            session_config,
        })
    }

    /// Get a reference to the database
    pub fn database(&self) -> &UserDatabase {
        &self.database
    }

    pub fn authenticator(&self) -> &Authenticator {
        &self.authenticator
    }

    pub fn accounts(&self) -> &AccountService {
        &self.accounts
    }

    /// Get the session configuration
    pub fn session_config(&self) -> &SessionConfig {
        &self.session_config
    }

    /// Verify system integrity
    pub async fn verify_integrity(&self) -> error::Result<bool> {
        self.database.verify_integrity().await
    }
}

// Re-export commonly used types
pub use auth::{
    Credentials, SameSiteConfig, SessionConfig, UserRecord, UserRegistration, UserUpdate,
};
pub use database::UserDatabaseConfig;
pub use error::{AuthError, Result as UserResult, UserError};

#[cfg(test)]
mod tests {
    use super::*;
    use authz::{Permission, Role};
    use http::{header::COOKIE, HeaderMap, HeaderValue};
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_user_manager_creation() {
        let temp_dir = TempDir::new().unwrap();
        let config = UserDatabaseConfig::at(temp_dir.path().join("test_user.db"));

        let manager = UserManager::new(config, SessionConfig::with_secret("manager-secret"))
            .await
            .unwrap();

        assert!(manager.verify_integrity().await.unwrap());
    }

    #[tokio::test]
    async fn test_login_to_authorization_flow() {
        let temp_dir = TempDir::new().unwrap();
        let config = UserDatabaseConfig::at(temp_dir.path().join("flow.db"));
        let manager = UserManager::new(config, SessionConfig::with_secret("flow-secret"))
            .await
            .unwrap();

        let registered = manager
            .accounts()
            .register(UserRegistration {
                email: "flow@example.com".to_string(),
                password: "secret!1".to_string(),
                username: "flow_user".to_string(),
                avatar_url: None,
            })
            .await
            .unwrap();

        let (_, token) = manager
            .accounts()
            .login(Credentials {
                email: "flow@example.com".to_string(),
                password: "secret!1".to_string(),
            })
            .await
            .unwrap();

        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_str(&format!("my_game_list_id={}", token)).unwrap(),
        );
        let auth = manager.authenticator();
        let principal = auth.authenticate(&headers).unwrap();
        assert_eq!(principal.id, registered.id);

        auth.authorize(&principal, Permission::Read).await.unwrap();
        assert!(matches!(
            auth.authorize(&principal, Permission::Delete).await,
            Err(AuthError::Forbidden)
        ));

        // Promotion takes effect without a new token.
        manager
            .database()
            .set_user_role(registered.id, Role::Admin)
            .await
            .unwrap();
        auth.authorize(&principal, Permission::Delete).await.unwrap();
    }
}
