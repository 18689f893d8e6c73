use async_trait::async_trait;
use authz::{error::AuthzError, Permission, PermissionStore, Role};
use chrono::{DateTime, Utc};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    FromRow, Pool, Sqlite,
};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::auth::identity::IdentityStore;
use crate::auth::types::{NewUser, UserChanges, UserRecord};
use crate::error::{Result, UserError};

/// Configuration for the user database
#[derive(Debug, Clone)]
pub struct UserDatabaseConfig {
    /// Path to the database file
    pub database_path: PathBuf,
    /// Maximum number of connections in the pool
    pub max_connections: u32,
    /// Connection acquire timeout in seconds
    pub connection_timeout: u64,
}

impl UserDatabaseConfig {
    /// Default settings for a database at `path`.
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            database_path: path.into(),
            ..Self::default()
        }
    }
}

impl Default for UserDatabaseConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("data/my_game_list.db"),
            max_connections: 5,
            connection_timeout: 30,
        }
    }
}

#[derive(FromRow)]
struct UserRow {
    id: String,
    email: String,
    username: String,
    password_hash: String,
    avatar_url: Option<String>,
    role_id: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for UserRecord {
    type Error = UserError;

    fn try_from(row: UserRow) -> Result<Self> {
        let id = Uuid::parse_str(&row.id)
            .map_err(|e| UserError::CorruptRecord(format!("user id {}: {}", row.id, e)))?;
        let role = Role::try_from(row.role_id)
            .map_err(|e| UserError::CorruptRecord(format!("user {}: {}", row.id, e)))?;

        Ok(Self {
            id,
            email: row.email,
            username: row.username,
            password_hash: row.password_hash,
            avatar_url: row.avatar_url,
            role,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// `meta` key recording that default grants were written.
const GRANTS_SEEDED_KEY: &str = "default_grants_seeded";

const USER_COLUMNS: &str =
    "id, email, username, password_hash, avatar_url, role_id, created_at, updated_at";

/// User database manager
///
/// Holds users and the role → permission graph.
pub struct UserDatabase {
    pool: Pool<Sqlite>,
    config: UserDatabaseConfig,
}

impl UserDatabase {
    /// Initialize the user database
    pub async fn new(config: UserDatabaseConfig) -> Result<Self> {
        // Ensure the directory exists
        if let Some(parent) = config.database_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        info!(
            "Opening user database at: {}",
            config.database_path.display()
        );

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout))
            .connect_with(
                SqliteConnectOptions::new()
                    .filename(&config.database_path)
                    .create_if_missing(true)
                    .foreign_keys(true),
            )
            .await
            .map_err(|e| UserError::Initialization(format!("Failed to open database: {}", e)))?;

        let db = Self { pool, config };

        db.create_tables().await?;
        db.seed_roles_and_permissions().await?;

        info!("User database initialized successfully");

        Ok(db)
    }

    async fn create_tables(&self) -> Result<()> {
        info!("Creating user database tables");

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS meta (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS roles (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL UNIQUE
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS permissions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                access_type TEXT NOT NULL UNIQUE
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS role_permissions (
                role_id INTEGER NOT NULL,
                permission_id INTEGER NOT NULL,
                PRIMARY KEY (role_id, permission_id),
                FOREIGN KEY (role_id) REFERENCES roles(id) ON DELETE CASCADE,
                FOREIGN KEY (permission_id) REFERENCES permissions(id) ON DELETE CASCADE
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                email TEXT NOT NULL UNIQUE,
                username TEXT NOT NULL,
                password_hash TEXT NOT NULL,
                avatar_url TEXT,
                role_id INTEGER NOT NULL,
                created_at TIMESTAMP NOT NULL,
                updated_at TIMESTAMP NOT NULL,
                FOREIGN KEY (role_id) REFERENCES roles(id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_users_role ON users(role_id)")
            .execute(&self.pool)
            .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_role_permissions_role ON role_permissions(role_id)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Seeds the closed permission set and the built-in roles.
    ///
    /// Default grants are written once per database, recorded by a marker
    /// row in `meta`. Later grant changes, including revoking every edge,
    /// survive a restart.
    async fn seed_roles_and_permissions(&self) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        for permission in Permission::ALL {
            sqlx::query("INSERT OR IGNORE INTO permissions (access_type) VALUES (?)")
                .bind(permission.as_str())
                .execute(&mut *tx)
                .await?;
        }

        for role in [Role::User, Role::Admin] {
            sqlx::query("INSERT OR IGNORE INTO roles (id, name) VALUES (?, ?)")
                .bind(role.id())
                .bind(role.name())
                .execute(&mut *tx)
                .await?;
        }

        let seeded = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM meta WHERE key = ?)",
        )
        .bind(GRANTS_SEEDED_KEY)
        .fetch_one(&mut *tx)
        .await?;

        if !seeded {
            // Databases created before the marker existed keep their grants.
            let existing = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM role_permissions")
                .fetch_one(&mut *tx)
                .await?;

            if existing == 0 {
                for role in [Role::User, Role::Admin] {
                    for permission in role.default_permissions() {
                        sqlx::query(
                            r#"
                            INSERT OR IGNORE INTO role_permissions (role_id, permission_id)
                            SELECT ?, id FROM permissions WHERE access_type = ?
                            "#,
                        )
                        .bind(role.id())
                        .bind(permission.as_str())
                        .execute(&mut *tx)
                        .await?;
                    }
                    info!("Seeded default permissions for role {}", role);
                }
            }

            sqlx::query("INSERT INTO meta (key, value) VALUES (?, ?)")
                .bind(GRANTS_SEEDED_KEY)
                .bind(Utc::now().to_rfc3339())
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Get the database pool for external use
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    pub fn config(&self) -> &UserDatabaseConfig {
        &self.config
    }

    /// Adds a role → permission edge. Idempotent.
    pub async fn grant_permission(&self, role: Role, permission: Permission) -> Result<()> {
        sqlx::query(
            r#"
            INSERT OR IGNORE INTO role_permissions (role_id, permission_id)
            SELECT ?, id FROM permissions WHERE access_type = ?
            "#,
        )
        .bind(role.id())
        .bind(permission.as_str())
        .execute(&self.pool)
        .await?;

        debug!("Granted {} to role {}", permission, role);
        Ok(())
    }

    /// Removes a role → permission edge. Idempotent.
    pub async fn revoke_permission(&self, role: Role, permission: Permission) -> Result<()> {
        sqlx::query(
            r#"
            DELETE FROM role_permissions
            WHERE role_id = ?
              AND permission_id = (SELECT id FROM permissions WHERE access_type = ?)
            "#,
        )
        .bind(role.id())
        .bind(permission.as_str())
        .execute(&self.pool)
        .await?;

        info!("Revoked {} from role {}", permission, role);
        Ok(())
    }

    /// Permissions currently granted to `role`.
    pub async fn role_permissions(&self, role: Role) -> Result<Vec<Permission>> {
        let names = sqlx::query_scalar::<_, String>(
            r#"
            SELECT p.access_type
            FROM role_permissions rp
            JOIN permissions p ON p.id = rp.permission_id
            WHERE rp.role_id = ?
            ORDER BY p.id
            "#,
        )
        .bind(role.id())
        .fetch_all(&self.pool)
        .await?;

        names
            .iter()
            .map(|name| {
                name.parse::<Permission>()
                    .map_err(|e| UserError::CorruptRecord(e.to_string()))
            })
            .collect()
    }

    /// Moves a user to another role. Returns `false` if the user does not exist.
    pub async fn set_user_role(&self, user_id: Uuid, role: Role) -> Result<bool> {
        let result = sqlx::query("UPDATE users SET role_id = ?, updated_at = ? WHERE id = ?")
            .bind(role.id())
            .bind(Utc::now())
            .bind(user_id.to_string())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() > 0 {
            info!("User {} moved to role {}", user_id, role);
        }
        Ok(result.rows_affected() > 0)
    }

    /// Deletes a user. Returns `false` if the user does not exist.
    pub async fn delete_user(&self, user_id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(user_id.to_string())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Verify database integrity
    pub async fn verify_integrity(&self) -> Result<bool> {
        for table in ["meta", "users", "roles", "permissions", "role_permissions"] {
            let exists = sqlx::query_scalar::<_, bool>(
                "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name=?)",
            )
            .bind(table)
            .fetch_one(&self.pool)
            .await?;

            if !exists {
                warn!("Missing table: {}", table);
                return Ok(false);
            }
        }

        let roles = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM roles WHERE id IN (?, ?)")
            .bind(Role::USER_ID)
            .bind(Role::ADMIN_ID)
            .fetch_one(&self.pool)
            .await?;
        let permissions = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM permissions")
            .fetch_one(&self.pool)
            .await?;

        if roles != 2 || permissions != Permission::ALL.len() as i64 {
            warn!(
                "Seed data incomplete: {} roles, {} permissions",
                roles, permissions
            );
            return Ok(false);
        }

        info!("Database integrity check passed");
        Ok(true)
    }

    /// Close the database connection
    pub async fn close(self) -> Result<()> {
        self.pool.close().await;
        info!("User database connection closed");
        Ok(())
    }

    async fn fetch_user(&self, column: &str, value: String) -> Result<Option<UserRecord>> {
        let query = format!("SELECT {} FROM users WHERE {} = ?", USER_COLUMNS, column);

        sqlx::query_as::<_, UserRow>(&query)
            .bind(value)
            .fetch_optional(&self.pool)
            .await?
            .map(UserRecord::try_from)
            .transpose()
    }
}

#[async_trait]
impl IdentityStore for UserDatabase {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserRecord>> {
        self.fetch_user("id", id.to_string()).await
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>> {
        self.fetch_user("email", email.to_string()).await
    }

    async fn create_user(&self, user: NewUser) -> Result<UserRecord> {
        let id = Uuid::new_v4();
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            INSERT INTO users (id, email, username, password_hash, avatar_url, role_id, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(id.to_string())
        .bind(&user.email)
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(&user.avatar_url)
        .bind(user.role.id())
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => {}
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                return Err(UserError::EmailTaken);
            }
            Err(e) => return Err(e.into()),
        }

        debug!("Created user {}", id);

        Ok(UserRecord {
            id,
            email: user.email,
            username: user.username,
            password_hash: user.password_hash,
            avatar_url: user.avatar_url,
            role: user.role,
            created_at: now,
            updated_at: now,
        })
    }

    async fn update_user(&self, id: Uuid, changes: UserChanges) -> Result<Option<UserRecord>> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET email = ?, username = ?, password_hash = ?, avatar_url = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&changes.email)
        .bind(&changes.username)
        .bind(&changes.password_hash)
        .bind(&changes.avatar_url)
        .bind(Utc::now())
        .bind(id.to_string())
        .execute(&self.pool)
        .await;

        match result {
            Ok(done) if done.rows_affected() == 0 => return Ok(None),
            Ok(_) => {}
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                return Err(UserError::EmailTaken);
            }
            Err(e) => return Err(e.into()),
        }

        debug!("Updated user {}", id);
        self.find_by_id(id).await
    }
}

#[async_trait]
impl PermissionStore for UserDatabase {
    async fn has_edge(
        &self,
        principal_id: Uuid,
        permission: Permission,
    ) -> authz::error::Result<bool> {
        sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS(
                SELECT 1
                FROM users u
                JOIN role_permissions rp ON rp.role_id = u.role_id
                JOIN permissions p ON p.id = rp.permission_id
                WHERE u.id = ? AND p.access_type = ?
            )
            "#,
        )
        .bind(principal_id.to_string())
        .bind(permission.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to check user access in database: {}", e);
            AuthzError::StoreUnavailable(e.to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn open(temp_dir: &TempDir) -> UserDatabase {
        UserDatabase::new(UserDatabaseConfig::at(temp_dir.path().join("test_user.db")))
            .await
            .unwrap()
    }

    async fn insert_user(db: &UserDatabase, email: &str, role: Role) -> UserRecord {
        db.create_user(NewUser {
            email: email.to_string(),
            username: "some_player".to_string(),
            password_hash: "$argon2id$placeholder".to_string(),
            avatar_url: None,
            role,
        })
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_database_initialization() {
        let temp_dir = TempDir::new().unwrap();
        let db = open(&temp_dir).await;

        assert!(temp_dir.path().join("test_user.db").exists());
        assert!(db.verify_integrity().await.unwrap());

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_default_grants_seeded() {
        let temp_dir = TempDir::new().unwrap();
        let db = open(&temp_dir).await;

        assert_eq!(
            db.role_permissions(Role::User).await.unwrap(),
            vec![Permission::Read]
        );
        assert_eq!(
            db.role_permissions(Role::Admin).await.unwrap(),
            Permission::ALL.to_vec()
        );
    }

    #[tokio::test]
    async fn test_revocation_survives_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let db = open(&temp_dir).await;
        db.revoke_permission(Role::Admin, Permission::Delete)
            .await
            .unwrap();
        db.close().await.unwrap();

        let reopened = open(&temp_dir).await;
        assert!(!reopened
            .role_permissions(Role::Admin)
            .await
            .unwrap()
            .contains(&Permission::Delete));
    }

    #[tokio::test]
    async fn test_revoking_every_grant_survives_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let db = open(&temp_dir).await;
        for role in [Role::User, Role::Admin] {
            for permission in Permission::ALL {
                db.revoke_permission(role, permission).await.unwrap();
            }
        }
        assert!(db.role_permissions(Role::Admin).await.unwrap().is_empty());
        db.close().await.unwrap();

        let reopened = open(&temp_dir).await;
        assert!(reopened.role_permissions(Role::User).await.unwrap().is_empty());
        assert!(reopened.role_permissions(Role::Admin).await.unwrap().is_empty());
        assert!(reopened.verify_integrity().await.unwrap());
    }

    #[tokio::test]
    async fn test_create_and_find_user() {
        let temp_dir = TempDir::new().unwrap();
        let db = open(&temp_dir).await;

        let created = insert_user(&db, "find@example.com", Role::User).await;

        let by_id = db.find_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(by_id.email, "find@example.com");
        assert_eq!(by_id.role, Role::User);

        let by_email = db.find_by_email("find@example.com").await.unwrap().unwrap();
        assert_eq!(by_email.id, created.id);

        assert!(db.find_by_id(Uuid::new_v4()).await.unwrap().is_none());
        assert!(db.find_by_email("missing@example.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_email_is_email_taken() {
        let temp_dir = TempDir::new().unwrap();
        let db = open(&temp_dir).await;

        insert_user(&db, "same@example.com", Role::User).await;
        let result = db
            .create_user(NewUser {
                email: "same@example.com".to_string(),
                username: "other_player".to_string(),
                password_hash: "x".to_string(),
                avatar_url: None,
                role: Role::User,
            })
            .await;
        assert!(matches!(result, Err(UserError::EmailTaken)));
    }

    #[tokio::test]
    async fn test_update_user() {
        let temp_dir = TempDir::new().unwrap();
        let db = open(&temp_dir).await;
        let user = insert_user(&db, "before@example.com", Role::User).await;
        insert_user(&db, "other@example.com", Role::User).await;

        let changes = |email: &str| UserChanges {
            email: email.to_string(),
            username: "renamed_player".to_string(),
            password_hash: "$argon2id$new".to_string(),
            avatar_url: Some("https://example.com/a.png".to_string()),
        };

        let updated = db
            .update_user(user.id, changes("after@example.com"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.email, "after@example.com");
        assert_eq!(updated.username, "renamed_player");
        assert_eq!(updated.password_hash, "$argon2id$new");
        assert_eq!(updated.role, Role::User);
        assert!(db.find_by_email("before@example.com").await.unwrap().is_none());

        let taken = db.update_user(user.id, changes("other@example.com")).await;
        assert!(matches!(taken, Err(UserError::EmailTaken)));

        let missing = db
            .update_user(Uuid::new_v4(), changes("nobody@example.com"))
            .await
            .unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_has_edge_follows_live_role() {
        let temp_dir = TempDir::new().unwrap();
        let db = open(&temp_dir).await;
        let user = insert_user(&db, "edge@example.com", Role::User).await;

        assert!(db.has_edge(user.id, Permission::Read).await.unwrap());
        assert!(!db.has_edge(user.id, Permission::Create).await.unwrap());

        assert!(db.set_user_role(user.id, Role::Admin).await.unwrap());
        assert!(db.has_edge(user.id, Permission::Create).await.unwrap());

        db.revoke_permission(Role::Admin, Permission::Create)
            .await
            .unwrap();
        assert!(!db.has_edge(user.id, Permission::Create).await.unwrap());

        db.grant_permission(Role::Admin, Permission::Create)
            .await
            .unwrap();
        assert!(db.has_edge(user.id, Permission::Create).await.unwrap());
    }

    #[tokio::test]
    async fn test_unknown_or_deleted_user_has_no_edges() {
        let temp_dir = TempDir::new().unwrap();
        let db = open(&temp_dir).await;

        assert!(!db.has_edge(Uuid::new_v4(), Permission::Read).await.unwrap());

        let user = insert_user(&db, "gone@example.com", Role::Admin).await;
        assert!(db.delete_user(user.id).await.unwrap());
        assert!(!db.delete_user(user.id).await.unwrap());
        assert!(!db.has_edge(user.id, Permission::Read).await.unwrap());
    }

    #[tokio::test]
    async fn test_closed_pool_is_store_unavailable() {
        let temp_dir = TempDir::new().unwrap();
        let db = open(&temp_dir).await;
        db.pool().close().await;

        let result = db.has_edge(Uuid::new_v4(), Permission::Read).await;
        assert!(matches!(result, Err(AuthzError::StoreUnavailable(_))));
    }
}
