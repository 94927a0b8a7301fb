//! SQLite persistence layer for the red packet tracker.
//!
//! This crate provides async database operations for accounts, grab records,
//! per-app monitoring state and record aggregates using SQLx with SQLite.
//! Amounts are stored as integer cents.
//!
//! # Example
//!
//! ```no_run
//! use database::{models::NewUser, user, Database};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Connect and run migrations
//!     let db = Database::connect("sqlite:redpacket.db?mode=rwc").await?;
//!     db.migrate().await?;
//!
//!     // Create a user
//!     let new_user = NewUser {
//!         phone: "13800138000".to_string(),
//!         nickname: "用户8000".to_string(),
//!         password_hash: None,
//!     };
//!     let created = user::create_user(db.pool(), &new_user).await?;
//!     println!("created {}", created.id);
//!
//!     Ok(())
//! }
//! ```

pub mod analytics;
pub mod error;
pub mod models;
pub mod monitoring;
pub mod red_packet;
pub mod repository;
pub mod user;
pub mod validation;

pub use error::{DatabaseError, Result};
pub use models::{
    AppId, AppSettings, DateRange, MonitoringApp, NewRedPacket, NewUser, Page, ProfileUpdate,
    RecordFilter, RecordStatus, RedPacketRecord, User,
};
pub use repository::{HealthProbe, MonitoringRepository, RedPacketRepository, UserRepository};
pub use validation::ValidationError;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;

/// Database connection wrapper.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Default pool size for database connections.
    pub const DEFAULT_POOL_SIZE: u32 = 20;

    /// Connect to a SQLite database.
    ///
    /// The URL should be in the format `sqlite:path/to/db.sqlite?mode=rwc`.
    /// Use `?mode=rwc` to create the database file if it doesn't exist.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # async fn example() -> database::Result<()> {
    /// // File database
    /// let db = database::Database::connect("sqlite:data/redpacket.db?mode=rwc").await?;
    ///
    /// // In-memory database (for testing)
    /// let db = database::Database::connect("sqlite::memory:").await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn connect(url: &str) -> Result<Self> {
        Self::connect_with_pool_size(url, Self::DEFAULT_POOL_SIZE).await
    }

    /// Connect to a SQLite database with a custom pool size.
    pub async fn connect_with_pool_size(url: &str, pool_size: u32) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(pool_size)
            .acquire_timeout(std::time::Duration::from_secs(30))
            .connect_with(options)
            .await?;

        tracing::info!(
            "Connected to database: {} (pool size: {})",
            url,
            pool_size
        );

        Ok(Self { pool })
    }

    /// Run database migrations.
    ///
    /// This should be called once after connecting to ensure the schema is up to date.
    pub async fn migrate(&self) -> Result<()> {
        tracing::info!("Running database migrations...");

        sqlx::migrate!("./migrations").run(&self.pool).await?;

        tracing::info!("Migrations complete");
        Ok(())
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close the database connection pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_db() -> Database {
        let db = Database::connect_with_pool_size("sqlite::memory:", 1).await.unwrap();
        db.migrate().await.unwrap();
        db
    }

    fn new_user(phone: &str) -> NewUser {
        NewUser {
            phone: phone.to_string(),
            nickname: format!("用户{}", &phone[phone.len() - 4..]),
            password_hash: Some("$2b$10$hash".to_string()),
        }
    }

    #[tokio::test]
    async fn test_user_lifecycle() {
        let db = test_db().await;

        // Create
        let created = user::create_user(db.pool(), &new_user("13800138000")).await.unwrap();
        assert_eq!(created.nickname, "用户8000");
        assert_eq!(created.total_earnings_cents, 0);
        assert_eq!(created.red_packet_count, 0);
        assert_eq!(created.success_rate, 0.0);
        assert!(created.is_active);
        assert!(created.last_login_at.is_none());
        assert_eq!(created.id.len(), 36);

        // Read
        let by_phone = user::find_by_phone(db.pool(), "13800138000").await.unwrap().unwrap();
        assert_eq!(by_phone.id, created.id);
        assert!(user::find_by_phone(db.pool(), "13900000000").await.unwrap().is_none());

        // Update
        let updated = user::update_profile(
            db.pool(),
            &created.id,
            &ProfileUpdate {
                nickname: Some("红包达人".to_string()),
                avatar: None,
            },
        )
        .await
        .unwrap();
        assert_eq!(updated.nickname, "红包达人");
        assert_eq!(updated.avatar, "");

        user::record_login(db.pool(), &created.id).await.unwrap();
        let fetched = user::get_user(db.pool(), &created.id).await.unwrap();
        assert!(fetched.last_login_at.is_some());

        user::set_active(db.pool(), &created.id, false).await.unwrap();
        assert!(!user::get_user(db.pool(), &created.id).await.unwrap().is_active);
    }

    #[tokio::test]
    async fn test_duplicate_phone_rejected() {
        let db = test_db().await;
        user::create_user(db.pool(), &new_user("13800138000")).await.unwrap();

        let result = user::create_user(db.pool(), &new_user("13800138000")).await;
        assert!(matches!(
            result,
            Err(DatabaseError::AlreadyExists { entity: "User", .. })
        ));
    }

    #[tokio::test]
    async fn test_missing_user() {
        let db = test_db().await;

        let result = user::get_user(db.pool(), "missing").await;
        assert!(matches!(result, Err(DatabaseError::NotFound { .. })));
        assert!(result.unwrap_err().is_not_found());

        let result = user::update_profile(db.pool(), "missing", &ProfileUpdate::default()).await;
        assert!(matches!(result, Err(DatabaseError::NotFound { .. })));
        assert!(user::record_login(db.pool(), "missing").await.is_err());
    }

    #[tokio::test]
    async fn test_repository_traits() {
        let db = test_db().await;
        let users: &dyn UserRepository = &db;
        let probe: &dyn HealthProbe = &db;

        probe.ping().await.unwrap();
        let created = users.create_user(&new_user("15012345678")).await.unwrap();
        assert_eq!(users.get_user(&created.id).await.unwrap().phone, "15012345678");

        let monitoring: &dyn MonitoringRepository = &db;
        assert!(monitoring.list_apps(&created.id).await.unwrap().is_empty());
    }
}
