use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::Duration;
use tracing::info;

use super::models::{NewUser, Session, User};
use super::store::{SessionStore, StoreError, UserStore};
use crate::config::DbConfig;

/// Postgres-backed credential and session store
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Open a pool using the configured limits.
    pub async fn connect(config: &DbConfig) -> Result<Self, StoreError> {
        let url = config
            .connection_url()
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout_secs))
            .connect(&url)
            .await?;

        info!("Created database pool for: {}", config.database);
        Ok(Self { pool })
    }

    /// Apply the embedded schema migrations.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!()
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Migration(e.to_string()))?;
        info!("Database migrations applied");
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
        info!("Closed database pool");
    }
}

fn map_unique_violation(err: sqlx::Error, what: &str) -> StoreError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::Conflict(what.to_string()),
        _ => StoreError::Sqlx(err),
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn username_exists(&self, username: &str) -> Result<bool, StoreError> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM users WHERE username = $1 AND deleted_at IS NULL)",
        )
        .bind(username)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, username, password, created_at, updated_at, deleted_at \
             FROM users WHERE username = $1 AND deleted_at IS NULL",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn insert_user(&self, user: NewUser) -> Result<User, StoreError> {
        sqlx::query_as::<_, User>(
            "INSERT INTO users (username, password) VALUES ($1, $2) \
             RETURNING id, username, password, created_at, updated_at, deleted_at",
        )
        .bind(&user.username)
        .bind(&user.password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_unique_violation(e, &format!("username '{}'", user.username)))
    }
}

#[async_trait]
impl SessionStore for PgStore {
    async fn save_session(
        &self,
        user_id: i64,
        access_token: &str,
        refresh_token: &str,
    ) -> Result<Session, StoreError> {
        sqlx::query_as::<_, Session>(
            "INSERT INTO sessions (access_token, refresh_token, user_id) VALUES ($1, $2, $3) \
             ON CONFLICT (user_id) DO UPDATE SET \
                 access_token = EXCLUDED.access_token, \
                 refresh_token = EXCLUDED.refresh_token, \
                 updated_at = CURRENT_TIMESTAMP \
             RETURNING id, access_token, refresh_token, user_id, created_at, updated_at",
        )
        .bind(access_token)
        .bind(refresh_token)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_unique_violation(e, "session token"))
    }

    async fn rotate_session(
        &self,
        user_id: i64,
        old_refresh_token: &str,
        access_token: &str,
        refresh_token: &str,
    ) -> Result<Option<Session>, StoreError> {
        // Single statement: concurrent rotations of the same token serialize
        // on the row lock and the loser matches zero rows.
        sqlx::query_as::<_, Session>(
            "UPDATE sessions SET access_token = $1, refresh_token = $2, updated_at = CURRENT_TIMESTAMP \
             WHERE refresh_token = $3 AND user_id = $4 \
             RETURNING id, access_token, refresh_token, user_id, created_at, updated_at",
        )
        .bind(access_token)
        .bind(refresh_token)
        .bind(old_refresh_token)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_unique_violation(e, "session token"))
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
