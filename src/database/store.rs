use async_trait::async_trait;
use thiserror::Error;

use super::models::{NewUser, Session, User};

/// Errors from the credential and session stores
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Unique constraint violated: {0}")]
    Conflict(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Migration error: {0}")]
    Migration(String),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// Credential store: the `users` table.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Whether a non-deleted user with this username exists.
    async fn username_exists(&self, username: &str) -> Result<bool, StoreError>;

    /// Non-deleted user by username.
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError>;

    /// Insert a user. A duplicate username yields `StoreError::Conflict`.
    async fn insert_user(&self, user: NewUser) -> Result<User, StoreError>;
}

/// Session store: the `sessions` table, one row per user.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Insert the user's session, or overwrite both token columns if the user
    /// already has one.
    async fn save_session(
        &self,
        user_id: i64,
        access_token: &str,
        refresh_token: &str,
    ) -> Result<Session, StoreError>;

    /// Replace the token pair of the session owned by `user_id` that currently
    /// holds `old_refresh_token`, as a single atomic step. Returns `None` when
    /// no row matched, i.e. the token was already rotated away.
    async fn rotate_session(
        &self,
        user_id: i64,
        old_refresh_token: &str,
        access_token: &str,
        refresh_token: &str,
    ) -> Result<Option<Session>, StoreError>;

    /// Round-trip to the backing store.
    async fn health_check(&self) -> Result<(), StoreError>;
}
