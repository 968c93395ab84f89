use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::models::{NewUser, Session, User};
use super::store::{SessionStore, StoreError, UserStore};

/// In-process store with the same uniqueness rules as the Postgres schema.
/// Used by the test suites and for running without a database.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Tables>,
}

#[derive(Debug, Default)]
struct Tables {
    users: Vec<User>,
    sessions: Vec<Session>,
    next_user_id: i64,
    next_session_id: i64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn session_count(&self) -> usize {
        self.inner.read().await.sessions.len()
    }

    pub async fn session_for_user(&self, user_id: i64) -> Option<Session> {
        let tables = self.inner.read().await;
        tables.sessions.iter().find(|s| s.user_id == user_id).cloned()
    }

    /// Mark a user as deleted, freeing the username.
    pub async fn soft_delete_user(&self, username: &str) -> bool {
        let mut tables = self.inner.write().await;
        match tables
            .users
            .iter_mut()
            .find(|u| u.username == username && !u.is_deleted())
        {
            Some(user) => {
                user.deleted_at = Some(Utc::now());
                true
            }
            None => false,
        }
    }
}

impl Tables {
    fn token_taken(&self, token: &str, except_user: i64) -> bool {
        self.sessions.iter().any(|s| {
            s.user_id != except_user && (s.access_token == token || s.refresh_token == token)
        })
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn username_exists(&self, username: &str) -> Result<bool, StoreError> {
        let tables = self.inner.read().await;
        Ok(tables
            .users
            .iter()
            .any(|u| u.username == username && !u.is_deleted()))
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let tables = self.inner.read().await;
        Ok(tables
            .users
            .iter()
            .find(|u| u.username == username && !u.is_deleted())
            .cloned())
    }

    async fn insert_user(&self, user: NewUser) -> Result<User, StoreError> {
        let mut tables = self.inner.write().await;
        if tables
            .users
            .iter()
            .any(|u| u.username == user.username && !u.is_deleted())
        {
            return Err(StoreError::Conflict(format!("username '{}'", user.username)));
        }

        tables.next_user_id += 1;
        let now = Utc::now();
        let row = User {
            id: tables.next_user_id,
            username: user.username,
            password_hash: user.password_hash,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        tables.users.push(row.clone());
        Ok(row)
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn save_session(
        &self,
        user_id: i64,
        access_token: &str,
        refresh_token: &str,
    ) -> Result<Session, StoreError> {
        let mut tables = self.inner.write().await;
        if tables.token_taken(access_token, user_id) || tables.token_taken(refresh_token, user_id) {
            return Err(StoreError::Conflict("session token".to_string()));
        }

        let now = Utc::now();
        if let Some(existing) = tables.sessions.iter_mut().find(|s| s.user_id == user_id) {
            existing.access_token = access_token.to_string();
            existing.refresh_token = refresh_token.to_string();
            existing.updated_at = now;
            return Ok(existing.clone());
        }

        tables.next_session_id += 1;
        let row = Session {
            id: tables.next_session_id,
            access_token: access_token.to_string(),
            refresh_token: refresh_token.to_string(),
            user_id,
            created_at: now,
            updated_at: now,
        };
        tables.sessions.push(row.clone());
        Ok(row)
    }

    async fn rotate_session(
        &self,
        user_id: i64,
        old_refresh_token: &str,
        access_token: &str,
        refresh_token: &str,
    ) -> Result<Option<Session>, StoreError> {
        let mut tables = self.inner.write().await;
        if tables.token_taken(access_token, user_id) || tables.token_taken(refresh_token, user_id) {
            return Err(StoreError::Conflict("session token".to_string()));
        }

        let Some(session) = tables
            .sessions
            .iter_mut()
            .find(|s| s.refresh_token == old_refresh_token && s.user_id == user_id)
        else {
            return Ok(None);
        };

        session.access_token = access_token.to_string();
        session.refresh_token = refresh_token.to_string();
        session.updated_at = Utc::now();
        Ok(Some(session.clone()))
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
