use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use super::password::{self, PasswordError};
use super::token::{TokenCodec, TokenError, TokenPair};
use crate::database::models::NewUser;
use crate::database::{SessionStore, StoreError, UserStore};

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    AlreadyExists(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    SessionNotFound(String),

    #[error("persistence error: {0}")]
    Persistence(#[from] StoreError),

    #[error("token error: {0}")]
    Token(#[from] TokenError),

    #[error("password hashing error: {0}")]
    Hashing(String),
}

impl From<PasswordError> for AuthError {
    fn from(err: PasswordError) -> Self {
        AuthError::Hashing(err.to_string())
    }
}

const INVALID_CREDENTIALS: &str = "invalid username or password";

/// Register, login and refresh flows over the credential and session stores.
pub struct SessionManager {
    users: Arc<dyn UserStore>,
    sessions: Arc<dyn SessionStore>,
    codec: Arc<TokenCodec>,
}

impl SessionManager {
    pub fn new(users: Arc<dyn UserStore>, sessions: Arc<dyn SessionStore>, codec: Arc<TokenCodec>) -> Self {
        Self { users, sessions, codec }
    }

    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    /// Create an account and its first session.
    pub async fn register(&self, username: &str, password: &str) -> Result<TokenPair, AuthError> {
        require_credentials(username, password)?;

        // Advisory; the store's unique index settles races.
        if self.users.username_exists(username).await? {
            return Err(AuthError::AlreadyExists("user already exists".to_string()));
        }

        let password_hash = hash_blocking(password).await?;
        let user = self
            .users
            .insert_user(NewUser {
                username: username.to_string(),
                password_hash,
            })
            .await
            .map_err(|e| match e {
                StoreError::Conflict(_) => AuthError::AlreadyExists("user already exists".to_string()),
                other => AuthError::Persistence(other),
            })?;

        let pair = self.codec.issue_pair(&user.username, user.id, false)?;
        self.sessions
            .save_session(user.id, &pair.access_token, &pair.refresh_token)
            .await?;

        info!(user_id = user.id, "registered user {}", user.username);
        Ok(pair)
    }

    /// Check credentials and rotate the user's session to a fresh pair.
    pub async fn login(&self, username: &str, password: &str) -> Result<TokenPair, AuthError> {
        require_credentials(username, password)?;

        let Some(user) = self.users.find_by_username(username).await? else {
            warn!("login rejected: unknown user {}", username);
            return Err(AuthError::Forbidden(INVALID_CREDENTIALS.to_string()));
        };

        if !verify_blocking(&user.password_hash, password).await? {
            warn!(user_id = user.id, "login rejected: password mismatch");
            return Err(AuthError::Forbidden(INVALID_CREDENTIALS.to_string()));
        }

        let pair = self.codec.issue_pair(&user.username, user.id, false)?;
        self.sessions
            .save_session(user.id, &pair.access_token, &pair.refresh_token)
            .await?;

        info!(user_id = user.id, "user logged in");
        Ok(pair)
    }

    /// Exchange a refresh token for a new pair. Each refresh token works once:
    /// the session row is overwritten, so presenting the old value again
    /// matches nothing.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, AuthError> {
        if refresh_token.is_empty() {
            return Err(AuthError::Validation("refresh token is required".to_string()));
        }

        let claims = self.codec.verify_refresh_token(refresh_token).map_err(|e| {
            warn!("refresh rejected: {}", e);
            AuthError::Unauthorized("invalid or expired refresh token".to_string())
        })?;

        if claims.sub == 0 {
            return Err(AuthError::Unauthorized("invalid user ID in refresh token".to_string()));
        }

        let pair = self.codec.issue_pair(&claims.username, claims.sub, claims.is_anonymous)?;
        let rotated = self
            .sessions
            .rotate_session(claims.sub, refresh_token, &pair.access_token, &pair.refresh_token)
            .await?;

        if rotated.is_none() {
            warn!(user_id = claims.sub, "refresh rejected: token is not the session's current one");
            return Err(AuthError::SessionNotFound("refresh token is not valid".to_string()));
        }

        info!(user_id = claims.sub, "session rotated");
        Ok(pair)
    }

    pub async fn health_check(&self) -> Result<(), StoreError> {
        self.sessions.health_check().await
    }
}

fn require_credentials(username: &str, password: &str) -> Result<(), AuthError> {
    if username.is_empty() || password.is_empty() {
        return Err(AuthError::Validation("username and password are required".to_string()));
    }
    Ok(())
}

async fn hash_blocking(password: &str) -> Result<String, AuthError> {
    let password = password.to_string();
    tokio::task::spawn_blocking(move || password::hash_password(&password))
        .await
        .map_err(|e| AuthError::Hashing(e.to_string()))?
        .map_err(AuthError::from)
}

async fn verify_blocking(hash: &str, password: &str) -> Result<bool, AuthError> {
    let hash = hash.to_string();
    let password = password.to_string();
    tokio::task::spawn_blocking(move || password::verify_password(&hash, &password))
        .await
        .map_err(|e| AuthError::Hashing(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::JwtConfig;
    use crate::database::MemoryStore;

    fn manager() -> (SessionManager, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let codec = TokenCodec::new(&JwtConfig {
            secret: "session-test-secret".to_string(),
            refresh_secret: None,
        })
        .unwrap();
        let manager = SessionManager::new(store.clone(), store.clone(), Arc::new(codec));
        (manager, store)
    }

    #[tokio::test]
    async fn test_register_issues_verifiable_pair() {
        let (manager, store) = manager();
        let pair = manager.register("alice", "pw123").await.unwrap();

        assert_ne!(pair.access_token, pair.refresh_token);
        let claims = manager.codec().verify_access_token(&pair.access_token).unwrap();
        assert_eq!(claims.username, "alice");

        let session = store.session_for_user(claims.sub).await.unwrap();
        assert_eq!(session.access_token, pair.access_token);
        assert_eq!(session.refresh_token, pair.refresh_token);
    }

    #[tokio::test]
    async fn test_register_rejects_empty_and_duplicate() {
        let (manager, _) = manager();
        assert!(matches!(manager.register("", "pw").await, Err(AuthError::Validation(_))));
        assert!(matches!(manager.register("bob", "").await, Err(AuthError::Validation(_))));

        manager.register("bob", "pw").await.unwrap();
        assert!(matches!(manager.register("bob", "other").await, Err(AuthError::AlreadyExists(_))));
    }

    #[tokio::test]
    async fn test_login_checks_password() {
        let (manager, _) = manager();
        manager.register("carol", "right").await.unwrap();

        assert!(manager.login("carol", "right").await.is_ok());
        assert!(matches!(manager.login("carol", "wrong").await, Err(AuthError::Forbidden(_))));
        assert!(matches!(manager.login("nobody", "right").await, Err(AuthError::Forbidden(_))));
        assert!(matches!(manager.login("carol", "").await, Err(AuthError::Validation(_))));
    }

    #[tokio::test]
    async fn test_login_rotates_existing_session() {
        let (manager, store) = manager();
        let registered = manager.register("dave", "pw").await.unwrap();
        let logged_in = manager.login("dave", "pw").await.unwrap();

        assert_eq!(store.session_count().await, 1);
        assert!(matches!(
            manager.refresh(&registered.refresh_token).await,
            Err(AuthError::SessionNotFound(_))
        ));
        assert!(manager.refresh(&logged_in.refresh_token).await.is_ok());
    }

    #[tokio::test]
    async fn test_refresh_is_single_use() {
        let (manager, _) = manager();
        let original = manager.register("erin", "pw").await.unwrap();

        let rotated = manager.refresh(&original.refresh_token).await.unwrap();
        assert_ne!(rotated.access_token, original.access_token);
        assert_ne!(rotated.refresh_token, original.refresh_token);

        assert!(matches!(
            manager.refresh(&original.refresh_token).await,
            Err(AuthError::SessionNotFound(_))
        ));
        assert!(manager.refresh(&rotated.refresh_token).await.is_ok());
    }

    #[tokio::test]
    async fn test_refresh_rejects_bad_input() {
        let (manager, _) = manager();
        let pair = manager.register("frank", "pw").await.unwrap();

        assert!(matches!(manager.refresh("").await, Err(AuthError::Validation(_))));
        assert!(matches!(manager.refresh("garbage").await, Err(AuthError::Unauthorized(_))));
        // access token is not a refresh token
        assert!(matches!(manager.refresh(&pair.access_token).await, Err(AuthError::Unauthorized(_))));

        let zero_subject = manager.codec().issue_refresh_token("ghost", 0, false).unwrap();
        assert!(matches!(manager.refresh(&zero_subject).await, Err(AuthError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn test_concurrent_refresh_has_one_winner() {
        let (manager, _) = manager();
        let manager = Arc::new(manager);
        let pair = manager.register("gina", "pw").await.unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let manager = manager.clone();
                let token = pair.refresh_token.clone();
                tokio::spawn(async move { manager.refresh(&token).await })
            })
            .collect();

        let mut successes = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                successes += 1;
            }
        }
        assert_eq!(successes, 1);
    }
}
