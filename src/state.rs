use std::sync::Arc;

use crate::auth::{SessionManager, TokenCodec};
use crate::config::AppConfig;
use crate::database::{SessionStore, UserStore};

/// Application context shared by every request handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub codec: Arc<TokenCodec>,
    pub sessions: Arc<SessionManager>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        codec: TokenCodec,
        users: Arc<dyn UserStore>,
        session_store: Arc<dyn SessionStore>,
    ) -> Self {
        let codec = Arc::new(codec);
        let sessions = Arc::new(SessionManager::new(users, session_store, codec.clone()));
        Self {
            config: Arc::new(config),
            codec,
            sessions,
        }
    }
}
