//! Application state shared across routes

use std::sync::Arc;

use crate::config::Config;
use crate::game::SessionStore;
use crate::ws::registry::ConnectionRegistry;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub sessions: Arc<SessionStore>,
    pub connections: Arc<ConnectionRegistry>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let sessions = Arc::new(SessionStore::new(config.max_sessions));

        Self {
            config: Arc::new(config),
            sessions,
            connections: Arc::new(ConnectionRegistry::new()),
        }
    }
}
