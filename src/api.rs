//! HTTP API consumed by the wizard UI

mod handlers;
mod sse;
mod types;

pub use handlers::create_router;

use crate::runtime::{RuntimeConfig, SessionManager};
use crate::remote::RemoteService;
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub runtime: Arc<SessionManager>,
}

impl AppState {
    pub fn new(remote: Arc<dyn RemoteService>, config: RuntimeConfig) -> Self {
        Self {
            runtime: Arc::new(SessionManager::new(remote, config)),
        }
    }
}
