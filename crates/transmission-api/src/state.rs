//! Shared application state.

use std::sync::Arc;

use transmission_match::application::registry::SessionRegistry;

use crate::hub::WsHub;

/// Application state shared across all request handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Every live session.
    pub registry: Arc<SessionRegistry>,
    /// Open WebSocket connections; also the registry's broadcaster.
    pub hub: Arc<WsHub>,
}

impl AppState {
    /// Create new application state.
    #[must_use]
    pub fn new(registry: Arc<SessionRegistry>, hub: Arc<WsHub>) -> Self {
        Self { registry, hub }
    }
}
