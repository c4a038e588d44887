//! Shared application state.

use std::sync::Arc;

use lylyric_chat::LLMConfig;
use lylyric_core::LylyricConfig;
use lylyric_runtime::{Orchestrator, SessionManager};
use lylyric_store::SqliteStore;
use parking_lot::RwLock;

/// Shared application state accessible from all route handlers.
pub struct AppState {
    pub config: LylyricConfig,
    pub orchestrator: Orchestrator,
    pub sessions: SessionManager,
    /// Same handle the completion service reads on every call.
    pub llm_config: Arc<RwLock<LLMConfig>>,
    /// Set when the local SQLite backend is in use; adds store stats to status.
    pub local_store: Option<Arc<SqliteStore>>,
}

impl AppState {
    pub fn new(
        config: LylyricConfig,
        orchestrator: Orchestrator,
        llm_config: Arc<RwLock<LLMConfig>>,
    ) -> Self {
        Self {
            config,
            orchestrator,
            sessions: SessionManager::new(),
            llm_config,
            local_store: None,
        }
    }

    pub fn with_local_store(mut self, store: Arc<SqliteStore>) -> Self {
        self.local_store = Some(store);
        self
    }
}
