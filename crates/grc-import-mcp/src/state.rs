//! Shared server state for the MCP server.

use std::{path::Path, sync::Arc};

use grc_import_core::{Config, ImportSession, RestStore, Store};
use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;

/// Shared state for the MCP server.
///
/// One import session lives for the life of the server; the `reset` tool
/// returns it to idle. The session is wrapped in `Arc<RwLock>` for access
/// across async tasks. The commit token lives outside that lock so `reset`
/// can cancel a commit that holds it.
#[derive(Clone)]
pub struct ServerState {
    /// The import session under review.
    pub session: Arc<RwLock<ImportSession>>,
    /// Importer configuration.
    pub config: Arc<Config>,
    /// The persistence service.
    pub store: Arc<dyn Store>,
    /// Cancels the commit in flight, if any.
    commit_cancel: Arc<Mutex<CancellationToken>>,
}

impl ServerState {
    /// Create state around an explicit store.
    pub fn new(config: Config, store: Arc<dyn Store>) -> Self {
        Self {
            session: Arc::new(RwLock::new(ImportSession::new(config.rich_strictness()))),
            config: Arc::new(config),
            store,
            commit_cancel: Arc::new(Mutex::new(CancellationToken::new())),
        }
    }

    /// A fresh token for the next commit; replaces any earlier one.
    pub async fn commit_token(&self) -> CancellationToken {
        let mut current = self.commit_cancel.lock().await;
        *current = CancellationToken::new();
        current.clone()
    }

    /// Cancels the current commit token. The commit stops at its next row
    /// boundary.
    pub async fn cancel_commit(&self) {
        self.commit_cancel.lock().await.cancel();
    }

    /// Create state from `<root>/.grc/config.toml`, talking to the configured
    /// persistence service.
    ///
    /// # Errors
    ///
    /// Returns an error if no persistence service is configured.
    pub fn from_root(root: &Path) -> anyhow::Result<Self> {
        let config = Config::load_or_default(&root.join(".grc/config.toml"));
        let store = RestStore::from_config(&config)?;
        Ok(Self::new(config, Arc::new(store)))
    }
}
