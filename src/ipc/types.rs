use crate::auth::Auth;
use crate::config::AppConfig;
use crate::storage::SqliteStore;
use crate::store::{RecordStore, SeedReport};
use crate::views::ViewRouter;
use anyhow::Context;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub store: Option<RecordStore>,
    pub auth: Auth,
    pub views: ViewRouter,
    pub config: AppConfig,
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        Self {
            workspace: None,
            store: None,
            auth: Auth::new(&config.auth),
            views: ViewRouter::new(),
            config,
        }
    }

    /// Open (or create) the workspace database, seed it and restore any
    /// persisted session.
    pub fn select_workspace(&mut self, path: &Path) -> anyhow::Result<SeedReport> {
        let docs = SqliteStore::open(path)
            .with_context(|| format!("failed to open workspace {}", path.to_string_lossy()))?;
        let store = RecordStore::new(Box::new(docs));
        let report = store
            .ensure_defaults(&self.config.auth)
            .context("failed to seed workspace defaults")?;

        self.auth = Auth::new(&self.config.auth);
        let session = self.auth.current_user(&store);
        // A failed landing render is already reflected in the router state.
        let _ = self.views.reset(session.as_ref(), &store);

        info!(
            workspace = %path.to_string_lossy(),
            restored_session = session.is_some(),
            "workspace opened"
        );
        self.workspace = Some(path.to_path_buf());
        self.store = Some(store);
        Ok(report)
    }

    /// Drop the open database handle (before replacing the file underneath).
    pub fn close_workspace(&mut self) {
        self.store = None;
        self.auth.forget();
    }
}
