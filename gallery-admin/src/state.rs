use gallery_core::{DerivativeConfig, ProjectPaths};
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Clone)]
pub struct AppState {
    pub paths: Arc<ProjectPaths>,
    pub derivatives: Arc<DerivativeConfig>,
    /// Held for every read-modify-write of `gallery.json`
    pub manifest_lock: Arc<Mutex<()>>,
}

impl AppState {
    pub fn new(paths: ProjectPaths) -> Self {
        Self {
            paths: Arc::new(paths),
            derivatives: Arc::new(DerivativeConfig::default()),
            manifest_lock: Arc::new(Mutex::new(())),
        }
    }
}
