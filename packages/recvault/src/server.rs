//! Server context and lifecycle: unbound, activated once, then serving.

use std::{
    future::Future,
    path::{Path, PathBuf},
    sync::{Arc, OnceLock},
    time::Duration,
};

use axum::Router;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::{
    capacity::{SpaceProbe, SystemSpace},
    config::Config,
    router,
    store::FileStore,
};

/// Shared by every handler. The recording directory is bound at most once.
#[derive(Clone)]
pub struct AppState {
    store: Arc<OnceLock<FileStore>>,
    pub assets_dir: PathBuf,
    pub read_timeout: Duration,
    pub space: Arc<dyn SpaceProbe>,
}

impl AppState {
    pub fn new(assets_dir: PathBuf, read_timeout: Duration, space: Arc<dyn SpaceProbe>) -> Self {
        Self {
            store: Arc::new(OnceLock::new()),
            assets_dir,
            read_timeout,
            space,
        }
    }

    pub fn store(&self) -> Option<&FileStore> {
        self.store.get()
    }
}

pub struct Server {
    state: AppState,
}

impl Server {
    pub fn new(config: &Config) -> Self {
        Self::with_state(AppState::new(
            config.assets_dir.clone(),
            config.read_timeout,
            Arc::new(SystemSpace),
        ))
    }

    pub fn with_state(state: AppState) -> Self {
        Self { state }
    }

    /// Creates and binds the recording directory. Returns `false` when the
    /// directory cannot be created or a directory is already bound.
    pub fn activate(&self, path: &Path) -> bool {
        if let Some(bound) = self.state.store() {
            warn!(
                bound = %bound.root().display(),
                requested = %path.display(),
                "recording directory already set"
            );
            return false;
        }
        let store = match FileStore::activate(path) {
            Ok(store) => store,
            Err(e) => {
                error!(path = %path.display(), error = %e, "could not create or access recording directory");
                return false;
            }
        };
        if self.state.store.set(store).is_err() {
            warn!(requested = %path.display(), "recording directory already set");
            return false;
        }
        info!(path = %path.display(), "recording directory set");
        true
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn router(&self) -> Router {
        router::app(self.state.clone())
    }

    /// Serves until `shutdown` resolves.
    pub async fn run(
        self,
        listener: TcpListener,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> std::io::Result<()> {
        let app = self.router();
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await
    }
}
