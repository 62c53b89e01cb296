use crate::api::{create_router, AppState};
use crate::watcher::RenameWatcher;
use anyhow::Context;
use editlayer_core::{
    ChangeLedger, Config, FsStore, Overlay, RenameTracker, SharedStorage, Storage,
};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing::info;

pub struct EditLayerServer {
    root_path: PathBuf,
    overlay: Arc<Mutex<Overlay<FsStore>>>,
    tracker: Arc<Mutex<RenameTracker>>,
    storage: SharedStorage,
    _watcher: RenameWatcher,
}

impl EditLayerServer {
    pub fn new(root_path: PathBuf, db_path: PathBuf) -> anyhow::Result<Self> {
        let config = Config::load(&root_path)
            .with_context(|| format!("failed to load config under {:?}", root_path))?;

        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {:?}", parent))?;
        }
        let storage: SharedStorage = Arc::new(Mutex::new(
            Storage::new(&db_path).with_context(|| format!("failed to open {:?}", db_path))?,
        ));

        let tracker = RenameTracker::load(Box::new(Arc::clone(&storage)), &config)?;
        let tracker = Arc::new(Mutex::new(tracker));

        let overlay = Overlay::new(ChangeLedger::new(), FsStore::new(&root_path));
        let watcher = RenameWatcher::new(&root_path, &config, Arc::clone(&tracker))?;

        Ok(Self {
            root_path,
            overlay: Arc::new(Mutex::new(overlay)),
            tracker,
            storage,
            _watcher: watcher,
        })
    }

    pub async fn serve(self, addr: SocketAddr) -> anyhow::Result<()> {
        let state = AppState {
            overlay: self.overlay,
            tracker: self.tracker,
            storage: self.storage,
        };

        let app = create_router(state);

        info!("Server listening on {}", addr);
        info!("Watching: {:?}", self.root_path);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app).await?;

        Ok(())
    }

    pub fn root_path(&self) -> &PathBuf {
        &self.root_path
    }
}
