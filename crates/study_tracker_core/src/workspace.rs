//! crates/study_tracker_core/src/workspace.rs
//!
//! A server hosts many users at once. Each one gets a `Workspace`: their own
//! session store and data cache, created on first use and torn down on logout.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{OnceCell, RwLock};
use tracing::{info, warn};

use crate::cache::{DataCache, LoadReport};
use crate::domain::Identity;
use crate::ports::StudyStore;
use crate::session::SessionStore;

pub struct Workspace {
    pub session: SessionStore,
    pub cache: DataCache,
    loaded: OnceCell<LoadReport>,
}

impl Workspace {
    fn new(store: Arc<dyn StudyStore>) -> Self {
        Self {
            session: SessionStore::new(),
            cache: DataCache::new(store),
            loaded: OnceCell::new(),
        }
    }

    /// Report of the initial load, once it has finished.
    pub fn load_report(&self) -> Option<&LoadReport> {
        self.loaded.get()
    }
}

pub struct Workspaces {
    store: Arc<dyn StudyStore>,
    active: RwLock<HashMap<Identity, Arc<Workspace>>>,
}

impl Workspaces {
    pub fn new(store: Arc<dyn StudyStore>) -> Self {
        Self {
            store,
            active: RwLock::new(HashMap::new()),
        }
    }

    pub async fn get(&self, identity: Identity) -> Option<Arc<Workspace>> {
        self.active.read().await.get(&identity).cloned()
    }

    /// Returns the user's workspace, creating and loading it on first use.
    ///
    /// Concurrent callers for the same user share one initial load and all
    /// wait for it to finish.
    pub async fn activate(&self, identity: Identity) -> Arc<Workspace> {
        let workspace = match self.get(identity).await {
            Some(ws) => ws,
            None => self
                .active
                .write()
                .await
                .entry(identity)
                .or_insert_with(|| Arc::new(Workspace::new(self.store.clone())))
                .clone(),
        };

        workspace
            .loaded
            .get_or_init(|| async {
                let report = match workspace.session.became(identity) {
                    Some(event) => workspace.cache.handle(event).await,
                    None => LoadReport::default(),
                };
                if report.is_ok() {
                    info!("Workspace ready for {}", identity);
                } else {
                    warn!("Workspace for {} loaded with errors: {:?}", identity, report);
                }
                report
            })
            .await;

        workspace
    }

    /// Logs the user out: empties their cache and forgets the workspace.
    pub async fn deactivate(&self, identity: Identity) -> bool {
        let Some(workspace) = self.active.write().await.remove(&identity) else {
            return false;
        };
        if let Some(event) = workspace.session.cleared() {
            workspace.cache.handle(event).await;
        }
        info!("Workspace closed for {}", identity);
        true
    }

    pub async fn len(&self) -> usize {
        self.active.read().await.len()
    }
}
