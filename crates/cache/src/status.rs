//! Process-wide cache population state.
//!
//! The state is published on a `watch` channel: one writer (the manager),
//! any number of readers that always see the latest complete value. File
//! system scans and deletes are serialised by a lock private to the manager.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheState {
    IdleEmpty,
    IdleNonEmpty,
    Clearing,
}

pub struct CacheManager {
    root: PathBuf,
    namespaces: Vec<String>,
    state: watch::Sender<CacheState>,
    fs_lock: Mutex<()>,
}

impl CacheManager {
    /// Manager over `root`, tracking the given namespace directories.
    /// Starts as `IdleEmpty` until the first check.
    pub fn new(root: impl Into<PathBuf>, namespaces: Vec<String>) -> Self {
        let (state, _) = watch::channel(CacheState::IdleEmpty);
        Self {
            root: root.into(),
            namespaces,
            state,
            fs_lock: Mutex::new(()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn namespaces(&self) -> &[String] {
        &self.namespaces
    }

    /// Current state
    pub fn state(&self) -> CacheState {
        *self.state.borrow()
    }

    /// Observe state changes; drop the receiver to stop observing
    pub fn subscribe(&self) -> watch::Receiver<CacheState> {
        self.state.subscribe()
    }

    fn publish(&self, state: CacheState) {
        self.state.send_replace(state);
    }

    /// Scan every tracked namespace for at least one regular file
    pub async fn check_cache_status(&self) -> CacheState {
        let populated = {
            let _guard = self.fs_lock.lock().await;
            let mut populated = false;
            for namespace in &self.namespaces {
                if contains_file(&self.root.join(namespace)).await {
                    debug!("Cache namespace {} is populated", namespace);
                    populated = true;
                    break;
                }
            }
            populated
        };

        let state = if populated {
            CacheState::IdleNonEmpty
        } else {
            CacheState::IdleEmpty
        };
        self.publish(state);
        state
    }

    /// Delete every tracked namespace, then re-check.
    ///
    /// Delete failures are logged; the resulting state reflects whatever is
    /// left on disk. Callers outside this crate go through
    /// `DownloadManager::clear_cache`, which also resets download states.
    pub(crate) async fn clear_cache(&self) -> CacheState {
        info!("Clearing cache at {:?}", self.root);
        self.publish(CacheState::Clearing);

        {
            let _guard = self.fs_lock.lock().await;
            for namespace in &self.namespaces {
                let dir = self.root.join(namespace);
                match tokio::fs::remove_dir_all(&dir).await {
                    Ok(()) => debug!("Removed {:?}", dir),
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                    Err(e) => warn!("Failed to remove {:?}: {}", dir, e),
                }
            }
        }

        self.check_cache_status().await
    }
}

/// Whether any regular file exists under `dir`
async fn contains_file(dir: &Path) -> bool {
    if !dir.exists() {
        return false;
    }

    let dir = dir.to_path_buf();
    let scan = tokio::task::spawn_blocking(move || {
        walkdir::WalkDir::new(&dir)
            .into_iter()
            .filter_map(|e| e.ok())
            .any(|e| e.file_type().is_file())
    });

    match scan.await {
        Ok(found) => found,
        Err(e) => {
            warn!("Cache scan task failed: {}", e);
            false
        }
    }
}
