//! Download Manager
//!
//! Runs artifact downloads into the cache and tracks their state:
//! `NotDownloaded -> InProgress -> Downloaded | Failed`.
//!
//! - One in-flight download per unique key; repeated starts are no-ops
//! - Concurrent transfers are bounded by a semaphore
//! - Each key's state is a `watch` channel; dropping a receiver only stops
//!   observation, the transfer still runs to completion
//! - A cache clear cancels in-flight transfers and, when the cache ends up
//!   empty, resets every key to `NotDownloaded`; updates from transfers
//!   started before the clear are discarded
//! - A key whose cached file was removed behind our back may be downloaded
//!   again

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::StreamExt;
use parking_lot::Mutex;
use tokio::io::AsyncWriteExt;
use tokio::sync::{watch, Mutex as AsyncMutex, Semaphore};
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{debug, info, warn};

use mozbuilds_core::{ByteStream, Installer, Result, Transport};

use crate::request::{DownloadRequest, DownloadState};
use crate::status::{CacheManager, CacheState};

struct Tracked {
    state: watch::Sender<DownloadState>,
    /// Bumped on every reset; transfers carry the value they started with
    epoch: u64,
    /// Held by the transfer writing this key's file
    slot: Arc<AsyncMutex<()>>,
    transfer: Option<AbortHandle>,
}

impl Tracked {
    fn new(initial: DownloadState) -> Self {
        let (state, _) = watch::channel(initial);
        Self {
            state,
            epoch: 0,
            slot: Arc::new(AsyncMutex::new(())),
            transfer: None,
        }
    }

    /// Back to `NotDownloaded`, cancelling any running transfer.
    /// Returns the slot to wait on when a transfer was cancelled.
    fn reset(&mut self) -> Option<Arc<AsyncMutex<()>>> {
        self.epoch += 1;
        self.state.send_replace(DownloadState::NotDownloaded);
        let transfer = self.transfer.take()?;
        transfer.abort();
        Some(Arc::clone(&self.slot))
    }
}

struct Inner {
    transport: Arc<dyn Transport>,
    installer: Arc<dyn Installer>,
    cache: Arc<CacheManager>,
    permits: Semaphore,
    tracked: Mutex<HashMap<String, Tracked>>,
}

impl Inner {
    /// Publish `state` for `key` unless the key was reset since `epoch`
    fn publish(&self, key: &str, epoch: u64, state: DownloadState) -> bool {
        let mut tracked = self.tracked.lock();
        match tracked.get_mut(key) {
            Some(entry) if entry.epoch == epoch => {
                if !state.is_in_progress() {
                    entry.transfer = None;
                }
                entry.state.send_replace(state);
                true
            }
            _ => {
                debug!("Dropping stale update for {}", key);
                false
            }
        }
    }
}

#[derive(Clone)]
pub struct DownloadManager {
    inner: Arc<Inner>,
}

impl DownloadManager {
    pub fn new(
        transport: Arc<dyn Transport>,
        installer: Arc<dyn Installer>,
        cache: Arc<CacheManager>,
        max_concurrent: usize,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                transport,
                installer,
                cache,
                permits: Semaphore::new(max_concurrent.max(1)),
                tracked: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn cache(&self) -> &Arc<CacheManager> {
        &self.inner.cache
    }

    pub fn local_path(&self, request: &DownloadRequest) -> PathBuf {
        request.local_path(self.inner.cache.root())
    }

    /// Start tracking a key. A file already present in the cache starts
    /// out as `Downloaded`.
    pub async fn track(&self, request: &DownloadRequest) -> DownloadState {
        let key = request.unique_key();
        let existing = self.inner.tracked.lock().get(&key).map(|e| e.state.borrow().clone());
        if let Some(state) = existing {
            return state;
        }

        let path = self.local_path(request);
        let initial = if is_file(&path).await {
            DownloadState::Downloaded { path }
        } else {
            DownloadState::NotDownloaded
        };

        let mut tracked = self.inner.tracked.lock();
        let entry = tracked.entry(key).or_insert_with(|| Tracked::new(initial));
        let current = entry.state.borrow().clone();
        current
    }

    /// Current state; untracked keys are `NotDownloaded`
    pub fn state(&self, key: &str) -> DownloadState {
        self.inner
            .tracked
            .lock()
            .get(key)
            .map(|entry| entry.state.borrow().clone())
            .unwrap_or_default()
    }

    /// Observe one key. Tracks the key if needed.
    pub async fn subscribe(&self, request: &DownloadRequest) -> watch::Receiver<DownloadState> {
        self.track(request).await;
        let mut tracked = self.inner.tracked.lock();
        let rx = tracked
            .entry(request.unique_key())
            .or_insert_with(|| Tracked::new(DownloadState::NotDownloaded))
            .state
            .subscribe();
        rx
    }

    /// Begin downloading `request`.
    ///
    /// Returns `None` without side effects when the key is already in
    /// progress or downloaded. Otherwise the key moves to `InProgress` before
    /// this returns and the transfer runs on its own task.
    pub async fn start_download(&self, request: DownloadRequest) -> Option<JoinHandle<()>> {
        let current = self.track(&request).await;
        let vanished = match &current {
            DownloadState::Downloaded { path } => !is_file(path).await,
            _ => false,
        };
        let key = request.unique_key();

        let mut tracked = self.inner.tracked.lock();
        let entry = tracked
            .entry(key.clone())
            .or_insert_with(|| Tracked::new(DownloadState::NotDownloaded));

        let startable = match &*entry.state.borrow() {
            DownloadState::Downloaded { path } if vanished => {
                info!("Cached file {:?} is gone, downloading again", path);
                true
            }
            state => state.can_start(),
        };
        if !startable {
            debug!("Download of {} already {:?}", key, *entry.state.borrow());
            return None;
        }

        entry.state.send_replace(DownloadState::InProgress {
            progress: 0.0,
            indeterminate: false,
        });

        let inner = Arc::clone(&self.inner);
        let slot = Arc::clone(&entry.slot);
        let epoch = entry.epoch;
        let handle = tokio::spawn(run_download(inner, request, key, epoch, slot));
        entry.transfer = Some(handle.abort_handle());
        Some(handle)
    }

    /// Clear the cache.
    ///
    /// Running transfers are cancelled first. When the cache ends up empty
    /// every tracked key is reset to `NotDownloaded`; otherwise only keys
    /// whose file is gone are reset.
    pub async fn clear_cache(&self) -> CacheState {
        let cancelled: Vec<_> = {
            let mut tracked = self.inner.tracked.lock();
            tracked
                .values_mut()
                .filter(|entry| entry.transfer.is_some())
                .filter_map(Tracked::reset)
                .collect()
        };
        if !cancelled.is_empty() {
            info!("Cancelling {} running downloads", cancelled.len());
        }
        wait_released(cancelled).await;

        let state = self.inner.cache.clear_cache().await;

        if state == CacheState::IdleEmpty {
            let cancelled: Vec<_> = {
                let mut tracked = self.inner.tracked.lock();
                info!("Reset {} tracked downloads", tracked.len());
                tracked.values_mut().filter_map(Tracked::reset).collect()
            };
            wait_released(cancelled).await;
            return state;
        }

        let downloaded: Vec<(String, PathBuf)> = {
            let tracked = self.inner.tracked.lock();
            let paths = tracked
                .iter()
                .filter_map(|(key, entry)| match &*entry.state.borrow() {
                    DownloadState::Downloaded { path } => Some((key.clone(), path.clone())),
                    _ => None,
                })
                .collect();
            paths
        };

        for (key, path) in downloaded {
            if !is_file(&path).await {
                let mut tracked = self.inner.tracked.lock();
                if let Some(entry) = tracked.get_mut(&key) {
                    entry.reset();
                }
            }
        }
        state
    }
}

/// Wait until cancelled transfers have dropped their slots
async fn wait_released(slots: Vec<Arc<AsyncMutex<()>>>) {
    for slot in slots {
        let _released = slot.lock().await;
    }
}

async fn is_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|meta| meta.is_file())
        .unwrap_or(false)
}

async fn run_download(
    inner: Arc<Inner>,
    request: DownloadRequest,
    key: String,
    epoch: u64,
    slot: Arc<AsyncMutex<()>>,
) {
    // A cancelled transfer for this key may still be unwinding
    let _slot = slot.lock_owned().await;
    let _permit = match inner.permits.acquire().await {
        Ok(permit) => permit,
        Err(_) => {
            inner.publish(&key, epoch, DownloadState::Failed {
                message: "download queue closed".to_string(),
            });
            return;
        }
    };

    let target = request.local_path(inner.cache.root());
    info!("Downloading {} to {:?}", request.url, target);

    match transfer(&inner, &request, &target, &key, epoch).await {
        Ok(()) => {
            info!("Download complete: {:?}", target);
            let current = inner.publish(&key, epoch, DownloadState::Downloaded {
                path: target.clone(),
            });
            inner.cache.check_cache_status().await;
            if current {
                inner.installer.install(&target);
            }
        }
        Err(e) => {
            // Partial bytes stay on disk; the next attempt overwrites them
            warn!("Download of {} failed: {}", request.url, e);
            inner.publish(&key, epoch, DownloadState::Failed {
                message: e.to_string(),
            });
            inner.cache.check_cache_status().await;
        }
    }
}

async fn transfer(
    inner: &Inner,
    request: &DownloadRequest,
    target: &Path,
    key: &str,
    epoch: u64,
) -> Result<()> {
    if let Some(parent) = target.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let mut body = inner.transport.stream_download(&request.url).await?;
    let total = body.total_len.filter(|len| *len > 0);
    inner.publish(key, epoch, DownloadState::InProgress {
        progress: 0.0,
        indeterminate: total.is_none(),
    });

    let mut file = tokio::fs::File::create(target).await?;
    let copied = copy_body(inner, &mut body, &mut file, total, key, epoch).await;

    // Whatever arrived is flushed, also on failure
    let flushed = file.flush().await;
    copied?;
    flushed?;
    Ok(())
}

async fn copy_body(
    inner: &Inner,
    body: &mut ByteStream,
    file: &mut tokio::fs::File,
    total: Option<u64>,
    key: &str,
    epoch: u64,
) -> Result<()> {
    let mut downloaded: u64 = 0;

    while let Some(chunk) = body.chunks.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await?;
        downloaded += chunk.len() as u64;

        if let Some(total) = total {
            let progress = (downloaded as f64 / total as f64).min(1.0) as f32;
            inner.publish(key, epoch, DownloadState::InProgress {
                progress,
                indeterminate: false,
            });
        }
    }
    Ok(())
}
