//! adb-backed implementations of the device seams.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use mozbuilds_core::{AbiProbe, Installer};

use crate::adb::AdbClient;

/// Reads supported ABIs from the target device
pub struct DeviceAbis {
    client: Arc<AdbClient>,
    serial: Option<String>,
}

impl DeviceAbis {
    pub fn new(client: Arc<AdbClient>, serial: Option<String>) -> Self {
        Self { client, serial }
    }
}

#[async_trait]
impl AbiProbe for DeviceAbis {
    /// Empty when no device answers; callers then treat only universal
    /// builds as compatible
    async fn supported_abis(&self) -> Vec<String> {
        let serial = match self.client.resolve_serial(self.serial.as_deref()).await {
            Ok(serial) => serial,
            Err(e) => {
                warn!("Cannot probe device ABIs: {}", e);
                return Vec::new();
            }
        };

        match self.client.supported_abis(&serial).await {
            Ok(abis) => abis,
            Err(e) => {
                warn!("Cannot read ABIs of {}: {}", serial, e);
                Vec::new()
            }
        }
    }
}

/// Installs finished downloads with `adb install -r` on a background task
pub struct AdbInstaller {
    client: Arc<AdbClient>,
    serial: Option<String>,
    pending: Mutex<Vec<JoinHandle<()>>>,
}

impl AdbInstaller {
    pub fn new(client: Arc<AdbClient>, serial: Option<String>) -> Self {
        Self {
            client,
            serial,
            pending: Mutex::new(Vec::new()),
        }
    }

    /// Wait for every install started so far
    pub async fn wait_idle(&self) {
        let pending: Vec<JoinHandle<()>> = std::mem::take(&mut *self.pending.lock());
        for handle in pending {
            if let Err(e) = handle.await {
                warn!("Install task aborted: {}", e);
            }
        }
    }
}

impl Installer for AdbInstaller {
    fn install(&self, apk: &Path) {
        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => runtime,
            Err(_) => {
                warn!("No runtime to install {:?} on", apk);
                return;
            }
        };

        let client = Arc::clone(&self.client);
        let serial = self.serial.clone();
        let apk = apk.to_path_buf();

        let handle = runtime.spawn(async move {
            let serial = match client.resolve_serial(serial.as_deref()).await {
                Ok(serial) => serial,
                Err(e) => {
                    warn!("Not installing {:?}: {}", apk, e);
                    return;
                }
            };

            info!("Installing {:?} on {}", apk, serial);
            match client.install(&serial, &apk).await {
                Ok(()) => info!("Installed {:?}", apk),
                Err(e) => warn!("Install of {:?} failed: {}", apk, e),
            }
        });

        self.pending.lock().push(handle);
    }
}
