//! ADB (Android Debug Bridge) Client
//!
//! The small slice of adb mozbuilds needs: list devices, read properties,
//! install an APK.

use std::path::{Path, PathBuf};

use tokio::process::Command;
use tracing::debug;

use crate::device::{parse_abi_list, parse_devices, Device};

/// ADB errors
#[derive(Debug, thiserror::Error)]
pub enum AdbError {
    #[error("ADB not found")]
    NotFound,
    #[error("No usable device connected")]
    NoDevice,
    #[error("ADB command failed: {0}")]
    CommandFailed(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// ADB Client
#[derive(Debug, Clone)]
pub struct AdbClient {
    adb: PathBuf,
}

impl AdbClient {
    /// Client for the adb under `sdk_path`, falling back to
    /// `$ANDROID_SDK_ROOT`, `$ANDROID_HOME`, then `adb` on `PATH`
    pub fn new(sdk_path: Option<PathBuf>) -> Self {
        let sdk = sdk_path
            .or_else(|| std::env::var_os("ANDROID_SDK_ROOT").map(PathBuf::from))
            .or_else(|| std::env::var_os("ANDROID_HOME").map(PathBuf::from));

        let adb = match sdk {
            Some(sdk) => adb_in_sdk(&sdk),
            None => PathBuf::from(adb_binary()),
        };
        Self { adb }
    }

    /// Client for an explicit adb executable
    pub fn with_executable(adb: impl Into<PathBuf>) -> Self {
        Self { adb: adb.into() }
    }

    pub fn adb_path(&self) -> &Path {
        &self.adb
    }

    async fn run(&self, args: &[&str]) -> Result<String, AdbError> {
        debug!("adb {:?}", args);

        let output = Command::new(&self.adb)
            .args(args)
            .output()
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => AdbError::NotFound,
                _ => AdbError::Io(e),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AdbError::CommandFailed(stderr.trim().to_string()));
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    async fn run_for_device(&self, serial: &str, args: &[&str]) -> Result<String, AdbError> {
        let mut full_args = vec!["-s", serial];
        full_args.extend(args);
        self.run(&full_args).await
    }

    /// List connected devices
    pub async fn list_devices(&self) -> Result<Vec<Device>, AdbError> {
        let output = self.run(&["devices", "-l"]).await?;
        Ok(parse_devices(&output))
    }

    /// `preferred` if given, else the first online device
    pub async fn resolve_serial(&self, preferred: Option<&str>) -> Result<String, AdbError> {
        if let Some(serial) = preferred {
            return Ok(serial.to_string());
        }

        let device = self
            .list_devices()
            .await?
            .into_iter()
            .find(Device::is_usable)
            .ok_or(AdbError::NoDevice)?;
        debug!("Using device {}", device.display_name());
        Ok(device.serial)
    }

    /// Get device property
    pub async fn get_prop(&self, serial: &str, prop: &str) -> Result<String, AdbError> {
        let output = self.run_for_device(serial, &["shell", "getprop", prop]).await?;
        Ok(output.trim().to_string())
    }

    /// Supported ABIs, most preferred first. Older devices only report a
    /// single `ro.product.cpu.abi`.
    pub async fn supported_abis(&self, serial: &str) -> Result<Vec<String>, AdbError> {
        let abis = parse_abi_list(&self.get_prop(serial, "ro.product.cpu.abilist").await?);
        if !abis.is_empty() {
            return Ok(abis);
        }
        Ok(parse_abi_list(&self.get_prop(serial, "ro.product.cpu.abi").await?))
    }

    /// Install an APK, replacing any existing install
    pub async fn install(&self, serial: &str, apk_path: &Path) -> Result<(), AdbError> {
        let path_str = apk_path.to_string_lossy();
        self.run_for_device(serial, &["install", "-r", &path_str]).await?;
        Ok(())
    }
}

fn adb_binary() -> &'static str {
    if cfg!(windows) {
        "adb.exe"
    } else {
        "adb"
    }
}

fn adb_in_sdk(sdk: &Path) -> PathBuf {
    sdk.join("platform-tools").join(adb_binary())
}
