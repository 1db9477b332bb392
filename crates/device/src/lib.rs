//! Device bridge
//!
//! Talks to a connected Android device through adb: reports its ABIs and
//! installs downloaded builds.

pub mod adb;
pub mod bridge;
pub mod device;

pub use adb::{AdbClient, AdbError};
pub use bridge::{AdbInstaller, DeviceAbis};
pub use device::{parse_abi_list, parse_devices, Device, DeviceState};
