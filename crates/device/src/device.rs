//! Connected device listing.

use serde::Serialize;

/// Device state as reported by `adb devices`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DeviceState {
    /// Online and ready
    Online,
    Offline,
    /// Debugging not yet accepted on the device
    Unauthorized,
    Unknown,
}

impl DeviceState {
    fn from_adb(raw: &str) -> Self {
        match raw {
            "device" => DeviceState::Online,
            "offline" => DeviceState::Offline,
            "unauthorized" => DeviceState::Unauthorized,
            _ => DeviceState::Unknown,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Device {
    pub serial: String,
    pub state: DeviceState,
    /// Model from `adb devices -l`, e.g. "Pixel_7"
    pub model: Option<String>,
}

impl Device {
    pub fn is_usable(&self) -> bool {
        self.state == DeviceState::Online
    }

    pub fn display_name(&self) -> String {
        match &self.model {
            Some(model) => format!("{} ({})", model.replace('_', " "), self.serial),
            None => self.serial.clone(),
        }
    }
}

/// Parse `adb devices -l` output. Lines that do not look like a device
/// entry are skipped.
pub fn parse_devices(output: &str) -> Vec<Device> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| {
            !line.is_empty() && !line.starts_with("List of devices") && !line.starts_with('*')
        })
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            let serial = parts.next()?.to_string();
            let state = DeviceState::from_adb(parts.next()?);
            let model = parts
                .find_map(|part| part.strip_prefix("model:"))
                .map(str::to_string);
            Some(Device { serial, state, model })
        })
        .collect()
}

/// Split a `ro.product.cpu.abilist` value
pub fn parse_abi_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|abi| !abi.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_devices() {
        let output = "\
* daemon not running; starting now at tcp:5037
* daemon started successfully
List of devices attached
emulator-5554          device product:sdk_gphone64_x86_64 model:sdk_gphone64_x86_64 transport_id:1
1A2B3C4D               unauthorized usb:1-1 transport_id:2

";
        let devices = parse_devices(output);
        assert_eq!(devices.len(), 2);
        assert_eq!(devices[0].serial, "emulator-5554");
        assert!(devices[0].is_usable());
        assert_eq!(devices[0].model.as_deref(), Some("sdk_gphone64_x86_64"));
        assert_eq!(devices[1].state, DeviceState::Unauthorized);
        assert_eq!(devices[1].display_name(), "1A2B3C4D");
    }

    #[test]
    fn test_parse_abi_list() {
        assert_eq!(
            parse_abi_list("arm64-v8a,armeabi-v7a,armeabi\n"),
            vec!["arm64-v8a", "armeabi-v7a", "armeabi"]
        );
        assert!(parse_abi_list("  \n").is_empty());
    }
}
