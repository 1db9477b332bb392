//! ABI names and device compatibility matching.

/// ABI tag used for builds that ship every native library
pub const UNIVERSAL_ABI: &str = "universal";

/// Android ABI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Abi {
    Arm64V8a,
    ArmeabiV7a,
    X86,
    X86_64,
}

impl Abi {
    /// Get the ABI name as used in APK file names
    pub fn abi_name(&self) -> &'static str {
        match self {
            Abi::Arm64V8a => "arm64-v8a",
            Abi::ArmeabiV7a => "armeabi-v7a",
            Abi::X86 => "x86",
            Abi::X86_64 => "x86_64",
        }
    }

    /// Parse from an ABI name or target triple
    pub fn from_name(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "arm64-v8a" | "aarch64" | "arm64" | "aarch64-linux-android" => Some(Abi::Arm64V8a),
            "armeabi-v7a" | "armv7" | "arm" | "armv7-linux-androideabi" => Some(Abi::ArmeabiV7a),
            "x86" | "i686" | "i686-linux-android" => Some(Abi::X86),
            "x86_64" | "x86-64" | "x86_64-linux-android" => Some(Abi::X86_64),
            _ => None,
        }
    }

    /// Find the first ABI whose name appears in `text` (longest names first,
    /// so `x86_64` is not mistaken for `x86`).
    pub fn find_in(text: &str) -> Option<Self> {
        [Abi::Arm64V8a, Abi::ArmeabiV7a, Abi::X86_64, Abi::X86]
            .into_iter()
            .find(|abi| text.contains(abi.abi_name()))
    }
}

/// Whether a build tagged `build_abi` runs on a device supporting `supported`.
///
/// Universal builds run everywhere. Otherwise the tag must name one of the
/// device ABIs; aliases such as `aarch64` resolve to their canonical name.
pub fn is_compatible(build_abi: &str, supported: &[String]) -> bool {
    if build_abi.eq_ignore_ascii_case(UNIVERSAL_ABI) {
        return true;
    }

    let wanted = Abi::from_name(build_abi);
    supported.iter().any(|device_abi| {
        if device_abi.trim().eq_ignore_ascii_case(build_abi.trim()) {
            return true;
        }
        match (wanted, Abi::from_name(device_abi)) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    })
}
