//! Release Channel Parser
//!
//! Reads the beta/release index page (`145.0/`, `145.0b3/`, ...) and the
//! per-version page that lists one directory per ABI.

use std::cmp::Ordering;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use mozbuilds_core::{Channel, Version, UNIVERSAL_ABI};

use crate::listing::directory_entries;

static PRE_RELEASE_MARKER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[ab]\d+").expect("valid marker pattern"));

static STABLE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d+\.\d+(\.\d+)?$").expect("valid stable pattern"));

/// Version directory names on an index page, without the trailing `/`
pub fn version_entries(html: &str) -> Vec<String> {
    directory_entries(html)
        .into_iter()
        .map(|entry| entry.trim_end_matches('/').to_string())
        .filter(|entry| !entry.is_empty())
        .collect()
}

/// Ordering used for raw release-index names such as `145.0b10`.
///
/// Splits on `.`, `b` and `-` and compares the leading numeric run of each
/// piece left to right (a piece without digits counts as 0). When one list is
/// a prefix of the other the longer one is greater. This is looser than
/// [`Version`]'s ordering: it ranks `145.0b3` above `145.0`.
pub fn compare_release_index(a: &str, b: &str) -> Ordering {
    fn numeric_runs(s: &str) -> Vec<u64> {
        s.split(['.', 'b', '-'])
            .map(|piece| {
                let digits: String = piece.chars().take_while(|c| c.is_ascii_digit()).collect();
                digits.parse().unwrap_or(0)
            })
            .collect()
    }

    numeric_runs(a).cmp(&numeric_runs(b))
}

/// Stable index names may omit the patch component; pad for [`Version`].
fn stable_version(name: &str) -> Option<Version> {
    if name.matches('.').count() == 1 {
        Version::parse(&format!("{}.0", name))
    } else {
        Version::parse(name)
    }
}

/// Newest version name on an index page for the given channel.
///
/// Beta keeps names with a pre-release marker (`b3`, `a1`); Release keeps
/// plain `major.minor[.patch]` names. Nightly has no index and yields `None`.
pub fn latest_version(html: &str, channel: Channel) -> Option<String> {
    let names = version_entries(html);

    let latest = match channel {
        Channel::Beta => names
            .into_iter()
            .filter(|name| PRE_RELEASE_MARKER_RE.is_match(name))
            .max_by(|a, b| compare_release_index(a, b)),
        Channel::Release => names
            .into_iter()
            .filter(|name| STABLE_RE.is_match(name))
            .filter_map(|name| stable_version(&name).map(|version| (name, version)))
            .max_by(|(_, a), (_, b)| a.cmp(b))
            .map(|(name, _)| name),
        Channel::Nightly => None,
    };

    debug!("Latest {} version on index: {:?}", channel, latest);
    latest
}

/// ABIs offered on a per-version page, in listing order.
///
/// Entries look like `fenix-145.0-android-arm64-v8a/`; an entry without an
/// ABI suffix (`fenix-145.0-android/`) is the universal build.
pub fn abis_for_version_page(html: &str, app_name: &str) -> Vec<String> {
    let pattern = format!(
        r"^{}-\d+\.\d+(\.\d+)?([ab]\d+)?-android(-(.+))?/$",
        regex::escape(app_name)
    );
    let Ok(entry_re) = Regex::new(&pattern) else {
        return Vec::new();
    };

    directory_entries(html)
        .iter()
        .filter_map(|entry| {
            let caps = entry_re.captures(entry)?;
            Some(
                caps.get(4)
                    .map(|abi| abi.as_str().to_string())
                    .unwrap_or_else(|| UNIVERSAL_ABI.to_string()),
            )
        })
        .collect()
}
