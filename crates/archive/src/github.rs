//! GitHub latest-release feed.

use serde::Deserialize;
use tracing::debug;

use mozbuilds_core::{Abi, BuildRecord, UNIVERSAL_ABI};

#[derive(Debug, Clone, Deserialize)]
pub struct GithubAsset {
    pub name: String,
    pub browser_download_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GithubRelease {
    pub tag_name: String,
    #[serde(default)]
    pub assets: Vec<GithubAsset>,
    pub updated_at: Option<String>,
}

/// `repos/{owner}/{repo}/releases/latest` relative to the API base
pub fn latest_release_url(api_base: &str, owner: &str, repo: &str) -> String {
    format!("{}/repos/{}/{}/releases/latest", api_base.trim_end_matches('/'), owner, repo)
}

/// One record per `.apk` asset. The feed only has a latest release, so the
/// records carry no date.
pub fn release_records(release: &GithubRelease, app_name: &str) -> Vec<BuildRecord> {
    let version = release.tag_name.trim_start_matches('v').to_string();

    release
        .assets
        .iter()
        .filter(|asset| asset.name.to_ascii_lowercase().ends_with(".apk"))
        .map(|asset| {
            let abi = Abi::find_in(&asset.name)
                .map(|abi| abi.abi_name())
                .unwrap_or(UNIVERSAL_ABI);
            BuildRecord {
                original_listing_entry: asset.name.clone(),
                raw_date: None,
                app_name: app_name.to_string(),
                version: version.clone(),
                abi_name: abi.to_string(),
                download_url: asset.browser_download_url.clone(),
                file_name: asset.name.clone(),
            }
        })
        .inspect(|record| debug!("GitHub asset {} ({})", record.file_name, record.abi_name))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAYLOAD: &str = r#"{
        "tag_name": "v2.4.1",
        "updated_at": "2025-02-11T10:00:00Z",
        "assets": [
            {"name": "app-arm64-v8a-release.apk", "browser_download_url": "https://gh/a.apk"},
            {"name": "app-x86_64-release.APK", "browser_download_url": "https://gh/b.apk"},
            {"name": "app-release.apk", "browser_download_url": "https://gh/c.apk"},
            {"name": "checksums.txt", "browser_download_url": "https://gh/sums"}
        ]
    }"#;

    #[test]
    fn test_release_records() {
        let release: GithubRelease = serde_json::from_str(PAYLOAD).unwrap();
        let records = release_records(&release, "github");

        assert_eq!(records.len(), 3);
        assert_eq!(records[0].version, "2.4.1");
        assert_eq!(records[0].abi_name, "arm64-v8a");
        assert_eq!(records[1].abi_name, "x86_64");
        assert_eq!(records[2].abi_name, UNIVERSAL_ABI);
        assert!(records.iter().all(|r| r.raw_date.is_none()));
    }

    #[test]
    fn test_release_without_assets() {
        let release: GithubRelease = serde_json::from_str(r#"{"tag_name": "1.0"}"#).unwrap();
        assert!(release_records(&release, "github").is_empty());
    }

    #[test]
    fn test_latest_release_url() {
        assert_eq!(
            latest_release_url("https://api.github.com/", "mozilla-mobile", "reference-browser"),
            "https://api.github.com/repos/mozilla-mobile/reference-browser/releases/latest"
        );
    }
}
