//! Immutable views handed to presentation.

use serde::Serialize;

use mozbuilds_cache::{DownloadRequest, DownloadState};
use mozbuilds_core::{is_compatible, BuildRecord, Channel};

/// One downloadable build with its device fit and download state
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArtifactSnapshot {
    pub record: BuildRecord,
    pub unique_key: String,
    pub compatible: bool,
    pub state: DownloadState,
    #[serde(skip)]
    pub request: DownloadRequest,
}

/// Builds of one app version from a single feed
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReleaseSet {
    /// App or repository name
    pub app: String,
    /// `None` for feeds without channels
    pub channel: Option<Channel>,
    pub version: Option<String>,
    pub date: Option<String>,
    pub artifacts: Vec<ArtifactSnapshot>,
}

impl ReleaseSet {
    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }

    /// Best build for a device: the first ABI in preference order with an
    /// exact build, else any compatible (universal) build
    pub fn best_for(&self, abis: &[String]) -> Option<&ArtifactSnapshot> {
        abis.iter()
            .find_map(|abi| {
                self.artifacts
                    .iter()
                    .find(|a| a.record.abi_name.eq_ignore_ascii_case(abi))
            })
            .or_else(|| {
                self.artifacts
                    .iter()
                    .find(|a| is_compatible(&a.record.abi_name, abis))
            })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobSnapshot {
    pub app_name: String,
    pub job_name: String,
    pub job_symbol: String,
    pub task_id: String,
    pub artifacts: Vec<ArtifactSnapshot>,
}

/// A resolved push and its downloadable artifacts
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PushSnapshot {
    pub push_id: u64,
    pub revision: String,
    pub author: String,
    pub push_timestamp: Option<i64>,
    pub comment: String,
    pub jobs: Vec<JobSnapshot>,
}

impl PushSnapshot {
    pub fn artifacts(&self) -> impl Iterator<Item = &ArtifactSnapshot> {
        self.jobs.iter().flat_map(|job| job.artifacts.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn artifact(abi: &str, compatible: bool) -> ArtifactSnapshot {
        let file_name = format!("fenix-145.0.multi.android-{}.apk", abi);
        let request =
            DownloadRequest::new("fenix", None, file_name.clone(), "https://x.test/a.apk");
        ArtifactSnapshot {
            record: BuildRecord {
                original_listing_entry: format!("fenix-145.0-android-{}/", abi),
                raw_date: None,
                app_name: "fenix".into(),
                version: "145.0".into(),
                abi_name: abi.into(),
                download_url: "https://x.test/a.apk".into(),
                file_name,
            },
            unique_key: request.unique_key(),
            compatible,
            state: DownloadState::NotDownloaded,
            request,
        }
    }

    fn set(artifacts: Vec<ArtifactSnapshot>) -> ReleaseSet {
        ReleaseSet {
            app: "fenix".into(),
            channel: Some(Channel::Release),
            version: Some("145.0".into()),
            date: None,
            artifacts,
        }
    }

    #[test]
    fn test_best_for_prefers_device_order() {
        let set = set(vec![
            artifact("armeabi-v7a", true),
            artifact("arm64-v8a", true),
            artifact("universal", true),
        ]);
        let abis = vec!["arm64-v8a".to_string(), "armeabi-v7a".to_string()];
        assert_eq!(set.best_for(&abis).unwrap().record.abi_name, "arm64-v8a");
    }

    #[test]
    fn test_best_for_falls_back_to_universal() {
        let set = set(vec![artifact("x86_64", false), artifact("universal", true)]);
        let abis = vec!["arm64-v8a".to_string()];
        assert_eq!(set.best_for(&abis).unwrap().record.abi_name, "universal");

        let none = self::set(vec![artifact("x86_64", false)]);
        assert!(none.best_for(&abis).is_none());
    }
}
