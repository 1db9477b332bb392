//! Download identities and per-artifact state.

use std::path::{Path, PathBuf};

use serde::Serialize;

use mozbuilds_core::BuildRecord;

/// One file to fetch into the cache.
///
/// Identity is `namespace/bucket?/file_name`; the local path mirrors it under
/// the cache root.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct DownloadRequest {
    /// App namespace, or `treeherder` for CI artifacts
    pub namespace: String,
    /// Build date or task id
    pub bucket: Option<String>,
    pub file_name: String,
    pub url: String,
}

/// Keep remote names from escaping their directory
fn path_component(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .map(|c| if matches!(c, '/' | '\\' | ':') || c.is_control() { '_' } else { c })
        .collect();

    match cleaned.as_str() {
        "" | "." | ".." => "_".to_string(),
        _ => cleaned,
    }
}

impl DownloadRequest {
    pub fn new(
        namespace: impl Into<String>,
        bucket: Option<String>,
        file_name: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        Self {
            namespace: path_component(&namespace.into()),
            bucket: bucket.map(|b| path_component(&b)),
            file_name: path_component(&file_name.into()),
            url: url.into(),
        }
    }

    /// Request for a parsed build record, bucketed by its build date
    pub fn for_build(namespace: &str, record: &BuildRecord) -> Self {
        Self::new(
            namespace,
            record.raw_date.clone(),
            record.file_name.clone(),
            record.download_url.clone(),
        )
    }

    /// Deduplication key
    pub fn unique_key(&self) -> String {
        match &self.bucket {
            Some(bucket) => format!("{}/{}/{}", self.namespace, bucket, self.file_name),
            None => format!("{}/{}", self.namespace, self.file_name),
        }
    }

    /// `<root>/<namespace>/<bucket>/<file>`
    pub fn local_path(&self, root: &Path) -> PathBuf {
        let mut path = root.join(&self.namespace);
        if let Some(bucket) = &self.bucket {
            path.push(bucket);
        }
        path.push(&self.file_name);
        path
    }
}

/// Download state of one artifact
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum DownloadState {
    NotDownloaded,
    InProgress { progress: f32, indeterminate: bool },
    Downloaded { path: PathBuf },
    Failed { message: String },
}

impl DownloadState {
    /// Whether a new download may start from this state
    pub fn can_start(&self) -> bool {
        matches!(self, DownloadState::NotDownloaded | DownloadState::Failed { .. })
    }

    pub fn is_in_progress(&self) -> bool {
        matches!(self, DownloadState::InProgress { .. })
    }
}

impl Default for DownloadState {
    fn default() -> Self {
        DownloadState::NotDownloaded
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(raw_date: Option<&str>) -> BuildRecord {
        BuildRecord {
            original_listing_entry: "2024-11-05-09-12-33-fenix-134.0a1-android-arm64-v8a/".into(),
            raw_date: raw_date.map(str::to_string),
            app_name: "fenix".into(),
            version: "134.0a1".into(),
            abi_name: "arm64-v8a".into(),
            download_url: "https://example.test/fenix.apk".into(),
            file_name: "fenix-134.0a1.multi.android-arm64-v8a.apk".into(),
        }
    }

    #[test]
    fn test_unique_key_and_path() {
        let dated = DownloadRequest::for_build("fenix", &record(Some("2024-11-05-09-12-33")));
        assert_eq!(
            dated.unique_key(),
            "fenix/2024-11-05-09-12-33/fenix-134.0a1.multi.android-arm64-v8a.apk"
        );
        assert_eq!(
            dated.local_path(Path::new("/cache")),
            Path::new("/cache/fenix/2024-11-05-09-12-33")
                .join("fenix-134.0a1.multi.android-arm64-v8a.apk")
        );

        let undated = DownloadRequest::for_build("fenix", &record(None));
        assert_eq!(undated.unique_key(), "fenix/fenix-134.0a1.multi.android-arm64-v8a.apk");
    }

    #[test]
    fn test_hostile_names_stay_inside_namespace() {
        let request = DownloadRequest::new("github", Some("..".into()), "../../etc/passwd", "u");
        let path = request.local_path(Path::new("/cache"));
        assert!(path.starts_with("/cache/github"));
        assert_eq!(request.file_name, ".._.._etc_passwd");
        assert_eq!(request.bucket.as_deref(), Some("_"));
    }

    #[test]
    fn test_state_predicates() {
        assert!(DownloadState::NotDownloaded.can_start());
        assert!(DownloadState::Failed { message: "boom".into() }.can_start());
        assert!(!DownloadState::InProgress { progress: 0.0, indeterminate: true }.can_start());
        assert!(!DownloadState::Downloaded { path: "/x".into() }.can_start());
    }
}
