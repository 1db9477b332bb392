//! Pipeline Orchestrator
//!
//! Composes the feed parsers, the Treeherder pipeline, the download manager
//! and the device probe into the two user-facing lookups:
//! - latest build set for an app (archive, release index, reference browser,
//!   GitHub)
//! - revision or author resolved to downloadable CI artifacts
//!
//! Every lookup returns snapshots carrying the device fit and the current
//! download state of each artifact.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use mozbuilds_archive::ArchiveClient;
use mozbuilds_cache::{CacheManager, DownloadManager, DownloadRequest};
use mozbuilds_core::{
    is_compatible, AbiProbe, App, AppConfig, BuildRecord, Channel, Installer, MozBuildsError,
    Result, Transport, UNIVERSAL_ABI,
};
use mozbuilds_treeherder::{
    JobArtifacts, PushResolution, Resolution, TreeherderClient, TreeherderPipeline,
};

use crate::snapshot::{ArtifactSnapshot, JobSnapshot, PushSnapshot, ReleaseSet};

/// Cache namespace of CI artifacts
pub const TREEHERDER_NAMESPACE: &str = "treeherder";

/// Cache namespace of GitHub release assets
pub const GITHUB_NAMESPACE: &str = "github";

pub struct Orchestrator {
    archive: ArchiveClient,
    treeherder: TreeherderPipeline,
    downloads: DownloadManager,
    probe: Arc<dyn AbiProbe>,
}

impl Orchestrator {
    pub fn new(
        archive: ArchiveClient,
        treeherder: TreeherderPipeline,
        downloads: DownloadManager,
        probe: Arc<dyn AbiProbe>,
    ) -> Self {
        Self {
            archive,
            treeherder,
            downloads,
            probe,
        }
    }

    /// Wire every component from configuration
    pub fn from_config(
        config: &AppConfig,
        transport: Arc<dyn Transport>,
        installer: Arc<dyn Installer>,
        probe: Arc<dyn AbiProbe>,
    ) -> Self {
        let archive = ArchiveClient::new(Arc::clone(&transport), &config.endpoints);
        let treeherder = TreeherderPipeline::new(
            TreeherderClient::new(Arc::clone(&transport), &config.endpoints),
            config.network.fanout_limit,
            config.network.author_push_count,
        );
        let cache = Arc::new(CacheManager::new(
            config.cache_root(),
            config.cache.namespaces.clone(),
        ));
        let downloads = DownloadManager::new(
            transport,
            installer,
            cache,
            config.network.max_concurrent_downloads,
        );

        Self::new(archive, treeherder, downloads, probe)
    }

    pub fn downloads(&self) -> &DownloadManager {
        &self.downloads
    }

    pub fn cache(&self) -> &Arc<CacheManager> {
        self.downloads.cache()
    }

    pub async fn supported_abis(&self) -> Vec<String> {
        self.probe.supported_abis().await
    }

    /// Latest build set of `app` on `channel`, or the nightly of `date`
    pub async fn latest_release_set(
        &self,
        app: App,
        channel: Channel,
        date: Option<NaiveDate>,
    ) -> Result<ReleaseSet> {
        self.latest_release_set_at(app, channel, date, Utc::now().date_naive())
            .await
    }

    /// [`Self::latest_release_set`] with an explicit current date
    pub async fn latest_release_set_at(
        &self,
        app: App,
        channel: Channel,
        date: Option<NaiveDate>,
        today: NaiveDate,
    ) -> Result<ReleaseSet> {
        info!("Looking up {} {}", app, channel);

        if date.is_some() && channel != Channel::Nightly {
            return Err(MozBuildsError::Config(format!(
                "a date selects nightly builds only, not {}",
                channel
            )));
        }

        let (version, records) = match (app.has_archive(), channel, date) {
            (false, Channel::Nightly, None) => {
                (Some("latest".to_string()), self.archive.reference_browser())
            }
            (false, _, _) => {
                return Err(MozBuildsError::NotFound(format!(
                    "{} only publishes its latest nightly",
                    app
                )))
            }
            (true, Channel::Nightly, None) => {
                let records = self.archive.latest_nightly(app, today).await?;
                (records.first().map(|r| r.version.clone()), records)
            }
            (true, Channel::Nightly, Some(date)) => {
                let records = self.archive.nightly_on(app, date).await?;
                (records.first().map(|r| r.version.clone()), records)
            }
            (true, channel, _) => match self.archive.latest_release(app, channel).await? {
                Some(release) => (Some(release.version), release.records),
                None => {
                    info!("No {} version found for {}", channel, app);
                    (None, Vec::new())
                }
            },
        };

        let date = records.iter().find_map(|r| r.raw_date.clone());
        let artifacts = self.snapshot_records(app.namespace(), records).await;

        Ok(ReleaseSet {
            app: app.product().to_string(),
            channel: Some(channel),
            version,
            date,
            artifacts,
        })
    }

    /// APK assets of a repository's latest GitHub release
    pub async fn github_release(&self, owner: &str, repo: &str) -> Result<ReleaseSet> {
        let (release, records) = self.archive.github_latest(owner, repo).await?;
        let artifacts = self.snapshot_records(GITHUB_NAMESPACE, records).await;

        Ok(ReleaseSet {
            app: repo.to_string(),
            channel: None,
            version: Some(release.tag_name.trim_start_matches('v').to_string()),
            date: release.updated_at,
            artifacts,
        })
    }

    pub async fn resolve_revision(
        &self,
        project: &str,
        revision: &str,
    ) -> Result<Resolution<PushSnapshot>> {
        match self.treeherder.resolve_revision(project, revision).await? {
            Resolution::Found(push) => {
                let abis = self.probe.supported_abis().await;
                Ok(Resolution::Found(self.snapshot_push(push, &abis).await))
            }
            Resolution::Empty(reason) => Ok(Resolution::Empty(reason)),
        }
    }

    pub async fn resolve_author(&self, author: &str) -> Result<Resolution<Vec<PushSnapshot>>> {
        match self.treeherder.resolve_author(author).await? {
            Resolution::Found(pushes) => {
                let abis = self.probe.supported_abis().await;
                let mut snapshots = Vec::with_capacity(pushes.len());
                for push in pushes {
                    snapshots.push(self.snapshot_push(push, &abis).await);
                }
                Ok(Resolution::Found(snapshots))
            }
            Resolution::Empty(reason) => Ok(Resolution::Empty(reason)),
        }
    }

    /// Start downloading an artifact; `None` when it is already in
    /// progress or downloaded
    pub async fn download(&self, artifact: &ArtifactSnapshot) -> Option<JoinHandle<()>> {
        self.downloads.start_download(artifact.request.clone()).await
    }

    async fn snapshot_records(
        &self,
        namespace: &str,
        records: Vec<BuildRecord>,
    ) -> Vec<ArtifactSnapshot> {
        let abis = self.probe.supported_abis().await;
        debug!("Device ABIs: {:?}", abis);

        let mut artifacts = Vec::with_capacity(records.len());
        for record in records {
            let request = DownloadRequest::for_build(namespace, &record);
            artifacts.push(self.snapshot(record, request, &abis).await);
        }
        artifacts
    }

    async fn snapshot(
        &self,
        record: BuildRecord,
        request: DownloadRequest,
        abis: &[String],
    ) -> ArtifactSnapshot {
        let state = self.downloads.track(&request).await;
        ArtifactSnapshot {
            compatible: is_compatible(&record.abi_name, abis),
            unique_key: request.unique_key(),
            record,
            state,
            request,
        }
    }

    async fn snapshot_push(&self, resolved: PushResolution, abis: &[String]) -> PushSnapshot {
        let PushResolution { push, comment, jobs } = resolved;

        let mut job_snapshots = Vec::with_capacity(jobs.len());
        for JobArtifacts { job, artifacts } in jobs {
            let mut snapshots = Vec::with_capacity(artifacts.len());
            for artifact in artifacts {
                let file_name = artifact.file_name().to_string();
                let url = self
                    .treeherder
                    .client()
                    .artifact_download_url(&job.task_id, &artifact.name);
                let record = BuildRecord {
                    original_listing_entry: artifact.name.clone(),
                    raw_date: None,
                    app_name: job.app_name.clone(),
                    version: push.revision.clone(),
                    abi_name: artifact.abi().unwrap_or_else(|| UNIVERSAL_ABI.to_string()),
                    download_url: url.clone(),
                    file_name: file_name.clone(),
                };
                let request = DownloadRequest::new(
                    TREEHERDER_NAMESPACE,
                    Some(job.task_id.clone()),
                    file_name,
                    url,
                );
                snapshots.push(self.snapshot(record, request, abis).await);
            }

            job_snapshots.push(JobSnapshot {
                app_name: job.app_name,
                job_name: job.job_name,
                job_symbol: job.job_symbol,
                task_id: job.task_id,
                artifacts: snapshots,
            });
        }

        PushSnapshot {
            push_id: push.id,
            revision: push.revision,
            author: push.author,
            push_timestamp: push.push_timestamp,
            comment,
            jobs: job_snapshots,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bytes::Bytes;
    use futures::stream::{self, StreamExt};
    use mozbuilds_cache::{CacheState, DownloadState};
    use mozbuilds_core::config::EndpointConfig;
    use mozbuilds_core::{ByteStream, NoopInstaller, StaticAbis};
    use mozbuilds_treeherder::EmptyReason;
    use std::collections::HashMap;
    use tempfile::TempDir;

    const ARCHIVE: &str = "https://archive.test/pub/";
    const TH: &str = "https://th.test/api/";
    const TC: &str = "https://tc.test/queue/";
    const INDEX: &str = "https://tc.test/index/";

    #[derive(Default)]
    struct FakeRemote {
        pages: HashMap<String, String>,
        files: HashMap<String, Vec<u8>>,
    }

    impl FakeRemote {
        fn page(mut self, url: impl Into<String>, body: impl Into<String>) -> Self {
            self.pages.insert(url.into(), body.into());
            self
        }

        fn file(mut self, url: impl Into<String>, body: &[u8]) -> Self {
            self.files.insert(url.into(), body.to_vec());
            self
        }
    }

    #[async_trait]
    impl Transport for FakeRemote {
        async fn fetch_text(&self, url: &str) -> Result<String> {
            self.pages
                .get(url)
                .cloned()
                .ok_or_else(|| MozBuildsError::network(format!("HTTP 404 for {}", url)))
        }

        async fn stream_download(&self, url: &str) -> Result<ByteStream> {
            let body = self
                .files
                .get(url)
                .cloned()
                .ok_or_else(|| MozBuildsError::network(format!("HTTP 404 for {}", url)))?;
            let total_len = Some(body.len() as u64);
            let chunks = stream::iter(
                body.chunks(3)
                    .map(|c| Ok(Bytes::copy_from_slice(c)))
                    .collect::<Vec<_>>(),
            )
            .boxed();
            Ok(ByteStream { total_len, chunks })
        }
    }

    fn listing(names: &[&str]) -> String {
        let mut html =
            String::from("<table>\n<tr><td>Dir</td><td><a href=\"/pub/\">../</a></td></tr>\n");
        for name in names {
            html.push_str(&format!(
                "<tr><td>Dir</td><td><a href=\"/pub/x/{0}\">{0}</a></td></tr>\n",
                name
            ));
        }
        html.push_str("</table>");
        html
    }

    fn orchestrator(remote: FakeRemote, abis: &[&str], dir: &TempDir) -> Orchestrator {
        let mut config = AppConfig::default();
        config.endpoints = EndpointConfig {
            archive_base: ARCHIVE.into(),
            treeherder_base: TH.into(),
            taskcluster_base: TC.into(),
            taskcluster_index_base: INDEX.into(),
            github_api_base: "https://gh.test/".into(),
        };
        config.cache.root = Some(dir.path().to_path_buf());

        let probe = StaticAbis(abis.iter().map(|a| a.to_string()).collect());
        Orchestrator::from_config(
            &config,
            Arc::new(remote),
            Arc::new(NoopInstaller),
            Arc::new(probe),
        )
    }

    fn release_remote() -> FakeRemote {
        FakeRemote::default()
            .page(
                format!("{}fenix/releases/", ARCHIVE),
                listing(&["144.0/", "145.0/", "145.0b9/", "99.0/"]),
            )
            .page(
                format!("{}fenix/releases/145.0/android/", ARCHIVE),
                listing(&[
                    "fenix-145.0-android-arm64-v8a/",
                    "fenix-145.0-android-armeabi-v7a/",
                    "fenix-145.0-android/",
                ]),
            )
    }

    #[tokio::test]
    async fn test_release_set_marks_compatibility() {
        let dir = TempDir::new().unwrap();
        let orchestrator = orchestrator(release_remote(), &["arm64-v8a"], &dir);

        let set = orchestrator
            .latest_release_set(App::Fenix, Channel::Release, None)
            .await
            .unwrap();

        assert_eq!(set.version.as_deref(), Some("145.0"));
        assert_eq!(set.date, None);
        let fit: Vec<(&str, bool)> = set
            .artifacts
            .iter()
            .map(|a| (a.record.abi_name.as_str(), a.compatible))
            .collect();
        assert_eq!(fit, vec![("arm64-v8a", true), ("armeabi-v7a", false), ("universal", true)]);
        assert!(set.artifacts.iter().all(|a| a.state == DownloadState::NotDownloaded));
        assert_eq!(
            set.artifacts[0].unique_key,
            "fenix/fenix-145.0.multi.android-arm64-v8a.apk"
        );
    }

    #[tokio::test]
    async fn test_latest_nightly_set() {
        let dir = TempDir::new().unwrap();
        let today = NaiveDate::from_ymd_opt(2024, 11, 20).unwrap();
        let remote = FakeRemote::default().page(
            format!("{}focus/nightly/2024/11/", ARCHIVE),
            listing(&[
                "2024-11-04-09-30-00-focus-134.0a1-android-arm64-v8a/",
                "2024-11-05-09-30-00-focus-134.0a1-android-arm64-v8a/",
                "2024-11-05-09-30-00-focus-134.0a1-android-x86_64/",
            ]),
        );
        let orchestrator = orchestrator(remote, &["x86_64"], &dir);

        let set = orchestrator
            .latest_release_set_at(App::Focus, Channel::Nightly, None, today)
            .await
            .unwrap();

        assert_eq!(set.version.as_deref(), Some("134.0a1"));
        assert_eq!(set.date.as_deref(), Some("2024-11-05-09-30-00"));
        assert_eq!(set.artifacts.len(), 2);
        assert_eq!(set.best_for(&["x86_64".to_string()]).unwrap().record.abi_name, "x86_64");
    }

    #[tokio::test]
    async fn test_reference_browser_is_nightly_only() {
        let dir = TempDir::new().unwrap();
        let orchestrator = orchestrator(FakeRemote::default(), &["arm64-v8a"], &dir);

        let set = orchestrator
            .latest_release_set(App::ReferenceBrowser, Channel::Nightly, None)
            .await
            .unwrap();
        assert_eq!(set.artifacts.len(), 3);
        assert_eq!(set.version.as_deref(), Some("latest"));
        assert!(set.artifacts[0].record.download_url.starts_with(INDEX));

        let err = orchestrator
            .latest_release_set(App::ReferenceBrowser, Channel::Beta, None)
            .await
            .unwrap_err();
        assert!(matches!(err, MozBuildsError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_date_with_release_channel_is_rejected() {
        let dir = TempDir::new().unwrap();
        let orchestrator = orchestrator(FakeRemote::default(), &[], &dir);
        let date = NaiveDate::from_ymd_opt(2024, 11, 5);
        let err = orchestrator
            .latest_release_set(App::Fenix, Channel::Release, date)
            .await
            .unwrap_err();
        assert!(matches!(err, MozBuildsError::Config(_)));
    }

    fn push_remote() -> FakeRemote {
        let mut row = vec![serde_json::Value::Null; 15];
        row[3] = "fenix".into();
        row[4] = "signing-apk-nightly".into();
        row[5] = "Bs".into();
        row[14] = "TASK42".into();

        FakeRemote::default()
            .page(
                format!("{}project/try/push/?revision=abc123", TH),
                serde_json::json!({"results": [{
                    "id": 42, "revision": "abc123", "author": "dev@mozilla.com",
                    "revisions": [{"revision": "abc123", "comments": "Bug 1 - Fix"}]
                }]})
                .to_string(),
            )
            .page(
                format!("{}jobs/?push_id=42", TH),
                serde_json::json!({"results": [row]}).to_string(),
            )
            .page(
                format!("{}task/TASK42/runs/0/artifacts", TC),
                serde_json::json!({"artifacts": [
                    {"name": "public/build/target.arm64-v8a.apk"},
                    {"name": "public/build/target.x86_64.apk"}
                ]})
                .to_string(),
            )
            .file(
                format!("{}task/TASK42/runs/0/artifacts/public/build/target.arm64-v8a.apk", TC),
                b"fake-apk-bytes",
            )
    }

    #[tokio::test]
    async fn test_revision_snapshot_and_download() {
        let dir = TempDir::new().unwrap();
        let orchestrator = orchestrator(push_remote(), &["arm64-v8a"], &dir);

        let push = orchestrator
            .resolve_revision("try", "abc123")
            .await
            .unwrap()
            .found()
            .unwrap();
        assert_eq!(push.push_id, 42);
        assert_eq!(push.comment, "Bug 1 - Fix");

        let artifacts: Vec<&ArtifactSnapshot> = push.artifacts().collect();
        assert_eq!(artifacts.len(), 2);
        assert_eq!(artifacts[0].unique_key, "treeherder/TASK42/target.arm64-v8a.apk");
        assert!(artifacts[0].compatible);
        assert!(!artifacts[1].compatible);

        orchestrator.download(artifacts[0]).await.unwrap().await.unwrap();
        let expected = dir.path().join("treeherder/TASK42/target.arm64-v8a.apk");
        assert_eq!(std::fs::read(&expected).unwrap(), b"fake-apk-bytes");
        assert_eq!(orchestrator.cache().state(), CacheState::IdleNonEmpty);

        // A fresh lookup reflects the cached file
        let again = orchestrator
            .resolve_revision("try", "abc123")
            .await
            .unwrap()
            .found()
            .unwrap();
        let first = again.artifacts().next().unwrap();
        assert_eq!(first.state, DownloadState::Downloaded { path: expected });
        assert!(orchestrator.download(first).await.is_none());
    }

    #[tokio::test]
    async fn test_unknown_revision_is_empty() {
        let dir = TempDir::new().unwrap();
        let remote = FakeRemote::default().page(
            format!("{}project/try/push/?revision=nope", TH),
            r#"{"results": []}"#,
        );
        let orchestrator = orchestrator(remote, &[], &dir);
        let resolution = orchestrator.resolve_revision("try", "nope").await.unwrap();
        assert_eq!(resolution, Resolution::Empty(EmptyReason::NoPush));
    }

    #[tokio::test]
    async fn test_github_release_set() {
        let dir = TempDir::new().unwrap();
        let remote = FakeRemote::default().page(
            "https://gh.test/repos/mozilla-mobile/firefox-android/releases/latest",
            serde_json::json!({
                "tag_name": "v2.4.1",
                "updated_at": "2025-02-11T10:00:00Z",
                "assets": [
                    {
                        "name": "app-arm64-v8a-release.apk",
                        "browser_download_url": "https://gh.test/a.apk"
                    },
                    {"name": "checksums.txt", "browser_download_url": "https://gh.test/c.txt"}
                ]
            })
            .to_string(),
        );
        let orchestrator = orchestrator(remote, &["arm64-v8a"], &dir);

        let set = orchestrator.github_release("mozilla-mobile", "firefox-android").await.unwrap();
        assert_eq!(set.version.as_deref(), Some("2.4.1"));
        assert_eq!(set.date.as_deref(), Some("2025-02-11T10:00:00Z"));
        assert_eq!(set.channel, None);
        assert_eq!(set.artifacts.len(), 1);
        assert_eq!(set.artifacts[0].unique_key, "github/app-arm64-v8a-release.apk");
    }
}
