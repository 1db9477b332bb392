//! Archive Client
//!
//! Fetches listing and index pages through a [`Transport`] and hands them to
//! the parsers.

use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{debug, info};

use mozbuilds_core::config::EndpointConfig;
use mozbuilds_core::{fetch_json, App, BuildRecord, Channel, Result, Transport};

use crate::github::{self, GithubRelease};
use crate::layout::{self, ArchiveLayout};
use crate::listing::{self, DateFilter};
use crate::release;

/// A resolved release version and its builds
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseBuilds {
    pub version: String,
    pub records: Vec<BuildRecord>,
}

pub struct ArchiveClient {
    transport: Arc<dyn Transport>,
    layout: ArchiveLayout,
    index_base: String,
    github_base: String,
}

impl ArchiveClient {
    pub fn new(transport: Arc<dyn Transport>, endpoints: &EndpointConfig) -> Self {
        Self {
            transport,
            layout: ArchiveLayout::new(endpoints.archive_base.clone()),
            index_base: endpoints.taskcluster_index_base.clone(),
            github_base: endpoints.github_api_base.clone(),
        }
    }

    pub fn layout(&self) -> &ArchiveLayout {
        &self.layout
    }

    async fn nightly_from_listing(
        &self,
        app: App,
        listing_url: &str,
        filter: DateFilter,
    ) -> Result<Vec<BuildRecord>> {
        let html = self.transport.fetch_text(listing_url).await?;
        let records = listing::parse_listing(&html, app.product(), listing_url, filter);
        debug!("{} records from {}", records.len(), listing_url);
        Ok(records)
    }

    /// Newest nightly build set. Early in a month the current listing can be
    /// empty, in which case the previous month is read once.
    pub async fn latest_nightly(&self, app: App, today: NaiveDate) -> Result<Vec<BuildRecord>> {
        let url = self.layout.nightly_listing_for(app, today);
        let records = self.nightly_from_listing(app, &url, DateFilter::Latest).await?;
        if !records.is_empty() {
            return Ok(records);
        }

        match layout::previous_month(today) {
            Some(previous) => {
                info!("No {} nightlies in {}, trying previous month", app, url);
                let url = self.layout.nightly_listing_for(app, previous);
                self.nightly_from_listing(app, &url, DateFilter::Latest).await
            }
            None => Ok(records),
        }
    }

    /// Nightly builds published on a given day
    pub async fn nightly_on(&self, app: App, date: NaiveDate) -> Result<Vec<BuildRecord>> {
        let url = self.layout.nightly_listing_for(app, date);
        self.nightly_from_listing(app, &url, DateFilter::On(date)).await
    }

    /// Newest beta or release version with its per-ABI builds.
    /// `None` when the index has no version for the channel.
    pub async fn latest_release(
        &self,
        app: App,
        channel: Channel,
    ) -> Result<Option<ReleaseBuilds>> {
        let index = self.transport.fetch_text(&self.layout.release_index_url(app)).await?;
        let Some(version) = release::latest_version(&index, channel) else {
            return Ok(None);
        };

        let page_url = self.layout.release_version_url(app, &version);
        let page = self.transport.fetch_text(&page_url).await?;
        let records = release::abis_for_version_page(&page, app.product())
            .iter()
            .map(|abi| self.layout.release_record(app, &version, abi))
            .collect();

        Ok(Some(ReleaseBuilds { version, records }))
    }

    /// Latest reference-browser builds (no remote call needed)
    pub fn reference_browser(&self) -> Vec<BuildRecord> {
        layout::reference_browser_records(&self.index_base)
    }

    /// APK assets of a GitHub repository's latest release
    pub async fn github_latest(
        &self,
        owner: &str,
        repo: &str,
    ) -> Result<(GithubRelease, Vec<BuildRecord>)> {
        let url = github::latest_release_url(&self.github_base, owner, repo);
        let release: GithubRelease = fetch_json(self.transport.as_ref(), &url).await?;
        let records = github::release_records(&release, repo);
        Ok((release, records))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use mozbuilds_core::{ByteStream, MozBuildsError};
    use std::collections::HashMap;

    struct PageTransport {
        pages: HashMap<String, String>,
    }

    impl PageTransport {
        fn new(pages: &[(&str, String)]) -> Arc<Self> {
            Arc::new(Self {
                pages: pages.iter().map(|(k, v)| (k.to_string(), v.clone())).collect(),
            })
        }
    }

    #[async_trait]
    impl Transport for PageTransport {
        async fn fetch_text(&self, url: &str) -> Result<String> {
            self.pages
                .get(url)
                .cloned()
                .ok_or_else(|| MozBuildsError::network(format!("HTTP 404 for {}", url)))
        }

        async fn stream_download(&self, url: &str) -> Result<ByteStream> {
            Err(MozBuildsError::NotFound(url.to_string()))
        }
    }

    fn dir_page(names: &[&str]) -> String {
        names
            .iter()
            .map(|n| format!("<tr><td>Dir</td><td><a href=\"/x/{0}\">{0}</a></td></tr>\n", n))
            .collect()
    }

    fn client(transport: Arc<PageTransport>) -> ArchiveClient {
        let endpoints = EndpointConfig {
            archive_base: "https://archive.test/pub/".into(),
            ..EndpointConfig::default()
        };
        ArchiveClient::new(transport, &endpoints)
    }

    #[tokio::test]
    async fn test_latest_nightly_falls_back_to_previous_month() {
        let transport = PageTransport::new(&[
            ("https://archive.test/pub/fenix/nightly/2024/06/", dir_page(&[])),
            (
                "https://archive.test/pub/fenix/nightly/2024/05/",
                dir_page(&["2024-05-31-21-00-00-fenix-128.0a1-android-arm64-v8a/"]),
            ),
        ]);
        let today = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();

        let records = client(transport).latest_nightly(App::Fenix, today).await.unwrap();
        assert_eq!(records.len(), 1);
        assert!(records[0]
            .download_url
            .starts_with("https://archive.test/pub/fenix/nightly/2024/05/"));
    }

    #[tokio::test]
    async fn test_latest_release() {
        let transport = PageTransport::new(&[
            (
                "https://archive.test/pub/focus/releases/",
                dir_page(&["../", "144.0/", "145.0b4/", "145.0/"]),
            ),
            (
                "https://archive.test/pub/focus/releases/145.0/android/",
                dir_page(&["focus-145.0-android-arm64-v8a/", "focus-145.0-android/"]),
            ),
        ]);

        let builds = client(transport)
            .latest_release(App::Focus, Channel::Release)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(builds.version, "145.0");
        let abis: Vec<&str> = builds.records.iter().map(|r| r.abi_name.as_str()).collect();
        assert_eq!(abis, vec!["arm64-v8a", "universal"]);
    }

    #[tokio::test]
    async fn test_latest_release_missing_channel() {
        let transport = PageTransport::new(&[(
            "https://archive.test/pub/focus/releases/",
            dir_page(&["145.0/"]),
        )]);
        let builds = client(transport).latest_release(App::Focus, Channel::Beta).await.unwrap();
        assert!(builds.is_none());
    }

    #[tokio::test]
    async fn test_network_error_propagates() {
        let transport = PageTransport::new(&[]);
        let today = NaiveDate::from_ymd_opt(2024, 6, 10).unwrap();
        let err = client(transport).latest_nightly(App::Fenix, today).await.unwrap_err();
        assert!(err.is_recoverable());
    }
}
