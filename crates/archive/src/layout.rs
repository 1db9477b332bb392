//! URL layout of the build archive and the reference-browser index.

use chrono::{Datelike, NaiveDate};

use mozbuilds_core::{App, BuildRecord, UNIVERSAL_ABI};

/// ABIs published for the reference browser
pub const REFERENCE_BROWSER_ABIS: &[&str] = &["arm64-v8a", "armeabi-v7a", "x86_64"];

/// Paths under the archive root (`https://archive.mozilla.org/pub/`)
#[derive(Debug, Clone)]
pub struct ArchiveLayout {
    base: String,
}

impl ArchiveLayout {
    pub fn new(base: impl Into<String>) -> Self {
        let mut base = base.into();
        if !base.ends_with('/') {
            base.push('/');
        }
        Self { base }
    }

    /// Monthly nightly listing
    pub fn nightly_month_url(&self, app: App, year: i32, month: u32) -> String {
        format!("{}{}/nightly/{:04}/{:02}/", self.base, app.product(), year, month)
    }

    /// Monthly nightly listing containing `date`
    pub fn nightly_listing_for(&self, app: App, date: NaiveDate) -> String {
        self.nightly_month_url(app, date.year(), date.month())
    }

    /// Beta/release version index
    pub fn release_index_url(&self, app: App) -> String {
        format!("{}{}/releases/", self.base, app.product())
    }

    /// Per-version page listing one directory per ABI
    pub fn release_version_url(&self, app: App, version: &str) -> String {
        format!("{}{}/releases/{}/android/", self.base, app.product(), version)
    }

    /// Build record for one release ABI
    pub fn release_record(&self, app: App, version: &str, abi: &str) -> BuildRecord {
        let product = app.product();
        let (entry, file_name) = if abi == UNIVERSAL_ABI {
            (
                format!("{}-{}-android/", product, version),
                format!("{}-{}.multi.android.apk", product, version),
            )
        } else {
            (
                format!("{}-{}-android-{}/", product, version, abi),
                format!("{}-{}.multi.android-{}.apk", product, version, abi),
            )
        };

        BuildRecord {
            download_url: format!(
                "{}{}{}",
                self.release_version_url(app, version),
                entry,
                file_name
            ),
            original_listing_entry: entry,
            raw_date: None,
            app_name: product.to_string(),
            version: version.to_string(),
            abi_name: abi.to_string(),
            file_name,
        }
    }
}

/// First day of the month before `date`
pub fn previous_month(date: NaiveDate) -> Option<NaiveDate> {
    let (year, month) = if date.month() == 1 {
        (date.year() - 1, 12)
    } else {
        (date.year(), date.month() - 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1)
}

/// Latest reference-browser builds, addressed through the Taskcluster index.
/// No listing exists, so the records carry no date.
pub fn reference_browser_records(index_base: &str) -> Vec<BuildRecord> {
    let base = index_base.trim_end_matches('/');
    REFERENCE_BROWSER_ABIS
        .iter()
        .map(|abi| {
            let route = format!("mobile.v2.reference-browser.nightly.latest.{}", abi);
            let file_name = format!("target.{}.apk", abi);
            BuildRecord {
                download_url: format!("{}/task/{}/artifacts/public/{}", base, route, file_name),
                original_listing_entry: route,
                raw_date: None,
                app_name: App::ReferenceBrowser.product().to_string(),
                version: "latest".to_string(),
                abi_name: abi.to_string(),
                file_name,
            }
        })
        .collect()
}
