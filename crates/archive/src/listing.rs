//! Nightly Archive Listing Parser
//!
//! Turns one monthly directory-listing page into build records. Entries are
//! named `<yyyy-MM-dd-HH-mm-ss>-<app>-<version>-android-<abi>/`; every build
//! of one nightly shares the date prefix, so entries are bucketed by it and
//! the newest bucket is the current build set.

use chrono::{NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use mozbuilds_core::BuildRecord;

/// Timestamp layout of a bucket prefix
pub const BUCKET_DATE_FORMAT: &str = "%Y-%m-%d-%H-%M-%S";

static DIR_ROW_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"<td>Dir</td>\s*<td><a href="[^"]*">([^<]+/)</a></td>"#)
        .expect("valid directory row pattern")
});

static ENTRY_TAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([^-/]+)-android-([^/]+)/$").expect("valid entry pattern")
});

static BUCKET_DATE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\d{4}-\d{2}-\d{2}-\d{2}-\d{2}-\d{2}$").expect("valid date pattern")
});

/// Which nightly to pick from a listing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateFilter {
    /// Newest date bucket
    Latest,
    /// Every entry whose date prefix starts with this calendar date
    On(NaiveDate),
}

/// Entries sharing one date prefix, in listing order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateBucket {
    pub prefix: String,
    pub entries: Vec<String>,
}

impl DateBucket {
    /// Parsed bucket timestamp, `None` when the prefix is not a timestamp
    pub fn timestamp(&self) -> Option<NaiveDateTime> {
        NaiveDateTime::parse_from_str(&self.prefix, BUCKET_DATE_FORMAT).ok()
    }
}

/// All directory entries of a listing page except the parent link
pub fn directory_entries(html: &str) -> Vec<String> {
    DIR_ROW_RE
        .captures_iter(html)
        .map(|caps| caps[1].trim().to_string())
        .filter(|entry| entry != "../")
        .collect()
}

/// Date prefix of an entry: everything before `-<app>`
pub fn date_prefix<'a>(entry: &'a str, app_name: &str) -> &'a str {
    let marker = format!("-{}", app_name);
    match entry.find(&marker) {
        Some(idx) => &entry[..idx],
        None => entry,
    }
}

/// Group entries by date prefix, buckets ordered by first appearance
pub fn group_by_date(entries: &[String], app_name: &str) -> Vec<DateBucket> {
    let mut buckets: Vec<DateBucket> = Vec::new();
    for entry in entries {
        let prefix = date_prefix(entry, app_name);
        match buckets.iter_mut().find(|b| b.prefix == prefix) {
            Some(bucket) => bucket.entries.push(entry.clone()),
            None => buckets.push(DateBucket {
                prefix: prefix.to_string(),
                entries: vec![entry.clone()],
            }),
        }
    }
    buckets
}

/// Bucket with the newest timestamp.
///
/// Unparsable prefixes rank as the earliest possible time, so they only win
/// when nothing else is present. Ties keep the earlier bucket.
pub fn select_latest_bucket(buckets: &[DateBucket]) -> Option<&DateBucket> {
    let mut best: Option<(&DateBucket, NaiveDateTime)> = None;
    for bucket in buckets {
        let ts = bucket.timestamp().unwrap_or(NaiveDateTime::MIN);
        match best {
            Some((_, best_ts)) if ts <= best_ts => {}
            _ => best = Some((bucket, ts)),
        }
    }
    best.map(|(bucket, _)| bucket)
}

/// APK file name inside a nightly entry
pub fn nightly_file_name(app_name: &str, version: &str, abi: &str) -> String {
    format!("{}-{}.multi.android-{}.apk", app_name, version, abi)
}

/// Parse one entry of the shape `<date>-<app>-<version>-android-<abi>/`.
///
/// `base_url` is the URL of the listing page and must end with `/`.
pub fn parse_entry(entry: &str, app_name: &str, base_url: &str) -> Option<BuildRecord> {
    let prefix = date_prefix(entry, app_name);
    if !BUCKET_DATE_RE.is_match(prefix) {
        debug!("Skipping listing entry with unparsable date: {}", entry);
        return None;
    }

    let tail = entry[prefix.len()..]
        .strip_prefix('-')?
        .strip_prefix(app_name)?
        .strip_prefix('-')?;
    let Some(caps) = ENTRY_TAIL_RE.captures(tail) else {
        debug!("Skipping unrelated listing entry: {}", entry);
        return None;
    };

    let version = caps[1].to_string();
    let abi = caps[2].to_string();
    let file_name = nightly_file_name(app_name, &version, &abi);

    Some(BuildRecord {
        original_listing_entry: entry.to_string(),
        raw_date: Some(prefix.to_string()),
        app_name: app_name.to_string(),
        download_url: format!("{}{}{}", base_url, entry, file_name),
        version,
        abi_name: abi,
        file_name,
    })
}

/// Parse a monthly listing page into the selected nightly's build records.
///
/// Returns an empty list when the page has no usable entries.
pub fn parse_listing(
    html: &str,
    app_name: &str,
    base_url: &str,
    filter: DateFilter,
) -> Vec<BuildRecord> {
    let entries = directory_entries(html);

    let selected: Vec<String> = match filter {
        DateFilter::Latest => {
            let buckets = group_by_date(&entries, app_name);
            match select_latest_bucket(&buckets) {
                Some(bucket) => {
                    debug!("Latest {} bucket: {}", app_name, bucket.prefix);
                    bucket.entries.clone()
                }
                None => return Vec::new(),
            }
        }
        DateFilter::On(date) => {
            let day = date.format("%Y-%m-%d").to_string();
            entries
                .into_iter()
                .filter(|entry| date_prefix(entry, app_name).starts_with(&day))
                .collect()
        }
    };

    selected
        .iter()
        .filter_map(|entry| parse_entry(entry, app_name, base_url))
        .collect()
}
