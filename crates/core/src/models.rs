//! Build descriptors shared by the feed parsers and the download cache.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::MozBuildsError;

/// Browser app with a known build feed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum App {
    Fenix,
    Focus,
    ReferenceBrowser,
}

impl App {
    /// Product name used in archive paths and file names
    pub fn product(&self) -> &'static str {
        match self {
            App::Fenix => "fenix",
            App::Focus => "focus",
            App::ReferenceBrowser => "reference-browser",
        }
    }

    /// Cache namespace directory
    pub fn namespace(&self) -> &'static str {
        self.product()
    }

    /// Whether the app publishes to the directory-listing archive
    pub fn has_archive(&self) -> bool {
        matches!(self, App::Fenix | App::Focus)
    }
}

impl fmt::Display for App {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.product())
    }
}

impl FromStr for App {
    type Err = MozBuildsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fenix" | "firefox" => Ok(App::Fenix),
            "focus" => Ok(App::Focus),
            "reference-browser" | "reference_browser" | "rb" => Ok(App::ReferenceBrowser),
            other => Err(MozBuildsError::Parse(format!("unknown app '{}'", other))),
        }
    }
}

/// Release track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    #[default]
    Nightly,
    Beta,
    Release,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Channel::Nightly => "nightly",
            Channel::Beta => "beta",
            Channel::Release => "release",
        })
    }
}

impl FromStr for Channel {
    type Err = MozBuildsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "nightly" => Ok(Channel::Nightly),
            "beta" => Ok(Channel::Beta),
            "release" => Ok(Channel::Release),
            other => Err(MozBuildsError::Parse(format!("unknown channel '{}'", other))),
        }
    }
}

/// One discovered, downloadable build.
///
/// `raw_date` is `None` for feeds that only expose a "latest" build; every
/// record from such a feed is current.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildRecord {
    pub original_listing_entry: String,
    pub raw_date: Option<String>,
    pub app_name: String,
    pub version: String,
    pub abi_name: String,
    pub download_url: String,
    pub file_name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_from_str() {
        assert_eq!("Fenix".parse::<App>().unwrap(), App::Fenix);
        assert_eq!("rb".parse::<App>().unwrap(), App::ReferenceBrowser);
        assert!("klar".parse::<App>().is_err());
        assert_eq!(App::ReferenceBrowser.to_string(), "reference-browser");
    }

    #[test]
    fn test_channel_from_str() {
        assert_eq!("BETA".parse::<Channel>().unwrap(), Channel::Beta);
        assert_eq!(Channel::default(), Channel::Nightly);
        assert!("aurora".parse::<Channel>().is_err());
    }
}
