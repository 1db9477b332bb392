//! Build feed parsers
//!
//! Handles the feeds that describe downloadable builds:
//! - Monthly nightly directory listings
//! - Beta/release version indexes and per-version ABI pages
//! - GitHub latest-release assets
//! - Reference-browser index routes

pub mod client;
pub mod github;
pub mod layout;
pub mod listing;
pub mod release;

pub use client::{ArchiveClient, ReleaseBuilds};
pub use layout::ArchiveLayout;
pub use listing::{parse_listing, DateBucket, DateFilter};
pub use release::{abis_for_version_page, compare_release_index, latest_version};
