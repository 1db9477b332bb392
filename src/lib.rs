//! mozbuilds - find, download and install Mozilla Android builds
//!
//! ## Architecture
//!
//! - `mozbuilds-core`: errors, configuration, version ordering, ABI matching
//!   and the transport/installer/probe seams
//! - `mozbuilds-archive`: nightly listings, release indexes, reference
//!   browser and GitHub feeds
//! - `mozbuilds-treeherder`: revision/author to CI artifact resolution
//! - `mozbuilds-cache`: download state machine and cache population state
//! - `mozbuilds-device`: adb ABI probe and installer
//!
//! This crate composes them in [`orchestrator::Orchestrator`] and exposes the
//! command line in [`commands`].

#![warn(clippy::all)]

pub mod commands;
pub mod orchestrator;
pub mod snapshot;

// Re-export the pipeline crates for library usage
pub use mozbuilds_archive as archive;
pub use mozbuilds_cache as cache;
pub use mozbuilds_core as core;
pub use mozbuilds_device as device;
pub use mozbuilds_treeherder as treeherder;

pub use mozbuilds_core::{APP_NAME, VERSION};
pub use orchestrator::Orchestrator;
pub use snapshot::{ArtifactSnapshot, JobSnapshot, PushSnapshot, ReleaseSet};
