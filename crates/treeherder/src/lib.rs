//! Treeherder resolution
//!
//! Turns a revision or author into the signed APK artifacts of its CI jobs.

pub mod client;
pub mod models;
pub mod pipeline;

pub use client::TreeherderClient;
pub use models::{ArtifactRecord, JobRecord, PushRecord, RevisionDetail};
pub use pipeline::{EmptyReason, JobArtifacts, PushResolution, Resolution, TreeherderPipeline};
