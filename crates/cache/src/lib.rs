//! mozbuilds build cache
//!
//! Downloads builds into `<root>/<namespace>/<date-or-task>/<file>` and
//! publishes per-artifact and process-wide cache state.

pub mod manager;
pub mod request;
pub mod status;

pub use manager::DownloadManager;
pub use request::{DownloadRequest, DownloadState};
pub use status::{CacheManager, CacheState};
