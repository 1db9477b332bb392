//! mozbuilds core - shared types and seams
//!
//! This crate holds what every other mozbuilds crate agrees on: the error
//! taxonomy, configuration, version ordering, ABI matching, build records
//! and the transport/installer/probe traits the pipeline is written against.

pub mod abi;
pub mod config;
pub mod error;
pub mod models;
pub mod transport;
pub mod version;

pub use abi::{is_compatible, Abi, UNIVERSAL_ABI};
pub use config::AppConfig;
pub use error::{MozBuildsError, Result};
pub use models::{App, BuildRecord, Channel};
pub use transport::{
    fetch_json, AbiProbe, ByteStream, HttpTransport, Installer, NoopInstaller, StaticAbis,
    Transport,
};
pub use version::Version;

/// mozbuilds version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = "mozbuilds";
