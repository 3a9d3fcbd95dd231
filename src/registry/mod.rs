//! Registry adapter for slink

pub mod client;
pub mod types;

pub use client::{resolve_range, tarball_url, RegistryClient};
pub use types::{DistInfo, RegistryInfo, VersionInfo};
