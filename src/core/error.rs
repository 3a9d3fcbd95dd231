//! Error types for slink

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for slink operations
pub type SlinkResult<T> = Result<T, SlinkError>;

/// Main error type for slink
#[derive(Error, Debug)]
pub enum SlinkError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("No manifest found at {}", .0.display())]
    ManifestMissing(PathBuf),

    #[error("Invalid manifest at {}: {reason}", .path.display())]
    ManifestInvalid { path: PathBuf, reason: String },

    #[error("Invalid version range: {0}")]
    RangeInvalid(String),

    #[error("No version of {package} satisfies {range}")]
    NoMatchingVersion { package: String, range: String },

    #[error("Version {version} of {package} has no dist record in the registry")]
    VersionGone { package: String, version: String },

    #[error("Package not found: {0}")]
    PackageNotFound(String),

    #[error("Registry error: {0}")]
    Registry(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error(
        "Bootstrap installer failed for [{deps}] in {scratch}\nstdout: {stdout}\nstderr: {stderr}",
        deps = .deps.join(", "),
        scratch = .scratch.display()
    )]
    Bootstrap {
        scratch: PathBuf,
        deps: Vec<String>,
        stdout: String,
        stderr: String,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{} operations failed:\n{}", .0.len(), .0.join("\n"))]
    Multiple(Vec<String>),
}

impl SlinkError {
    /// Create a registry error
    pub fn registry<S: Into<String>>(msg: S) -> Self {
        SlinkError::Registry(msg.into())
    }

    /// Create a store error
    pub fn store<S: Into<String>>(msg: S) -> Self {
        SlinkError::Store(msg.into())
    }

    /// Create a config error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        SlinkError::Config(msg.into())
    }

    /// Collapse the errors of concurrent siblings into one error,
    /// surfacing all of them.
    pub fn collect(mut errors: Vec<SlinkError>) -> Self {
        if errors.len() == 1 {
            errors.remove(0)
        } else {
            SlinkError::Multiple(errors.into_iter().map(|e| e.to_string()).collect())
        }
    }
}
