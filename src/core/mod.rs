//! Core module for slink
//!
//! Contains the engine context, configuration, error types, and manifest
//! handling.

pub mod config;
pub mod engine;
pub mod error;
pub mod manifest;

pub use config::Config;
pub use engine::Engine;
pub use error::{SlinkError, SlinkResult};
pub use manifest::{Manifest, ManifestCache};
