//! Version algebra and dependency spec parsing for slink

pub mod spec;
pub mod version;

pub use spec::{DepRequest, DepTarget, Section};
pub use version::VersionConstraint;
