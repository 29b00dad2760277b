//! Data models for obsflow.
//!
//! Artifact handles describe what the external simulator and imager
//! produced. They are read-only inputs to metadata derivation.

mod artifacts;
mod enums;

pub use artifacts::{ImageArtifact, VisibilityArtifact};
pub use enums::{FrequencyAggregation, ImageKind};
