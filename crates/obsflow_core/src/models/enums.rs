//! Enums shared by artifact handles and settings.

use serde::{Deserialize, Serialize};

/// Which imaging product an image artifact is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageKind {
    /// Image produced directly from visibilities.
    Dirty,
    /// Image after a deconvolution pass.
    Cleaned,
}

impl ImageKind {
    /// ObsCore calibration level of this product.
    pub fn calib_level(&self) -> u8 {
        match self {
            ImageKind::Dirty => 2,
            ImageKind::Cleaned => 3,
        }
    }
}

impl std::fmt::Display for ImageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ImageKind::Dirty => write!(f, "dirty"),
            ImageKind::Cleaned => write!(f, "cleaned"),
        }
    }
}

/// How frequency channels are combined in an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrequencyAggregation {
    /// Multi-frequency synthesis: all channels aggregated into one plane.
    #[default]
    Mfs,
    /// One image plane per channel.
    Cube,
}

impl std::fmt::Display for FrequencyAggregation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FrequencyAggregation::Mfs => write!(f, "mfs"),
            FrequencyAggregation::Cube => write!(f, "cube"),
        }
    }
}
