//! Handles to data products written by the external collaborators.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::enums::{FrequencyAggregation, ImageKind};

/// A simulated visibility dataset (e.g. a Measurement Set).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisibilityArtifact {
    /// Location of the dataset.
    pub path: PathBuf,
    /// Instrument/array name as reported by the simulator (e.g. "MWA").
    pub instrument: String,
    /// Phase centre right ascension in degrees.
    pub phase_centre_ra_deg: f64,
    /// Phase centre declination in degrees.
    pub phase_centre_dec_deg: f64,
    /// Observation start (MJD, UTC).
    pub t_min_mjd: f64,
    /// Observation end (MJD, UTC).
    pub t_max_mjd: f64,
    /// Lowest channel frequency in Hz.
    pub freq_min_hz: f64,
    /// Highest channel frequency in Hz.
    pub freq_max_hz: f64,
    /// Number of frequency channels.
    #[serde(default = "default_one")]
    pub n_channels: u32,
    /// Width of one channel in Hz.
    #[serde(default)]
    pub channel_width_hz: f64,
    /// Number of time steps.
    #[serde(default = "default_one")]
    pub n_time_steps: u32,
    /// Integration time of a single time step in seconds.
    #[serde(default)]
    pub integration_time_s: f64,
    /// Polarisation products (e.g. ["XX", "XY", "YX", "YY"]).
    #[serde(default)]
    pub pol_states: Vec<String>,
}

fn default_one() -> u32 {
    1
}

impl VisibilityArtifact {
    /// Artifact file name without directory components.
    pub fn file_name(&self) -> Option<String> {
        file_name_of(&self.path)
    }

    /// Observation duration in seconds.
    pub fn duration_s(&self) -> f64 {
        (self.t_max_mjd - self.t_min_mjd) * 86_400.0
    }
}

/// An image derived from a visibility artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageArtifact {
    /// Location of the image (FITS).
    pub path: PathBuf,
    /// Dirty or cleaned product.
    pub kind: ImageKind,
    /// Pixels along the first axis.
    pub npixel_x: u32,
    /// Pixels along the second axis.
    pub npixel_y: u32,
    /// Angular size of one pixel in radians.
    pub cellsize_rad: f64,
    /// Channel aggregation mode.
    #[serde(default)]
    pub aggregation: FrequencyAggregation,
    /// Image centre right ascension in degrees, if known.
    #[serde(default)]
    pub centre_ra_deg: Option<f64>,
    /// Image centre declination in degrees, if known.
    #[serde(default)]
    pub centre_dec_deg: Option<f64>,
    /// Lowest frequency covered in Hz, if known.
    #[serde(default)]
    pub freq_min_hz: Option<f64>,
    /// Highest frequency covered in Hz, if known.
    #[serde(default)]
    pub freq_max_hz: Option<f64>,
}

impl ImageArtifact {
    /// Create a square image handle.
    pub fn new(path: impl Into<PathBuf>, kind: ImageKind, npixel: u32, cellsize_rad: f64) -> Self {
        Self {
            path: path.into(),
            kind,
            npixel_x: npixel,
            npixel_y: npixel,
            cellsize_rad,
            aggregation: FrequencyAggregation::default(),
            centre_ra_deg: None,
            centre_dec_deg: None,
            freq_min_hz: None,
            freq_max_hz: None,
        }
    }

    /// Set the frequency aggregation mode.
    pub fn with_aggregation(mut self, aggregation: FrequencyAggregation) -> Self {
        self.aggregation = aggregation;
        self
    }

    /// Set the image centre.
    pub fn with_centre(mut self, ra_deg: f64, dec_deg: f64) -> Self {
        self.centre_ra_deg = Some(ra_deg);
        self.centre_dec_deg = Some(dec_deg);
        self
    }

    /// Set the covered frequency range.
    pub fn with_frequency_range(mut self, min_hz: f64, max_hz: f64) -> Self {
        self.freq_min_hz = Some(min_hz);
        self.freq_max_hz = Some(max_hz);
        self
    }

    /// Artifact file name without directory components.
    pub fn file_name(&self) -> Option<String> {
        file_name_of(&self.path)
    }

    /// Number of spectral planes in the image.
    pub fn spectral_planes(&self, n_channels: u32) -> u32 {
        match self.aggregation {
            FrequencyAggregation::Mfs => 1,
            FrequencyAggregation::Cube => n_channels.max(1),
        }
    }
}

fn file_name_of(path: &Path) -> Option<String> {
    path.file_name().map(|n| n.to_string_lossy().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_file_name_strips_directories() {
        let img = ImageArtifact::new("/out/run/dirty.fits", ImageKind::Dirty, 1024, 1e-6);
        assert_eq!(img.file_name().as_deref(), Some("dirty.fits"));
    }

    #[test]
    fn mfs_has_single_plane() {
        let img = ImageArtifact::new("a.fits", ImageKind::Dirty, 8, 1e-6);
        assert_eq!(img.spectral_planes(375), 1);
        let cube = img.with_aggregation(FrequencyAggregation::Cube);
        assert_eq!(cube.spectral_planes(375), 375);
    }
}
