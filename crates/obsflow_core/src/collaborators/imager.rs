//! Dirty and cleaned imaging.

use std::fs;
use std::path::{Path, PathBuf};

use super::command::ToolCommand;
use super::errors::{CollaboratorError, CollaboratorResult};
use crate::config::ImagingSettings;
use crate::logging::RunLogger;
use crate::models::{ImageArtifact, ImageKind, VisibilityArtifact};

/// Produces images from visibilities.
pub trait Imager: Send + Sync {
    fn name(&self) -> &str;

    /// Image `vis` without deconvolution.
    fn dirty_image(
        &self,
        vis: &VisibilityArtifact,
        settings: &ImagingSettings,
        output: &Path,
        log: &RunLogger,
    ) -> CollaboratorResult<ImageArtifact>;

    /// Deconvolve, starting from an existing dirty image.
    fn clean_image(
        &self,
        vis: &VisibilityArtifact,
        dirty: &ImageArtifact,
        settings: &ImagingSettings,
        output: &Path,
        log: &RunLogger,
    ) -> CollaboratorResult<ImageArtifact>;
}

/// WSClean adapter producing multi-frequency-synthesis images.
pub struct WscleanImager {
    program: String,
}

impl WscleanImager {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn from_settings(settings: &ImagingSettings) -> Self {
        Self::new(settings.program.clone())
    }

    /// WSClean `-name` prefix used while producing `output`.
    pub fn work_prefix(output: &Path) -> PathBuf {
        let stem = output
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        output.with_file_name(format!("{}-wsclean", stem))
    }

    fn product(prefix: &Path, suffix: &str) -> PathBuf {
        let mut name = prefix.as_os_str().to_owned();
        name.push(suffix);
        PathBuf::from(name)
    }

    fn base_command(&self, settings: &ImagingSettings, prefix: &Path) -> ToolCommand {
        let npixel = settings.npixel.to_string();
        ToolCommand::new(self.name(), &self.program)
            .args(["-size", npixel.as_str(), npixel.as_str()])
            .arg("-scale")
            .arg(format!("{}deg", settings.cellsize_rad.to_degrees()))
            .arg("-name")
            .path_arg(prefix)
    }

    /// Dirty imaging command line.
    pub fn dirty_command(
        &self,
        vis: &VisibilityArtifact,
        settings: &ImagingSettings,
        prefix: &Path,
    ) -> ToolCommand {
        self.base_command(settings, prefix)
            .args(["-niter", "0"])
            .args(settings.extra_args.iter().cloned())
            .path_arg(&vis.path)
    }

    /// Cleaning command line. Expects `<prefix>-dirty.fits` to exist.
    pub fn clean_command(
        &self,
        vis: &VisibilityArtifact,
        settings: &ImagingSettings,
        prefix: &Path,
    ) -> ToolCommand {
        self.base_command(settings, prefix)
            .arg("-niter")
            .arg(settings.niter.to_string())
            .arg("-mgain")
            .arg(settings.mgain.to_string())
            .arg("-auto-threshold")
            .arg(settings.auto_threshold.to_string())
            .arg("-reuse-dirty")
            .path_arg(prefix)
            .args(settings.extra_args.iter().cloned())
            .path_arg(&vis.path)
    }

    fn collect(&self, prefix: &Path, output: &Path) -> CollaboratorResult<()> {
        let image = Self::product(prefix, "-image.fits");
        if !image.exists() {
            return Err(CollaboratorError::missing_output(self.name(), image));
        }
        fs::rename(&image, output)
            .map_err(|e| CollaboratorError::io(self.name(), "moving image product", e))
    }

    fn describe(
        vis: &VisibilityArtifact,
        settings: &ImagingSettings,
        kind: ImageKind,
        output: &Path,
    ) -> ImageArtifact {
        ImageArtifact::new(output, kind, settings.npixel, settings.cellsize_rad)
            .with_centre(vis.phase_centre_ra_deg, vis.phase_centre_dec_deg)
            .with_frequency_range(vis.freq_min_hz, vis.freq_max_hz)
    }
}

impl Default for WscleanImager {
    fn default() -> Self {
        Self::new("wsclean")
    }
}

impl Imager for WscleanImager {
    fn name(&self) -> &str {
        "wsclean"
    }

    fn dirty_image(
        &self,
        vis: &VisibilityArtifact,
        settings: &ImagingSettings,
        output: &Path,
        log: &RunLogger,
    ) -> CollaboratorResult<ImageArtifact> {
        let prefix = Self::work_prefix(output);
        self.dirty_command(vis, settings, &prefix).run(log)?;
        self.collect(&prefix, output)?;
        Ok(Self::describe(vis, settings, ImageKind::Dirty, output))
    }

    fn clean_image(
        &self,
        vis: &VisibilityArtifact,
        dirty: &ImageArtifact,
        settings: &ImagingSettings,
        output: &Path,
        log: &RunLogger,
    ) -> CollaboratorResult<ImageArtifact> {
        let prefix = Self::work_prefix(output);
        fs::copy(&dirty.path, Self::product(&prefix, "-dirty.fits"))
            .map_err(|e| CollaboratorError::io(self.name(), "staging dirty image", e))?;

        self.clean_command(vis, settings, &prefix).run(log)?;
        self.collect(&prefix, output)?;
        Ok(Self::describe(vis, settings, ImageKind::Cleaned, output))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vis() -> VisibilityArtifact {
        VisibilityArtifact {
            path: PathBuf::from("/out/obsflow_.MS"),
            instrument: "MWA".to_string(),
            phase_centre_ra_deg: 250.5,
            phase_centre_dec_deg: -80.0,
            t_min_mjd: 59000.0,
            t_max_mjd: 59000.001,
            freq_min_hz: 100e6,
            freq_max_hz: 120e6,
            n_channels: 16,
            channel_width_hz: 1.25e6,
            n_time_steps: 1,
            integration_time_s: 86.4,
            pol_states: vec!["XX".to_string(), "YY".to_string()],
        }
    }

    #[test]
    fn work_prefix_sits_next_to_output() {
        assert_eq!(
            WscleanImager::work_prefix(Path::new("/out/obsflow_dirty.fits")),
            PathBuf::from("/out/obsflow_dirty-wsclean")
        );
    }

    #[test]
    fn dirty_command_has_no_iterations() {
        let settings = ImagingSettings {
            npixel: 512,
            ..ImagingSettings::default()
        };
        let cmd = WscleanImager::default().dirty_command(&vis(), &settings, Path::new("/out/p"));

        assert_eq!(
            cmd.command_line(),
            format!(
                "wsclean -size 512 512 -scale {}deg -name /out/p -niter 0 /out/obsflow_.MS",
                settings.cellsize_rad.to_degrees()
            )
        );
    }

    #[test]
    fn clean_command_reuses_dirty_image() {
        let settings = ImagingSettings {
            niter: 100,
            mgain: 0.8,
            auto_threshold: 3.0,
            extra_args: vec!["-j".to_string(), "4".to_string()],
            ..ImagingSettings::default()
        };
        let cmd = WscleanImager::default().clean_command(&vis(), &settings, Path::new("/out/c"));
        let args = cmd.arguments();

        assert!(args.windows(2).any(|w| w == ["-niter", "100"]));
        assert!(args.windows(2).any(|w| w == ["-mgain", "0.8"]));
        assert!(args.windows(2).any(|w| w == ["-auto-threshold", "3"]));
        assert!(args.windows(2).any(|w| w == ["-reuse-dirty", "/out/c"]));
        assert!(args.windows(2).any(|w| w == ["-j", "4"]));
        assert_eq!(args.last().map(String::as_str), Some("/out/obsflow_.MS"));
    }

    #[test]
    fn described_image_follows_visibilities() {
        let settings = ImagingSettings::default();
        let img = WscleanImager::describe(
            &vis(),
            &settings,
            ImageKind::Cleaned,
            Path::new("/out/c.fits"),
        );
        assert_eq!(img.kind, ImageKind::Cleaned);
        assert_eq!(img.npixel_x, settings.npixel);
        assert_eq!(img.centre_ra_deg, Some(250.5));
        assert_eq!(img.freq_max_hz, Some(120e6));
    }
}
