//! In-process collaborators and fixtures for pipeline tests.

#![allow(dead_code)]

use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use obsflow_core::collaborators::{
    CollaboratorError, CollaboratorResult, Imager, SimulationRequest, Simulator,
};
use obsflow_core::config::{ImagingSettings, Settings};
use obsflow_core::logging::{LogConfig, RunLogger};
use obsflow_core::models::{ImageArtifact, ImageKind, VisibilityArtifact};
use obsflow_core::orchestrator::{policy_from_settings, Context};

/// Writes a small fake Measurement Set.
#[derive(Default)]
pub struct FakeSimulator {
    pub fail_with: Option<String>,
    pub calls: AtomicUsize,
}

impl FakeSimulator {
    pub fn failing(message: &str) -> Self {
        Self {
            fail_with: Some(message.to_string()),
            ..Self::default()
        }
    }
}

impl Simulator for FakeSimulator {
    fn name(&self) -> &str {
        "fake-simulator"
    }

    fn simulate(
        &self,
        request: &SimulationRequest<'_>,
        log: &RunLogger,
    ) -> CollaboratorResult<VisibilityArtifact> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        log.command("fake-simulator");
        if let Some(ref message) = self.fail_with {
            return Err(CollaboratorError::command_failed(self.name(), 1, message.clone()));
        }

        fs::create_dir_all(request.output)
            .map_err(|e| CollaboratorError::io(self.name(), "creating MS", e))?;
        fs::write(request.output.join("table.dat"), vec![0u8; 4096])
            .map_err(|e| CollaboratorError::io(self.name(), "writing MS", e))?;

        request
            .observation
            .to_visibility(request.output, &request.telescope.name)
            .map_err(|e| CollaboratorError::failed(self.name(), e.to_string()))
    }
}

/// Writes placeholder FITS files and counts calls.
#[derive(Default)]
pub struct FakeImager {
    pub dirty_calls: AtomicUsize,
    pub clean_calls: AtomicUsize,
}

impl FakeImager {
    fn write(
        &self,
        vis: &VisibilityArtifact,
        settings: &ImagingSettings,
        output: &Path,
        kind: ImageKind,
    ) -> CollaboratorResult<ImageArtifact> {
        fs::write(output, b"SIMPLE  =                    T")
            .map_err(|e| CollaboratorError::io("fake-imager", "writing image", e))?;
        Ok(
            ImageArtifact::new(output, kind, settings.npixel, settings.cellsize_rad)
                .with_centre(vis.phase_centre_ra_deg, vis.phase_centre_dec_deg)
                .with_frequency_range(vis.freq_min_hz, vis.freq_max_hz),
        )
    }
}

impl Imager for FakeImager {
    fn name(&self) -> &str {
        "fake-imager"
    }

    fn dirty_image(
        &self,
        vis: &VisibilityArtifact,
        settings: &ImagingSettings,
        output: &Path,
        _log: &RunLogger,
    ) -> CollaboratorResult<ImageArtifact> {
        self.dirty_calls.fetch_add(1, Ordering::SeqCst);
        self.write(vis, settings, output, ImageKind::Dirty)
    }

    fn clean_image(
        &self,
        vis: &VisibilityArtifact,
        dirty: &ImageArtifact,
        settings: &ImagingSettings,
        output: &Path,
        _log: &RunLogger,
    ) -> CollaboratorResult<ImageArtifact> {
        self.clean_calls.fetch_add(1, Ordering::SeqCst);
        if !dirty.path.exists() {
            return Err(CollaboratorError::missing_output("fake-imager", &dirty.path));
        }
        self.write(vis, settings, output, ImageKind::Cleaned)
    }
}

/// Settings for a small MWA observation starting at MJD 59000.0.
pub fn mwa_settings(output_root: &Path) -> Settings {
    let mut settings = Settings::default();
    settings.paths.output_root = output_root.to_string_lossy().into_owned();
    settings.paths.logs_folder = output_root.join(".logs").to_string_lossy().into_owned();
    settings.metadata.namespace = "testing".to_string();
    settings.simulation.telescope.name = "MWA".to_string();
    let obs = &mut settings.simulation.observation;
    obs.start_time = "2020-05-31T00:00:00Z".to_string();
    obs.length_s = 112.0;
    obs.number_of_time_steps = 14;
    obs.number_of_channels = 16;
    obs.start_frequency_hz = 150e6;
    obs.frequency_increment_hz = 1.28e6;
    obs.pol_states = vec!["XX".to_string(), "YY".to_string()];
    settings.imaging.npixel = 256;
    settings
}

pub struct Harness {
    pub ctx: Context,
    pub simulator: Arc<FakeSimulator>,
    pub imager: Arc<FakeImager>,
}

pub fn harness(settings: Settings, output_root: &Path) -> Harness {
    harness_with(settings, output_root, FakeSimulator::default())
}

pub fn harness_with(settings: Settings, output_root: &Path, simulator: FakeSimulator) -> Harness {
    let simulator = Arc::new(simulator);
    let imager = Arc::new(FakeImager::default());
    let config = LogConfig {
        show_timestamps: false,
        ..LogConfig::default()
    };
    let logger = Arc::new(
        RunLogger::new("test_run", output_root.join(".logs"), config).unwrap(),
    );
    let policy = policy_from_settings(&settings.metadata, Some("tester".to_string()), 0);

    let ctx = Context::new(
        settings,
        "test_run",
        output_root.to_path_buf(),
        logger,
        simulator.clone(),
        imager.clone(),
    )
    .with_policy(policy);

    Harness {
        ctx,
        simulator,
        imager,
    }
}
