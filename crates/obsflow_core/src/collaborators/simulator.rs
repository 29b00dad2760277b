//! Visibility simulation.

use std::path::Path;

use super::command::ToolCommand;
use super::errors::{CollaboratorError, CollaboratorResult};
use crate::config::{ObservationConfig, SimulationSettings, SkyModelConfig, TelescopeConfig};
use crate::logging::RunLogger;
use crate::models::VisibilityArtifact;

/// Everything a simulator needs for one run.
#[derive(Debug, Clone, Copy)]
pub struct SimulationRequest<'a> {
    pub telescope: &'a TelescopeConfig,
    pub sky_model: &'a SkyModelConfig,
    pub observation: &'a ObservationConfig,
    pub output: &'a Path,
}

impl<'a> SimulationRequest<'a> {
    pub fn from_settings(settings: &'a SimulationSettings, output: &'a Path) -> Self {
        Self {
            telescope: &settings.telescope,
            sky_model: &settings.sky_model,
            observation: &settings.observation,
            output,
        }
    }
}

/// Produces visibilities for a telescope, sky model and observation.
pub trait Simulator: Send + Sync {
    /// Name used in logs and errors.
    fn name(&self) -> &str;

    /// Write visibilities to `request.output` and describe them.
    fn simulate(
        &self,
        request: &SimulationRequest<'_>,
        log: &RunLogger,
    ) -> CollaboratorResult<VisibilityArtifact>;
}

/// Runs an external simulator program.
///
/// The program receives the observation as command-line options and must
/// write the dataset to `--output`. The returned artifact is described from
/// the observation configuration.
pub struct CommandSimulator {
    program: String,
    extra_args: Vec<String>,
}

impl CommandSimulator {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            extra_args: Vec::new(),
        }
    }

    pub fn from_settings(settings: &SimulationSettings) -> Self {
        Self {
            program: settings.program.clone(),
            extra_args: settings.extra_args.clone(),
        }
    }

    /// Command line for a request.
    pub fn command(&self, request: &SimulationRequest<'_>) -> ToolCommand {
        let obs = request.observation;
        let mut cmd = ToolCommand::new(self.name(), &self.program)
            .args(self.extra_args.iter().cloned())
            .args(["--telescope", request.telescope.name.as_str()]);

        if let Some(ref version) = request.telescope.version {
            cmd = cmd.args(["--telescope-version", version.as_str()]);
        }
        cmd = cmd.args(["--sky-model", request.sky_model.name.as_str()]);
        if let Some(ref path) = request.sky_model.path {
            cmd = cmd.arg("--sky-model-path").path_arg(path);
        }

        cmd.args([
            "--phase-centre-ra".to_string(),
            obs.phase_centre_ra_deg.to_string(),
            "--phase-centre-dec".to_string(),
            obs.phase_centre_dec_deg.to_string(),
            "--start-time".to_string(),
            obs.start_time.clone(),
            "--length-s".to_string(),
            obs.length_s.to_string(),
            "--time-steps".to_string(),
            obs.number_of_time_steps.to_string(),
            "--channels".to_string(),
            obs.number_of_channels.to_string(),
            "--start-frequency-hz".to_string(),
            obs.start_frequency_hz.to_string(),
            "--frequency-increment-hz".to_string(),
            obs.frequency_increment_hz.to_string(),
        ])
        .arg("--output")
        .path_arg(request.output)
    }
}

impl Simulator for CommandSimulator {
    fn name(&self) -> &str {
        "simulator"
    }

    fn simulate(
        &self,
        request: &SimulationRequest<'_>,
        log: &RunLogger,
    ) -> CollaboratorResult<VisibilityArtifact> {
        // Validate the observation before spending time in the simulator.
        request
            .observation
            .t_min_mjd()
            .map_err(|e| CollaboratorError::failed(self.name(), e.to_string()))?;

        self.command(request).run(log)?;

        if !request.output.exists() {
            return Err(CollaboratorError::missing_output(self.name(), request.output));
        }

        request
            .observation
            .to_visibility(request.output, &request.telescope.name)
            .map_err(|e| CollaboratorError::failed(self.name(), e.to_string()))
    }
}
