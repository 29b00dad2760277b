//! Settings struct with TOML-based sections.
//!
//! Settings are organized into logical sections that map to TOML tables.
//! Each section can be updated independently for atomic section-level updates.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use hifitime::Epoch;
use serde::{Deserialize, Serialize};

use crate::logging::LogLevel;
use crate::metadata::{Instrument, DEFAULT_LIFETIME_S, DEFAULT_OBS_ID_PREFIX};
use crate::models::VisibilityArtifact;

use super::manager::{ConfigError, ConfigResult};

/// Root settings structure containing all configuration sections.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// Output locations.
    #[serde(default)]
    pub paths: PathSettings,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingSettings,

    /// Metadata and data-management settings.
    #[serde(default)]
    pub metadata: MetadataSettings,

    /// Simulator invocation.
    #[serde(default)]
    pub simulation: SimulationSettings,

    /// Imager invocation.
    #[serde(default)]
    pub imaging: ImagingSettings,

    /// Metadata registration.
    #[serde(default)]
    pub registry: RegistrySettings,
}

impl Settings {
    /// Check values that cannot be caught by deserialization.
    ///
    /// Runs before any directory is created or collaborator invoked.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.paths.output_root.trim().is_empty() {
            return Err(ConfigError::invalid("paths.output_root", "must not be empty"));
        }
        if self.paths.name_prefix.contains(['/', '\\']) {
            return Err(ConfigError::invalid(
                "paths.name_prefix",
                "must not contain path separators",
            ));
        }
        if self.metadata.namespace.trim().is_empty() {
            return Err(ConfigError::invalid("metadata.namespace", "must not be empty"));
        }
        if self.metadata.lifetime <= 0 {
            return Err(ConfigError::invalid(
                "metadata.lifetime",
                format!("{} is not a positive number of seconds", self.metadata.lifetime),
            ));
        }
        Instrument::parse(&self.simulation.telescope.name)
            .map_err(|e| ConfigError::invalid("simulation.telescope.name", e.to_string()))?;

        let obs = &self.simulation.observation;
        obs.start_datetime()?;
        if obs.number_of_time_steps == 0 {
            return Err(ConfigError::invalid(
                "simulation.observation.number_of_time_steps",
                "must be at least 1",
            ));
        }
        if obs.number_of_channels == 0 {
            return Err(ConfigError::invalid(
                "simulation.observation.number_of_channels",
                "must be at least 1",
            ));
        }
        if obs.length_s <= 0.0 {
            return Err(ConfigError::invalid(
                "simulation.observation.length_s",
                "must be positive",
            ));
        }
        if self.imaging.npixel == 0 {
            return Err(ConfigError::invalid("imaging.npixel", "must be at least 1"));
        }
        if self.imaging.cellsize_rad <= 0.0 {
            return Err(ConfigError::invalid("imaging.cellsize_rad", "must be positive"));
        }
        Ok(())
    }
}

/// Output locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathSettings {
    /// Root directory all artifacts and sidecars are written to.
    #[serde(default = "default_output_root")]
    pub output_root: String,

    /// Folder for run log files.
    #[serde(default = "default_logs_folder")]
    pub logs_folder: String,

    /// Prefix of every artifact file name.
    #[serde(default = "default_name_prefix")]
    pub name_prefix: String,
}

fn default_output_root() -> String {
    "obsflow_output".to_string()
}

fn default_logs_folder() -> String {
    ".logs".to_string()
}

fn default_name_prefix() -> String {
    "obsflow_".to_string()
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            output_root: default_output_root(),
            logs_folder: default_logs_folder(),
            name_prefix: default_name_prefix(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Minimum level written to the run log.
    #[serde(default)]
    pub level: LogLevel,

    /// Use compact log format (collaborator output only kept for the tail).
    #[serde(default = "default_true")]
    pub compact: bool,

    /// Number of collaborator output lines to show on failure.
    #[serde(default = "default_error_tail")]
    pub error_tail: u32,

    /// Progress update step percentage.
    #[serde(default = "default_progress_step")]
    pub progress_step: u32,

    /// Prefix run log lines with a timestamp.
    #[serde(default = "default_true")]
    pub show_timestamps: bool,
}

fn default_true() -> bool {
    true
}

fn default_error_tail() -> u32 {
    20
}

fn default_progress_step() -> u32 {
    20
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: LogLevel::default(),
            compact: true,
            error_tail: default_error_tail(),
            progress_step: default_progress_step(),
            show_timestamps: true,
        }
    }
}

/// Metadata and data-management settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataSettings {
    /// Data-management namespace (Rucio scope).
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Lifetime of registered products in seconds.
    #[serde(default = "default_lifetime")]
    pub lifetime: i64,

    /// ObsCore collection override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection: Option<String>,

    /// Dataset grouping the products of one run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dataset_name: Option<String>,

    /// Prefix of generated observation IDs.
    #[serde(default = "default_obs_id_prefix")]
    pub obs_id_prefix: String,

    /// Authority of data-management identifiers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ivoid_authority: Option<String>,

    /// Whether simulated visibilities count as calibrated.
    #[serde(default)]
    pub calibrated: bool,

    /// Fixed run index. When unset, a persisted per-user counter is used.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_index: Option<u64>,
}

fn default_namespace() -> String {
    "testing".to_string()
}

fn default_lifetime() -> i64 {
    DEFAULT_LIFETIME_S as i64
}

fn default_obs_id_prefix() -> String {
    DEFAULT_OBS_ID_PREFIX.to_string()
}

impl Default for MetadataSettings {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            lifetime: default_lifetime(),
            collection: None,
            dataset_name: None,
            obs_id_prefix: default_obs_id_prefix(),
            ivoid_authority: None,
            calibrated: false,
            run_index: None,
        }
    }
}

/// Simulator invocation and inputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationSettings {
    /// Simulator executable.
    #[serde(default = "default_simulator_program")]
    pub program: String,

    /// Extra arguments passed before the generated ones.
    #[serde(default)]
    pub extra_args: Vec<String>,

    #[serde(default)]
    pub telescope: TelescopeConfig,

    #[serde(default)]
    pub sky_model: SkyModelConfig,

    #[serde(default)]
    pub observation: ObservationConfig,
}

fn default_simulator_program() -> String {
    "obsflow-simulate".to_string()
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            program: default_simulator_program(),
            extra_args: Vec::new(),
            telescope: TelescopeConfig::default(),
            sky_model: SkyModelConfig::default(),
            observation: ObservationConfig::default(),
        }
    }
}

/// Telescope to simulate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelescopeConfig {
    /// Array name, also recorded as the ObsCore instrument.
    #[serde(default = "default_telescope")]
    pub name: String,

    /// Array configuration version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

fn default_telescope() -> String {
    "SKA-LOW-AAstar".to_string()
}

impl Default for TelescopeConfig {
    fn default() -> Self {
        Self {
            name: default_telescope(),
            version: None,
        }
    }
}

/// Sky model fed to the simulator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkyModelConfig {
    /// Named catalog (e.g. "GLEAM").
    #[serde(default = "default_sky_model")]
    pub name: String,

    /// Catalog file, when not using a named one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

fn default_sky_model() -> String {
    "GLEAM".to_string()
}

impl Default for SkyModelConfig {
    fn default() -> Self {
        Self {
            name: default_sky_model(),
            path: None,
        }
    }
}

/// Observation timing and spectral setup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservationConfig {
    #[serde(default)]
    pub phase_centre_ra_deg: f64,

    #[serde(default = "default_dec")]
    pub phase_centre_dec_deg: f64,

    /// Start of the observation, RFC 3339 (UTC).
    #[serde(default = "default_start_time")]
    pub start_time: String,

    /// Total length in seconds.
    #[serde(default = "default_length_s")]
    pub length_s: f64,

    #[serde(default = "default_one")]
    pub number_of_time_steps: u32,

    #[serde(default = "default_channels")]
    pub number_of_channels: u32,

    #[serde(default = "default_start_freq")]
    pub start_frequency_hz: f64,

    #[serde(default = "default_freq_inc")]
    pub frequency_increment_hz: f64,

    /// Polarisation products written by the simulator.
    #[serde(default = "default_pol_states")]
    pub pol_states: Vec<String>,
}

fn default_dec() -> f64 {
    -27.0
}

fn default_start_time() -> String {
    "2021-09-21T14:12:35Z".to_string()
}

fn default_length_s() -> f64 {
    7.997
}

fn default_one() -> u32 {
    1
}

fn default_channels() -> u32 {
    375
}

fn default_start_freq() -> f64 {
    170e6
}

fn default_freq_inc() -> f64 {
    80e3
}

fn default_pol_states() -> Vec<String> {
    ["XX", "XY", "YX", "YY"].iter().map(|s| s.to_string()).collect()
}

impl Default for ObservationConfig {
    fn default() -> Self {
        Self {
            phase_centre_ra_deg: 0.0,
            phase_centre_dec_deg: default_dec(),
            start_time: default_start_time(),
            length_s: default_length_s(),
            number_of_time_steps: default_one(),
            number_of_channels: default_channels(),
            start_frequency_hz: default_start_freq(),
            frequency_increment_hz: default_freq_inc(),
            pol_states: default_pol_states(),
        }
    }
}

impl ObservationConfig {
    /// Parsed start time.
    pub fn start_datetime(&self) -> ConfigResult<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.start_time)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| {
                ConfigError::invalid(
                    "simulation.observation.start_time",
                    format!("{:?} is not RFC 3339: {}", self.start_time, e),
                )
            })
    }

    /// Start time as MJD (UTC).
    pub fn t_min_mjd(&self) -> ConfigResult<f64> {
        let start = self.start_datetime()?;
        let unix_s = start.timestamp() as f64 + f64::from(start.timestamp_subsec_nanos()) * 1e-9;
        Ok(Epoch::from_unix_seconds(unix_s).to_mjd_utc_days())
    }

    /// Centre frequency of the last channel.
    pub fn end_frequency_hz(&self) -> f64 {
        let extra = self.number_of_channels.saturating_sub(1);
        self.start_frequency_hz + f64::from(extra) * self.frequency_increment_hz
    }

    /// Describe the visibilities a simulator writes for this observation.
    pub fn to_visibility(
        &self,
        path: impl Into<PathBuf>,
        instrument: &str,
    ) -> ConfigResult<VisibilityArtifact> {
        let t_min = self.t_min_mjd()?;
        let steps = self.number_of_time_steps.max(1);
        Ok(VisibilityArtifact {
            path: path.into(),
            instrument: instrument.to_string(),
            phase_centre_ra_deg: self.phase_centre_ra_deg,
            phase_centre_dec_deg: self.phase_centre_dec_deg,
            t_min_mjd: t_min,
            t_max_mjd: t_min + self.length_s / 86_400.0,
            freq_min_hz: self.start_frequency_hz,
            freq_max_hz: self.end_frequency_hz(),
            n_channels: self.number_of_channels,
            channel_width_hz: self.frequency_increment_hz,
            n_time_steps: steps,
            integration_time_s: self.length_s / f64::from(steps),
            pol_states: self.pol_states.clone(),
        })
    }
}

/// Imager invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImagingSettings {
    /// Imager executable (WSClean).
    #[serde(default = "default_imager_program")]
    pub program: String,

    /// Pixels per image side.
    #[serde(default = "default_npixel")]
    pub npixel: u32,

    /// Pixel size in radians.
    #[serde(default = "default_cellsize")]
    pub cellsize_rad: f64,

    /// Deconvolution iterations for the cleaned image.
    #[serde(default = "default_niter")]
    pub niter: u32,

    /// Major-cycle gain.
    #[serde(default = "default_mgain")]
    pub mgain: f64,

    /// Stop cleaning at this many sigma.
    #[serde(default = "default_auto_threshold")]
    pub auto_threshold: f64,

    /// Extra arguments appended to every imager call.
    #[serde(default)]
    pub extra_args: Vec<String>,
}

fn default_imager_program() -> String {
    "wsclean".to_string()
}

fn default_npixel() -> u32 {
    20000
}

fn default_cellsize() -> f64 {
    9.3e-7
}

fn default_niter() -> u32 {
    50000
}

fn default_mgain() -> f64 {
    0.8
}

fn default_auto_threshold() -> f64 {
    3.0
}

impl Default for ImagingSettings {
    fn default() -> Self {
        Self {
            program: default_imager_program(),
            npixel: default_npixel(),
            cellsize_rad: default_cellsize(),
            niter: default_niter(),
            mgain: default_mgain(),
            auto_threshold: default_auto_threshold(),
            extra_args: Vec::new(),
        }
    }
}

/// Metadata registration tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrySettings {
    /// Executable receiving `--namespace`, `--name` and the meta JSON on stdin.
    #[serde(default = "default_registry_program")]
    pub program: String,

    /// Extra arguments passed before the generated ones.
    #[serde(default)]
    pub extra_args: Vec<String>,
}

fn default_registry_program() -> String {
    "obsflow-set-metadata".to_string()
}

impl Default for RegistrySettings {
    fn default() -> Self {
        Self {
            program: default_registry_program(),
            extra_args: Vec::new(),
        }
    }
}

/// Names of config sections for targeted updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigSection {
    Paths,
    Logging,
    Metadata,
    Simulation,
    Imaging,
    Registry,
}

impl ConfigSection {
    /// Get the TOML table name for this section.
    pub fn table_name(&self) -> &'static str {
        match self {
            ConfigSection::Paths => "paths",
            ConfigSection::Logging => "logging",
            ConfigSection::Metadata => "metadata",
            ConfigSection::Simulation => "simulation",
            ConfigSection::Imaging => "imaging",
            ConfigSection::Registry => "registry",
        }
    }

    /// Comment written above the section in a generated file.
    pub fn comment(&self) -> &'static str {
        match self {
            ConfigSection::Paths => "Output locations",
            ConfigSection::Logging => "Logging configuration",
            ConfigSection::Metadata => "ObsCore and data-management metadata",
            ConfigSection::Simulation => "Visibility simulator",
            ConfigSection::Imaging => "Imager (WSClean)",
            ConfigSection::Registry => "Metadata registration tool",
        }
    }

    /// All sections, in file order.
    pub fn all() -> &'static [ConfigSection] {
        &[
            ConfigSection::Paths,
            ConfigSection::Logging,
            ConfigSection::Metadata,
            ConfigSection::Simulation,
            ConfigSection::Imaging,
            ConfigSection::Registry,
        ]
    }
}
