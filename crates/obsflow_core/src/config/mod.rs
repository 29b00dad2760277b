//! Pipeline configuration.
//!
//! This module provides:
//! - TOML-based configuration with logical sections
//! - Atomic file writes (write to temp, then rename)
//! - Section-level updates (only changed section is modified)
//! - Validation with automatic defaults
//!
//! # Example
//!
//! ```no_run
//! use obsflow_core::config::{ConfigManager, ConfigSection};
//!
//! let mut config = ConfigManager::new("obsflow.toml");
//! config.load_or_create().unwrap();
//!
//! println!("Output root: {}", config.settings().paths.output_root);
//!
//! config.settings_mut().metadata.namespace = "sdc3".to_string();
//! config.update_section(ConfigSection::Metadata).unwrap();
//! ```

mod manager;
mod settings;

pub use manager::{ConfigError, ConfigManager, ConfigResult};
pub use settings::{
    ConfigSection, ImagingSettings, LoggingSettings, MetadataSettings, ObservationConfig,
    PathSettings, RegistrySettings, Settings, SimulationSettings, SkyModelConfig,
    TelescopeConfig,
};
