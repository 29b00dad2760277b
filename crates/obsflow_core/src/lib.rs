//! obsflow core - ObsCore metadata and pipeline sequencing for simulated
//! radio-interferometric observations.
//!
//! This crate contains the metadata model, the run orchestrator and the
//! collaborator adapters. The `obsflow` binary is a thin layer on top.

pub mod collaborators;
pub mod config;
pub mod ids;
pub mod logging;
pub mod metadata;
pub mod models;
pub mod orchestrator;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
