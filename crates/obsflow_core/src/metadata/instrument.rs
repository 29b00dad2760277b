//! Known instruments and their metadata rules.

use super::errors::{MetaError, MetaResult};

/// Instrument an observation was made (or simulated) with.
///
/// The set of special-cased instruments is closed; anything else falls
/// back to [`Instrument::Generic`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instrument {
    /// Murchison Widefield Array.
    Mwa,
    /// SKA-Low, any array configuration (e.g. "SKA-LOW-AAstar").
    SkaLow,
    /// SKA-Mid, any array configuration.
    SkaMid,
    /// Any other array, carrying its name as given.
    Generic(String),
}

/// How the observation ID of an instrument is derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObsIdScheme {
    /// GPS start time floored to the instrument's exposure cadence.
    GpsCadence {
        cadence_s: i64,
        authority: &'static str,
    },
    /// `<prefix>-<user token>-<run index>`.
    Generated,
}

impl Instrument {
    /// Parse an instrument name.
    ///
    /// Rejects empty names and names containing control characters.
    pub fn parse(name: &str) -> MetaResult<Self> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(MetaError::configuration("instrument name", "name is empty"));
        }
        if trimmed.chars().any(char::is_control) {
            return Err(MetaError::configuration(
                "instrument name",
                format!("{:?} contains control characters", name),
            ));
        }

        let upper = trimmed.to_ascii_uppercase().replace('_', "-");
        let instrument = if upper == "MWA" {
            Instrument::Mwa
        } else if upper.starts_with("SKA-LOW") || upper.starts_with("SKALOW") {
            Instrument::SkaLow
        } else if upper.starts_with("SKA-MID") || upper.starts_with("SKAMID") {
            Instrument::SkaMid
        } else {
            Instrument::Generic(trimmed.to_string())
        };
        Ok(instrument)
    }

    /// Canonical instrument name.
    pub fn name(&self) -> &str {
        match self {
            Instrument::Mwa => "MWA",
            Instrument::SkaLow => "SKA-LOW",
            Instrument::SkaMid => "SKA-MID",
            Instrument::Generic(name) => name,
        }
    }

    /// Observatory operating the instrument, if known.
    pub fn facility(&self) -> Option<&'static str> {
        match self {
            Instrument::Mwa => Some("MRO"),
            Instrument::SkaLow | Instrument::SkaMid => Some("SKAO"),
            Instrument::Generic(_) => None,
        }
    }

    /// Collection used when the caller does not override it.
    pub fn default_collection(&self) -> Option<&'static str> {
        match self {
            Instrument::Mwa => Some("MRO/MWA"),
            Instrument::SkaLow => Some("SKAO/SKALOW"),
            Instrument::SkaMid => Some("SKAO/SKAMID"),
            Instrument::Generic(_) => None,
        }
    }

    /// Observation ID scheme for this instrument.
    pub fn obs_id_scheme(&self) -> ObsIdScheme {
        match self {
            Instrument::Mwa => ObsIdScheme::GpsCadence {
                cadence_s: 8,
                authority: "org.mwatelescope",
            },
            Instrument::SkaLow | Instrument::SkaMid | Instrument::Generic(_) => {
                ObsIdScheme::Generated
            }
        }
    }
}

impl std::fmt::Display for Instrument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}
