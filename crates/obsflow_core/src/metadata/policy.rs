//! Instrument-specific rules for the fields derivation leaves unset.
//!
//! Derivation from an artifact never fills `obs_collection`, `obs_id` or
//! `obs_publisher_did`. The policy here does, based on the instrument:
//!
//! - MWA: `obs_id` is the GPS start time floored to the 8 s exposure
//!   cadence, and the publisher DID lives under `org.mwatelescope`.
//! - Everything else: `obs_id` is `<prefix>-<user token>-<run index>` and
//!   the publisher DID is the data-management identifier.

use hifitime::Epoch;

use super::datamanagement::{DataManagementRecord, IvoidOptions};
use super::errors::{MetaError, MetaResult};
use super::instrument::{Instrument, ObsIdScheme};
use super::obscore::{ObsCoreRecord, ObsId};
use crate::ids::{rnd_token, USER_TOKEN_LEN};

/// Default prefix of generated observation IDs.
pub const DEFAULT_OBS_ID_PREFIX: &str = "obsflow";

/// Convert an MJD (UTC) to GPS seconds.
pub fn mjd_to_gps_seconds(mjd: f64) -> f64 {
    Epoch::from_mjd_utc(mjd).to_gpst_seconds()
}

/// Observation ID for a GPS-cadence instrument: the GPS start time floored
/// to a multiple of `cadence_s`.
pub fn gps_cadence_obs_id(t_min_mjd: f64, cadence_s: i64) -> i64 {
    let gps = mjd_to_gps_seconds(t_min_mjd);
    (gps / cadence_s as f64).floor() as i64 * cadence_s
}

/// Observation ID for instruments without a native scheme.
pub fn generated_obs_id(prefix: &str, user_seed: Option<&str>, run_index: u64) -> String {
    format!(
        "{}-{}-{}",
        prefix,
        rnd_token(user_seed, USER_TOKEN_LEN),
        run_index
    )
}

/// Caller-supplied settings for filling policy fields.
#[derive(Debug, Clone)]
pub struct ObsCorePolicy {
    /// Explicit collection; wins over the instrument default.
    pub collection: Option<String>,
    /// Seed for the user token (usually the OS user name).
    pub user_seed: Option<String>,
    /// Index distinguishing simulation runs of the same user.
    pub run_index: u64,
    /// Prefix of generated observation IDs.
    pub obs_id_prefix: String,
    /// Authority of data-management identifiers (None = default).
    pub ivoid_authority: Option<String>,
}

impl Default for ObsCorePolicy {
    fn default() -> Self {
        Self {
            collection: None,
            user_seed: None,
            run_index: 0,
            obs_id_prefix: DEFAULT_OBS_ID_PREFIX.to_string(),
            ivoid_authority: None,
        }
    }
}

impl ObsCorePolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the collection override.
    pub fn with_collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = Some(collection.into());
        self
    }

    /// Set the user seed.
    pub fn with_user_seed(mut self, seed: Option<String>) -> Self {
        self.user_seed = seed;
        self
    }

    /// Set the run index.
    pub fn with_run_index(mut self, run_index: u64) -> Self {
        self.run_index = run_index;
        self
    }

    /// Instrument named in the record.
    pub fn instrument_of(record: &ObsCoreRecord) -> MetaResult<Instrument> {
        let name = record
            .instrument_name
            .as_deref()
            .ok_or_else(|| MetaError::missing(vec!["instrument_name"]))?;
        Instrument::parse(name)
    }

    /// Fill `obs_id` and `obs_publisher_did` from the instrument's scheme.
    ///
    /// `namespace` and `name` are the data-management coordinates the
    /// record will be registered under.
    pub fn apply_observation_id(
        &self,
        record: &mut ObsCoreRecord,
        namespace: &str,
        name: &str,
    ) -> MetaResult<Instrument> {
        let instrument = Self::instrument_of(record)?;

        match instrument.obs_id_scheme() {
            ObsIdScheme::GpsCadence {
                cadence_s,
                authority,
            } => {
                let t_min = record.t_min.ok_or_else(|| MetaError::missing(vec!["t_min"]))?;
                let obs_id = gps_cadence_obs_id(t_min, cadence_s);
                record.obs_publisher_did = Some(ObsCoreRecord::get_ivoid(
                    authority,
                    Some(&format!("/obs_id/{}", obs_id)),
                    None,
                    None,
                )?);
                record.obs_id = Some(ObsId::Number(obs_id));
            }
            ObsIdScheme::Generated => {
                record.obs_id = Some(ObsId::Text(generated_obs_id(
                    &self.obs_id_prefix,
                    self.user_seed.as_deref(),
                    self.run_index,
                )));
                record.obs_publisher_did = Some(self.product_ivoid(namespace, name)?);
            }
        }

        Ok(instrument)
    }

    /// Fill `obs_collection` from the override, else the instrument default.
    ///
    /// Left unset when neither exists; persistence then fails validation.
    pub fn apply_collection(&self, record: &mut ObsCoreRecord) -> MetaResult<()> {
        if let Some(ref collection) = self.collection {
            record.obs_collection = Some(collection.clone());
            return Ok(());
        }
        let instrument = Self::instrument_of(record)?;
        if let Some(collection) = instrument.default_collection() {
            record.obs_collection = Some(collection.to_string());
        }
        Ok(())
    }

    /// Apply every policy field to a freshly derived visibility record.
    pub fn apply_to_visibility(
        &self,
        record: &mut ObsCoreRecord,
        namespace: &str,
        name: &str,
    ) -> MetaResult<()> {
        let instrument = self.apply_observation_id(record, namespace, name)?;
        self.apply_collection(record)?;
        if record.facility_name.is_none() {
            record.facility_name = instrument.facility().map(str::to_string);
        }
        Ok(())
    }

    /// Complete an image record from the record of its source visibilities.
    ///
    /// The observation ID and collection are shared with the visibilities;
    /// the publisher DID identifies the image product itself.
    pub fn apply_to_image(
        &self,
        record: &mut ObsCoreRecord,
        observation: &ObsCoreRecord,
        namespace: &str,
        name: &str,
    ) -> MetaResult<()> {
        if let Some(ref collection) = self.collection {
            record.obs_collection = Some(collection.clone());
        }
        record.inherit_observation(observation);
        record.obs_publisher_did = Some(self.product_ivoid(namespace, name)?);
        Ok(())
    }

    fn product_ivoid(&self, namespace: &str, name: &str) -> MetaResult<String> {
        let options = IvoidOptions {
            authority: self.ivoid_authority.as_deref(),
            ..Default::default()
        };
        DataManagementRecord::get_ivoid_with(namespace, name, &options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record_for(instrument: &str, t_min: f64) -> ObsCoreRecord {
        ObsCoreRecord {
            dataproduct_type: Some("visibility".to_string()),
            calib_level: Some(1),
            instrument_name: Some(instrument.to_string()),
            t_min: Some(t_min),
            t_max: Some(t_min + 0.001),
            ..Default::default()
        }
    }

    #[test]
    fn gps_conversion_includes_leap_seconds() {
        // 2020-05-31T00:00:00 UTC, 18 leap seconds after the GPS epoch.
        let gps = mjd_to_gps_seconds(59000.0);
        assert!((gps - 1_274_918_418.0).abs() < 1e-3, "gps = {}", gps);
    }

    #[test]
    fn mwa_obs_id_is_floored_to_cadence() {
        let gps = mjd_to_gps_seconds(59000.0);
        let obs_id = gps_cadence_obs_id(59000.0, 8);
        assert_eq!(obs_id % 8, 0);
        assert_eq!(obs_id, (gps / 8.0).floor() as i64 * 8);
        assert_eq!(obs_id, 1_274_918_416);
    }

    #[test]
    fn mwa_policy_sets_id_and_did() {
        let mut record = record_for("MWA", 59000.0);
        let policy = ObsCorePolicy::new();
        let instrument = policy
            .apply_observation_id(&mut record, "testing", "run1.MS")
            .unwrap();

        assert_eq!(instrument, Instrument::Mwa);
        assert_eq!(record.obs_id, Some(ObsId::Number(1_274_918_416)));
        assert_eq!(
            record.obs_publisher_did.as_deref(),
            Some("ivo://org.mwatelescope/obs_id/1274918416")
        );
        assert!(record.obs_collection.is_none());
    }

    #[test]
    fn generic_policy_uses_user_token_and_run_index() {
        let policy = ObsCorePolicy::new()
            .with_user_seed(Some("alice".to_string()))
            .with_run_index(3);

        let mut record = record_for("SKA-LOW-AAstar", 59478.5);
        policy
            .apply_observation_id(&mut record, "testing", "skalow_eor_.MS")
            .unwrap();

        let token = rnd_token(Some("alice"), USER_TOKEN_LEN);
        assert_eq!(
            record.obs_id,
            Some(ObsId::Text(format!("obsflow-{}-3", token)))
        );
        assert_eq!(
            record.obs_publisher_did.as_deref(),
            Some("ivo://test.skao/~?testing:skalow_eor_.MS")
        );
    }

    #[test]
    fn distinct_run_indices_give_distinct_ids() {
        let a = generated_obs_id("obsflow", Some("alice"), 0);
        let b = generated_obs_id("obsflow", Some("alice"), 1);
        assert_ne!(a, b);
        assert_eq!(a, generated_obs_id("obsflow", Some("alice"), 0));
    }

    #[test]
    fn collection_override_wins() {
        let mut record = record_for("MWA", 59000.0);
        ObsCorePolicy::new()
            .with_collection("custom/coll")
            .apply_collection(&mut record)
            .unwrap();
        assert_eq!(record.obs_collection.as_deref(), Some("custom/coll"));
    }

    #[test]
    fn unknown_instrument_without_override_stays_unset() {
        let mut record = record_for("MeerKAT", 59000.0);
        let policy = ObsCorePolicy::new();
        policy.apply_to_visibility(&mut record, "testing", "x.MS").unwrap();

        assert!(record.obs_collection.is_none());
        assert_eq!(record.missing_mandatory(), vec!["obs_collection"]);
    }

    #[test]
    fn known_instrument_gets_default_collection_and_facility() {
        let mut record = record_for("SKA-LOW", 59000.0);
        ObsCorePolicy::new()
            .apply_to_visibility(&mut record, "testing", "x.MS")
            .unwrap();
        assert_eq!(record.obs_collection.as_deref(), Some("SKAO/SKALOW"));
        assert_eq!(record.facility_name.as_deref(), Some("SKAO"));
        assert!(record.is_complete());
    }

    #[test]
    fn missing_instrument_is_a_validation_error() {
        let mut record = ObsCoreRecord::default();
        let err = ObsCorePolicy::new()
            .apply_observation_id(&mut record, "ns", "n")
            .unwrap_err();
        assert_eq!(err.missing_fields(), &["instrument_name"]);
    }

    #[test]
    fn image_shares_obs_id_but_has_own_did() {
        let policy = ObsCorePolicy::new();
        let mut vis = record_for("MWA", 59000.0);
        policy.apply_to_visibility(&mut vis, "testing", "run1.MS").unwrap();

        let mut img = ObsCoreRecord {
            dataproduct_type: Some("image".to_string()),
            calib_level: Some(2),
            ..Default::default()
        };
        policy
            .apply_to_image(&mut img, &vis, "testing", "run1_dirty.fits")
            .unwrap();

        assert_eq!(img.obs_id, vis.obs_id);
        assert_eq!(img.obs_collection.as_deref(), Some("MRO/MWA"));
        assert_eq!(
            img.obs_publisher_did.as_deref(),
            Some("ivo://test.skao/~?testing:run1_dirty.fits")
        );
        assert!(img.is_complete());
    }
}
