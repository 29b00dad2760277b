//! ObsCore discovery record.
//!
//! Field names follow the IVOA ObsCore data model so the serialized record
//! can be handed to a catalog without renaming. Every field is optional in
//! memory; [`ObsCoreRecord::validate`] enforces the mandatory subset before
//! the record is persisted.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::errors::{MetaError, MetaResult};
use crate::models::{FrequencyAggregation, ImageArtifact, VisibilityArtifact};

/// Speed of light in m/s, for frequency to wavelength conversion.
const SPEED_OF_LIGHT: f64 = 299_792_458.0;

const ARCSEC_PER_DEG: f64 = 3600.0;

/// Fields that must be non-empty before a record may be persisted.
pub const MANDATORY_FIELDS: [&str; 5] = [
    "dataproduct_type",
    "calib_level",
    "obs_collection",
    "obs_id",
    "obs_publisher_did",
];

/// Observation identifier.
///
/// Instruments with a native numbering (MWA GPS seconds) serialize as a
/// JSON number; generated identifiers serialize as a string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ObsId {
    Number(i64),
    Text(String),
}

impl ObsId {
    fn is_blank(&self) -> bool {
        match self {
            ObsId::Number(_) => false,
            ObsId::Text(text) => text.trim().is_empty(),
        }
    }
}

impl fmt::Display for ObsId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObsId::Number(n) => write!(f, "{}", n),
            ObsId::Text(text) => f.write_str(text),
        }
    }
}

impl From<i64> for ObsId {
    fn from(n: i64) -> Self {
        ObsId::Number(n)
    }
}

impl From<String> for ObsId {
    fn from(text: String) -> Self {
        ObsId::Text(text)
    }
}

impl From<&str> for ObsId {
    fn from(text: &str) -> Self {
        ObsId::Text(text.to_string())
    }
}

/// An ObsCore metadata record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObsCoreRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dataproduct_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dataproduct_subtype: Option<String>,
    /// 0 raw instrumental, 1 instrumental in standard format, 2 calibrated,
    /// 3 processed product.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub calib_level: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub obs_collection: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub obs_id: Option<ObsId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub obs_publisher_did: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_name: Option<String>,

    // Spatial coverage (degrees unless noted).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub s_ra: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub s_dec: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub s_fov: Option<f64>,
    /// Arcseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub s_resolution: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub s_xel1: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub s_xel2: Option<u32>,
    /// Arcseconds per pixel.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub s_pixel_scale: Option<f64>,

    // Temporal coverage (MJD, UTC; durations in seconds).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub t_min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub t_max: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub t_exptime: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub t_resolution: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub t_xel: Option<u32>,

    // Spectral coverage (wavelength in metres).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub em_min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub em_max: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub em_xel: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub em_ucd: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub em_unit: Option<String>,

    // Polarisation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pol_states: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pol_xel: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub facility_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instrument_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_format: Option<String>,
    /// Estimated size in kilobytes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_estsize: Option<u64>,
}

impl ObsCoreRecord {
    /// Derive a record from a visibility dataset.
    ///
    /// Calibration level comes from `calibrated`, not from the data.
    /// Collection, observation ID and publisher DID are left unset; they
    /// depend on instrument policy applied by the caller.
    pub fn from_visibility(vis: &VisibilityArtifact, calibrated: bool) -> Self {
        let mut record = Self {
            dataproduct_type: Some("visibility".to_string()),
            calib_level: Some(if calibrated { 2 } else { 1 }),
            instrument_name: Some(vis.instrument.clone()),
            s_ra: Some(vis.phase_centre_ra_deg),
            s_dec: Some(vis.phase_centre_dec_deg),
            t_min: Some(vis.t_min_mjd),
            t_max: Some(vis.t_max_mjd),
            t_exptime: Some(vis.duration_s()),
            t_xel: Some(vis.n_time_steps),
            em_xel: Some(vis.n_channels),
            access_format: access_format_for(&vis.path.to_string_lossy()),
            ..Default::default()
        };

        if vis.integration_time_s > 0.0 {
            record.t_resolution = Some(vis.integration_time_s);
        }
        record.set_frequency_range(vis.freq_min_hz, vis.freq_max_hz);

        if !vis.pol_states.is_empty() {
            record.pol_states = Some(format!("/{}/", vis.pol_states.join("/")));
            record.pol_xel = Some(vis.pol_states.len() as u32);
        }

        record
    }

    /// Derive a record from an image.
    ///
    /// Spatial coverage is the pixel grid times the cell size. Calibration
    /// level follows from whether the image is dirty or cleaned.
    pub fn from_image(img: &ImageArtifact) -> Self {
        let cell_deg = img.cellsize_rad.to_degrees();
        let max_side = img.npixel_x.max(img.npixel_y);

        let mut record = Self {
            dataproduct_type: Some("image".to_string()),
            calib_level: Some(img.kind.calib_level()),
            s_ra: img.centre_ra_deg,
            s_dec: img.centre_dec_deg,
            s_fov: Some(f64::from(max_side) * cell_deg),
            s_xel1: Some(img.npixel_x),
            s_xel2: Some(img.npixel_y),
            s_pixel_scale: Some(cell_deg * ARCSEC_PER_DEG),
            access_format: Some("image/fits".to_string()),
            ..Default::default()
        };

        if img.aggregation == FrequencyAggregation::Mfs {
            record.em_xel = Some(1);
        }
        if let (Some(min), Some(max)) = (img.freq_min_hz, img.freq_max_hz) {
            record.set_frequency_range(min, max);
        }

        record
    }

    /// Copy observation-level fields from the record of the visibilities an
    /// image was made from. Fields already set on `self` are kept.
    pub fn inherit_observation(&mut self, observation: &ObsCoreRecord) {
        fn fill<T: Clone>(dst: &mut Option<T>, src: &Option<T>) {
            if dst.is_none() {
                dst.clone_from(src);
            }
        }

        fill(&mut self.obs_collection, &observation.obs_collection);
        fill(&mut self.obs_id, &observation.obs_id);
        fill(&mut self.target_name, &observation.target_name);
        fill(&mut self.facility_name, &observation.facility_name);
        fill(&mut self.instrument_name, &observation.instrument_name);
        fill(&mut self.s_ra, &observation.s_ra);
        fill(&mut self.s_dec, &observation.s_dec);
        fill(&mut self.t_min, &observation.t_min);
        fill(&mut self.t_max, &observation.t_max);
        fill(&mut self.t_exptime, &observation.t_exptime);
        fill(&mut self.em_min, &observation.em_min);
        fill(&mut self.em_max, &observation.em_max);
        fill(&mut self.em_ucd, &observation.em_ucd);
        fill(&mut self.em_unit, &observation.em_unit);
        fill(&mut self.pol_states, &observation.pol_states);
        fill(&mut self.pol_xel, &observation.pol_xel);
    }

    /// Names of mandatory fields that are unset or empty.
    pub fn missing_mandatory(&self) -> Vec<&'static str> {
        fn blank(value: &Option<String>) -> bool {
            value.as_deref().map_or(true, |v| v.trim().is_empty())
        }

        let present = [
            !blank(&self.dataproduct_type),
            self.calib_level.is_some(),
            !blank(&self.obs_collection),
            self.obs_id.as_ref().is_some_and(|id| !id.is_blank()),
            !blank(&self.obs_publisher_did),
        ];

        MANDATORY_FIELDS
            .iter()
            .zip(present)
            .filter(|(_, ok)| !ok)
            .map(|(name, _)| *name)
            .collect()
    }

    /// Whether every mandatory field is set.
    pub fn is_complete(&self) -> bool {
        self.missing_mandatory().is_empty()
    }

    /// Fail with the list of missing mandatory fields, if any.
    pub fn validate(&self) -> MetaResult<()> {
        let missing = self.missing_mandatory();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(MetaError::missing(missing))
        }
    }

    /// Serialize to a flat mapping of the set fields.
    ///
    /// Fails if the record is incomplete.
    pub fn to_dict(&self) -> MetaResult<Map<String, Value>> {
        self.validate()?;
        match serde_json::to_value(self)? {
            Value::Object(map) => Ok(map),
            other => Err(MetaError::configuration(
                "ObsCore record",
                format!("serialized to non-object {}", other),
            )),
        }
    }

    /// Build an IVOA identifier: `ivo://<authority><path>?<query>#<fragment>`.
    ///
    /// The authority must be at least 3 characters, start with an
    /// alphanumeric and contain only alphanumerics or `-._~`.
    pub fn get_ivoid(
        authority: &str,
        path: Option<&str>,
        query: Option<&str>,
        fragment: Option<&str>,
    ) -> MetaResult<String> {
        validate_authority(authority)?;

        let mut ivoid = format!("ivo://{}", authority);
        if let Some(path) = path.filter(|p| !p.is_empty()) {
            if path.contains(|c| c == '?' || c == '#') {
                return Err(MetaError::configuration(
                    "ivoid path",
                    format!("{:?} contains '?' or '#'", path),
                ));
            }
            if !path.starts_with('/') {
                ivoid.push('/');
            }
            ivoid.push_str(path);
        }
        if let Some(query) = query {
            ivoid.push('?');
            ivoid.push_str(query);
        }
        if let Some(fragment) = fragment {
            ivoid.push('#');
            ivoid.push_str(fragment);
        }
        Ok(ivoid)
    }

    fn set_frequency_range(&mut self, freq_min_hz: f64, freq_max_hz: f64) {
        if freq_min_hz <= 0.0 || freq_max_hz <= 0.0 {
            return;
        }
        let (lo, hi) = if freq_min_hz <= freq_max_hz {
            (freq_min_hz, freq_max_hz)
        } else {
            (freq_max_hz, freq_min_hz)
        };
        self.em_min = Some(SPEED_OF_LIGHT / hi);
        self.em_max = Some(SPEED_OF_LIGHT / lo);
        self.em_ucd = Some("em.wl".to_string());
        self.em_unit = Some("m".to_string());
    }
}

fn validate_authority(authority: &str) -> MetaResult<()> {
    let mut chars = authority.chars();
    let first_ok = chars.next().is_some_and(|c| c.is_ascii_alphanumeric());
    let rest_ok = chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_' | '~'));

    if authority.len() < 3 || !first_ok || !rest_ok {
        return Err(MetaError::configuration(
            "ivoid authority",
            format!(
                "{:?} must be at least 3 characters of [A-Za-z0-9-._~] starting with an alphanumeric",
                authority
            ),
        ));
    }
    Ok(())
}

fn access_format_for(path: &str) -> Option<String> {
    let lower = path.trim_end_matches('/').to_ascii_lowercase();
    let format = if lower.ends_with(".ms") {
        "application/x-ms"
    } else if lower.ends_with(".fits") {
        "image/fits"
    } else if lower.ends_with(".vis") {
        "application/x-oskar-vis"
    } else {
        return None;
    };
    Some(format.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ImageKind;

    fn sample_vis() -> VisibilityArtifact {
        VisibilityArtifact {
            path: "/data/run1.MS".into(),
            instrument: "SKA-LOW-AAstar".to_string(),
            phase_centre_ra_deg: 0.0,
            phase_centre_dec_deg: -27.0,
            t_min_mjd: 59478.592071,
            t_max_mjd: 59478.592163,
            freq_min_hz: 170e6,
            freq_max_hz: 200e6,
            n_channels: 375,
            channel_width_hz: 80e3,
            n_time_steps: 1,
            integration_time_s: 7.997,
            pol_states: vec!["XX".into(), "XY".into(), "YX".into(), "YY".into()],
        }
    }

    #[test]
    fn visibility_leaves_policy_fields_unset() {
        let record = ObsCoreRecord::from_visibility(&sample_vis(), false);
        assert_eq!(record.dataproduct_type.as_deref(), Some("visibility"));
        assert_eq!(record.calib_level, Some(1));
        assert_eq!(record.instrument_name.as_deref(), Some("SKA-LOW-AAstar"));
        assert!(record.obs_collection.is_none());
        assert!(record.obs_id.is_none());
        assert!(record.obs_publisher_did.is_none());
        assert_eq!(
            record.missing_mandatory(),
            vec!["obs_collection", "obs_id", "obs_publisher_did"]
        );
    }

    #[test]
    fn calibration_flag_sets_level() {
        let record = ObsCoreRecord::from_visibility(&sample_vis(), true);
        assert_eq!(record.calib_level, Some(2));
    }

    #[test]
    fn visibility_spectral_coverage_in_wavelength() {
        let record = ObsCoreRecord::from_visibility(&sample_vis(), false);
        let em_min = record.em_min.unwrap();
        let em_max = record.em_max.unwrap();
        assert!((em_min - SPEED_OF_LIGHT / 200e6).abs() < 1e-12);
        assert!((em_max - SPEED_OF_LIGHT / 170e6).abs() < 1e-12);
        assert!(em_min < em_max);
        assert_eq!(record.em_xel, Some(375));
        assert_eq!(record.pol_states.as_deref(), Some("/XX/XY/YX/YY/"));
        assert_eq!(record.pol_xel, Some(4));
        assert_eq!(record.access_format.as_deref(), Some("application/x-ms"));
    }

    #[test]
    fn image_spatial_coverage_from_grid() {
        let img = ImageArtifact::new("/out/dirty.fits", ImageKind::Dirty, 20000, 9.3e-7);
        let record = ObsCoreRecord::from_image(&img);
        assert_eq!(record.dataproduct_type.as_deref(), Some("image"));
        assert_eq!(record.calib_level, Some(2));
        assert_eq!(record.s_xel1, Some(20000));
        let expected_fov = 20000.0 * 9.3e-7_f64.to_degrees();
        assert!((record.s_fov.unwrap() - expected_fov).abs() < 1e-12);
        assert_eq!(record.em_xel, Some(1));
    }

    #[test]
    fn cleaned_image_is_level_three() {
        let img = ImageArtifact::new("/out/clean.fits", ImageKind::Cleaned, 64, 1e-5);
        assert_eq!(ObsCoreRecord::from_image(&img).calib_level, Some(3));
    }

    #[test]
    fn image_inherits_observation_fields() {
        let mut vis = ObsCoreRecord::from_visibility(&sample_vis(), false);
        vis.obs_id = Some(ObsId::from("obs-1"));
        vis.obs_collection = Some("SKAO/SKALOW".to_string());

        let img = ImageArtifact::new("/out/dirty.fits", ImageKind::Dirty, 64, 1e-5)
            .with_centre(10.0, -30.0);
        let mut record = ObsCoreRecord::from_image(&img);
        record.inherit_observation(&vis);

        assert_eq!(record.obs_id, Some(ObsId::from("obs-1")));
        assert_eq!(record.obs_collection.as_deref(), Some("SKAO/SKALOW"));
        assert_eq!(record.t_min, vis.t_min);
        // Image's own centre wins over the phase centre.
        assert_eq!(record.s_ra, Some(10.0));
    }

    #[test]
    fn to_dict_fails_when_incomplete() {
        let record = ObsCoreRecord::from_visibility(&sample_vis(), false);
        let err = record.to_dict().unwrap_err();
        assert_eq!(
            err.missing_fields(),
            &["obs_collection", "obs_id", "obs_publisher_did"]
        );
    }

    #[test]
    fn blank_strings_count_as_missing() {
        let mut record = ObsCoreRecord::from_visibility(&sample_vis(), false);
        record.obs_collection = Some("  ".to_string());
        record.obs_id = Some(ObsId::from("x"));
        record.obs_publisher_did = Some("ivo://test.skao/~?a:b".to_string());
        assert_eq!(record.missing_mandatory(), vec!["obs_collection"]);
    }

    #[test]
    fn to_dict_omits_unset_fields() {
        let mut record = ObsCoreRecord::from_visibility(&sample_vis(), false);
        record.obs_collection = Some("SKAO/SKALOW".to_string());
        record.obs_id = Some(ObsId::from("x"));
        record.obs_publisher_did = Some("ivo://test.skao/~?a:b".to_string());

        let dict = record.to_dict().unwrap();
        assert_eq!(dict["obs_collection"], "SKAO/SKALOW");
        assert!(!dict.contains_key("s_fov"));
        assert!(!dict.contains_key("access_estsize"));
    }

    fn sorted_keys(record: &ObsCoreRecord) -> Vec<String> {
        let mut keys: Vec<String> = record.to_dict().unwrap().keys().cloned().collect();
        keys.sort();
        keys
    }

    fn with_policy_fields(mut record: ObsCoreRecord) -> ObsCoreRecord {
        record.obs_collection = Some("SKAO/SKALOW".to_string());
        record.obs_id = Some(ObsId::from("obsflow-abc1234-0"));
        record.obs_publisher_did = Some("ivo://test.skao/~?testing:run1.MS".to_string());
        record
    }

    #[test]
    fn visibility_record_key_set() {
        let record = with_policy_fields(ObsCoreRecord::from_visibility(&sample_vis(), false));

        assert_eq!(
            sorted_keys(&record),
            vec![
                "access_format",
                "calib_level",
                "dataproduct_type",
                "em_max",
                "em_min",
                "em_ucd",
                "em_unit",
                "em_xel",
                "instrument_name",
                "obs_collection",
                "obs_id",
                "obs_publisher_did",
                "pol_states",
                "pol_xel",
                "s_dec",
                "s_ra",
                "t_exptime",
                "t_max",
                "t_min",
                "t_resolution",
                "t_xel",
            ]
        );
    }

    #[test]
    fn image_record_key_set() {
        let img = ImageArtifact::new("/out/dirty.fits", ImageKind::Dirty, 256, 1e-5)
            .with_centre(0.0, -27.0)
            .with_frequency_range(170e6, 200e6);
        let record = with_policy_fields(ObsCoreRecord::from_image(&img));

        assert_eq!(
            sorted_keys(&record),
            vec![
                "access_format",
                "calib_level",
                "dataproduct_type",
                "em_max",
                "em_min",
                "em_ucd",
                "em_unit",
                "em_xel",
                "obs_collection",
                "obs_id",
                "obs_publisher_did",
                "s_dec",
                "s_fov",
                "s_pixel_scale",
                "s_ra",
                "s_xel1",
                "s_xel2",
            ]
        );
    }

    #[test]
    fn numeric_obs_id_stays_a_number() {
        let mut record = with_policy_fields(ObsCoreRecord::from_visibility(&sample_vis(), false));
        record.obs_id = Some(ObsId::Number(1_274_918_416));

        let dict = record.to_dict().unwrap();
        assert_eq!(dict["obs_id"], Value::from(1_274_918_416_i64));

        let back: ObsCoreRecord = serde_json::from_value(Value::Object(dict)).unwrap();
        assert_eq!(back.obs_id, Some(ObsId::Number(1_274_918_416)));
        assert_eq!(back.obs_id.unwrap().to_string(), "1274918416");
    }

    #[test]
    fn ivoid_formats_all_parts() {
        let id = ObsCoreRecord::get_ivoid("org.mwatelescope", Some("/obs_id/1234"), None, None)
            .unwrap();
        assert_eq!(id, "ivo://org.mwatelescope/obs_id/1234");

        let id = ObsCoreRecord::get_ivoid("test.skao", Some("~"), Some("ns:name"), Some("f"))
            .unwrap();
        assert_eq!(id, "ivo://test.skao/~?ns:name#f");
    }

    #[test]
    fn ivoid_rejects_bad_authority() {
        assert!(ObsCoreRecord::get_ivoid("ab", None, None, None).is_err());
        assert!(ObsCoreRecord::get_ivoid(".abc", None, None, None).is_err());
        assert!(ObsCoreRecord::get_ivoid("a b c", None, None, None).is_err());
    }
}
