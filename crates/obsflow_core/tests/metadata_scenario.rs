//! ObsCore derivation and sidecar packaging without the pipeline.

use std::path::PathBuf;

use serde_json::Value;
use tempfile::tempdir;

use obsflow_core::metadata::{DataManagementRecord, ObsCorePolicy, ObsCoreRecord, ObsId};
use obsflow_core::models::VisibilityArtifact;

fn mwa_visibility(path: PathBuf) -> VisibilityArtifact {
    VisibilityArtifact {
        path,
        instrument: "MWA".to_string(),
        phase_centre_ra_deg: 0.0,
        phase_centre_dec_deg: -27.0,
        t_min_mjd: 59000.0,
        t_max_mjd: 59000.0 + 112.0 / 86_400.0,
        freq_min_hz: 150e6,
        freq_max_hz: 170e6,
        n_channels: 16,
        channel_width_hz: 1.28e6,
        n_time_steps: 14,
        integration_time_s: 8.0,
        pol_states: vec!["XX".to_string(), "YY".to_string()],
    }
}

#[test]
fn collection_is_required_before_the_sidecar_is_written() {
    let dir = tempdir().unwrap();
    let artifact = dir.path().join("run1.MS");
    let vis = mwa_visibility(artifact.clone());

    let mut record = ObsCoreRecord::from_visibility(&vis, false);
    ObsCorePolicy::new()
        .apply_observation_id(&mut record, "testing", "run1.MS")
        .unwrap();

    match record.obs_id {
        Some(ObsId::Number(obs_id)) => assert_eq!(obs_id % 8, 0),
        ref other => panic!("unexpected obs_id: {:?}", other),
    }
    assert!(record.obs_collection.is_none());

    let sidecar = DataManagementRecord::get_meta_fname(&artifact);
    let dm = DataManagementRecord::for_artifact("testing", &artifact, 86_400, None, record.clone())
        .unwrap();
    let err = dm.write(&sidecar).unwrap_err();
    assert_eq!(err.missing_fields(), &["obs_collection"]);
    assert!(!sidecar.exists());

    ObsCorePolicy::new()
        .with_collection("MRO/MWA")
        .apply_collection(&mut record)
        .unwrap();
    let dm = DataManagementRecord::for_artifact("testing", &artifact, 86_400, None, record).unwrap();
    dm.write(&sidecar).unwrap();

    let written: Value =
        serde_json::from_str(&std::fs::read_to_string(&sidecar).unwrap()).unwrap();
    let keys: Vec<&str> = written
        .as_object()
        .unwrap()
        .keys()
        .map(String::as_str)
        .collect();
    assert_eq!(keys.len(), 5);
    for key in ["namespace", "name", "lifetime", "dataset_name", "meta"] {
        assert!(keys.contains(&key), "missing {}", key);
    }
    assert_eq!(written["meta"]["obs_collection"], "MRO/MWA");
    assert_eq!(written["dataset_name"], Value::Null);
}

#[test]
fn meta_fname_is_pure() {
    let a = DataManagementRecord::get_meta_fname("/data/run1.MS");
    let b = DataManagementRecord::get_meta_fname("/data/run1.MS");
    assert_eq!(a, b);
    assert_eq!(a, PathBuf::from("/data/run1.MS.meta"));
    assert!(!a.exists());
}
