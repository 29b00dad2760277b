//! Metadata derivation and packaging.
//!
//! ```text
//! VisibilityArtifact / ImageArtifact
//!     └── ObsCoreRecord::from_visibility / from_image   (pure derivation)
//!           └── ObsCorePolicy                            (instrument rules)
//!                 └── DataManagementRecord               (namespace, name, lifetime)
//!                       └── <artifact>.meta              (sidecar, atomic write)
//! ```
//!
//! # Example
//!
//! ```no_run
//! use obsflow_core::metadata::{DataManagementRecord, ObsCorePolicy, ObsCoreRecord};
//! # fn vis() -> obsflow_core::models::VisibilityArtifact { unimplemented!() }
//!
//! let vis = vis();
//! let mut record = ObsCoreRecord::from_visibility(&vis, false);
//! let policy = ObsCorePolicy::new().with_collection("MRO/MWA");
//! policy.apply_to_visibility(&mut record, "testing", "run1.MS").unwrap();
//!
//! let dm = DataManagementRecord::for_artifact("testing", &vis.path, 86_400, None, record).unwrap();
//! dm.write(DataManagementRecord::get_meta_fname(&vis.path)).unwrap();
//! ```

mod datamanagement;
mod errors;
mod instrument;
mod obscore;
mod policy;

pub use datamanagement::{
    name_from_path, DataManagementRecord, IvoidOptions, DEFAULT_AUTHORITY, DEFAULT_IVOID_PATH,
    DEFAULT_LIFETIME_S, META_SUFFIX,
};
pub(crate) use datamanagement::atomic_write;
pub use errors::{MetaError, MetaResult};
pub use instrument::{Instrument, ObsIdScheme};
pub use obscore::{ObsCoreRecord, ObsId, MANDATORY_FIELDS};
pub use policy::{
    generated_obs_id, gps_cadence_obs_id, mjd_to_gps_seconds, ObsCorePolicy,
    DEFAULT_OBS_ID_PREFIX,
};
