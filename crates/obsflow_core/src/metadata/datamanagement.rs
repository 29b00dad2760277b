//! Data-management (Rucio) wrapper around an ObsCore record.
//!
//! The serialized shape is what bulk metadata registration expects:
//!
//! ```text
//! {
//!   "namespace": "testing",
//!   "name": "run1.MS",
//!   "lifetime": 86400,
//!   "dataset_name": null,
//!   "meta": { "obs_collection": "MRO/MWA", ... }
//! }
//! ```
//!
//! The record is written next to its artifact as `<artifact>.meta`.

use std::ffi::OsString;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::errors::{MetaError, MetaResult};
use super::obscore::ObsCoreRecord;

/// Suffix appended to an artifact path to locate its sidecar.
pub const META_SUFFIX: &str = ".meta";

/// Default lifetime of a registered data product (one day).
pub const DEFAULT_LIFETIME_S: u64 = 86_400;

/// Default IVOA authority for data-management identifiers.
pub const DEFAULT_AUTHORITY: &str = "test.skao";

/// Default IVOA path for data-management identifiers.
pub const DEFAULT_IVOID_PATH: &str = "/~";

/// Optional parts of a data-management identifier.
///
/// Unset parts fall back to [`DEFAULT_AUTHORITY`], [`DEFAULT_IVOID_PATH`]
/// and a `<namespace>:<name>` query.
#[derive(Debug, Clone, Copy, Default)]
pub struct IvoidOptions<'a> {
    pub authority: Option<&'a str>,
    pub path: Option<&'a str>,
    pub query: Option<&'a str>,
    pub fragment: Option<&'a str>,
}

/// ObsCore record plus the fields a data-management service needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataManagementRecord {
    namespace: String,
    name: String,
    lifetime: u64,
    dataset_name: Option<String>,
    meta: ObsCoreRecord,
}

impl DataManagementRecord {
    /// Create a record, validating its fields.
    ///
    /// `name` must not contain path separators and `lifetime` must be
    /// positive.
    pub fn new(
        namespace: impl Into<String>,
        name: impl Into<String>,
        lifetime: i64,
        dataset_name: Option<String>,
        meta: ObsCoreRecord,
    ) -> MetaResult<Self> {
        let namespace = namespace.into();
        let name = name.into();

        if namespace.trim().is_empty() {
            return Err(MetaError::configuration("namespace", "namespace is empty"));
        }
        if name.trim().is_empty() {
            return Err(MetaError::configuration("name", "name is empty"));
        }
        if name.contains('/') || name.contains('\\') {
            return Err(MetaError::configuration(
                "name",
                format!("{:?} contains a path separator", name),
            ));
        }
        if lifetime <= 0 {
            return Err(MetaError::configuration(
                "lifetime",
                format!("{} is not a positive number of seconds", lifetime),
            ));
        }
        if dataset_name.as_deref().is_some_and(|d| d.trim().is_empty()) {
            return Err(MetaError::configuration("dataset name", "dataset name is empty"));
        }

        Ok(Self {
            namespace,
            name,
            lifetime: lifetime as u64,
            dataset_name,
            meta,
        })
    }

    /// Create a record named after an artifact (directories stripped).
    pub fn for_artifact(
        namespace: impl Into<String>,
        artifact_path: impl AsRef<Path>,
        lifetime: i64,
        dataset_name: Option<String>,
        meta: ObsCoreRecord,
    ) -> MetaResult<Self> {
        let name = name_from_path(artifact_path.as_ref())?;
        Self::new(namespace, name, lifetime, dataset_name, meta)
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn lifetime(&self) -> u64 {
        self.lifetime
    }

    pub fn dataset_name(&self) -> Option<&str> {
        self.dataset_name.as_deref()
    }

    pub fn meta(&self) -> &ObsCoreRecord {
        &self.meta
    }

    /// Serialize to the nested registration mapping.
    ///
    /// Fails with a validation error if the ObsCore record is incomplete.
    pub fn to_dict(&self) -> MetaResult<Map<String, Value>> {
        let meta = self.meta.to_dict()?;

        let mut map = Map::new();
        map.insert("namespace".to_string(), Value::String(self.namespace.clone()));
        map.insert("name".to_string(), Value::String(self.name.clone()));
        map.insert("lifetime".to_string(), Value::from(self.lifetime));
        map.insert(
            "dataset_name".to_string(),
            self.dataset_name.clone().map_or(Value::Null, Value::String),
        );
        map.insert("meta".to_string(), Value::Object(meta));
        Ok(map)
    }

    /// Serialize and write the mapping to `fpath` atomically.
    ///
    /// Nothing is written if validation fails. Returns the mapping.
    pub fn write(&self, fpath: impl AsRef<Path>) -> MetaResult<Map<String, Value>> {
        let dict = self.to_dict()?;
        let json = serde_json::to_string_pretty(&dict)?;
        atomic_write(fpath.as_ref(), json.as_bytes())?;
        Ok(dict)
    }

    /// Rebuild a record from its serialized mapping.
    pub fn from_dict(value: Value) -> MetaResult<Self> {
        let raw: DataManagementRecord = serde_json::from_value(value)?;
        Self::new(
            raw.namespace,
            raw.name,
            i64::try_from(raw.lifetime).unwrap_or(i64::MAX),
            raw.dataset_name,
            raw.meta,
        )
    }

    /// Read a record from a sidecar file.
    pub fn from_file(fpath: impl AsRef<Path>) -> MetaResult<Self> {
        let fpath = fpath.as_ref();
        let content = fs::read_to_string(fpath)
            .map_err(|e| MetaError::io("reading sidecar", fpath, e))?;
        let value: Value = serde_json::from_str(&content)?;
        Self::from_dict(value)
    }

    /// Sidecar path for an artifact path. Pure; the filesystem is not
    /// consulted.
    pub fn get_meta_fname(fname: impl AsRef<Path>) -> PathBuf {
        let mut os: OsString = fname.as_ref().as_os_str().to_owned();
        os.push(META_SUFFIX);
        PathBuf::from(os)
    }

    /// Identifier of a data product using the default authority and path.
    pub fn get_ivoid(namespace: &str, name: &str) -> MetaResult<String> {
        Self::get_ivoid_with(namespace, name, &IvoidOptions::default())
    }

    /// Identifier of a data product with explicit parts.
    pub fn get_ivoid_with(
        namespace: &str,
        name: &str,
        options: &IvoidOptions<'_>,
    ) -> MetaResult<String> {
        let default_query = format!("{}:{}", namespace, name);
        ObsCoreRecord::get_ivoid(
            options.authority.unwrap_or(DEFAULT_AUTHORITY),
            Some(options.path.unwrap_or(DEFAULT_IVOID_PATH)),
            Some(options.query.unwrap_or(&default_query)),
            options.fragment,
        )
    }
}

/// File name of an artifact path, rejecting paths without one.
pub fn name_from_path(path: &Path) -> MetaResult<String> {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .ok_or_else(|| {
            MetaError::configuration(
                "artifact path",
                format!("{} has no file name", path.display()),
            )
        })
}

/// Write `content` to `path` via a temp file and rename.
///
/// The temp file is removed if any step fails.
pub(crate) fn atomic_write(path: &Path, content: &[u8]) -> MetaResult<()> {
    let mut temp_os: OsString = path.as_os_str().to_owned();
    temp_os.push(".tmp");
    let temp_path = PathBuf::from(temp_os);

    let result = (|| {
        let mut file = fs::File::create(&temp_path)?;
        file.write_all(content)?;
        file.sync_all()?;
        fs::rename(&temp_path, path)
    })();

    result.map_err(|e| {
        let _ = fs::remove_file(&temp_path);
        MetaError::io("writing sidecar", path, e)
    })
}
