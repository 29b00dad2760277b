//! Metadata registration with the data-management system.

use std::path::Path;

use serde_json::{Map, Value};

use super::command::ToolCommand;
use super::errors::{CollaboratorError, CollaboratorResult, RegistrationError};
use crate::config::RegistrySettings;
use crate::logging::RunLogger;
use crate::metadata::{name_from_path, DataManagementRecord};

/// Accepts ObsCore metadata for a registered data identifier.
pub trait MetadataRegistry: Send + Sync {
    fn name(&self) -> &str;

    /// Attach `meta` to `namespace:name`. `Ok(false)` means the registry
    /// answered but did not accept it.
    fn set_metadata_bulk(
        &self,
        namespace: &str,
        name: &str,
        meta: &Map<String, Value>,
        log: &RunLogger,
    ) -> CollaboratorResult<bool>;
}

/// Runs an external registration program.
///
/// Invoked as `<program> [extra args] --namespace <ns> --name <name>` with
/// the metadata JSON on stdin; exit status 0 means accepted.
pub struct CommandRegistry {
    program: String,
    extra_args: Vec<String>,
}

impl CommandRegistry {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            extra_args: Vec::new(),
        }
    }

    pub fn from_settings(settings: &RegistrySettings) -> Self {
        Self {
            program: settings.program.clone(),
            extra_args: settings.extra_args.clone(),
        }
    }

    pub fn command(
        &self,
        namespace: &str,
        name: &str,
        meta: &Map<String, Value>,
    ) -> CollaboratorResult<ToolCommand> {
        let payload = serde_json::to_vec(meta)
            .map_err(|e| CollaboratorError::failed(self.name(), e.to_string()))?;
        Ok(ToolCommand::new(self.name(), &self.program)
            .args(self.extra_args.iter().cloned())
            .args(["--namespace", namespace, "--name", name])
            .stdin(payload))
    }
}

impl MetadataRegistry for CommandRegistry {
    fn name(&self) -> &str {
        "registry"
    }

    fn set_metadata_bulk(
        &self,
        namespace: &str,
        name: &str,
        meta: &Map<String, Value>,
        log: &RunLogger,
    ) -> CollaboratorResult<bool> {
        let output = self.command(namespace, name, meta)?.run_unchecked(log)?;
        if !output.status.success() {
            log.show_tail(self.name());
        }
        Ok(output.status.success())
    }
}

/// Register the `<artifact>.meta` sidecar under `namespace`.
///
/// The data identifier name is the artifact's file name.
pub fn register_artifact(
    registry: &dyn MetadataRegistry,
    namespace: &str,
    artifact: &Path,
    log: &RunLogger,
) -> Result<(), RegistrationError> {
    let sidecar_error = |source| RegistrationError::Sidecar {
        artifact: artifact.to_path_buf(),
        source,
    };

    let name = name_from_path(artifact).map_err(sidecar_error)?;
    let record = DataManagementRecord::from_file(DataManagementRecord::get_meta_fname(artifact))
        .map_err(sidecar_error)?;
    let meta = record.meta().to_dict().map_err(sidecar_error)?;

    log.command(&format!(
        "{} set_metadata_bulk {}:{}",
        registry.name(),
        namespace,
        name
    ));
    if registry.set_metadata_bulk(namespace, &name, &meta, log)? {
        log.success(&format!("Metadata set for {}:{}", namespace, name));
        Ok(())
    } else {
        Err(RegistrationError::Rejected {
            registry: registry.name().to_string(),
            namespace: namespace.to_string(),
            name,
        })
    }
}
