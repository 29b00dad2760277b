//! Error types for metadata derivation and persistence.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while building, validating or persisting metadata.
#[derive(Error, Debug)]
pub enum MetaError {
    /// The record is missing ObsCore-mandatory fields.
    #[error("ObsCore record is missing mandatory fields: {}", .missing.join(", "))]
    Validation { missing: Vec<&'static str> },

    /// A value was rejected at construction time, before any I/O.
    #[error("Invalid {what}: {message}")]
    Configuration { what: String, message: String },

    /// Reading or writing a sidecar file failed.
    #[error("I/O error in {operation} ({}): {source}", .path.display())]
    Io {
        operation: String,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The record could not be converted to or from JSON.
    #[error("Failed to convert metadata: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl MetaError {
    /// Create a validation error for the given missing fields.
    pub fn missing(fields: Vec<&'static str>) -> Self {
        Self::Validation { missing: fields }
    }

    /// Create a configuration error.
    pub fn configuration(what: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Configuration {
            what: what.into(),
            message: message.into(),
        }
    }

    /// Create an I/O error with context.
    pub fn io(operation: impl Into<String>, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            operation: operation.into(),
            path: path.into(),
            source,
        }
    }

    /// Names of the missing fields, if this is a validation error.
    pub fn missing_fields(&self) -> &[&'static str] {
        match self {
            Self::Validation { missing } => missing,
            _ => &[],
        }
    }
}

/// Result type for metadata operations.
pub type MetaResult<T> = Result<T, MetaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_names_fields() {
        let err = MetaError::missing(vec!["obs_collection", "obs_id"]);
        let msg = err.to_string();
        assert!(msg.contains("obs_collection"));
        assert!(msg.contains("obs_id"));
        assert_eq!(err.missing_fields(), &["obs_collection", "obs_id"]);
    }

    #[test]
    fn io_error_names_path() {
        let err = MetaError::io(
            "writing sidecar",
            "/data/run1.MS.meta",
            io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(err.to_string().contains("/data/run1.MS.meta"));
    }
}
