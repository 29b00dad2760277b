//! Collaborator error types.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failure reported by a simulator, imager or registry.
#[derive(Error, Debug)]
pub enum CollaboratorError {
    #[error("Failed to start {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: io::Error,
    },

    #[error("{tool} failed with exit code {exit_code}: {message}")]
    CommandFailed {
        tool: String,
        exit_code: i32,
        message: String,
    },

    #[error("{tool} finished but did not produce {path}")]
    MissingOutput { tool: String, path: PathBuf },

    #[error("{tool}: I/O error during {operation}: {source}")]
    Io {
        tool: String,
        operation: String,
        #[source]
        source: io::Error,
    },

    #[error("{tool}: {message}")]
    Failed { tool: String, message: String },
}

impl CollaboratorError {
    /// Name of the collaborator that failed.
    pub fn tool(&self) -> &str {
        match self {
            Self::Spawn { tool, .. }
            | Self::CommandFailed { tool, .. }
            | Self::MissingOutput { tool, .. }
            | Self::Io { tool, .. }
            | Self::Failed { tool, .. } => tool,
        }
    }

    pub fn command_failed(tool: impl Into<String>, exit_code: i32, message: impl Into<String>) -> Self {
        Self::CommandFailed {
            tool: tool.into(),
            exit_code,
            message: message.into(),
        }
    }

    pub fn missing_output(tool: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self::MissingOutput {
            tool: tool.into(),
            path: path.into(),
        }
    }

    pub fn io(tool: impl Into<String>, operation: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            tool: tool.into(),
            operation: operation.into(),
            source,
        }
    }

    /// Generic failure, for in-process collaborators.
    pub fn failed(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Failed {
            tool: tool.into(),
            message: message.into(),
        }
    }
}

/// Result type for collaborator calls.
pub type CollaboratorResult<T> = Result<T, CollaboratorError>;

/// Failure registering an artifact's sidecar.
#[derive(Error, Debug)]
pub enum RegistrationError {
    #[error("Sidecar for {artifact}: {source}")]
    Sidecar {
        artifact: PathBuf,
        #[source]
        source: crate::metadata::MetaError,
    },

    #[error(transparent)]
    Collaborator(#[from] CollaboratorError),

    #[error("{registry} did not accept metadata for {namespace}:{name}")]
    Rejected {
        registry: String,
        namespace: String,
        name: String,
    },
}
