//! Error types for the orchestrator pipeline.
//!
//! Errors carry context that chains through layers:
//! Run → Step → Collaborator / Metadata → Detail

use std::io;

use thiserror::Error;

use super::stage::PipelineStage;
use crate::collaborators::CollaboratorError;
use crate::metadata::MetaError;

/// Top-level pipeline error with run context.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// A step failed; no later step ran.
    #[error("Run '{run_name}' failed at step '{step_name}' (stage {stage}, artifact {artifact}): {source}")]
    StepFailed {
        run_name: String,
        step_name: String,
        /// Stage the run had reached when the step failed.
        stage: PipelineStage,
        /// Artifact the step was working on.
        artifact: String,
        #[source]
        source: StepError,
    },

    /// Failed to set up the run (directories, run index, summary).
    #[error("Run '{run_name}' setup failed: {message}")]
    SetupFailed { run_name: String, message: String },
}

impl PipelineError {
    pub fn step_failed(
        run_name: impl Into<String>,
        step_name: impl Into<String>,
        stage: PipelineStage,
        artifact: impl Into<String>,
        source: StepError,
    ) -> Self {
        Self::StepFailed {
            run_name: run_name.into(),
            step_name: step_name.into(),
            stage,
            artifact: artifact.into(),
            source,
        }
    }

    pub fn setup_failed(run_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SetupFailed {
            run_name: run_name.into(),
            message: message.into(),
        }
    }

    /// The underlying step error, if a step failed.
    pub fn step_error(&self) -> Option<&StepError> {
        match self {
            Self::StepFailed { source, .. } => Some(source),
            Self::SetupFailed { .. } => None,
        }
    }
}

/// Error from a pipeline step.
#[derive(Error, Debug)]
pub enum StepError {
    /// The step was attempted before its predecessor completed.
    #[error("'{step}' requires stage {expected}, but the run is at {actual}")]
    OutOfOrder {
        step: String,
        expected: PipelineStage,
        actual: PipelineStage,
    },

    #[error("Input validation failed: {0}")]
    InvalidInput(String),

    #[error("Output validation failed: {0}")]
    InvalidOutput(String),

    /// Simulator, imager or registry failure, unchanged.
    #[error(transparent)]
    Collaborator(#[from] CollaboratorError),

    /// Metadata derivation or sidecar failure.
    #[error(transparent)]
    Metadata(#[from] MetaError),

    #[error("I/O error in {operation}: {source}")]
    IoError {
        operation: String,
        #[source]
        source: io::Error,
    },

    #[error("{0}")]
    Other(String),
}

impl StepError {
    pub fn out_of_order(
        step: impl Into<String>,
        expected: PipelineStage,
        actual: PipelineStage,
    ) -> Self {
        Self::OutOfOrder {
            step: step.into(),
            expected,
            actual,
        }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    pub fn invalid_output(message: impl Into<String>) -> Self {
        Self::InvalidOutput(message.into())
    }

    pub fn io_error(operation: impl Into<String>, source: io::Error) -> Self {
        Self::IoError {
            operation: operation.into(),
            source,
        }
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::Other(message.into())
    }
}

/// Result type for step operations.
pub type StepResult<T> = Result<T, StepError>;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;
