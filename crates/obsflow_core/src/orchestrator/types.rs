//! Core types for the orchestrator pipeline.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::errors::{StepError, StepResult};
use super::stage::PipelineStage;
use crate::collaborators::{Imager, Simulator};
use crate::config::{MetadataSettings, Settings};
use crate::logging::RunLogger;
use crate::metadata::{atomic_write, ObsCorePolicy, ObsCoreRecord};
use crate::models::{ImageArtifact, ImageKind, VisibilityArtifact};

/// File name of the run summary written to the output directory.
pub const RUN_SUMMARY_FILE: &str = "run.json";

/// Data products of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Product {
    Visibility,
    DirtyImage,
    CleanedImage,
}

impl Product {
    /// File name of the product for a name prefix.
    pub fn file_name(self, prefix: &str) -> String {
        match self {
            Product::Visibility => format!("{}.MS", prefix),
            Product::DirtyImage => format!("{}dirty.fits", prefix),
            Product::CleanedImage => format!("{}cleaned.fits", prefix),
        }
    }

    pub fn image_kind(self) -> Option<ImageKind> {
        match self {
            Product::Visibility => None,
            Product::DirtyImage => Some(ImageKind::Dirty),
            Product::CleanedImage => Some(ImageKind::Cleaned),
        }
    }
}

/// Build the ObsCore policy for a run from the metadata settings.
pub fn policy_from_settings(
    metadata: &MetadataSettings,
    user_seed: Option<String>,
    run_index: u64,
) -> ObsCorePolicy {
    ObsCorePolicy {
        collection: metadata.collection.clone(),
        user_seed,
        run_index,
        obs_id_prefix: metadata.obs_id_prefix.clone(),
        ivoid_authority: metadata.ivoid_authority.clone(),
    }
}

/// Read-only context passed to pipeline steps.
///
/// Contains run configuration and shared resources that steps can read
/// but not modify. Mutable state goes in `RunState`.
pub struct Context {
    pub settings: Settings,
    /// Run name, used for the log file and in errors.
    pub run_name: String,
    /// Directory all artifacts and sidecars are written to.
    pub output_dir: PathBuf,
    pub logger: Arc<RunLogger>,
    pub simulator: Arc<dyn Simulator>,
    pub imager: Arc<dyn Imager>,
    /// Rules for the policy-controlled ObsCore fields.
    pub policy: ObsCorePolicy,
}

impl Context {
    /// Create a context. The policy is built from the metadata settings
    /// with no user seed and the configured run index (or 0).
    pub fn new(
        settings: Settings,
        run_name: impl Into<String>,
        output_dir: PathBuf,
        logger: Arc<RunLogger>,
        simulator: Arc<dyn Simulator>,
        imager: Arc<dyn Imager>,
    ) -> Self {
        let policy = policy_from_settings(
            &settings.metadata,
            None,
            settings.metadata.run_index.unwrap_or(0),
        );
        Self {
            settings,
            run_name: run_name.into(),
            output_dir,
            logger,
            simulator,
            imager,
            policy,
        }
    }

    pub fn with_policy(mut self, policy: ObsCorePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Path of a product under the output directory.
    pub fn product_path(&self, product: Product) -> PathBuf {
        self.output_dir.join(product.file_name(&self.settings.paths.name_prefix))
    }

    pub fn namespace(&self) -> &str {
        &self.settings.metadata.namespace
    }

    pub fn lifetime(&self) -> i64 {
        self.settings.metadata.lifetime
    }

    pub fn dataset_name(&self) -> Option<String> {
        self.settings.metadata.dataset_name.clone()
    }
}

/// Mutable run state that accumulates results from pipeline steps.
///
/// Steps add their product; the pipeline advances `stage` after each
/// successful step.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunState {
    pub run_id: String,
    pub run_index: u64,
    pub started_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<String>,
    pub stage: PipelineStage,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visibility: Option<VisibilityArtifact>,
    /// Completed ObsCore record of the visibilities; images inherit from it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observation: Option<ObsCoreRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dirty_image: Option<ImageArtifact>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cleaned_image: Option<ImageArtifact>,
    /// Sidecars written so far, in order.
    #[serde(default)]
    pub sidecars: Vec<PathBuf>,
}

impl RunState {
    pub fn new(run_id: impl Into<String>, run_index: u64) -> Self {
        Self {
            run_id: run_id.into(),
            run_index,
            started_at: Some(chrono::Local::now().to_rfc3339()),
            ..Default::default()
        }
    }

    /// Fail unless the run is exactly at `expected`.
    pub fn require_stage(&self, step: &str, expected: PipelineStage) -> StepResult<()> {
        if self.stage == expected {
            Ok(())
        } else {
            Err(StepError::out_of_order(step, expected, self.stage))
        }
    }

    /// Move to `to`, which must directly follow the current stage.
    pub fn advance(&mut self, step: &str, to: PipelineStage) -> StepResult<()> {
        match to.previous() {
            Some(required) if required == self.stage => {
                self.stage = to;
                if to.is_terminal() {
                    self.finished_at = Some(chrono::Local::now().to_rfc3339());
                }
                Ok(())
            }
            Some(required) => Err(StepError::out_of_order(step, required, self.stage)),
            None => Err(StepError::other(format!(
                "'{}' cannot move a run back to {}",
                step, to
            ))),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.stage.is_terminal()
    }

    pub fn image(&self, kind: ImageKind) -> Option<&ImageArtifact> {
        match kind {
            ImageKind::Dirty => self.dirty_image.as_ref(),
            ImageKind::Cleaned => self.cleaned_image.as_ref(),
        }
    }

    /// Write the state as pretty JSON to `<dir>/run.json`.
    pub fn write_summary(&self, dir: &Path) -> StepResult<PathBuf> {
        let path = dir.join(RUN_SUMMARY_FILE);
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| StepError::other(format!("serializing run summary: {}", e)))?;
        atomic_write(&path, json.as_bytes())?;
        Ok(path)
    }

    /// Read a summary written by `write_summary`.
    pub fn read_summary(dir: &Path) -> StepResult<Self> {
        let path = dir.join(RUN_SUMMARY_FILE);
        let content =
            fs::read_to_string(&path).map_err(|e| StepError::io_error("reading run summary", e))?;
        serde_json::from_str(&content)
            .map_err(|e| StepError::other(format!("parsing {}: {}", path.display(), e)))
    }
}
