//! Describe steps - derive ObsCore metadata and write the `.meta` sidecar.

use std::fs;
use std::path::{Path, PathBuf};

use crate::metadata::{name_from_path, DataManagementRecord, ObsCoreRecord};
use crate::orchestrator::errors::{StepError, StepResult};
use crate::orchestrator::stage::PipelineStage;
use crate::orchestrator::step::PipelineStep;
use crate::orchestrator::types::{Context, Product, RunState};

/// Size of a file, or of all files under a directory, in KiB (rounded up).
///
/// Symbolic links inside a directory are not followed.
pub fn estimate_size_kib(path: &Path) -> Option<u64> {
    fn bytes(path: &Path, meta: fs::Metadata) -> u64 {
        if !meta.is_dir() {
            return meta.len();
        }
        let Ok(entries) = fs::read_dir(path) else {
            return 0;
        };
        entries
            .flatten()
            .filter_map(|entry| {
                let meta = fs::symlink_metadata(entry.path()).ok()?;
                (!meta.file_type().is_symlink()).then(|| bytes(&entry.path(), meta))
            })
            .sum()
    }

    let meta = fs::metadata(path).ok()?;
    Some(bytes(path, meta).div_ceil(1024))
}

/// Derives and persists the metadata of one product.
///
/// - visibility: SIMULATED → VIS_DESCRIBED
/// - dirty image: DIRTY_IMAGED → DIRTY_DESCRIBED
/// - cleaned image: CLEAN_IMAGED → CLEAN_DESCRIBED
pub struct DescribeStep {
    product: Product,
}

impl DescribeStep {
    pub fn new(product: Product) -> Self {
        Self { product }
    }

    pub fn visibility() -> Self {
        Self::new(Product::Visibility)
    }

    pub fn dirty_image() -> Self {
        Self::new(Product::DirtyImage)
    }

    pub fn cleaned_image() -> Self {
        Self::new(Product::CleanedImage)
    }

    /// Derive the complete record for the product and its artifact path.
    fn derive(&self, ctx: &Context, state: &RunState) -> StepResult<(ObsCoreRecord, PathBuf)> {
        let namespace = ctx.namespace();

        match self.product.image_kind() {
            None => {
                let vis = state
                    .visibility
                    .as_ref()
                    .ok_or_else(|| StepError::invalid_input("no visibilities recorded"))?;
                let name = name_from_path(&vis.path)?;

                let mut record =
                    ObsCoreRecord::from_visibility(vis, ctx.settings.metadata.calibrated);
                ctx.policy.apply_to_visibility(&mut record, namespace, &name)?;
                Ok((record, vis.path.clone()))
            }
            Some(kind) => {
                let img = state.image(kind).ok_or_else(|| {
                    StepError::invalid_input(format!("no {} image recorded", kind))
                })?;
                let observation = state.observation.as_ref().ok_or_else(|| {
                    StepError::invalid_input("visibilities have not been described")
                })?;
                let name = name_from_path(&img.path)?;

                let mut record = ObsCoreRecord::from_image(img);
                ctx.policy.apply_to_image(&mut record, observation, namespace, &name)?;
                Ok((record, img.path.clone()))
            }
        }
    }
}

impl PipelineStep for DescribeStep {
    fn name(&self) -> &str {
        match self.product {
            Product::Visibility => "DescribeVisibility",
            Product::DirtyImage => "DescribeDirtyImage",
            Product::CleanedImage => "DescribeCleanedImage",
        }
    }

    fn description(&self) -> &str {
        match self.product {
            Product::Visibility => "Describe visibilities",
            Product::DirtyImage => "Describe dirty image",
            Product::CleanedImage => "Describe cleaned image",
        }
    }

    fn requires(&self) -> PipelineStage {
        match self.product {
            Product::Visibility => PipelineStage::Simulated,
            Product::DirtyImage => PipelineStage::DirtyImaged,
            Product::CleanedImage => PipelineStage::CleanImaged,
        }
    }

    fn produces(&self) -> PipelineStage {
        match self.product {
            Product::Visibility => PipelineStage::VisDescribed,
            Product::DirtyImage => PipelineStage::DirtyDescribed,
            Product::CleanedImage => PipelineStage::CleanDescribed,
        }
    }

    fn product(&self) -> Product {
        self.product
    }

    fn execute(&self, ctx: &Context, state: &mut RunState) -> StepResult<()> {
        let (mut record, artifact) = self.derive(ctx, state)?;
        if record.access_estsize.is_none() {
            record.access_estsize = estimate_size_kib(&artifact);
        }

        let missing = record.missing_mandatory();
        if missing.is_empty() {
            ctx.logger.validation("all mandatory ObsCore fields set");
        } else {
            ctx.logger
                .validation(&format!("missing mandatory fields: {}", missing.join(", ")));
        }

        let dm = DataManagementRecord::for_artifact(
            ctx.namespace(),
            &artifact,
            ctx.lifetime(),
            ctx.dataset_name(),
            record,
        )?;

        let sidecar = DataManagementRecord::get_meta_fname(&artifact);
        ctx.logger.section(&format!("Writing {}", sidecar.display()));
        dm.write(&sidecar)?;

        let obs_id = dm.meta().obs_id.as_ref().map(ToString::to_string);
        ctx.logger.info(&format!(
            "obs_id {} / {}",
            obs_id.as_deref().unwrap_or("-"),
            dm.meta().obs_publisher_did.as_deref().unwrap_or("-")
        ));

        if self.product == Product::Visibility {
            state.observation = Some(dm.meta().clone());
        }
        state.sidecars.push(sidecar);
        Ok(())
    }

    fn validate_output(&self, _ctx: &Context, state: &RunState) -> StepResult<()> {
        match state.sidecars.last() {
            Some(sidecar) if sidecar.exists() => Ok(()),
            Some(sidecar) => Err(StepError::invalid_output(format!(
                "sidecar not found at {}",
                sidecar.display()
            ))),
            None => Err(StepError::invalid_output("no sidecar recorded")),
        }
    }
}
