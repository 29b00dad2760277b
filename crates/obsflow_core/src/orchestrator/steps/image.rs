//! Imaging steps - dirty and cleaned images from the simulated visibilities.

use crate::models::{ImageArtifact, ImageKind, VisibilityArtifact};
use crate::orchestrator::errors::{StepError, StepResult};
use crate::orchestrator::stage::PipelineStage;
use crate::orchestrator::step::PipelineStep;
use crate::orchestrator::types::{Context, Product, RunState};

fn visibilities(state: &RunState) -> StepResult<&VisibilityArtifact> {
    state
        .visibility
        .as_ref()
        .ok_or_else(|| StepError::invalid_input("no visibilities recorded"))
}

fn check_image(state: &RunState, kind: ImageKind) -> StepResult<()> {
    let img = state
        .image(kind)
        .ok_or_else(|| StepError::invalid_output(format!("no {} image recorded", kind)))?;
    if img.kind != kind {
        return Err(StepError::invalid_output(format!(
            "imager returned a {} image where {} was expected",
            img.kind, kind
        )));
    }
    if !img.path.exists() {
        return Err(StepError::invalid_output(format!(
            "{} image not found at {}",
            kind,
            img.path.display()
        )));
    }
    Ok(())
}

fn log_image(ctx: &Context, img: &ImageArtifact) {
    ctx.logger.info(&format!(
        "{} image: {} ({}x{} px, {:.3e} rad/px)",
        img.kind,
        img.path.display(),
        img.npixel_x,
        img.npixel_y,
        img.cellsize_rad
    ));
}

/// VIS_DESCRIBED → DIRTY_IMAGED.
pub struct DirtyImageStep;

impl DirtyImageStep {
    pub fn new() -> Self {
        Self
    }
}

impl Default for DirtyImageStep {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineStep for DirtyImageStep {
    fn name(&self) -> &str {
        "DirtyImage"
    }

    fn description(&self) -> &str {
        "Dirty imaging"
    }

    fn requires(&self) -> PipelineStage {
        PipelineStage::VisDescribed
    }

    fn produces(&self) -> PipelineStage {
        PipelineStage::DirtyImaged
    }

    fn product(&self) -> Product {
        Product::DirtyImage
    }

    fn execute(&self, ctx: &Context, state: &mut RunState) -> StepResult<()> {
        let vis = visibilities(state)?;
        let output = ctx.product_path(Product::DirtyImage);

        let img = ctx
            .imager
            .dirty_image(vis, &ctx.settings.imaging, &output, &ctx.logger)?;
        log_image(ctx, &img);

        state.dirty_image = Some(img);
        Ok(())
    }

    fn validate_output(&self, _ctx: &Context, state: &RunState) -> StepResult<()> {
        check_image(state, ImageKind::Dirty)
    }
}

/// DIRTY_DESCRIBED → CLEAN_IMAGED.
pub struct CleanImageStep;

impl CleanImageStep {
    pub fn new() -> Self {
        Self
    }
}

impl Default for CleanImageStep {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineStep for CleanImageStep {
    fn name(&self) -> &str {
        "CleanImage"
    }

    fn description(&self) -> &str {
        "Deconvolution"
    }

    fn requires(&self) -> PipelineStage {
        PipelineStage::DirtyDescribed
    }

    fn produces(&self) -> PipelineStage {
        PipelineStage::CleanImaged
    }

    fn product(&self) -> Product {
        Product::CleanedImage
    }

    fn execute(&self, ctx: &Context, state: &mut RunState) -> StepResult<()> {
        let vis = visibilities(state)?;
        let dirty = state
            .dirty_image
            .as_ref()
            .ok_or_else(|| StepError::invalid_input("no dirty image recorded"))?;
        let output = ctx.product_path(Product::CleanedImage);

        let img = ctx.imager.clean_image(
            vis,
            dirty,
            &ctx.settings.imaging,
            &output,
            &ctx.logger,
        )?;
        log_image(ctx, &img);

        state.cleaned_image = Some(img);
        Ok(())
    }

    fn validate_output(&self, _ctx: &Context, state: &RunState) -> StepResult<()> {
        check_image(state, ImageKind::Cleaned)
    }
}
