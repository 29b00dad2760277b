//! Simulate step - produce visibilities with the configured simulator.

use crate::collaborators::SimulationRequest;
use crate::orchestrator::errors::{StepError, StepResult};
use crate::orchestrator::stage::PipelineStage;
use crate::orchestrator::step::PipelineStep;
use crate::orchestrator::types::{Context, Product, RunState};

/// INIT → SIMULATED.
pub struct SimulateStep;

impl SimulateStep {
    pub fn new() -> Self {
        Self
    }
}

impl Default for SimulateStep {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineStep for SimulateStep {
    fn name(&self) -> &str {
        "Simulate"
    }

    fn description(&self) -> &str {
        "Simulate visibilities"
    }

    fn requires(&self) -> PipelineStage {
        PipelineStage::Init
    }

    fn produces(&self) -> PipelineStage {
        PipelineStage::Simulated
    }

    fn product(&self) -> Product {
        Product::Visibility
    }

    fn validate_input(&self, ctx: &Context, state: &RunState) -> StepResult<()> {
        state.require_stage(self.name(), self.requires())?;
        std::fs::create_dir_all(&ctx.output_dir)
            .map_err(|e| StepError::io_error("creating output directory", e))
    }

    fn execute(&self, ctx: &Context, state: &mut RunState) -> StepResult<()> {
        let output = ctx.product_path(Product::Visibility);
        let simulation = &ctx.settings.simulation;
        ctx.logger.info(&format!(
            "Telescope {} / sky model {} via {}",
            simulation.telescope.name,
            simulation.sky_model.name,
            ctx.simulator.name()
        ));

        let request = SimulationRequest::from_settings(simulation, &output);
        let vis = ctx.simulator.simulate(&request, &ctx.logger)?;

        ctx.logger.info(&format!(
            "Visibilities: {} ({} channels, {} time steps)",
            vis.path.display(),
            vis.n_channels,
            vis.n_time_steps
        ));
        state.visibility = Some(vis);
        Ok(())
    }

    fn validate_output(&self, _ctx: &Context, state: &RunState) -> StepResult<()> {
        let vis = state
            .visibility
            .as_ref()
            .ok_or_else(|| StepError::invalid_output("no visibilities recorded"))?;
        if !vis.path.exists() {
            return Err(StepError::invalid_output(format!(
                "visibilities not found at {}",
                vis.path.display()
            )));
        }
        Ok(())
    }
}
