//! Pipeline runner that executes steps in sequence.

use super::errors::{PipelineError, PipelineResult, StepError};
use super::step::PipelineStep;
use super::types::{Context, RunState};

/// Pipeline that runs a sequence of steps.
///
/// Each step is validated before and after execution. The first failure
/// stops the run; nothing is retried.
pub struct Pipeline {
    steps: Vec<Box<dyn PipelineStep>>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self { steps: Vec::new() }
    }

    pub fn add_step<S: PipelineStep + 'static>(&mut self, step: S) -> &mut Self {
        self.steps.push(Box::new(step));
        self
    }

    /// Add a step (builder pattern).
    pub fn with_step<S: PipelineStep + 'static>(mut self, step: S) -> Self {
        self.add_step(step);
        self
    }

    /// Run every step in order.
    pub fn run(&self, ctx: &Context, state: &mut RunState) -> PipelineResult<PipelineRunResult> {
        let mut result = PipelineRunResult::default();
        let total_steps = self.steps.len().max(1);

        for (i, step) in self.steps.iter().enumerate() {
            let percent = ((i as f64 / total_steps as f64) * 100.0) as u32;
            ctx.logger.progress(percent);

            Self::run_step(ctx, state, step.as_ref())?;
            result.steps_completed.push(step.name().to_string());
        }

        ctx.logger.progress(100);
        ctx.logger.success("Pipeline completed successfully");

        Ok(result)
    }

    /// Run a single step against the current state.
    ///
    /// On success the run advances to the step's `produces()` stage; on
    /// failure the state's stage is unchanged.
    pub fn run_step(
        ctx: &Context,
        state: &mut RunState,
        step: &dyn PipelineStep,
    ) -> PipelineResult<()> {
        let step_name = step.name();
        ctx.logger.phase(step.description());

        let fail = |state: &RunState, e: StepError| {
            ctx.logger.error(&format!("{} failed: {}", step_name, e));
            PipelineError::step_failed(
                &ctx.run_name,
                step_name,
                state.stage,
                step.product().file_name(&ctx.settings.paths.name_prefix),
                e,
            )
        };

        ctx.logger.debug(&format!("Validating input for '{}'", step_name));
        if let Err(e) = step.validate_input(ctx, state) {
            return Err(fail(state, e));
        }

        ctx.logger.debug(&format!("Executing '{}'", step_name));
        if let Err(e) = step.execute(ctx, state) {
            return Err(fail(state, e));
        }

        ctx.logger.debug(&format!("Validating output for '{}'", step_name));
        if let Err(e) = step.validate_output(ctx, state) {
            return Err(fail(state, e));
        }

        if let Err(e) = state.advance(step_name, step.produces()) {
            return Err(fail(state, e));
        }
        ctx.logger.success(&format!("{} completed", step_name));
        ctx.logger.clear_tail();

        Ok(())
    }

    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.name()).collect()
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

/// Result of a pipeline run.
#[derive(Debug, Clone, Default)]
pub struct PipelineRunResult {
    /// Names of the steps that ran, in order.
    pub steps_completed: Vec<String>,
}
