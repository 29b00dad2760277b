//! Pipeline step trait definition.

use super::errors::StepResult;
use super::stage::PipelineStage;
use super::types::{Context, Product, RunState};

/// One guarded transition of a run.
///
/// The pipeline runner calls, in order:
///
/// 1. `validate_input`: the run must be at `requires()` (plus any
///    step-specific checks)
/// 2. `execute`: do the work and record the product in `RunState`
/// 3. `validate_output`: the product exists
///
/// and then advances the run to `produces()`.
pub trait PipelineStep: Send + Sync {
    /// Step name (for logging and error context).
    fn name(&self) -> &str;

    /// Stage the run must be at before this step.
    fn requires(&self) -> PipelineStage;

    /// Stage the run is at after this step.
    fn produces(&self) -> PipelineStage;

    /// Product this step creates or describes.
    fn product(&self) -> Product;

    fn validate_input(&self, _ctx: &Context, state: &RunState) -> StepResult<()> {
        state.require_stage(self.name(), self.requires())
    }

    fn execute(&self, ctx: &Context, state: &mut RunState) -> StepResult<()>;

    fn validate_output(&self, ctx: &Context, state: &RunState) -> StepResult<()>;

    /// Human-readable description of what this step does.
    fn description(&self) -> &str {
        self.name()
    }
}
