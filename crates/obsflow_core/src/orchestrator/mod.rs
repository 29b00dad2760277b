//! Pipeline orchestrator for simulate → image → describe runs.
//!
//! A run is a linear state machine. Each transition is one pipeline step,
//! guarded by the stage the run must be at:
//!
//! ```text
//! INIT ─Simulate─▶ SIMULATED ─DescribeVisibility─▶ VIS_DESCRIBED
//!      ─DirtyImage─▶ DIRTY_IMAGED ─DescribeDirtyImage─▶ DIRTY_DESCRIBED
//!      ─CleanImage─▶ CLEAN_IMAGED ─DescribeCleanedImage─▶ CLEAN_DESCRIBED
//! ```
//!
//! # Example
//!
//! ```ignore
//! use obsflow_core::orchestrator::{run_standard, Context, RunState};
//!
//! let ctx = Context::new(settings, "run_0", output_dir, logger, simulator, imager);
//! let mut state = RunState::new("run_0", 0);
//! run_standard(&ctx, &mut state)?;
//! assert!(state.is_complete());
//! ```

mod errors;
mod pipeline;
mod run_index;
mod stage;
mod step;
pub mod steps;
mod types;

use std::path::Path;

pub use errors::{PipelineError, PipelineResult, StepError, StepResult};
pub use pipeline::{Pipeline, PipelineRunResult};
pub use run_index::{RunIndexStore, RUN_INDEX_FILE};
pub use stage::PipelineStage;
pub use step::PipelineStep;
pub use steps::{CleanImageStep, DescribeStep, DirtyImageStep, SimulateStep};
pub use types::{policy_from_settings, Context, Product, RunState, RUN_SUMMARY_FILE};

use crate::config::Settings;
use crate::metadata::MetaResult;

/// Create the pipeline with all six transitions in order.
pub fn create_standard_pipeline() -> Pipeline {
    Pipeline::new()
        .with_step(SimulateStep::new())
        .with_step(DescribeStep::visibility())
        .with_step(DirtyImageStep::new())
        .with_step(DescribeStep::dirty_image())
        .with_step(CleanImageStep::new())
        .with_step(DescribeStep::cleaned_image())
}

/// Run the standard pipeline and write `run.json` to the output directory.
///
/// The summary is written whether or not the run succeeds; a step failure
/// takes precedence over a summary write failure.
pub fn run_standard(ctx: &Context, state: &mut RunState) -> PipelineResult<PipelineRunResult> {
    let outcome = create_standard_pipeline().run(ctx, state);

    let summary = state.write_summary(&ctx.output_dir);
    match (&outcome, summary) {
        (_, Ok(path)) => ctx
            .logger
            .debug(&format!("Run summary written to {}", path.display())),
        (Err(_), Err(e)) => ctx.logger.warn(&format!("Run summary not written: {}", e)),
        (Ok(_), Err(e)) => {
            return Err(PipelineError::setup_failed(
                &ctx.run_name,
                format!("writing run summary: {}", e),
            ))
        }
    }

    outcome
}

/// Run index for a new run: the configured one, else the next value of the
/// persisted counter for `user_seed` under `output_root`.
pub fn resolve_run_index(
    settings: &Settings,
    output_root: &Path,
    user_seed: Option<&str>,
) -> MetaResult<u64> {
    match settings.metadata.run_index {
        Some(index) => Ok(index),
        None => RunIndexStore::open(output_root)?.next_index(user_seed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn standard_pipeline_covers_every_transition() {
        let pipeline = create_standard_pipeline();
        assert_eq!(
            pipeline.step_names(),
            vec![
                "Simulate",
                "DescribeVisibility",
                "DirtyImage",
                "DescribeDirtyImage",
                "CleanImage",
                "DescribeCleanedImage",
            ]
        );
    }

    #[test]
    fn configured_run_index_wins() {
        let dir = tempdir().unwrap();
        let mut settings = Settings::default();
        settings.metadata.run_index = Some(42);

        assert_eq!(resolve_run_index(&settings, dir.path(), Some("a")).unwrap(), 42);
        assert!(!dir.path().join(RUN_INDEX_FILE).exists());
    }

    #[test]
    fn counter_used_when_unset() {
        let dir = tempdir().unwrap();
        let settings = Settings::default();

        assert_eq!(resolve_run_index(&settings, dir.path(), Some("a")).unwrap(), 0);
        assert_eq!(resolve_run_index(&settings, dir.path(), Some("a")).unwrap(), 1);
    }

    #[test]
    fn damaged_counter_is_not_reset() {
        let dir = tempdir().unwrap();
        let settings = Settings::default();
        resolve_run_index(&settings, dir.path(), Some("a")).unwrap();
        std::fs::write(dir.path().join(RUN_INDEX_FILE), "{").unwrap();

        assert!(resolve_run_index(&settings, dir.path(), Some("a")).is_err());
        assert_eq!(
            std::fs::read_to_string(dir.path().join(RUN_INDEX_FILE)).unwrap(),
            "{"
        );
    }
}
