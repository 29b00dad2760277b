//! Run stages and their order.

use std::fmt;

use serde::{Deserialize, Serialize};

/// How far a run has progressed. Stages advance strictly one at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PipelineStage {
    #[default]
    Init,
    Simulated,
    VisDescribed,
    DirtyImaged,
    DirtyDescribed,
    CleanImaged,
    CleanDescribed,
}

impl PipelineStage {
    const ORDER: [PipelineStage; 7] = [
        PipelineStage::Init,
        PipelineStage::Simulated,
        PipelineStage::VisDescribed,
        PipelineStage::DirtyImaged,
        PipelineStage::DirtyDescribed,
        PipelineStage::CleanImaged,
        PipelineStage::CleanDescribed,
    ];

    pub fn all() -> &'static [PipelineStage] {
        &Self::ORDER
    }

    fn position(self) -> usize {
        self as usize
    }

    /// Stage reached by the next transition.
    pub fn next(self) -> Option<Self> {
        Self::ORDER.get(self.position() + 1).copied()
    }

    /// Stage a run must be at to transition into this one.
    pub fn previous(self) -> Option<Self> {
        self.position().checked_sub(1).map(|i| Self::ORDER[i])
    }

    pub fn is_terminal(self) -> bool {
        self.next().is_none()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PipelineStage::Init => "INIT",
            PipelineStage::Simulated => "SIMULATED",
            PipelineStage::VisDescribed => "VIS_DESCRIBED",
            PipelineStage::DirtyImaged => "DIRTY_IMAGED",
            PipelineStage::DirtyDescribed => "DIRTY_DESCRIBED",
            PipelineStage::CleanImaged => "CLEAN_IMAGED",
            PipelineStage::CleanDescribed => "CLEAN_DESCRIBED",
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
