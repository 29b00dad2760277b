//! Pipeline step implementations, one per stage transition.

mod describe;
mod image;
mod simulate;

pub use describe::{estimate_size_kib, DescribeStep};
pub use image::{CleanImageStep, DirtyImageStep};
pub use simulate::SimulateStep;
