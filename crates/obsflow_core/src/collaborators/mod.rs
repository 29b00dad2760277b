//! External collaborators: simulator, imager and metadata registry.
//!
//! Each is a trait so the pipeline can run against in-process fakes. The
//! shipped implementations shell out to command-line tools through
//! [`ToolCommand`], which logs the command line and keeps the output tail
//! in the run log.

mod command;
mod errors;
mod imager;
mod registry;
mod simulator;

pub use command::ToolCommand;
pub use errors::{CollaboratorError, CollaboratorResult, RegistrationError};
pub use imager::{Imager, WscleanImager};
pub use registry::{register_artifact, CommandRegistry, MetadataRegistry};
pub use simulator::{CommandSimulator, SimulationRequest, Simulator};
