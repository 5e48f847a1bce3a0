//! Application layer: command execution, the tag pipeline, and event
//! consumers.

mod executor;
pub mod handlers;
mod tag_pipeline;

pub use executor::{CommandContext, CommandExecutor, ExecutorError};
pub use tag_pipeline::{MessageOutcome, TagPipeline};
