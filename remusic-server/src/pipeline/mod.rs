//! Digitization pipeline: external tools, per-score runner, job dispatch

pub mod command;
pub mod queue;
pub mod runner;

pub use command::{ToolCommand, ToolError};
pub use queue::JobQueue;
pub use runner::{PipelineError, PipelineTools, ScoreProcessor};
