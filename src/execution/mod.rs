//! Workflow Execution Module
//!
//! Provides the run coordinator and everything it drives: the step
//! executor, command tokenization and the dispatcher boundary.
//!
//! # Architecture
//!
//! - [`engine`]: Run coordinator (sequential, parallel and dry-run modes)
//! - [`step`]: Individual step execution logic
//! - [`shell`]: POSIX shell word splitting
//! - [`dispatcher`]: The injected command execution capability
//! - [`report`]: Run outcome and per-step records

pub mod dispatcher;
pub mod engine;
pub mod report;
pub mod shell;
pub mod step;

pub use dispatcher::{CommandDispatcher, DispatchOutput, ProcessDispatcher};
pub use engine::Engine;
pub use report::{RunOutcome, RunReport, StepRecord};
pub use step::{execute_step, is_truthy, StepOutcome};
