//! ToolFlow - Declarative Workflow Runner
//!
//! Executes an ordered list of CLI-style steps described in a YAML
//! document, with variable substitution, conditional skipping, sequential
//! or parallel execution, dry-run validation and per-step failure tolerance.
//!
//! # Architecture
//!
//! The library is organized into four main modules:
//!
//! - [`workflow`]: Document model, parsing, validation and variable substitution
//! - [`execution`]: Run coordinator, step executor and the dispatcher boundary
//! - [`monitoring`]: Step timing and final step states
//! - [`config`]: Global configuration (shared variables and defaults)
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use toolflow::execution::{Engine, ProcessDispatcher};
//! use toolflow::workflow::parse_overrides;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Every step runs as `toolbox <step arguments>`
//!     let dispatcher = ProcessDispatcher::new().with_program("toolbox");
//!     let engine = Engine::new(Arc::new(dispatcher));
//!
//!     let overrides = parse_overrides(["input=holiday.jpg"]);
//!     let report = engine.run("thumbnails.yaml", &overrides)?.into_result()?;
//!     println!("{} steps", report.steps.len());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod execution;
pub mod monitoring;
pub mod workflow;

// Re-export commonly used types
pub use config::GlobalConfig;
pub use error::{DispatchError, WorkflowError};
pub use execution::{CommandDispatcher, DispatchOutput, Engine, RunOutcome, RunReport};
pub use workflow::{load_workflow, StepSpec, VariableScope, WorkflowDocument};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = "ToolFlow";
