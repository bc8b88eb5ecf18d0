//! Individual Step Execution
//!
//! Handles a single workflow step:
//! - Condition evaluation
//! - Command placeholder substitution
//! - Tokenization and dispatch
//! - Failure tolerance via `continue_on_error`

use log::{debug, error, info, warn};

use super::dispatcher::{CommandDispatcher, DispatchOutput};
use super::shell::split_words;
use crate::error::DispatchError;
use crate::workflow::{substitute, StepSpec, VariableScope};

/// Resolved condition values that skip a step (compared case-insensitively).
const FALSY_CONDITIONS: &[&str] = &["false", "0", "no", "none", ""];

/// Message reported for a step without a command.
pub const MISSING_COMMAND: &str = "missing command";

/// Outcome of one step.
///
/// Expected failures are values, not errors: the coordinator inspects
/// `succeeded` to decide whether the run continues.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepOutcome {
    pub succeeded: bool,
    pub skipped: bool,
    pub message: Option<String>,
    /// Set when a failure was downgraded by `continue_on_error`
    pub tolerated: bool,
    /// The command after substitution, if it was resolved
    pub resolved_command: Option<String>,
    /// Dispatcher stdout of a successful step
    pub stdout: Option<String>,
}

impl StepOutcome {
    fn completed(resolved_command: String, stdout: Option<String>) -> Self {
        Self {
            succeeded: true,
            resolved_command: Some(resolved_command),
            stdout,
            ..Self::default()
        }
    }

    fn skipped(condition: &str) -> Self {
        Self {
            succeeded: true,
            skipped: true,
            message: Some(format!("condition '{}' is false", condition)),
            ..Self::default()
        }
    }

    fn failed(message: impl Into<String>, resolved_command: Option<String>) -> Self {
        Self {
            succeeded: false,
            message: Some(message.into()),
            resolved_command,
            ..Self::default()
        }
    }

    fn tolerated(failure: &str, resolved_command: String) -> Self {
        Self {
            succeeded: true,
            tolerated: true,
            message: Some(format!("warning: {}", failure)),
            resolved_command: Some(resolved_command),
            ..Self::default()
        }
    }

    /// Returns true for a failure that stops the run.
    pub fn is_hard_failure(&self) -> bool {
        !self.succeeded
    }
}

/// Returns true if a resolved condition means "run the step".
pub fn is_truthy(resolved: &str) -> bool {
    !FALSY_CONDITIONS
        .iter()
        .any(|falsy| resolved.eq_ignore_ascii_case(falsy))
}

/// Executes a single workflow step.
///
/// # Arguments
///
/// * `step` - The step definition
/// * `index` - 0-based position in the document, for diagnostics
/// * `scope` - Variables visible to this step
/// * `dry_run` - Resolve and report the command without dispatching it
/// * `dispatcher` - Executes the tokenized command
pub fn execute_step(
    step: &StepSpec,
    index: usize,
    scope: &VariableScope,
    dry_run: bool,
    dispatcher: &dyn CommandDispatcher,
) -> StepOutcome {
    let step_name = step.display_name(index);

    if let Some(condition) = &step.condition {
        let resolved = substitute(condition, scope);
        if !is_truthy(&resolved) {
            info!("Skipping {} (condition '{}' is false)", step_name, resolved);
            return StepOutcome::skipped(&resolved);
        }
        debug!("Step '{}' condition '{}' is true", step_name, resolved);
    }

    let Some(template) = step.command_text() else {
        error!("Step '{}' has no command", step_name);
        return StepOutcome::failed(MISSING_COMMAND, None);
    };

    let command_text = substitute(template, scope);

    if dry_run {
        info!("[DRY RUN] {}: {}", step_name, command_text);
        return StepOutcome::completed(command_text, None);
    }

    info!("Executing {}...", step_name);
    debug!("Command: {}", command_text);

    let failure = match dispatch(&command_text, dispatcher) {
        Ok(output) if output.success() => {
            info!("{} completed successfully", step_name);
            return StepOutcome::completed(command_text, Some(output.stdout));
        }
        Ok(output) => output.failure_text(),
        Err(e) => e.to_string(),
    };

    if step.continue_on_error {
        warn!("{} failed (continuing): {}", step_name, failure);
        StepOutcome::tolerated(&failure, command_text)
    } else {
        error!("{} failed: {}", step_name, failure);
        StepOutcome::failed(failure, Some(command_text))
    }
}

fn dispatch(
    command_text: &str,
    dispatcher: &dyn CommandDispatcher,
) -> Result<DispatchOutput, DispatchError> {
    let argv = split_words(command_text)?;
    if argv.is_empty() {
        return Err(DispatchError::EmptyCommand);
    }
    dispatcher.dispatch(&argv)
}
