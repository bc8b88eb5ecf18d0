//! Run Results
//!
//! The terminal state of a run plus one record per step, serializable
//! to JSON for the `--report` option.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::step::StepOutcome;
use crate::error::WorkflowError;
use crate::monitoring::StepStatus;

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RunOutcome {
    /// Every step ran, was skipped, or failed with `continue_on_error`
    Completed,
    /// A step failed hard; `index` is 0-based
    Aborted {
        index: usize,
        step: String,
        reason: String,
    },
    /// Dry run: commands were resolved but nothing was dispatched
    ValidatedOnly,
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed => write!(f, "completed"),
            Self::Aborted { index, step, reason } => {
                write!(f, "aborted at step '{}' (#{}): {}", step, index + 1, reason)
            }
            Self::ValidatedOnly => write!(f, "validated only (dry run)"),
        }
    }
}

/// Result of one step within a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepRecord {
    pub index: usize,
    pub name: String,
    pub status: StepStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

impl StepRecord {
    /// Builds a record from an executor outcome.
    pub fn from_outcome(index: usize, name: String, outcome: &StepOutcome, dry_run: bool) -> Self {
        let status = if outcome.skipped {
            StepStatus::Skipped
        } else if !outcome.succeeded {
            StepStatus::Failed
        } else if outcome.tolerated {
            StepStatus::Warned
        } else if dry_run {
            StepStatus::Validated
        } else {
            StepStatus::Completed
        };

        Self {
            index,
            name,
            status,
            command: outcome.resolved_command.clone(),
            message: outcome.message.clone(),
            duration_ms: None,
        }
    }

    /// A record for a step that never started.
    pub fn cancelled(index: usize, name: String) -> Self {
        Self {
            index,
            name,
            status: StepStatus::Cancelled,
            command: None,
            message: None,
            duration_ms: None,
        }
    }
}

/// Everything known about a finished run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub workflow: String,
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: u64,
    pub parallel: bool,
    pub dry_run: bool,
    pub outcome: RunOutcome,
    /// One record per document step, in document order
    pub steps: Vec<StepRecord>,
}

impl RunReport {
    /// Returns true unless the run aborted.
    pub fn is_success(&self) -> bool {
        !matches!(self.outcome, RunOutcome::Aborted { .. })
    }

    /// Converts an aborted run into [`WorkflowError::Aborted`].
    pub fn into_result(self) -> Result<Self, WorkflowError> {
        match &self.outcome {
            RunOutcome::Aborted { index, step, reason } => Err(WorkflowError::Aborted {
                index: *index,
                step: step.clone(),
                reason: reason.clone(),
            }),
            _ => Ok(self),
        }
    }

    /// Number of steps that ended with `status`.
    pub fn count(&self, status: StepStatus) -> usize {
        self.steps.iter().filter(|s| s.status == status).count()
    }

    /// Steps that failed, or were tolerated, with their messages.
    pub fn problems(&self) -> impl Iterator<Item = &StepRecord> {
        self.steps
            .iter()
            .filter(|s| matches!(s.status, StepStatus::Failed | StepStatus::Warned))
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
