//! Workflow Validation
//!
//! Structural checks run once after parsing:
//! - Steps without a command (warning; they fail when reached)
//! - Duplicate step names (warning; diagnostics become ambiguous)
//! - Output capture in parallel workflows (error)
//! - Capture variable names that could never be referenced (error)

use std::collections::HashSet;

use log::{debug, info, warn};

use super::model::WorkflowDocument;
use crate::error::WorkflowError;

/// A problem found while validating a document.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationIssue {
    MissingCommand { index: usize, step: String },
    DuplicateName { index: usize, step: String },
    RegisterInParallel { index: usize, step: String },
    InvalidRegisterName { index: usize, step: String, name: String },
}

impl ValidationIssue {
    /// Returns true if the issue must stop the run before it starts.
    pub fn is_error(&self) -> bool {
        matches!(
            self,
            Self::RegisterInParallel { .. } | Self::InvalidRegisterName { .. }
        )
    }
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingCommand { index, step } => {
                write!(f, "Step '{}' (#{}) has no command", step, index + 1)
            }
            Self::DuplicateName { index, step } => {
                write!(f, "Step name '{}' (#{}) is used more than once", step, index + 1)
            }
            Self::RegisterInParallel { index, step } => write!(
                f,
                "Step '{}' (#{}) registers output, which is not supported in parallel workflows",
                step,
                index + 1
            ),
            Self::InvalidRegisterName { index, step, name } => write!(
                f,
                "Step '{}' (#{}) registers output as '{}', which is not a valid variable name",
                step,
                index + 1,
                name
            ),
        }
    }
}

fn is_variable_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_alphanumeric() || c == '_')
}

/// Collects every issue in the document, in step order.
pub fn check_document(document: &WorkflowDocument) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    let mut seen_names: HashSet<String> = HashSet::new();

    for (index, step) in document.steps.iter().enumerate() {
        let name = step.display_name(index);

        if step.command_text().is_none() {
            issues.push(ValidationIssue::MissingCommand {
                index,
                step: name.clone(),
            });
        }

        if !seen_names.insert(name.clone()) {
            issues.push(ValidationIssue::DuplicateName {
                index,
                step: name.clone(),
            });
        }

        if let Some(register) = &step.register {
            if document.parallel {
                issues.push(ValidationIssue::RegisterInParallel {
                    index,
                    step: name.clone(),
                });
            }
            if !is_variable_name(register) {
                issues.push(ValidationIssue::InvalidRegisterName {
                    index,
                    step: name.clone(),
                    name: register.clone(),
                });
            }
        }

        if step.condition.is_some() {
            debug!("Step '{}' is conditional", name);
        }
    }

    issues
}

/// Validates the document, logging warnings and failing on hard errors.
pub fn validate_document(document: &WorkflowDocument) -> Result<(), WorkflowError> {
    let issues = check_document(document);

    let (errors, warnings): (Vec<_>, Vec<_>) = issues.into_iter().partition(|i| i.is_error());

    for warning in &warnings {
        warn!("{}", warning);
    }

    if !errors.is_empty() {
        let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
        return Err(WorkflowError::Invalid(messages.join("\n")));
    }

    info!(
        "Workflow validated: {} steps ({} warnings)",
        document.steps.len(),
        warnings.len()
    );
    Ok(())
}
