//! Error Types
//!
//! Typed errors for every failure that is not an ordinary step outcome.
//!
//! - [`WorkflowError`]: document loading problems and aborted runs
//! - [`DispatchError`]: failures to hand a command to the dispatcher
//! - [`ShellSplitError`]: malformed command lines
//! - [`ConfigError`]: unreadable global configuration

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by the run coordinator.
///
/// `Read`, `Parse`, `NotAMapping` and `Invalid` are document errors and are
/// always raised before any step starts. `Aborted` is raised when a step fails
/// without `continue_on_error`.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("failed to read workflow file '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse workflow YAML: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("workflow root must be a mapping, found {found}")]
    NotAMapping { found: &'static str },

    #[error("invalid workflow: {0}")]
    Invalid(String),

    #[error("workflow aborted at step '{step}' (#{}): {reason}", index + 1)]
    Aborted {
        index: usize,
        step: String,
        reason: String,
    },
}

impl WorkflowError {
    /// Returns true for errors raised before any step ran.
    pub fn is_document_error(&self) -> bool {
        !matches!(self, Self::Aborted { .. })
    }
}

/// Errors raised while tokenizing a command line.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShellSplitError {
    #[error("unterminated {0} quote")]
    UnterminatedQuote(char),

    #[error("trailing backslash with no escaped character")]
    TrailingEscape,
}

/// Errors raised before a dispatcher could produce an exit status.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("command line is empty")]
    EmptyCommand,

    #[error("could not tokenize command: {0}")]
    Tokenize(#[from] ShellSplitError),

    #[error("failed to start '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{0}")]
    Other(String),
}

/// Errors raised while loading the global configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file '{}': {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}
