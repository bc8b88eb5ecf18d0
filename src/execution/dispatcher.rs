//! Command Dispatch
//!
//! The engine never runs commands itself. Each step's argument vector is
//! handed to a [`CommandDispatcher`], which may call into a host program
//! in-process, spawn a subprocess, or forward the call elsewhere.
//!
//! [`ProcessDispatcher`] is the subprocess implementation used by the CLI.

use std::path::PathBuf;
use std::process::Command;

use log::debug;

use crate::error::DispatchError;

/// Result of a dispatched command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl DispatchOutput {
    /// A successful result with the given stdout.
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            exit_code: 0,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// A failed result with the given exit code and stderr.
    pub fn failed(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            exit_code,
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Describes a failed result for step messages.
    pub fn failure_text(&self) -> String {
        let detail = if self.stderr.trim().is_empty() {
            self.stdout.trim()
        } else {
            self.stderr.trim()
        };

        if detail.is_empty() {
            format!("exit code {}", self.exit_code)
        } else {
            format!("exit code {}: {}", self.exit_code, detail)
        }
    }
}

/// Executes one tokenized command line.
///
/// Implementations are shared across worker threads in parallel runs and
/// must block until the command has finished.
pub trait CommandDispatcher: Send + Sync {
    fn dispatch(&self, argv: &[String]) -> Result<DispatchOutput, DispatchError>;
}

impl<F> CommandDispatcher for F
where
    F: Fn(&[String]) -> Result<DispatchOutput, DispatchError> + Send + Sync,
{
    fn dispatch(&self, argv: &[String]) -> Result<DispatchOutput, DispatchError> {
        self(argv)
    }
}

/// Runs each command as a child process.
///
/// With a `program` set, the argument vector is appended to it, so a step
/// `image convert a.png b.jpg` runs `<program> image convert a.png b.jpg`.
#[derive(Debug, Clone, Default)]
pub struct ProcessDispatcher {
    program: Option<String>,
    working_dir: Option<PathBuf>,
}

impl ProcessDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the host program that receives every step's arguments.
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = Some(program.into());
        self
    }

    /// Sets the working directory for child processes.
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    fn command_for(&self, argv: &[String]) -> Result<Command, DispatchError> {
        let (program, args) = match &self.program {
            Some(program) => (program.as_str(), argv),
            None => {
                let (first, rest) = argv.split_first().ok_or(DispatchError::EmptyCommand)?;
                (first.as_str(), rest)
            }
        };

        let mut cmd = Command::new(program);
        cmd.args(args);

        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
            debug!("Executing in directory: {}", dir.display());
        }

        Ok(cmd)
    }
}

impl CommandDispatcher for ProcessDispatcher {
    fn dispatch(&self, argv: &[String]) -> Result<DispatchOutput, DispatchError> {
        let mut cmd = self.command_for(argv)?;
        let program = cmd.get_program().to_string_lossy().into_owned();

        let output = cmd
            .output()
            .map_err(|source| DispatchError::Spawn { program, source })?;

        let result = DispatchOutput {
            // Signal-terminated children have no code
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };

        if !result.stdout.trim().is_empty() {
            debug!("stdout:\n{}", result.stdout);
        }
        if !result.stderr.trim().is_empty() {
            debug!("stderr:\n{}", result.stderr);
        }

        Ok(result)
    }
}

/// In-memory dispatcher for tests.
#[cfg(test)]
pub(crate) mod testing {
    use std::collections::HashMap;
    use std::sync::{Barrier, Mutex};

    use super::*;

    /// Records every call; commands whose first word is registered fail.
    #[derive(Default)]
    pub struct RecordingDispatcher {
        calls: Mutex<Vec<Vec<String>>>,
        failures: HashMap<String, i32>,
        outputs: HashMap<String, String>,
        barrier: Option<Barrier>,
    }

    impl RecordingDispatcher {
        pub fn new() -> Self {
            Self::default()
        }

        /// Commands starting with `word` exit with `code`.
        pub fn failing(mut self, word: &str, code: i32) -> Self {
            self.failures.insert(word.to_string(), code);
            self
        }

        /// Commands starting with `word` print `stdout`.
        pub fn printing(mut self, word: &str, stdout: &str) -> Self {
            self.outputs.insert(word.to_string(), stdout.to_string());
            self
        }

        /// Holds every call until `parties` calls are in flight.
        pub fn rendezvous(mut self, parties: usize) -> Self {
            self.barrier = Some(Barrier::new(parties));
            self
        }

        pub fn calls(&self) -> Vec<Vec<String>> {
            self.calls.lock().unwrap().clone()
        }

        pub fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    impl CommandDispatcher for RecordingDispatcher {
        fn dispatch(&self, argv: &[String]) -> Result<DispatchOutput, DispatchError> {
            self.calls.lock().unwrap().push(argv.to_vec());

            if let Some(barrier) = &self.barrier {
                barrier.wait();
            }

            let first = argv.first().map(String::as_str).unwrap_or_default();
            if let Some(code) = self.failures.get(first) {
                return Ok(DispatchOutput::failed(*code, format!("{} failed", first)));
            }

            Ok(DispatchOutput::ok(
                self.outputs.get(first).cloned().unwrap_or_default(),
            ))
        }
    }
}
