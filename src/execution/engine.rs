//! Workflow Execution Engine
//!
//! The run coordinator. It builds the variable scope, picks an execution
//! strategy and drives the step executor over every step:
//! - Sequential: document order, stop at the first hard failure
//! - Parallel: bounded worker pool, stop starting new steps after the first hard failure
//! - Dry run: always sequential, resolve every command, dispatch nothing

use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::channel;
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use chrono::Utc;
use indexmap::IndexMap;
use log::{debug, info, warn};

use super::dispatcher::CommandDispatcher;
use super::report::{RunOutcome, RunReport, StepRecord};
use super::step::{execute_step, StepOutcome};
use crate::error::WorkflowError;
use crate::monitoring::{EventType, ExecutionTimeline, StepStatus};
use crate::workflow::{load_workflow, validate_document, VariableScope, WorkflowDocument};

/// A finished step reported by a parallel worker.
struct WorkerResult {
    index: usize,
    outcome: StepOutcome,
    started: Instant,
    finished: Instant,
}

/// Workflow execution engine.
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
///
/// use toolflow::execution::{Engine, ProcessDispatcher};
/// use toolflow::workflow::parse_overrides;
///
/// fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let mut engine = Engine::new(Arc::new(ProcessDispatcher::new().with_program("toolbox")));
///     engine.set_dry_run(true);
///
///     let overrides = parse_overrides(["input=photo.jpg"]);
///     let report = engine.run("thumbnails.yaml", &overrides)?;
///     println!("{}", report.outcome);
///     Ok(())
/// }
/// ```
pub struct Engine {
    dispatcher: Arc<dyn CommandDispatcher>,
    globals: IndexMap<String, String>,
    dry_run: bool,
    max_workers: usize,
}

impl Engine {
    /// Creates an engine that hands every step to `dispatcher`.
    pub fn new(dispatcher: Arc<dyn CommandDispatcher>) -> Self {
        Self {
            dispatcher,
            globals: IndexMap::new(),
            dry_run: false,
            max_workers: num_cpus::get(),
        }
    }

    /// Sets the global configuration variables (lowest precedence).
    pub fn set_globals(&mut self, globals: IndexMap<String, String>) {
        self.globals = globals;
    }

    /// Enables or disables dry run mode.
    pub fn set_dry_run(&mut self, dry_run: bool) {
        self.dry_run = dry_run;
    }

    /// Sets the worker pool bound for parallel workflows.
    pub fn set_max_workers(&mut self, max: usize) {
        self.max_workers = max.max(1);
    }

    /// Loads the workflow at `path` and runs it.
    ///
    /// Document errors are returned before any step starts. Step failures
    /// are not errors: they end up in [`RunReport::outcome`].
    pub fn run(
        &self,
        path: impl AsRef<Path>,
        overrides: &IndexMap<String, String>,
    ) -> Result<RunReport, WorkflowError> {
        let document = load_workflow(path)?;
        Ok(self.execute(&document, overrides))
    }

    /// Validates and runs an in-memory document.
    pub fn run_document(
        &self,
        document: &WorkflowDocument,
        overrides: &IndexMap<String, String>,
    ) -> Result<RunReport, WorkflowError> {
        validate_document(document)?;
        Ok(self.execute(document, overrides))
    }

    fn execute(&self, document: &WorkflowDocument, overrides: &IndexMap<String, String>) -> RunReport {
        let started_at = Utc::now();
        let mut timeline = ExecutionTimeline::new();
        let scope = VariableScope::layered(&self.globals, &document.vars, overrides);
        let parallel = document.parallel && !self.dry_run;

        if document.parallel && self.dry_run {
            info!("Dry run: validating steps sequentially");
        }

        info!(
            "Starting workflow '{}' ({} steps, {}{})",
            document.name,
            document.steps.len(),
            if parallel { "parallel" } else { "sequential" },
            if self.dry_run { ", dry run" } else { "" }
        );

        let (outcome, mut steps) = if document.steps.is_empty() {
            warn!("No steps found in workflow '{}'", document.name);
            let outcome = if self.dry_run {
                RunOutcome::ValidatedOnly
            } else {
                RunOutcome::Completed
            };
            (outcome, Vec::new())
        } else if parallel {
            self.run_parallel(document, &scope, &mut timeline)
        } else {
            self.run_sequential(document, scope, &mut timeline)
        };

        let durations = timeline.durations();
        for record in &mut steps {
            record.duration_ms = durations
                .get(&record.index)
                .map(|d| d.as_millis().min(u64::MAX as u128) as u64);
        }

        debug!("{}", timeline.gantt_chart());

        match &outcome {
            RunOutcome::Completed => info!("Workflow '{}' completed", document.name),
            RunOutcome::Aborted { .. } => warn!("Workflow '{}' {}", document.name, outcome),
            RunOutcome::ValidatedOnly => {
                info!("Workflow '{}' validated, nothing executed", document.name)
            }
        }

        RunReport {
            workflow: document.name.clone(),
            started_at,
            elapsed_ms: timeline.elapsed().as_millis().min(u64::MAX as u128) as u64,
            parallel,
            dry_run: self.dry_run,
            outcome,
            steps,
        }
    }

    /// Runs steps one after another in document order.
    ///
    /// The scope is owned here so registered step output can be bound
    /// for later steps.
    fn run_sequential(
        &self,
        document: &WorkflowDocument,
        mut scope: VariableScope,
        timeline: &mut ExecutionTimeline,
    ) -> (RunOutcome, Vec<StepRecord>) {
        let mut records = Vec::with_capacity(document.steps.len());

        for (index, step) in document.steps.iter().enumerate() {
            let name = step.display_name(index);

            timeline.add_event(index, name.clone(), EventType::Started);
            let outcome = execute_step(step, index, &scope, self.dry_run, &*self.dispatcher);
            let record = StepRecord::from_outcome(index, name.clone(), &outcome, self.dry_run);
            timeline.add_event(index, name.clone(), EventType::Finished(record.status));
            records.push(record);

            if outcome.is_hard_failure() {
                // Dry runs keep going so every step gets checked
                if self.dry_run {
                    continue;
                }

                for (later, step) in document.steps.iter().enumerate().skip(index + 1) {
                    records.push(StepRecord::cancelled(later, step.display_name(later)));
                }

                return (
                    RunOutcome::Aborted {
                        index,
                        step: name,
                        reason: outcome.message.unwrap_or_default(),
                    },
                    records,
                );
            }

            if let (Some(variable), Some(stdout)) = (&step.register, &outcome.stdout) {
                if !outcome.tolerated {
                    debug!("Step '{}' registered output as '{}'", name, variable);
                    scope.insert(variable.clone(), stdout.trim());
                }
            }
        }

        let outcome = if self.dry_run {
            RunOutcome::ValidatedOnly
        } else {
            RunOutcome::Completed
        };
        (outcome, records)
    }

    /// Runs steps on a bounded pool of scoped worker threads.
    ///
    /// Workers claim steps in document order from a shared counter. A hard
    /// failure raises the cancel flag; steps claimed after that are never
    /// started, while steps already running finish normally. When several
    /// steps fail, the lowest index is reported.
    fn run_parallel(
        &self,
        document: &WorkflowDocument,
        scope: &VariableScope,
        timeline: &mut ExecutionTimeline,
    ) -> (RunOutcome, Vec<StepRecord>) {
        let steps = &document.steps;
        let workers = self.max_workers.max(1).min(steps.len());
        let dispatcher: &dyn CommandDispatcher = &*self.dispatcher;

        info!("Running {} steps on {} workers", steps.len(), workers);

        let next = AtomicUsize::new(0);
        let cancelled = AtomicBool::new(false);
        let (tx, rx) = channel::<WorkerResult>();

        let mut slots: Vec<Option<StepRecord>> = vec![None; steps.len()];
        let mut failures: Vec<(usize, String)> = Vec::new();

        thread::scope(|s| {
            for _ in 0..workers {
                let tx = tx.clone();
                let next = &next;
                let cancelled = &cancelled;

                s.spawn(move || loop {
                    let index = next.fetch_add(1, Ordering::SeqCst);
                    if index >= steps.len() || cancelled.load(Ordering::SeqCst) {
                        break;
                    }

                    let started = Instant::now();
                    let outcome = execute_step(&steps[index], index, scope, false, dispatcher);
                    if outcome.is_hard_failure() {
                        cancelled.store(true, Ordering::SeqCst);
                    }

                    let result = WorkerResult {
                        index,
                        outcome,
                        started,
                        finished: Instant::now(),
                    };
                    if tx.send(result).is_err() {
                        break;
                    }
                });
            }

            // Only worker senders remain, so the loop ends when all workers exit
            drop(tx);

            for result in rx {
                let name = steps[result.index].display_name(result.index);
                let record = StepRecord::from_outcome(result.index, name.clone(), &result.outcome, false);

                timeline.add_event_at(result.index, name.clone(), EventType::Started, result.started);
                timeline.add_event_at(
                    result.index,
                    name.clone(),
                    EventType::Finished(record.status),
                    result.finished,
                );

                if result.outcome.is_hard_failure() {
                    if failures.is_empty() {
                        warn!("Step '{}' failed; not starting remaining steps", name);
                    }
                    failures.push((result.index, result.outcome.message.unwrap_or_default()));
                }

                slots[result.index] = Some(record);
            }
        });

        let records: Vec<StepRecord> = slots
            .into_iter()
            .enumerate()
            .map(|(index, slot)| {
                slot.unwrap_or_else(|| StepRecord::cancelled(index, steps[index].display_name(index)))
            })
            .collect();

        let cancelled_count = records
            .iter()
            .filter(|r| r.status == StepStatus::Cancelled)
            .count();
        if cancelled_count > 0 {
            info!("{} steps were not started", cancelled_count);
        }

        let outcome = match failures.into_iter().min_by_key(|(index, _)| *index) {
            Some((index, reason)) => RunOutcome::Aborted {
                index,
                step: steps[index].display_name(index),
                reason,
            },
            None => RunOutcome::Completed,
        };

        (outcome, records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::dispatcher::testing::RecordingDispatcher;
    use crate::workflow::StepSpec;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn engine(dispatcher: &Arc<RecordingDispatcher>) -> Engine {
        Engine::new(dispatcher.clone())
    }

    fn no_overrides() -> IndexMap<String, String> {
        IndexMap::new()
    }

    fn three_steps(parallel: bool) -> WorkflowDocument {
        WorkflowDocument::new("three")
            .with_parallel(parallel)
            .with_step(StepSpec::new("one"))
            .with_step(StepSpec::new("two"))
            .with_step(StepSpec::new("three"))
    }

    #[test]
    fn test_engine_defaults() {
        let dispatcher = Arc::new(RecordingDispatcher::new());
        let engine = engine(&dispatcher);
        assert!(!engine.dry_run);
        assert!(engine.max_workers >= 1);
        assert!(engine.globals.is_empty());
    }

    #[test]
    fn test_max_workers_has_floor() {
        let dispatcher = Arc::new(RecordingDispatcher::new());
        let mut engine = engine(&dispatcher);
        engine.set_max_workers(0);
        assert_eq!(engine.max_workers, 1);
    }

    #[test]
    fn test_sequential_completes_in_order() {
        let dispatcher = Arc::new(RecordingDispatcher::new());
        let report = engine(&dispatcher)
            .run_document(&three_steps(false), &no_overrides())
            .unwrap();

        assert_eq!(report.outcome, RunOutcome::Completed);
        assert_eq!(dispatcher.calls(), vec![vec!["one"], vec!["two"], vec!["three"]]);
        assert_eq!(report.count(StepStatus::Completed), 3);
        assert!(report.steps.iter().all(|s| s.duration_ms.is_some()));
    }

    #[test]
    fn test_sequential_aborts_at_failing_step() {
        let dispatcher = Arc::new(RecordingDispatcher::new().failing("two", 1));
        let report = engine(&dispatcher)
            .run_document(&three_steps(false), &no_overrides())
            .unwrap();

        assert_eq!(
            report.outcome,
            RunOutcome::Aborted {
                index: 1,
                step: "Step 2".to_string(),
                reason: "exit code 1: two failed".to_string(),
            }
        );
        assert_eq!(dispatcher.call_count(), 2);
        assert_eq!(report.steps[2].status, StepStatus::Cancelled);
        assert!(report.into_result().is_err());
    }

    #[test]
    fn test_continue_on_error_does_not_abort() {
        let dispatcher = Arc::new(RecordingDispatcher::new().failing("two", 1));
        let doc = WorkflowDocument::new("tolerant")
            .with_step(StepSpec::new("one"))
            .with_step(StepSpec::new("two").continue_on_error())
            .with_step(StepSpec::new("three"));

        let report = engine(&dispatcher).run_document(&doc, &no_overrides()).unwrap();

        assert_eq!(report.outcome, RunOutcome::Completed);
        assert_eq!(dispatcher.call_count(), 3);
        assert_eq!(report.steps[1].status, StepStatus::Warned);
        assert_eq!(
            report.steps[1].message.as_deref(),
            Some("warning: exit code 1: two failed")
        );
    }

    #[test]
    fn test_missing_command_aborts() {
        let dispatcher = Arc::new(RecordingDispatcher::new());
        let doc = WorkflowDocument::new("broken")
            .with_step(StepSpec::new("one"))
            .with_step(StepSpec::default().named("Empty"))
            .with_step(StepSpec::new("three"));

        let report = engine(&dispatcher).run_document(&doc, &no_overrides()).unwrap();

        match report.outcome {
            RunOutcome::Aborted { index, step, reason } => {
                assert_eq!(index, 1);
                assert_eq!(step, "Empty");
                assert_eq!(reason, "missing command");
            }
            other => panic!("unexpected outcome: {other}"),
        }
        assert_eq!(dispatcher.call_count(), 1);
    }

    #[test]
    fn test_skipped_steps_count_as_success() {
        let dispatcher = Arc::new(RecordingDispatcher::new());
        let doc = WorkflowDocument::new("conditional")
            .with_var("enabled", "No")
            .with_step(StepSpec::new("one").when("{enabled}"))
            .with_step(StepSpec::new("two"));

        let report = engine(&dispatcher).run_document(&doc, &no_overrides()).unwrap();

        assert_eq!(report.outcome, RunOutcome::Completed);
        assert_eq!(report.steps[0].status, StepStatus::Skipped);
        assert_eq!(dispatcher.calls(), vec![vec!["two"]]);
    }

    #[test]
    fn test_empty_workflow_completes_without_dispatch() {
        let dispatcher = Arc::new(RecordingDispatcher::new());
        let report = engine(&dispatcher)
            .run_document(&WorkflowDocument::new("empty"), &no_overrides())
            .unwrap();

        assert_eq!(report.outcome, RunOutcome::Completed);
        assert!(report.steps.is_empty());
        assert_eq!(dispatcher.call_count(), 0);
    }

    #[test]
    fn test_dry_run_dispatches_nothing() {
        let dispatcher = Arc::new(RecordingDispatcher::new());
        let mut engine = engine(&dispatcher);
        engine.set_dry_run(true);

        let doc = WorkflowDocument::new("photos")
            .with_parallel(true)
            .with_var("input", "shots/photo.jpg")
            .with_step(StepSpec::new("image convert {input} {input.stem}.png"))
            .with_step(StepSpec::default().named("Broken"))
            .with_step(StepSpec::new("image info ${input.name}"));

        let report = engine.run_document(&doc, &no_overrides()).unwrap();

        assert_eq!(report.outcome, RunOutcome::ValidatedOnly);
        assert!(!report.parallel);
        assert_eq!(dispatcher.call_count(), 0);
        assert_eq!(
            report.steps[0].command.as_deref(),
            Some("image convert shots/photo.jpg photo.png")
        );
        assert_eq!(report.steps[0].status, StepStatus::Validated);
        assert_eq!(report.steps[1].status, StepStatus::Failed);
        assert_eq!(report.steps[2].command.as_deref(), Some("image info photo.jpg"));
    }

    #[test]
    fn test_dry_run_empty_workflow() {
        let dispatcher = Arc::new(RecordingDispatcher::new());
        let mut engine = engine(&dispatcher);
        engine.set_dry_run(true);

        let report = engine
            .run_document(&WorkflowDocument::new("empty"), &no_overrides())
            .unwrap();
        assert_eq!(report.outcome, RunOutcome::ValidatedOnly);
    }

    #[test]
    fn test_scope_precedence() {
        let dispatcher = Arc::new(RecordingDispatcher::new());
        let mut engine = engine(&dispatcher);

        let mut globals = IndexMap::new();
        globals.insert("a".to_string(), "global".to_string());
        globals.insert("b".to_string(), "global".to_string());
        globals.insert("c".to_string(), "global".to_string());
        engine.set_globals(globals);

        let doc = WorkflowDocument::new("layers")
            .with_var("b", "doc")
            .with_var("c", "doc")
            .with_step(StepSpec::new("show {a} {b} {c}"));

        let mut overrides = IndexMap::new();
        overrides.insert("c".to_string(), "cli".to_string());

        engine.run_document(&doc, &overrides).unwrap();
        assert_eq!(dispatcher.calls(), vec![vec!["show", "global", "doc", "cli"]]);
    }

    #[test]
    fn test_register_binds_output_for_later_steps() {
        let dispatcher = Arc::new(RecordingDispatcher::new().printing("whoami", "alice\n"));
        let doc = WorkflowDocument::new("capture")
            .with_step(StepSpec::new("greet {user}"))
            .with_step(StepSpec::new("whoami").register("user"))
            .with_step(StepSpec::new("greet {user}"));

        engine(&dispatcher).run_document(&doc, &no_overrides()).unwrap();

        let calls = dispatcher.calls();
        assert_eq!(calls[0], vec!["greet", "{user}"]);
        assert_eq!(calls[2], vec!["greet", "alice"]);
    }

    #[test]
    fn test_register_rejected_in_parallel() {
        let dispatcher = Arc::new(RecordingDispatcher::new());
        let doc = three_steps(true).with_step(StepSpec::new("whoami").register("user"));

        let err = engine(&dispatcher).run_document(&doc, &no_overrides()).unwrap_err();
        assert!(err.is_document_error());
        assert_eq!(dispatcher.call_count(), 0);
    }

    #[test]
    fn test_parallel_runs_all_steps() {
        let dispatcher = Arc::new(RecordingDispatcher::new().rendezvous(3));
        let mut engine = engine(&dispatcher);
        engine.set_max_workers(3);

        let report = engine.run_document(&three_steps(true), &no_overrides()).unwrap();

        assert_eq!(report.outcome, RunOutcome::Completed);
        assert!(report.parallel);
        assert_eq!(dispatcher.call_count(), 3);
        assert_eq!(report.count(StepStatus::Completed), 3);
        let names: Vec<&str> = report.steps.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Step 1", "Step 2", "Step 3"]);
    }

    #[test]
    fn test_parallel_failure_keeps_started_steps() {
        let dispatcher = Arc::new(RecordingDispatcher::new().failing("two", 1).rendezvous(3));
        let mut engine = engine(&dispatcher);
        engine.set_max_workers(3);

        let report = engine.run_document(&three_steps(true), &no_overrides()).unwrap();

        assert!(matches!(report.outcome, RunOutcome::Aborted { index: 1, .. }));
        assert_eq!(dispatcher.call_count(), 3);
        assert_eq!(report.steps[0].status, StepStatus::Completed);
        assert_eq!(report.steps[1].status, StepStatus::Failed);
        assert_eq!(report.steps[2].status, StepStatus::Completed);
    }

    #[test]
    fn test_parallel_failure_cancels_queued_steps() {
        let dispatcher = Arc::new(RecordingDispatcher::new().failing("two", 1));
        let mut engine = engine(&dispatcher);
        engine.set_max_workers(1);

        let report = engine.run_document(&three_steps(true), &no_overrides()).unwrap();

        assert!(matches!(report.outcome, RunOutcome::Aborted { index: 1, .. }));
        assert_eq!(dispatcher.calls(), vec![vec!["one"], vec!["two"]]);
        assert_eq!(report.steps[0].status, StepStatus::Completed);
        assert_eq!(report.steps[2].status, StepStatus::Cancelled);
    }

    #[test]
    fn test_parallel_reports_lowest_failing_index() {
        let dispatcher = Arc::new(
            RecordingDispatcher::new()
                .failing("two", 1)
                .failing("three", 2)
                .rendezvous(3),
        );
        let mut engine = engine(&dispatcher);
        engine.set_max_workers(3);

        let report = engine.run_document(&three_steps(true), &no_overrides()).unwrap();

        assert_eq!(
            report.outcome,
            RunOutcome::Aborted {
                index: 1,
                step: "Step 2".to_string(),
                reason: "exit code 1: two failed".to_string(),
            }
        );
        assert_eq!(report.count(StepStatus::Failed), 2);
    }

    #[test]
    fn test_parallel_tolerated_failure_does_not_abort() {
        let dispatcher = Arc::new(RecordingDispatcher::new().failing("two", 1));
        let mut engine = engine(&dispatcher);
        engine.set_max_workers(1);

        let doc = WorkflowDocument::new("tolerant")
            .with_parallel(true)
            .with_step(StepSpec::new("one"))
            .with_step(StepSpec::new("two").continue_on_error())
            .with_step(StepSpec::new("three"));

        let report = engine.run_document(&doc, &no_overrides()).unwrap();
        assert_eq!(report.outcome, RunOutcome::Completed);
        assert_eq!(dispatcher.call_count(), 3);
    }

    #[test]
    fn test_run_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            "name: File\nvars:\n  input: a.jpg\nsteps:\n  - command: image info {{input}}\n"
        )
        .unwrap();

        let dispatcher = Arc::new(RecordingDispatcher::new());
        let report = engine(&dispatcher).run(file.path(), &no_overrides()).unwrap();

        assert_eq!(report.workflow, "File");
        assert_eq!(dispatcher.calls(), vec![vec!["image", "info", "a.jpg"]]);
    }

    #[test]
    fn test_document_error_runs_nothing() {
        let dispatcher = Arc::new(RecordingDispatcher::new());
        let err = engine(&dispatcher)
            .run("/nonexistent/workflow.yaml", &no_overrides())
            .unwrap_err();

        assert!(err.is_document_error());
        assert_eq!(dispatcher.call_count(), 0);
    }
}
