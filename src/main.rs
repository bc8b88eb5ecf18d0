//! ToolFlow CLI Entry Point
//!
//! Provides command-line interface for workflow execution.
//!
//! # Usage
//!
//! ```bash
//! # Execute a workflow
//! toolflow thumbnails.yaml
//!
//! # Override workflow variables
//! toolflow thumbnails.yaml --var input=holiday.jpg --var resize=no
//!
//! # Dry run mode (resolve commands, run nothing)
//! toolflow thumbnails.yaml --dry-run
//!
//! # Run every step through a host program
//! toolflow thumbnails.yaml --program toolbox --workers 8
//! ```

use std::env;
use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use colored::Colorize;
use log::{error, info};

use toolflow::config::GlobalConfig;
use toolflow::execution::{Engine, ProcessDispatcher, RunOutcome, RunReport};
use toolflow::monitoring::StepStatus;
use toolflow::workflow::parse_overrides;
use toolflow::{APP_NAME, VERSION};

/// Default workflow file used when none is specified.
const DEFAULT_WORKFLOW: &str = "workflow.yaml";

/// Command-line options parsed from arguments.
#[derive(Debug)]
struct Options {
    workflow_path: String,
    vars: Vec<String>,
    dry_run: bool,
    workers: Option<usize>,
    program: Option<String>,
    working_dir: Option<PathBuf>,
    config_path: Option<PathBuf>,
    report_path: Option<PathBuf>,
    verbose: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            workflow_path: DEFAULT_WORKFLOW.to_string(),
            vars: Vec::new(),
            dry_run: false,
            workers: None,
            program: None,
            working_dir: None,
            config_path: None,
            report_path: None,
            verbose: false,
        }
    }
}

/// Configures the logging system with appropriate formatting.
fn setup_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format(|buf, record| {
            use std::io::Write;

            match record.level() {
                log::Level::Warn | log::Level::Error => {
                    writeln!(buf, "[{}] {}", record.level(), record.args())
                }
                _ => writeln!(buf, "{}", record.args()),
            }
        })
        .init();
}

/// Prints the application banner with version information.
fn print_banner() {
    println!();
    println!("{} v{}", APP_NAME, VERSION);
    println!("Declarative Workflow Runner");
    println!();
}

/// Prints usage information.
fn print_usage() {
    println!("Usage: toolflow [OPTIONS] <WORKFLOW_FILE>");
    println!();
    println!("Arguments:");
    println!("  <WORKFLOW_FILE>       Path to workflow YAML file (default: {})", DEFAULT_WORKFLOW);
    println!();
    println!("Options:");
    println!("  -v, --var KEY=VALUE   Override a workflow variable (repeatable)");
    println!("  --dry-run             Resolve and print commands without running them");
    println!("  --workers N           Maximum parallel steps (default: CPU count)");
    println!("  --program NAME        Host program that receives each step's arguments");
    println!("  --working-dir PATH    Working directory for step commands");
    println!("  --config PATH         Global configuration file");
    println!("  --report PATH         Write a JSON run report");
    println!("  --verbose             Enable debug logging");
    println!("  -h, --help            Show this help message");
    println!("  -V, --version         Show version information");
    println!();
    println!("Examples:");
    println!("  toolflow thumbnails.yaml");
    println!("  toolflow thumbnails.yaml --var input=holiday.jpg --dry-run");
    println!("  toolflow thumbnails.yaml --program toolbox --workers 8");
}

/// Returns the value following an option, advancing the cursor.
fn option_value<'a>(args: &'a [String], i: &mut usize, option: &str) -> Result<&'a str, String> {
    *i += 1;
    args.get(*i)
        .map(String::as_str)
        .ok_or_else(|| format!("{} requires a value", option))
}

/// Parses command-line arguments into an Options struct.
fn parse_arguments(args: &[String]) -> Result<Options, String> {
    let mut options = Options::default();
    let mut positional_index = 0;
    let mut i = 1; // Skip program name

    while i < args.len() {
        let arg = &args[i];

        match arg.as_str() {
            "--help" | "-h" => {
                print_usage();
                std::process::exit(0);
            }
            "--version" | "-V" => {
                println!("{} {}", APP_NAME, VERSION);
                std::process::exit(0);
            }
            "--dry-run" => options.dry_run = true,
            "--verbose" => options.verbose = true,
            "--var" | "-v" => {
                let pair = option_value(args, &mut i, "--var")?;
                options.vars.push(pair.to_string());
            }
            "--workers" => {
                let value = option_value(args, &mut i, "--workers")?;
                let workers: usize = value
                    .parse()
                    .map_err(|_| format!("Invalid workers value: {}", value))?;
                if workers == 0 {
                    return Err("--workers must be at least 1".to_string());
                }
                options.workers = Some(workers);
            }
            "--program" => {
                options.program = Some(option_value(args, &mut i, "--program")?.to_string());
            }
            "--working-dir" => {
                options.working_dir = Some(PathBuf::from(option_value(args, &mut i, "--working-dir")?));
            }
            "--config" => {
                options.config_path = Some(PathBuf::from(option_value(args, &mut i, "--config")?));
            }
            "--report" => {
                options.report_path = Some(PathBuf::from(option_value(args, &mut i, "--report")?));
            }
            arg if arg.starts_with('-') => {
                return Err(format!("Unknown option: {}", arg));
            }
            _ => {
                match positional_index {
                    0 => options.workflow_path = arg.clone(),
                    _ => return Err(format!("Unexpected argument: {}", arg)),
                }
                positional_index += 1;
            }
        }
        i += 1;
    }

    Ok(options)
}

/// Checks that the working directory exists and is a directory.
fn check_working_directory(dir: &Path) -> Result<(), Box<dyn Error>> {
    if !dir.exists() {
        return Err(format!("Working directory does not exist: {}", dir.display()).into());
    }

    if !dir.is_dir() {
        return Err(format!("Path is not a directory: {}", dir.display()).into());
    }

    info!("Working directory: {}", dir.display());
    Ok(())
}

/// Prints the terminal state of the run.
fn print_summary(report: &RunReport) {
    println!();

    match &report.outcome {
        RunOutcome::Completed => {
            println!(
                "{} Workflow '{}' completed ({} completed, {} skipped, {} warnings) in {} ms",
                "✓".green().bold(),
                report.workflow.bold(),
                report.count(StepStatus::Completed),
                report.count(StepStatus::Skipped),
                report.count(StepStatus::Warned),
                report.elapsed_ms
            );
        }
        RunOutcome::Aborted { .. } => {
            println!(
                "{} Workflow '{}' {}",
                "✗".red().bold(),
                report.workflow.bold(),
                report.outcome.to_string().red()
            );
            let cancelled = report.count(StepStatus::Cancelled);
            if cancelled > 0 {
                println!("  {} steps were not started", cancelled);
            }
        }
        RunOutcome::ValidatedOnly => {
            println!(
                "{} Workflow '{}' validated: {} steps, nothing executed",
                "[DRY RUN]".yellow().bold(),
                report.workflow.bold(),
                report.steps.len()
            );
            for step in &report.steps {
                let detail = match step.status {
                    StepStatus::Skipped => step.message.clone().unwrap_or_default().dimmed().to_string(),
                    StepStatus::Failed => step.message.clone().unwrap_or_default().red().to_string(),
                    _ => step.command.clone().unwrap_or_default(),
                };
                println!("  #{} {}: {}", step.index + 1, step.name, detail);
            }
            return;
        }
    }

    for step in report.problems().filter(|s| s.status == StepStatus::Warned) {
        println!(
            "  {} {}: {}",
            "!".yellow(),
            step.name,
            step.message.as_deref().unwrap_or_default()
        );
    }
}

/// Main application entry point.
fn run() -> Result<ExitCode, Box<dyn Error>> {
    let args: Vec<String> = env::args().collect();

    let options = parse_arguments(&args).map_err(|e| {
        eprintln!("Error: {}", e);
        eprintln!();
        print_usage();
        e
    })?;

    setup_logging(options.verbose);
    print_banner();

    let config = match &options.config_path {
        Some(path) => GlobalConfig::load_from(path)?,
        None => GlobalConfig::load(),
    };

    if options.dry_run {
        info!("Mode: DRY RUN (commands will not execute)");
        println!();
    }

    let mut dispatcher = ProcessDispatcher::new();
    if let Some(program) = options.program.or(config.program) {
        info!("Dispatching steps through: {}", program);
        dispatcher = dispatcher.with_program(program);
    }
    if let Some(dir) = options.working_dir.or(config.working_dir) {
        check_working_directory(&dir)?;
        dispatcher = dispatcher.with_working_dir(dir);
    }

    let mut engine = Engine::new(Arc::new(dispatcher));
    engine.set_globals(config.vars);
    engine.set_dry_run(options.dry_run);
    if let Some(workers) = options.workers.or(config.max_workers) {
        engine.set_max_workers(workers);
    }

    let overrides = parse_overrides(&options.vars);

    let report = engine.run(&options.workflow_path, &overrides).map_err(|e| {
        error!("Failed to run workflow: {}", e);
        e
    })?;

    if let Some(path) = &options.report_path {
        fs::write(path, report.to_json()?)?;
        info!("Wrote run report to {}", path.display());
    }

    print_summary(&report);

    Ok(if report.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(e) => {
            eprintln!();
            eprintln!("{} {}", "Error:".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}
