mod cli;
mod config;
mod engine;
mod error;
mod io;
mod orchestrator;
mod ui;

use std::path::Path;

use anyhow::Result;
use clap::Parser;

use cli::{Cli, Command};
use config::StepConfig;
use engine::{Decision, StepStatus};
use error::{ChunkstepError, Fault};
use io::{LineFileReader, LineFileWriter, PassThrough, PoisonWriter, VecReader};
use orchestrator::StepOrchestrator;
use ui::StepProgress;

/// Policy bounds given on the command line, taking precedence over the
/// configuration file.
struct Overrides {
    chunk_size: Option<usize>,
    max_attempts: Option<u32>,
    skip_limit: Option<u32>,
}

impl Overrides {
    fn apply(&self, config: &mut StepConfig) {
        if let Some(n) = self.chunk_size {
            config.chunk_size = n;
        }
        if let Some(n) = self.max_attempts {
            config.max_attempts = n;
        }
        if let Some(n) = self.skip_limit {
            config.skip_limit = n;
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let overrides = Overrides {
        chunk_size: cli.chunk_size,
        max_attempts: cli.max_attempts,
        skip_limit: cli.skip_limit,
    };

    match cli.command {
        Command::Run {
            input,
            output,
            config,
            json,
        } => run_file_step(
            &input,
            &output,
            config.as_deref(),
            json,
            &overrides,
            cli.verbose,
        ),
        Command::Demo => run_demo(&overrides),
    }
}

fn run_file_step(
    input: &Path,
    output: &Path,
    config_path: Option<&Path>,
    json: bool,
    overrides: &Overrides,
    verbose: bool,
) -> Result<()> {
    let mut config = match config_path {
        Some(path) => StepConfig::load_from(path)?,
        None => StepConfig::load()?,
    };
    overrides.apply(&mut config);
    config.validate()?;

    let reader = LineFileReader::open(input)?;
    let writer = LineFileWriter::create(output)?;

    let progress = StepProgress::start(&input.display().to_string());
    let execution =
        StepOrchestrator::new(reader, PassThrough, writer, config.policies()).execute();
    progress.complete(&execution);
    if json || verbose {
        progress.print_execution(&execution);
    }

    match execution.status {
        StepStatus::Completed => Ok(()),
        StepStatus::Failed => {
            let fault = execution
                .last_fault
                .clone()
                .unwrap_or_else(|| Fault::new("step.failed", "step ended in FAILED state"));
            Err(ChunkstepError::StepFailed(fault).into())
        }
    }
}

/// In-memory demonstration: a poison record in the second chunk is retried,
/// then isolated and skipped by the recovery scanner.
fn run_demo(overrides: &Overrides) -> Result<()> {
    let items: Vec<String> = (1..=8).map(|n| format!("record-{n:02}")).collect();
    let poison = vec!["record-05".to_string()];

    let mut config = StepConfig {
        chunk_size: 3,
        max_attempts: 2,
        skip_limit: 2,
        ..Default::default()
    };
    config
        .rules
        .insert("demo.poison".to_string(), Decision::Skippable);
    overrides.apply(&mut config);
    config.validate()?;

    let reader = VecReader::new(items);
    let writer = PoisonWriter::new(poison, Fault::new("demo.poison", "simulated poison record"));

    let progress = StepProgress::start("built-in demo (8 records, 1 poison)");
    let execution =
        StepOrchestrator::new(reader, PassThrough, writer, config.policies()).execute();
    progress.complete(&execution);
    progress.print_execution(&execution);
    Ok(())
}
