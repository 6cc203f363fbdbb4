//! clap-based command line interface.
//!
//! Defines the [`Cli`] struct with subcommands [`Command`] (run, demo) and
//! global flags overriding the configured policy bounds
//! (--chunk-size, --max-attempts, --skip-limit, --verbose).

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// chunkstep — fault-tolerant chunk-oriented batch step runner.
#[derive(Debug, Parser)]
#[command(name = "chunkstep", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Maximum number of items per chunk.
    #[arg(long, global = true)]
    pub chunk_size: Option<usize>,

    /// Total whole-chunk commit attempts (1 = no retry).
    #[arg(long, global = true)]
    pub max_attempts: Option<u32>,

    /// Maximum items skipped per run (0 = skip disabled).
    #[arg(long, global = true)]
    pub skip_limit: Option<u32>,

    /// Enable verbose output.
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run a step over a line-oriented input file.
    Run {
        /// Input file, one item per line.
        input: PathBuf,

        /// Output file receiving the committed items.
        #[arg(long, short)]
        output: PathBuf,

        /// Path to a TOML step configuration file.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Print the full execution record as JSON when the run ends.
        #[arg(long)]
        json: bool,
    },

    /// Run the built-in skip-and-recover demonstration.
    Demo,
}
