//! CLI implementation using clap.

mod commands;

pub use commands::execute;

use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};

use crate::mutation::MutationStatus;

/// Mutiny - Mutation testing for Python projects.
#[derive(Parser)]
#[command(name = "mutiny")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Project directory; commands run from here
    #[arg(short, long, default_value = ".")]
    pub path: PathBuf,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub format: OutputFormat,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Enable verbose output (repeat for more)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Generate mutants and run the tests against each of them
    Run(RunArgs),

    /// List mutants that were not killed, grouped by file
    Results,

    /// Print the ids of all mutants with a given status
    ResultIds(ResultIdsArgs),

    /// Write a mutant to disk
    Apply(ApplyArgs),

    /// Show the diff of a mutant
    Show(ShowArgs),
}

#[derive(Args, Default)]
pub struct RunArgs {
    /// A mutant id to rerun, or a file to restrict the run to
    pub argument: Option<String>,

    /// Files and directories to mutate (comma or colon separated)
    #[arg(long)]
    pub paths_to_mutate: Option<String>,

    /// Mutation types to leave out (comma separated)
    #[arg(long, conflicts_with = "enable_mutation_types")]
    pub disable_mutation_types: Option<String>,

    /// Only apply these mutation types (comma separated)
    #[arg(long)]
    pub enable_mutation_types: Option<String>,

    /// Glob patterns of files and directories to skip (comma separated)
    #[arg(long)]
    pub paths_to_exclude: Option<String>,

    /// Test command
    #[arg(long)]
    pub runner: Option<String>,

    /// Only mutate lines executed according to a coverage.py JSON report
    #[arg(
        long,
        num_args = 0..=1,
        default_missing_value = "coverage.json",
        conflicts_with = "use_patch_file"
    )]
    pub use_coverage: Option<PathBuf>,

    /// Only mutate lines added by a unified diff
    #[arg(long)]
    pub use_patch_file: Option<PathBuf>,

    /// Rerun survivors with the full test command when a hook narrowed it
    #[arg(long)]
    pub rerun_all: bool,

    /// Directories holding the tests (comma or colon separated)
    #[arg(long)]
    pub tests_dir: Option<String>,

    /// Survivors slower than this multiple of the baseline are suspicious
    #[arg(short = 'm', long)]
    pub test_time_multiplier: Option<f64>,

    /// Seconds added to the suspicious threshold
    #[arg(short = 'b', long)]
    pub test_time_base: Option<f64>,

    /// Show test output instead of capturing it
    #[arg(short = 's', long)]
    pub swallow_output: bool,

    /// Extra callee names treated like `dict(...)` (comma separated)
    #[arg(long)]
    pub dict_synonyms: Option<String>,

    /// Shell command run before each mutant
    #[arg(long)]
    pub pre_mutation: Option<String>,

    /// Shell command run after each mutant
    #[arg(long)]
    pub post_mutation: Option<String>,

    /// Plain words instead of emoji in the progress line
    #[arg(long)]
    pub simple_output: bool,

    /// Don't show the progress line
    #[arg(long)]
    pub no_progress: bool,

    /// Only report fatal errors through the exit code
    #[arg(long, alias = "CI")]
    pub ci: bool,

    /// Number of checker threads
    #[arg(long)]
    pub max_workers: Option<usize>,

    /// Fixed per-mutant timeout in seconds
    #[arg(long)]
    pub timeout: Option<f64>,
}

#[derive(Args)]
pub struct ResultIdsArgs {
    /// One of: killed, timeout, suspicious, survived, skipped, untested
    pub status: MutationStatus,
}

#[derive(Args)]
pub struct ApplyArgs {
    /// Mutant id, as listed by `results`
    pub id: i64,

    /// Keep a copy of the original file next to it as `<file>.bak`
    #[arg(long)]
    pub backup: bool,
}

#[derive(Args)]
pub struct ShowArgs {
    /// Mutant id, a file name, or `all`; lists results when omitted
    pub id_or_file: Option<String>,
}

#[derive(Clone, Copy, Debug, Default, ValueEnum, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    #[default]
    Text,
}
