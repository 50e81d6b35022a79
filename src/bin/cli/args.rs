//! CLI argument structures and configuration.

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Taxonomy-driven organizer for audio sample pack collections
#[derive(Parser)]
#[command(name = "packflow")]
#[command(version = VERSION)]
#[command(about = "Packflow - organize audio sample pack collections")]
#[command(long_about = "
Detect packs and bundles in a sample collection, de-duplicate files, and
reorganize everything into a clean, taxonomically consistent tree with backup
and rollback.

Common Usage:

  # Inspect a collection without touching it
  packflow scan ~/Samples

  # Run the full six-phase pipeline interactively
  packflow organize ~/Samples

  # Simulate without mutating anything
  packflow organize --dry-run ~/Samples

  # Undo a reorganization from the original snapshot
  packflow rollback ~/Samples
")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging for debugging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the full organization pipeline on a collection
    Organize(OrganizeArgs),

    /// Scan a collection and print the detection report (read-only)
    Scan(ScanArgs),

    /// Restore the layout recorded in the original snapshot
    Rollback(RollbackArgs),

    /// Print default configuration in YAML format
    #[command(name = "print-default-config")]
    PrintDefaultConfig,

    /// Initialize a configuration file with defaults
    #[command(name = "init-config")]
    InitConfig(InitConfigArgs),

    /// Validate a configuration file
    #[command(name = "validate-config")]
    ValidateConfig(ValidateConfigArgs),
}

#[derive(Args)]
pub struct OrganizeArgs {
    /// Source directory holding the sample collection
    pub path: PathBuf,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Simulate every operation without mutating the filesystem
    #[arg(long)]
    pub dry_run: bool,

    /// Skip the safety backup before execution (not recommended)
    #[arg(long)]
    pub no_backup: bool,

    /// Answer every checkpoint with its default instead of prompting
    #[arg(short = 'y', long)]
    pub yes: bool,

    /// Output format for the final report
    #[arg(short, long, value_enum, default_value = "pretty")]
    pub format: OutputFormat,
}

#[derive(Args)]
pub struct ScanArgs {
    /// Source directory holding the sample collection
    pub path: PathBuf,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Output format for the detection report
    #[arg(short, long, value_enum, default_value = "pretty")]
    pub format: OutputFormat,
}

#[derive(Args)]
pub struct RollbackArgs {
    /// Source directory previously organized by packflow
    pub path: PathBuf,
}

#[derive(Args)]
pub struct InitConfigArgs {
    /// Output configuration file name
    #[arg(short, long, default_value = ".packflow.yml")]
    pub output: PathBuf,

    /// Overwrite an existing configuration file
    #[arg(short, long)]
    pub force: bool,
}

#[derive(Args)]
pub struct ValidateConfigArgs {
    /// Path to the configuration file to validate
    #[arg(short, long, required = true)]
    pub config: PathBuf,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable console output
    Pretty,
    /// JSON output
    Json,
    /// Markdown report
    Markdown,
}
