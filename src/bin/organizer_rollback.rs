//! organizer-rollback - restore a collection to its original snapshot layout.
//!
//! Validates that `structure-originale.json` exists under
//! `<path>/.audio-organizer/`, then non-destructively moves current top-level
//! entries back into the locations recorded in the snapshot, creating missing
//! directories and preserving mtimes. Exit code 0 on success, non-zero on any
//! fatal precondition failure.

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;

use packflow_rs::organize::rollback::rollback_from_snapshot;

/// Restore a collection to the layout recorded in its original snapshot
#[derive(Parser)]
#[command(name = "organizer-rollback")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    /// Collection directory previously organized
    pub path: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .init();

    match rollback_from_snapshot(&cli.path) {
        Ok(report) => {
            println!(
                "restored {} entr(ies); {} already in place; {} empty director(ies) removed",
                report.restored, report.already_in_place, report.removed_directories
            );
            for name in &report.missing {
                eprintln!("warning: '{name}' recorded in the snapshot was not found");
            }
            if let Some(log) = &report.log_path {
                println!("log: {}", log.display());
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
