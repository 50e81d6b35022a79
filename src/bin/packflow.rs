//! Packflow CLI - taxonomy-driven audio sample pack organizer.

use clap::Parser;

mod cli;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing/logging
    let log_level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .init();

    // Execute command
    match cli.command {
        Commands::Organize(args) => {
            cli::organize_command(args).await?;
        }
        Commands::Scan(args) => {
            cli::scan_command(args).await?;
        }
        Commands::Rollback(args) => {
            cli::rollback_command(args).await?;
        }
        Commands::PrintDefaultConfig => {
            cli::print_default_config().await?;
        }
        Commands::InitConfig(args) => {
            cli::init_config(args).await?;
        }
        Commands::ValidateConfig(args) => {
            cli::validate_config(args).await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cli::args::OutputFormat;
    use std::path::PathBuf;

    #[test]
    fn test_cli_parsing_scan() {
        let cli = Cli::parse_from(["packflow", "scan", "/music"]);
        assert!(!cli.verbose);
        match cli.command {
            Commands::Scan(args) => {
                assert_eq!(args.path, PathBuf::from("/music"));
                assert!(matches!(args.format, OutputFormat::Pretty));
            }
            _ => panic!("expected scan command"),
        }
    }

    #[test]
    fn test_cli_parsing_organize_flags() {
        let cli = Cli::parse_from(["packflow", "organize", "--dry-run", "-y", "/music"]);
        match cli.command {
            Commands::Organize(args) => {
                assert!(args.dry_run);
                assert!(args.yes);
                assert!(!args.no_backup);
            }
            _ => panic!("expected organize command"),
        }
    }

    #[test]
    fn test_cli_parsing_rollback() {
        let cli = Cli::parse_from(["packflow", "rollback", "/music"]);
        match cli.command {
            Commands::Rollback(args) => {
                assert_eq!(args.path, PathBuf::from("/music"));
            }
            _ => panic!("expected rollback command"),
        }
    }
}
