//! CLI command implementations.

use anyhow::{bail, Context};
use console::style;
use dialoguer::{theme::ColorfulTheme, Confirm, Input, Select};
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use packflow_rs::core::config::OrganizerConfig;
use packflow_rs::core::pipeline::{PendingInteraction, Phase, PhaseStatus};
use packflow_rs::core::snapshot::SnapshotBuilder;
use packflow_rs::core::taxonomy::TaxonomyRegistry;
use packflow_rs::detectors::packs::PackDetector;
use packflow_rs::io::reports::write_run_reports;
use packflow_rs::{OrganizerEngine, PipelineEvent};

use super::args::{
    InitConfigArgs, OrganizeArgs, OutputFormat, RollbackArgs, ScanArgs, ValidateConfigArgs,
};
use super::output;

fn load_config(path: Option<&Path>) -> anyhow::Result<OrganizerConfig> {
    if let Some(path) = path {
        return OrganizerConfig::from_yaml_file(path)
            .with_context(|| format!("loading configuration from {}", path.display()));
    }
    // Unnamed: current directory, then the home directory.
    let mut candidates = vec![PathBuf::from(packflow_rs::core::config::CONFIG_FILE_NAME)];
    if let Some(home) = dirs::home_dir() {
        candidates.push(home.join(packflow_rs::core::config::CONFIG_FILE_NAME));
    }
    for candidate in candidates {
        if candidate.is_file() {
            return OrganizerConfig::from_yaml_file(&candidate)
                .with_context(|| format!("loading configuration from {}", candidate.display()));
        }
    }
    Ok(OrganizerConfig::default())
}

/// `packflow organize <path>` — run the six-phase pipeline interactively.
pub async fn organize_command(args: OrganizeArgs) -> anyhow::Result<()> {
    let mut config = load_config(args.config.as_deref())?;
    config.executor.dry_run = args.dry_run;
    if args.no_backup {
        config.executor.create_backup = false;
    }

    let mut engine = OrganizerEngine::new(&args.path, config)?;
    engine.initialize()?;

    // Progress bar fed from the event stream.
    let mut events = engine.subscribe();
    let bar = ProgressBar::new(100);
    bar.set_style(
        ProgressStyle::with_template("{spinner:.green} [{bar:30.cyan/blue}] {percent:>3}% {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    bar.enable_steady_tick(Duration::from_millis(120));
    let render = tokio::spawn({
        let bar = bar.clone();
        async move {
            while let Ok(event) = events.recv().await {
                if let PipelineEvent::PhaseProgress {
                    phase,
                    progress,
                    message,
                } = event
                {
                    bar.set_position(progress as u64);
                    bar.set_message(format!("[{phase}] {message}"));
                }
            }
        }
    });

    for phase in Phase::ALL {
        bar.set_position(0);
        bar.set_message(format!("[{phase}] starting"));

        let mut outcome = engine.execute_phase(phase.index()).await?;
        while outcome.status == PhaseStatus::AwaitingUser {
            let pending = outcome
                .pending
                .clone()
                .context("suspended phase carries no pending state")?;
            bar.suspend(|| debug!("checkpoint reached in phase {phase}"));
            let choice = bar.suspend(|| prompt_for_checkpoint(&pending, args.yes))?;
            outcome = engine
                .continue_phase(phase.index(), pending.resume_from_step, choice)
                .await?;
        }
    }

    bar.finish_and_clear();
    render.abort();

    let state = engine.get_state().clone();
    let (json_path, md_path) = write_run_reports(&args.path, &state)?;

    match args.format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&engine.run_summary())?);
        }
        _ => {
            output::print_summary(&engine.run_summary());
            println!();
            println!(
                "reports: {} / {}",
                style(json_path.display()).dim(),
                style(md_path.display()).dim()
            );
        }
    }
    Ok(())
}

/// Resolve one user-action checkpoint, either interactively or with
/// defaults under `--yes`.
fn prompt_for_checkpoint(
    pending: &PendingInteraction,
    assume_yes: bool,
) -> anyhow::Result<serde_json::Value> {
    println!();
    println!("{} {}", style("?").yellow().bold(), style(&pending.message).bold());

    match pending.phase {
        Phase::Preparation => {
            if assume_yes {
                return Ok(json!({ "approve": true }));
            }
            let approve = Confirm::with_theme(&ColorfulTheme::default())
                .with_prompt("apply the proposed cleanup?")
                .default(true)
                .interact()?;
            Ok(json!({ "approve": approve }))
        }
        Phase::Discovery => {
            if assume_yes {
                return Ok(json!({ "strategy": "keep-all" }));
            }
            let strategies = ["keep-all", "auto-remove", "manual-review"];
            let picked = Select::with_theme(&ColorfulTheme::default())
                .with_prompt("duplicate strategy")
                .items(&strategies)
                .default(0)
                .interact()?;
            Ok(json!({ "strategy": strategies[picked] }))
        }
        Phase::Classification => {
            if let Some(quarantined) = pending.payload.get("quarantined") {
                let parsed: Vec<packflow_rs::core::pipeline::QuarantinedPack> =
                    serde_json::from_value(quarantined.clone()).unwrap_or_default();
                output::print_quarantine(&parsed);
            }
            if assume_yes {
                return Ok(json!({ "keep": [] }));
            }
            let ids: String = Input::with_theme(&ColorfulTheme::default())
                .with_prompt("pack ids to rescue (comma-separated, empty keeps none)")
                .allow_empty(true)
                .interact_text()?;
            let keep: Vec<String> = ids
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
            Ok(json!({ "keep": keep }))
        }
        Phase::Matrix => {
            let proposals: Vec<packflow_rs::detectors::structure::StructureProposal> = pending
                .payload
                .get("proposals")
                .cloned()
                .map(serde_json::from_value)
                .transpose()?
                .unwrap_or_default();
            output::print_proposals(&proposals);
            if assume_yes || proposals.is_empty() {
                return Ok(json!({}));
            }
            let labels: Vec<String> = proposals
                .iter()
                .map(|p| {
                    if p.recommended {
                        format!("{} (recommended)", p.name)
                    } else {
                        p.name.clone()
                    }
                })
                .collect();
            let default = proposals.iter().position(|p| p.recommended).unwrap_or(0);
            let picked = Select::with_theme(&ColorfulTheme::default())
                .with_prompt("target structure")
                .items(&labels)
                .default(default)
                .interact()?;
            Ok(json!({ "proposalId": proposals[picked].id }))
        }
        _ => Ok(json!({})),
    }
}

/// `packflow scan <path>` — detection report without any mutation.
pub async fn scan_command(args: ScanArgs) -> anyhow::Result<()> {
    let config = load_config(args.config.as_deref())?;
    config.validate()?;

    let taxonomy = std::sync::Arc::new(TaxonomyRegistry::load());
    let builder = SnapshotBuilder::new(config.snapshot.clone())?;
    let (snapshot, stats) = builder.build(&args.path)?;

    let detector = PackDetector::new(taxonomy.clone(), config.detector.clone());
    let report = detector.detect(&snapshot);

    let indexer = packflow_rs::detectors::duplicates::DuplicateIndexer::new(config.duplicates);
    let duplicates = indexer.index(&snapshot);

    match args.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string_pretty(&json!({
                    "stats": stats,
                    "detection": report,
                    "duplicates": duplicates,
                }))?
            );
        }
        _ => {
            println!(
                "scanned {} files in {} directories ({} audio, {} presets)",
                stats.files, stats.directories, stats.audio_files, stats.preset_files
            );
            output::print_detection_report(&report);
            println!();
            output::print_duplicates(&duplicates);
        }
    }
    Ok(())
}

/// `packflow rollback <path>` — restore from the original snapshot.
pub async fn rollback_command(args: RollbackArgs) -> anyhow::Result<()> {
    let report = packflow_rs::organize::rollback::rollback_from_snapshot(&args.path)?;
    println!(
        "restored {} entr(ies); {} already in place; {} missing",
        report.restored,
        report.already_in_place,
        report.missing.len()
    );
    if let Some(log) = &report.log_path {
        println!("log: {}", log.display());
    }
    if !report.missing.is_empty() {
        bail!("{} recorded entr(ies) could not be located", report.missing.len());
    }
    Ok(())
}

/// `packflow print-default-config`
pub async fn print_default_config() -> anyhow::Result<()> {
    print!("{}", OrganizerConfig::default().to_yaml()?);
    Ok(())
}

/// `packflow init-config`
pub async fn init_config(args: InitConfigArgs) -> anyhow::Result<()> {
    if args.output.exists() && !args.force {
        bail!(
            "{} already exists (use --force to overwrite)",
            args.output.display()
        );
    }
    OrganizerConfig::default().save_yaml_file(&args.output)?;
    println!("configuration written to {}", args.output.display());
    Ok(())
}

/// `packflow validate-config`
pub async fn validate_config(args: ValidateConfigArgs) -> anyhow::Result<()> {
    match OrganizerConfig::from_yaml_file(&args.config) {
        Ok(_) => {
            println!("{} {}", style("✓").green(), "configuration is valid");
            Ok(())
        }
        Err(e) => bail!("invalid configuration: {e}"),
    }
}
