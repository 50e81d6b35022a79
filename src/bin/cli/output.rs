//! Console rendering helpers.

use console::style;
use owo_colors::OwoColorize;
use tabled::{settings::Style, Table, Tabled};

use packflow_rs::core::pipeline::QuarantinedPack;
use packflow_rs::detectors::duplicates::DuplicateReport;
use packflow_rs::detectors::packs::DetectionReport;
use packflow_rs::detectors::structure::StructureProposal;
use packflow_rs::RunSummary;

#[derive(Tabled)]
struct PackRow {
    #[tabled(rename = "Pack")]
    name: String,
    #[tabled(rename = "Type")]
    kind: String,
    #[tabled(rename = "Audio")]
    audio: usize,
    #[tabled(rename = "Size (MB)")]
    size_mb: u64,
    #[tabled(rename = "Confidence")]
    confidence: String,
}

/// Print the detection report as a table.
pub fn print_detection_report(report: &DetectionReport) {
    println!();
    println!(
        "{}",
        style(format!(
            "Detected {} pack(s), {} bundle(s), {} wrapper(s)",
            report.stats.packs_detected,
            report.stats.bundles_detected,
            report.stats.wrappers_detected
        ))
        .bold()
    );

    let mut rows = Vec::new();
    for pack in report.all_packs() {
        rows.push(PackRow {
            name: pack.name.clone(),
            kind: pack.pack_type.to_string(),
            audio: pack.audio_file_count,
            size_mb: pack.total_size / (1024 * 1024),
            confidence: format!("{:.0}%", pack.confidence * 100.0),
        });
    }
    if rows.is_empty() {
        println!("{}", "no packs detected".dimmed());
        return;
    }

    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
}

/// Print the duplicate report summary.
pub fn print_duplicates(report: &DuplicateReport) {
    if !report.has_duplicates() {
        println!("{}", "no duplicates found".green());
        return;
    }
    println!(
        "{} duplicate group(s), {:.1} MB wasted",
        report.groups.len().yellow(),
        report.total_wasted as f64 / (1024.0 * 1024.0)
    );
    for group in report.groups.iter().take(10) {
        println!(
            "  {} × {} ({:.1} MB wasted)",
            group.count,
            group
                .paths
                .first()
                .and_then(|p| p.file_name())
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| group.signature.clone()),
            group.wasted_size as f64 / (1024.0 * 1024.0)
        );
    }
    if report.groups.len() > 10 {
        println!("  … and {} more", report.groups.len() - 10);
    }
}

/// Print the quarantine listing shown at the phase-2 checkpoint.
pub fn print_quarantine(quarantined: &[QuarantinedPack]) {
    println!(
        "{}",
        style(format!("{} pack(s) in quarantine", quarantined.len())).yellow()
    );
    for pack in quarantined {
        println!(
            "  {} ({:.0}%) — {}",
            pack.name,
            pack.confidence * 100.0,
            pack.reasons.first().map(String::as_str).unwrap_or("")
        );
    }
}

/// Print the structure proposals shown at the phase-3 checkpoint.
pub fn print_proposals(proposals: &[StructureProposal]) {
    for proposal in proposals {
        let marker = if proposal.recommended {
            style("(recommended)").green().to_string()
        } else {
            String::new()
        };
        println!(
            "  {} — {} {marker}",
            style(&proposal.id).bold(),
            proposal.name
        );
        println!(
            "      {} folders, depth {}, {}/{} packs routed",
            proposal.estimated_folder_count,
            proposal.max_depth,
            proposal.statistics.routed,
            proposal.statistics.pack_count
        );
    }
}

/// Print the final run summary.
pub fn print_summary(summary: &RunSummary) {
    println!();
    println!("{}", style("Run summary").bold().underlined());
    println!("  files indexed:       {}", summary.files_indexed);
    println!("  packs detected:      {}", summary.packs_detected);
    println!(
        "  duplicates:          {} group(s), {:.1} MB",
        summary.duplicate_groups,
        summary.wasted_bytes as f64 / (1024.0 * 1024.0)
    );
    println!("  fusion groups:       {}", summary.fusion_groups);
    println!(
        "  operations executed: {} ({} failed)",
        summary.operations_executed, summary.operation_failures
    );
    match (summary.validation_passed, summary.validation_score) {
        (Some(true), Some(score)) => {
            println!("  validation:          {} (score {score:.2})", "passed".green());
        }
        (Some(false), Some(score)) => {
            println!("  validation:          {} (score {score:.2})", "FAILED".red());
        }
        _ => {}
    }
}

