//! Run report generation.
//!
//! Writes JSON and Markdown summaries of a completed run beside the
//! snapshots, so shells and humans can review what happened without replaying
//! events.

use chrono::Utc;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::api::results::RunSummary;
use crate::core::errors::{OrganizerError, Result};
use crate::core::pipeline::{Phase, PhaseData, PipelineState};

/// Writes run reports into a directory.
pub struct ReportWriter {
    out_dir: PathBuf,
}

impl ReportWriter {
    /// Create a writer targeting the given directory.
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self {
            out_dir: out_dir.into(),
        }
    }

    /// Write the JSON report; returns its path.
    pub fn write_json(&self, state: &PipelineState) -> Result<PathBuf> {
        self.ensure_out_dir()?;
        let summary = RunSummary::from_state(state);
        let path = self.out_dir.join(format!(
            "report-{}.json",
            Utc::now().format("%Y-%m-%dT%H-%M-%S")
        ));
        let payload = serde_json::json!({
            "summary": summary,
            "phases": state.phases,
        });
        fs::write(&path, serde_json::to_string_pretty(&payload)?)
            .map_err(|e| OrganizerError::io(format!("writing {}", path.display()), e))?;
        info!("report written to {}", path.display());
        Ok(path)
    }

    /// Write the Markdown report; returns its path.
    pub fn write_markdown(&self, state: &PipelineState) -> Result<PathBuf> {
        self.ensure_out_dir()?;
        let path = self.out_dir.join(format!(
            "report-{}.md",
            Utc::now().format("%Y-%m-%dT%H-%M-%S")
        ));
        let markdown = render_markdown(state);
        fs::write(&path, markdown)
            .map_err(|e| OrganizerError::io(format!("writing {}", path.display()), e))?;
        info!("report written to {}", path.display());
        Ok(path)
    }

    fn ensure_out_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.out_dir)
            .map_err(|e| OrganizerError::io(format!("creating {}", self.out_dir.display()), e))
    }
}

fn render_markdown(state: &PipelineState) -> String {
    let summary = RunSummary::from_state(state);
    let mut out = String::new();

    let _ = writeln!(out, "# Organization report");
    let _ = writeln!(out);
    let _ = writeln!(out, "- Source: `{}`", summary.source.display());
    let _ = writeln!(out, "- Status: {:?}", summary.status);
    let _ = writeln!(out, "- Files indexed: {}", summary.files_indexed);
    let _ = writeln!(out, "- Packs detected: {}", summary.packs_detected);
    let _ = writeln!(
        out,
        "- Duplicates: {} group(s), {:.1} MB wasted",
        summary.duplicate_groups,
        summary.wasted_bytes as f64 / (1024.0 * 1024.0)
    );
    let _ = writeln!(out, "- Quarantined: {}", summary.quarantined);
    let _ = writeln!(out, "- Fusion groups: {}", summary.fusion_groups);
    let _ = writeln!(
        out,
        "- Operations executed: {} ({} failure(s))",
        summary.operations_executed, summary.operation_failures
    );
    if let (Some(score), Some(passed)) = (summary.validation_score, summary.validation_passed) {
        let _ = writeln!(
            out,
            "- Validation: {} (score {score:.2})",
            if passed { "passed" } else { "FAILED" }
        );
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "## Phases");
    let _ = writeln!(out);
    let _ = writeln!(out, "| Phase | Status | Duration |");
    let _ = writeln!(out, "|-------|--------|----------|");
    for record in &state.phases {
        let _ = writeln!(
            out,
            "| {} | {:?} | {} ms |",
            record.phase, record.status, record.summary.duration_ms
        );
    }

    if let Some(PhaseData::Validation(validation)) = state.output(Phase::Validation) {
        let _ = writeln!(out);
        let _ = writeln!(out, "## Validation checks");
        let _ = writeln!(out);
        for check in &validation.report.checks {
            let _ = writeln!(
                out,
                "- **{}**: {:.2} ({} finding(s))",
                check.name,
                check.score,
                check.findings.len()
            );
        }
    }

    out
}

/// Convenience: write both report formats under `<source>/.audio-organizer`.
pub fn write_run_reports(source: &Path, state: &PipelineState) -> Result<(PathBuf, PathBuf)> {
    let writer = ReportWriter::new(source.join(crate::core::snapshot::METADATA_DIR));
    let json = writer.write_json(state)?;
    let markdown = writer.write_markdown(state)?;
    Ok((json, markdown))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_reports_written() {
        let tmp = TempDir::new().unwrap();
        let state = PipelineState::new(tmp.path());

        let (json, markdown) = write_run_reports(tmp.path(), &state).unwrap();
        assert!(json.is_file());
        assert!(markdown.is_file());

        let rendered = fs::read_to_string(markdown).unwrap();
        assert!(rendered.contains("# Organization report"));
        assert!(rendered.contains("| preparation |"));
    }

    #[test]
    fn test_markdown_mentions_validation_when_present() {
        let state = PipelineState::new("/music");
        let rendered = render_markdown(&state);
        assert!(!rendered.contains("## Validation checks"));
    }
}
