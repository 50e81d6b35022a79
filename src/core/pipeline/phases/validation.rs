//! Phase 5: validation.
//!
//! Runs the five check suites over the reorganized tree and produces the
//! final verdict. Critical findings fail the phase regardless of score.

use async_trait::async_trait;
use tracing::{info, warn};

use crate::core::errors::{OrganizerError, Result};
use crate::core::pipeline::phases::{PhaseContext, PhaseOutcome, PipelinePhase};
use crate::core::pipeline::state::{Phase, PhaseData, PhaseOutputs, ValidationOutput};
use crate::core::snapshot::{SnapshotBuilder, SnapshotStore};
use crate::detectors::duplicates::DuplicateIndexer;
use crate::organize::validator::{ResultValidator, ValidationContext};

/// Phase 5 implementation.
pub struct ValidationPhase;

#[async_trait]
impl PipelinePhase for ValidationPhase {
    fn phase(&self) -> Phase {
        Phase::Validation
    }

    async fn execute(&self, ctx: &PhaseContext, prior: &PhaseOutputs) -> Result<PhaseOutcome> {
        let phase = self.phase();
        ctx.progress(phase, 10.0, "capturing current state");

        let store = SnapshotStore::new(&ctx.source);
        let snapshot_after = match store.load_reorganized() {
            Ok(snapshot) => snapshot,
            Err(_) => {
                let builder = SnapshotBuilder::new(ctx.config.snapshot.clone())?;
                builder.build(&ctx.source)?.0
            }
        };
        ctx.check_cancelled(phase)?;

        let files_before = match prior.get(&Phase::Preparation) {
            Some(PhaseData::Preparation(prep)) => prep.snapshot.root.file_count(),
            _ => snapshot_after.root.file_count(),
        };

        let matrix = match prior.get(&Phase::Matrix) {
            Some(PhaseData::Matrix(m)) => Some(m),
            _ => None,
        };
        let proposal = matrix.and_then(|m| {
            m.selected_proposal
                .as_deref()
                .and_then(|id| m.proposals.iter().find(|p| p.id == id))
        });
        let fusion_groups = matrix.map(|m| m.fusion_groups.as_slice()).unwrap_or(&[]);

        ctx.progress(phase, 40.0, "re-indexing duplicates");
        let duplicates_after =
            DuplicateIndexer::new(ctx.config.duplicates.clone()).index(&snapshot_after);

        ctx.progress(phase, 70.0, "running validation suites");
        let validator = ResultValidator::new(ctx.config.validation.clone());
        let report = validator.validate(&ValidationContext {
            root: &ctx.source,
            snapshot_after: &snapshot_after,
            files_before,
            proposal,
            fusion_groups,
            execution: None,
            duplicates_after: Some(&duplicates_after),
        });

        info!(
            score = format!("{:.2}", report.score),
            passed = report.passed,
            "validation verdict"
        );

        if report.critical_count > 0 {
            // Critical findings always fail the phase; the report still
            // reaches the shell through the error surface and the run report.
            let summary: Vec<String> = report
                .checks
                .iter()
                .flat_map(|c| c.findings.iter())
                .filter(|f| {
                    f.severity == crate::organize::validator::FindingSeverity::Critical
                })
                .map(|f| f.message.clone())
                .collect();
            warn!("validation failed critically: {}", summary.join("; "));
            return Err(OrganizerError::pipeline_cause(
                phase.name(),
                format!("critical validation findings: {}", summary.join("; ")),
                "validation-critical",
            ));
        }

        Ok(PhaseOutcome::Completed(PhaseData::Validation(
            ValidationOutput { report },
        )))
    }
}
