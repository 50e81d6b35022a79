//! Phase 0: preparation.
//!
//! Step 1 scans the source, persists the original snapshot, and collects
//! clean/unwrap candidates; when candidates exist the phase suspends so the
//! user can validate them. Step 2 applies the approved mini-plan (with
//! backup), rescans, and completes.

use async_trait::async_trait;
use serde_json::json;
use tracing::info;

use crate::core::errors::{OrganizerError, Result};
use crate::core::pipeline::phases::{PhaseContext, PhaseOutcome, PipelinePhase, ResumeRequest};
use crate::core::pipeline::state::{PendingInteraction, Phase, PhaseData, PhaseOutputs, PreparationOutput};
use crate::core::snapshot::{Snapshot, SnapshotBuilder, SnapshotStore, ScanStats};
use crate::detectors::packs::{PackDetector, PackType};
use crate::organize::executor::PlanExecutor;
use crate::organize::plan::{OperationKind, ReorganizationPlanner};

/// Phase 0 implementation.
pub struct PreparationPhase;

impl PreparationPhase {
    fn scan(&self, ctx: &PhaseContext) -> Result<(Snapshot, ScanStats)> {
        let builder = SnapshotBuilder::new(ctx.config.snapshot.clone())?;
        builder.build(&ctx.source)
    }
}

#[async_trait]
impl PipelinePhase for PreparationPhase {
    fn phase(&self) -> Phase {
        Phase::Preparation
    }

    async fn execute(&self, ctx: &PhaseContext, _prior: &PhaseOutputs) -> Result<PhaseOutcome> {
        let phase = self.phase();
        ctx.progress(phase, 5.0, "scanning source directory");

        let (snapshot, stats) = self.scan(ctx)?;
        let store = SnapshotStore::new(&ctx.source);
        store.save_original(&snapshot)?;
        ctx.progress(phase, 40.0, format!("indexed {} files", stats.files));
        ctx.check_cancelled(phase)?;

        // Quick detection pass to find wrappers and dirty names.
        let detector = PackDetector::new(ctx.taxonomy.clone(), ctx.config.detector.clone());
        let report = detector.detect(&snapshot);
        let plan = ReorganizationPlanner::new().plan_preparation(&report.packs);
        ctx.progress(phase, 70.0, "prepared cleanup candidates");

        if plan.operations.is_empty() {
            info!("nothing to prepare; source is already clean");
            return Ok(PhaseOutcome::Completed(PhaseData::Preparation(
                PreparationOutput {
                    snapshot,
                    stats,
                    cleaned: 0,
                    unwrapped: 0,
                    backup_path: None,
                },
            )));
        }

        // Step 1 ends here: the user validates the cleanup before any
        // mutation happens.
        let candidates: Vec<_> = plan
            .operations
            .iter()
            .map(|op| {
                json!({
                    "kind": op.kind.to_string(),
                    "source": op.source,
                    "target": op.target,
                    "rationale": op.rationale,
                })
            })
            .collect();

        Ok(PhaseOutcome::AwaitingUser(PendingInteraction {
            phase,
            resume_from_step: 2,
            message: format!(
                "{} cleanup operation(s) proposed; approve to apply",
                plan.operations.len()
            ),
            payload: json!({
                "step": 1,
                "candidates": candidates,
                "stats": serde_json::to_value(&stats)?,
            }),
        }))
    }

    async fn resume(
        &self,
        ctx: &PhaseContext,
        _prior: &PhaseOutputs,
        request: ResumeRequest,
    ) -> Result<PhaseOutcome> {
        let phase = self.phase();
        if request.from_step != 2 {
            return Err(OrganizerError::pipeline_cause(
                phase.name(),
                format!("unknown resume step {}", request.from_step),
                "invalid-resume-step",
            ));
        }
        // The step-1 payload must travel into step 2.
        if request.pending.get("candidates").is_none() {
            return Err(OrganizerError::pipeline_cause(
                phase.name(),
                "pending state is missing step-1 candidates",
                "missing-pending-state",
            ));
        }

        let approved = request
            .user_choice
            .get("approve")
            .and_then(|v| v.as_bool())
            .unwrap_or(true);

        // Re-derive the plan from a fresh scan; the filesystem may have
        // drifted while suspended.
        let (snapshot, stats) = self.scan(ctx)?;
        let mut cleaned = 0;
        let mut unwrapped = 0;
        let mut backup_path = None;

        if approved {
            ctx.progress(phase, 80.0, "applying cleanup operations");
            let detector = PackDetector::new(ctx.taxonomy.clone(), ctx.config.detector.clone());
            let report = detector.detect(&snapshot);
            let plan = ReorganizationPlanner::new().plan_preparation(&report.packs);
            plan.validate()?;

            let executor = PlanExecutor::new(ctx.config.executor.clone())
                .with_cancellation(ctx.cancelled.clone());
            let execution = executor.execute(&plan, &ctx.source)?;
            backup_path = execution.backup_path.clone();
            cleaned = plan.operations_of(OperationKind::Clean).count();
            unwrapped = plan.operations_of(OperationKind::Unwrap).count();

            // Wrappers that failed to unwrap stay counted as pending work.
            for failure in &execution.failures {
                if failure.kind == OperationKind::Unwrap {
                    unwrapped = unwrapped.saturating_sub(1);
                } else {
                    cleaned = cleaned.saturating_sub(1);
                }
            }
        } else {
            info!("cleanup rejected by user; keeping source as-is");
        }

        // Rescan so downstream phases see the cleaned tree. The original
        // snapshot stays as the pre-clean baseline for rollback.
        let (snapshot, stats) = if approved {
            ctx.progress(phase, 95.0, "rescanning cleaned tree");
            self.scan(ctx)?
        } else {
            (snapshot, stats)
        };

        // Wrappers should be gone after an approved cleanup.
        if approved {
            let detector = PackDetector::new(ctx.taxonomy.clone(), ctx.config.detector.clone());
            let remaining = detector
                .detect(&snapshot)
                .packs
                .iter()
                .filter(|p| p.pack_type == PackType::WrapperFolder)
                .count();
            if remaining > 0 {
                info!("{remaining} wrapper(s) still present after preparation");
            }
        }

        Ok(PhaseOutcome::Completed(PhaseData::Preparation(
            PreparationOutput {
                snapshot,
                stats,
                cleaned,
                unwrapped,
                backup_path,
            },
        )))
    }
}
