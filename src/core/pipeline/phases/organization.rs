//! Phase 4: organization.
//!
//! Builds the operation plan from the selected structure and fusion groups,
//! persists the proposed structure, executes the plan (backup, timeout,
//! verification, rollback on critical failure), and captures the
//! post-reorganization snapshot.

use async_trait::async_trait;
use serde_json::json;
use tracing::info;

use crate::core::errors::{OrganizerError, Result};
use crate::core::pipeline::phases::{PhaseContext, PhaseOutcome, PipelinePhase};
use crate::core::pipeline::state::{
    OrganizationOutput, Phase, PhaseData, PhaseOutputs,
};
use crate::core::snapshot::{SnapshotBuilder, SnapshotStore};
use crate::detectors::classifier::EnrichedPack;
use crate::detectors::fusion::FusionGroup;
use crate::detectors::structure::StructureProposal;
use crate::organize::executor::PlanExecutor;
use crate::organize::plan::{PlanInputs, ReorganizationPlanner};

/// Phase 4 implementation.
pub struct OrganizationPhase;

struct OrganizationInputs<'a> {
    packs: &'a [EnrichedPack],
    proposal: &'a StructureProposal,
    fusion_groups: &'a [FusionGroup],
}

impl OrganizationPhase {
    fn inputs<'a>(&self, prior: &'a PhaseOutputs) -> Result<OrganizationInputs<'a>> {
        let phase = Phase::Organization;

        let Some(PhaseData::Classification(classification)) = prior.get(&Phase::Classification)
        else {
            return Err(OrganizerError::pipeline_cause(
                phase.name(),
                "classification output is missing",
                "missing-classified-packs",
            ));
        };
        let Some(PhaseData::Matrix(matrix)) = prior.get(&Phase::Matrix) else {
            return Err(OrganizerError::pipeline_cause(
                phase.name(),
                "matrix output is missing",
                "missing-matrix",
            ));
        };
        let Some(selected) = matrix.selected_proposal.as_deref() else {
            return Err(OrganizerError::pipeline_cause(
                phase.name(),
                "no structure proposal was selected",
                "missing-selection",
            ));
        };
        let Some(proposal) = matrix.proposals.iter().find(|p| p.id == selected) else {
            return Err(OrganizerError::pipeline_cause(
                phase.name(),
                format!("selected proposal '{selected}' not found"),
                "missing-selection",
            ));
        };

        Ok(OrganizationInputs {
            packs: &classification.enriched_packs,
            proposal,
            fusion_groups: &matrix.fusion_groups,
        })
    }
}

#[async_trait]
impl PipelinePhase for OrganizationPhase {
    fn phase(&self) -> Phase {
        Phase::Organization
    }

    async fn execute(&self, ctx: &PhaseContext, prior: &PhaseOutputs) -> Result<PhaseOutcome> {
        let phase = self.phase();
        let inputs = self.inputs(prior)?;
        ctx.check_cancelled(phase)?;

        ctx.progress(phase, 10.0, "building operation plan");
        let planner = ReorganizationPlanner::new();
        let plan = planner.plan_organization(PlanInputs {
            root: &ctx.source,
            packs: inputs.packs,
            proposal: inputs.proposal,
            fusion_groups: inputs.fusion_groups,
        });
        plan.validate()?;
        info!(operations = plan.operations.len(), "plan validated");

        // Persist the planned structure beside the snapshots.
        let store = SnapshotStore::new(&ctx.source);
        store.save_proposed(&json!({
            "proposalId": inputs.proposal.id,
            "hierarchy": inputs.proposal.hierarchy,
            "plan": serde_json::to_value(&plan)?,
        }))?;

        ctx.progress(phase, 30.0, format!("executing {} operations", plan.operations.len()));
        let executor = PlanExecutor::new(ctx.config.executor.clone())
            .with_cancellation(ctx.cancelled.clone());
        let report = executor.execute(&plan, &ctx.source)?;

        // Capture the post-reorganization state for validation and rollback
        // tooling.
        if !report.dry_run {
            ctx.progress(phase, 85.0, "capturing reorganized snapshot");
            let builder = SnapshotBuilder::new(ctx.config.snapshot.clone())?;
            let (snapshot, _) = builder.build(&ctx.source)?;
            store.save_reorganized(&snapshot)?;
        }

        Ok(PhaseOutcome::Completed(PhaseData::Organization(
            OrganizationOutput {
                plan_id: plan.id.clone(),
                operations_total: plan.operations.len(),
                executed: report.executed,
                skipped: report.skipped,
                failures: report
                    .failures
                    .iter()
                    .map(|f| format!("{}: {}", f.source.display(), f.error))
                    .collect(),
                backup_path: report.backup_path.clone(),
                dry_run: report.dry_run,
                duration_ms: report.duration_ms,
            },
        )))
    }
}
