//! Phase 3: matrix.
//!
//! Builds structure proposals and fusion groups, then suspends so the user
//! can select the target structure. Resuming with a proposal id (or nothing,
//! which selects the recommendation) completes the phase.

use async_trait::async_trait;
use serde_json::json;
use tracing::info;

use crate::core::errors::{OrganizerError, Result};
use crate::core::pipeline::phases::{PhaseContext, PhaseOutcome, PipelinePhase, ResumeRequest};
use crate::core::pipeline::state::{
    MatrixOutput, PendingInteraction, Phase, PhaseData, PhaseOutputs,
};
use crate::detectors::classifier::EnrichedPack;
use crate::detectors::fusion::{FusionGroup, FusionMatcher};
use crate::detectors::structure::{StructureProposal, StructureProposer};

/// Phase 3 implementation.
pub struct MatrixPhase;

impl MatrixPhase {
    fn classified_packs<'a>(&self, prior: &'a PhaseOutputs) -> Result<&'a [EnrichedPack]> {
        match prior.get(&Phase::Classification) {
            Some(PhaseData::Classification(output)) => Ok(&output.enriched_packs),
            _ => Err(OrganizerError::pipeline_cause(
                Phase::Matrix.name(),
                "classification output is missing",
                "missing-classified-packs",
            )),
        }
    }
}

#[async_trait]
impl PipelinePhase for MatrixPhase {
    fn phase(&self) -> Phase {
        Phase::Matrix
    }

    async fn execute(&self, ctx: &PhaseContext, prior: &PhaseOutputs) -> Result<PhaseOutcome> {
        let phase = self.phase();
        let packs = self.classified_packs(prior)?;
        ctx.check_cancelled(phase)?;

        ctx.progress(phase, 30.0, "generating structure proposals");
        let proposals = StructureProposer::new().propose(packs);

        ctx.progress(phase, 60.0, "matching near-duplicate packs");
        let matcher = FusionMatcher::new(ctx.taxonomy.clone(), ctx.config.fusion.clone());
        let fusion_groups = matcher.group(packs);
        info!(
            proposals = proposals.len(),
            fusion_groups = fusion_groups.len(),
            "matrix assembled"
        );

        // The structure choice is always the user's.
        Ok(PhaseOutcome::AwaitingUser(PendingInteraction {
            phase,
            resume_from_step: 2,
            message: "select a target structure".to_string(),
            payload: json!({
                "step": 1,
                "proposals": serde_json::to_value(&proposals)?,
                "fusionGroups": serde_json::to_value(&fusion_groups)?,
            }),
        }))
    }

    async fn resume(
        &self,
        _ctx: &PhaseContext,
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

        let proposals: Vec<StructureProposal> = request
            .pending
            .get("proposals")
            .cloned()
            .map(serde_json::from_value)
            .transpose()?
            .ok_or_else(|| {
                OrganizerError::pipeline_cause(
                    phase.name(),
                    "pending state is missing proposals",
                    "missing-pending-state",
                )
            })?;
        let fusion_groups: Vec<FusionGroup> = request
            .pending
            .get("fusionGroups")
            .cloned()
            .map(serde_json::from_value)
            .transpose()?
            .unwrap_or_default();

        let requested = request
            .user_choice
            .get("proposalId")
            .and_then(|v| v.as_str());
        let selected = match requested {
            Some(id) => {
                if !proposals.iter().any(|p| p.id == id) {
                    return Err(OrganizerError::validation(format!(
                        "unknown proposal id '{id}'"
                    )));
                }
                id.to_string()
            }
            None => proposals
                .iter()
                .find(|p| p.recommended)
                .or_else(|| proposals.first())
                .map(|p| p.id.clone())
                .ok_or_else(|| {
                    OrganizerError::pipeline_cause(
                        phase.name(),
                        "no proposals available",
                        "missing-pending-state",
                    )
                })?,
        };
        info!("structure proposal selected: {selected}");

        Ok(PhaseOutcome::Completed(PhaseData::Matrix(MatrixOutput {
            proposals,
            fusion_groups,
            selected_proposal: Some(selected),
        })))
    }
}
