//! Phase 2: classification.
//!
//! Consumes the enriched packs from discovery (falling back from the
//! metadata result to the deep-analysis result automatically, with a
//! warning), and quarantines low-confidence packs for review. When the
//! quarantine is non-empty the phase suspends so the user can keep or drop
//! its members.

use async_trait::async_trait;
use serde_json::json;
use std::collections::HashSet;
use tracing::{info, warn};

use crate::core::errors::{OrganizerError, Result};
use crate::core::pipeline::phases::{PhaseContext, PhaseOutcome, PipelinePhase, ResumeRequest};
use crate::core::pipeline::state::{
    ClassificationOutput, PendingInteraction, Phase, PhaseData, PhaseOutputs, QuarantinedPack,
};
use crate::detectors::classifier::EnrichedPack;

/// Phase 2 implementation.
pub struct ClassificationPhase;

impl ClassificationPhase {
    /// Locate enriched packs in the discovery output, applying the recovery
    /// fallback when the primary path is empty.
    fn enriched_packs(
        &self,
        ctx: &PhaseContext,
        prior: &PhaseOutputs,
    ) -> Result<Vec<EnrichedPack>> {
        let phase = Phase::Classification;
        let Some(PhaseData::Discovery(discovery)) = prior.get(&Phase::Discovery) else {
            return Err(OrganizerError::pipeline_cause(
                phase.name(),
                "discovery output is missing",
                "missing-enriched-packs",
            ));
        };

        let primary = discovery
            .metadata
            .as_ref()
            .filter(|m| !m.enriched_packs.is_empty());
        if let Some(result) = primary {
            return Ok(result.enriched_packs.clone());
        }

        // Recovery hook: fall back to the deep-analysis result.
        if let Some(deep) = discovery
            .deep_analysis
            .as_ref()
            .filter(|m| !m.enriched_packs.is_empty())
        {
            warn!("metadata result empty; falling back to deep-analysis packs");
            ctx.progress(
                phase,
                10.0,
                "metadata result empty; using deep-analysis packs",
            );
            return Ok(deep.enriched_packs.clone());
        }

        Err(OrganizerError::pipeline_cause(
            phase.name(),
            "no enriched packs available from discovery",
            "missing-enriched-packs",
        ))
    }

    fn split_quarantine(
        &self,
        ctx: &PhaseContext,
        packs: Vec<EnrichedPack>,
    ) -> (Vec<EnrichedPack>, Vec<EnrichedPack>) {
        let bar = ctx.config.classification.quarantine_confidence;
        packs
            .into_iter()
            .partition(|pack| pack.pack.confidence >= bar)
    }
}

fn summarize(pack: &EnrichedPack) -> QuarantinedPack {
    QuarantinedPack {
        pack_id: pack.pack.id.clone(),
        name: pack.pack.name.clone(),
        path: pack.pack.path.clone(),
        confidence: pack.pack.confidence,
        reasons: pack.pack.reasoning.clone(),
    }
}

#[async_trait]
impl PipelinePhase for ClassificationPhase {
    fn phase(&self) -> Phase {
        Phase::Classification
    }

    async fn execute(&self, ctx: &PhaseContext, prior: &PhaseOutputs) -> Result<PhaseOutcome> {
        let phase = self.phase();
        let packs = self.enriched_packs(ctx, prior)?;
        ctx.check_cancelled(phase)?;
        ctx.progress(phase, 40.0, format!("classifying {} packs", packs.len()));

        let (kept, parked) = self.split_quarantine(ctx, packs);
        let quarantined: Vec<QuarantinedPack> = parked.iter().map(summarize).collect();
        info!(
            kept = kept.len(),
            quarantined = quarantined.len(),
            "classification finished"
        );

        if quarantined.is_empty() {
            return Ok(PhaseOutcome::Completed(PhaseData::Classification(
                ClassificationOutput {
                    enriched_packs: kept,
                    quarantined,
                },
            )));
        }

        Ok(PhaseOutcome::AwaitingUser(PendingInteraction {
            phase,
            resume_from_step: 2,
            message: format!(
                "{} low-confidence pack(s) quarantined; choose which to keep",
                quarantined.len()
            ),
            payload: json!({
                "step": 1,
                "kept": serde_json::to_value(&kept)?,
                "quarantined": serde_json::to_value(&quarantined)?,
                "rescuable": serde_json::to_value(&parked)?,
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

        let kept: Vec<EnrichedPack> = request
            .pending
            .get("kept")
            .cloned()
            .map(serde_json::from_value)
            .transpose()?
            .ok_or_else(|| {
                OrganizerError::pipeline_cause(
                    phase.name(),
                    "pending state is missing kept packs",
                    "missing-pending-state",
                )
            })?;
        let quarantined: Vec<QuarantinedPack> = request
            .pending
            .get("quarantined")
            .cloned()
            .map(serde_json::from_value)
            .transpose()?
            .unwrap_or_default();

        // The user names quarantined pack ids to keep; the rest stay parked.
        let keep_ids: HashSet<String> = request
            .user_choice
            .get("keep")
            .and_then(|v| v.as_array())
            .map(|ids| {
                ids.iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();

        // Rescue selected members by id from the full quarantine payload.
        let mut final_packs = kept;
        if !keep_ids.is_empty() {
            let rescuable: Vec<EnrichedPack> = request
                .pending
                .get("rescuable")
                .cloned()
                .map(serde_json::from_value)
                .transpose()?
                .unwrap_or_default();
            for pack in rescuable {
                if keep_ids.contains(&pack.pack.id) {
                    final_packs.push(pack);
                }
            }
        }
        let still_quarantined: Vec<QuarantinedPack> = quarantined
            .into_iter()
            .filter(|q| !keep_ids.contains(&q.pack_id))
            .collect();

        Ok(PhaseOutcome::Completed(PhaseData::Classification(
            ClassificationOutput {
                enriched_packs: final_packs,
                quarantined: still_quarantined,
            },
        )))
    }
}
