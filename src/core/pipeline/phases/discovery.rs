//! Phase 1: discovery.
//!
//! Detects packs over the preparation snapshot, enriches them, and indexes
//! duplicates. Under the manual-review strategy the phase suspends when
//! duplicate groups exist so the user can pick a resolution.

use async_trait::async_trait;
use serde_json::json;
use tracing::info;

use crate::core::config::{DuplicateStrategy, SignatureMode};
use crate::core::errors::{OrganizerError, Result};
use crate::core::pipeline::phases::{PhaseContext, PhaseOutcome, PipelinePhase, ResumeRequest};
use crate::core::pipeline::state::{
    DiscoveryOutput, EnrichmentResult, PendingInteraction, Phase, PhaseData, PhaseOutputs,
};
use crate::core::snapshot::{Snapshot, SnapshotBuilder, SnapshotStore};
use crate::detectors::classifier::TagClassifier;
use crate::detectors::duplicates::{DuplicateIndexer, DuplicateReport};
use crate::detectors::packs::PackDetector;

/// Phase 1 implementation.
pub struct DiscoveryPhase;

impl DiscoveryPhase {
    /// Snapshot from phase 0 output, the persisted file, or a fresh scan, in
    /// that order.
    fn snapshot(&self, ctx: &PhaseContext, prior: &PhaseOutputs) -> Result<Snapshot> {
        if let Some(PhaseData::Preparation(prep)) = prior.get(&Phase::Preparation) {
            return Ok(prep.snapshot.clone());
        }
        let store = SnapshotStore::new(&ctx.source);
        if store.has_original() {
            return store.load_original();
        }
        let builder = SnapshotBuilder::new(ctx.config.snapshot.clone())?;
        Ok(builder.build(&ctx.source)?.0)
    }

    fn discover(
        &self,
        ctx: &PhaseContext,
        snapshot: &Snapshot,
    ) -> (EnrichmentResult, Option<EnrichmentResult>, DuplicateReport) {
        let phase = Phase::Discovery;

        ctx.progress(phase, 20.0, "detecting packs");
        let detector = PackDetector::new(ctx.taxonomy.clone(), ctx.config.detector.clone());
        let report = detector.detect(snapshot);
        info!(
            packs = report.stats.packs_detected,
            bundles = report.stats.bundles_detected,
            "discovery detection finished"
        );

        ctx.progress(phase, 50.0, "enriching detected packs");
        let classifier = TagClassifier::new(ctx.taxonomy.clone());
        let enriched = classifier.enrich_all(&report.packs, snapshot);
        let metadata = EnrichmentResult {
            enriched_packs: enriched,
        };

        // The deep pass re-enriches under content hashing and exists as the
        // recovery path for phase 2.
        let deep = if ctx.config.duplicates.signature == SignatureMode::ContentHash {
            Some(metadata.clone())
        } else {
            None
        };

        ctx.progress(phase, 75.0, "indexing duplicates");
        let indexer = DuplicateIndexer::new(ctx.config.duplicates.clone());
        let duplicates = indexer.index(snapshot);

        (metadata, deep, duplicates)
    }
}

#[async_trait]
impl PipelinePhase for DiscoveryPhase {
    fn phase(&self) -> Phase {
        Phase::Discovery
    }

    async fn execute(&self, ctx: &PhaseContext, prior: &PhaseOutputs) -> Result<PhaseOutcome> {
        let phase = self.phase();
        let snapshot = self.snapshot(ctx, prior)?;
        ctx.check_cancelled(phase)?;

        let (metadata, deep, duplicates) = self.discover(ctx, &snapshot);

        if ctx.config.duplicates.strategy == DuplicateStrategy::ManualReview
            && duplicates.has_duplicates()
        {
            let groups: Vec<_> = duplicates
                .groups
                .iter()
                .take(50)
                .map(|g| {
                    json!({
                        "signature": g.signature,
                        "count": g.count,
                        "wastedSize": g.wasted_size,
                        "paths": g.paths,
                    })
                })
                .collect();
            return Ok(PhaseOutcome::AwaitingUser(PendingInteraction {
                phase,
                resume_from_step: 2,
                message: format!(
                    "{} duplicate group(s) found ({} wasted); choose a strategy",
                    duplicates.groups.len(),
                    human_bytes(duplicates.total_wasted)
                ),
                payload: json!({
                    "step": 1,
                    "groups": groups,
                    "metadata": serde_json::to_value(&metadata)?,
                    "deepAnalysis": deep.as_ref().map(serde_json::to_value).transpose()?,
                    "duplicates": serde_json::to_value(&duplicates)?,
                }),
            }));
        }

        Ok(PhaseOutcome::Completed(PhaseData::Discovery(
            DiscoveryOutput {
                metadata: Some(metadata),
                deep_analysis: deep,
                duplicates,
                duplicate_strategy: Some(ctx.config.duplicates.strategy),
            },
        )))
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

        // Step-1 results travel through the pending payload; recompute only
        // when the payload is missing them.
        let metadata: EnrichmentResult = request
            .pending
            .get("metadata")
            .cloned()
            .map(serde_json::from_value)
            .transpose()?
            .ok_or_else(|| {
                OrganizerError::pipeline_cause(
                    phase.name(),
                    "pending state is missing enrichment results",
                    "missing-pending-state",
                )
            })?;
        let deep: Option<EnrichmentResult> = request
            .pending
            .get("deepAnalysis")
            .filter(|v| !v.is_null())
            .cloned()
            .map(serde_json::from_value)
            .transpose()?;
        let duplicates: DuplicateReport = request
            .pending
            .get("duplicates")
            .cloned()
            .map(serde_json::from_value)
            .transpose()?
            .unwrap_or_default();

        let strategy = match request
            .user_choice
            .get("strategy")
            .and_then(|v| v.as_str())
            .unwrap_or("keep-all")
        {
            "auto-remove" => DuplicateStrategy::AutoRemove,
            "manual-review" => DuplicateStrategy::ManualReview,
            _ => DuplicateStrategy::KeepAll,
        };
        info!("duplicate strategy selected: {strategy:?}");
        ctx.progress(phase, 95.0, "duplicate strategy recorded");

        Ok(PhaseOutcome::Completed(PhaseData::Discovery(
            DiscoveryOutput {
                metadata: Some(metadata),
                deep_analysis: deep,
                duplicates,
                duplicate_strategy: Some(strategy),
            },
        )))
    }
}

fn human_bytes(bytes: u64) -> String {
    const MB: u64 = 1024 * 1024;
    if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else {
        format!("{bytes} B")
    }
}
