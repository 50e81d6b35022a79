//! Pack detection.
//!
//! The detector operates on snapshot nodes only; it never touches the
//! filesystem. For each directory it computes a classification decision using
//! prioritized rules; the first rule to fire wins:
//!
//! - **P1** wrapper detection (single child duplicating the parent's name)
//! - **P2** explicit bundle (bundle-hint name + ≥3 qualifying sub-packs)
//! - **P3** weighted scoring with a content-validation gate
//! - **P4** bundle-versus-pack arbitration for commercial-named containers
//!
//! After classification a single conflict-resolution pass keeps parents over
//! descendants and deduplicates by canonical path.

pub use scoring::{DetectionContext, GateResult, PackScorer, ScoreBreakdown};
pub use types::{
    DecisionState, DetectedPack, DetectionReport, DetectionStats, DirectoryDecision, PackType,
    StructureSummary,
};

mod scoring;
mod types;

use dashmap::DashMap;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

use crate::core::config::DetectorConfig;
use crate::core::snapshot::{Snapshot, SnapshotNode};
use crate::core::taxonomy::TaxonomyRegistry;

/// Taxonomy-driven pack detector.
pub struct PackDetector {
    taxonomy: Arc<TaxonomyRegistry>,
    config: DetectorConfig,
    // Scores depend only on (path, nested-ness), so runs stay idempotent.
    score_cache: DashMap<(PathBuf, bool), ScoreBreakdown>,
}

/// Internal classification outcome before conflict resolution.
enum Outcome {
    Accepted(Box<DetectedPack>, f64),
    Organization,
    Rejected,
}

impl PackDetector {
    /// Create a detector over a shared taxonomy.
    pub fn new(taxonomy: Arc<TaxonomyRegistry>, config: DetectorConfig) -> Self {
        Self {
            taxonomy,
            config,
            score_cache: DashMap::new(),
        }
    }

    /// Run detection over a snapshot.
    ///
    /// Running twice on the same snapshot yields identical pack sets.
    pub fn detect(&self, snapshot: &Snapshot) -> DetectionReport {
        let mut report = DetectionReport::default();
        let mut accepted: Vec<(DetectedPack, f64)> = Vec::new();

        for child in snapshot.root.subdirectories() {
            self.classify_tree(child, DetectionContext::root(), &mut accepted, &mut report);
        }

        report.packs = self.resolve_conflicts(accepted);
        for pack in &report.packs {
            match pack.pack_type {
                PackType::BundleContainer => {
                    report.stats.bundles_detected += 1;
                    report.stats.packs_detected += pack.sub_packs.len();
                }
                PackType::WrapperFolder => report.stats.wrappers_detected += 1,
                _ => report.stats.packs_detected += 1,
            }
        }

        debug!(
            evaluated = report.stats.directories_evaluated,
            packs = report.stats.packs_detected,
            bundles = report.stats.bundles_detected,
            "detection finished"
        );
        report
    }

    fn classify_tree(
        &self,
        node: &SnapshotNode,
        ctx: DetectionContext,
        accepted: &mut Vec<(DetectedPack, f64)>,
        report: &mut DetectionReport,
    ) {
        if self.should_skip(node) {
            return;
        }
        report.stats.directories_evaluated += 1;

        match self.classify(node, ctx, report) {
            Outcome::Accepted(pack, score) => {
                report.decisions.push(DirectoryDecision {
                    path: node.path.clone(),
                    state: DecisionState::Accepted {
                        pack_type: pack.pack_type,
                    },
                    score: Some(score),
                    reasoning: pack.reasoning.clone(),
                });
                accepted.push((*pack, score));
                // A pack subsumes its subtree; detection does not descend.
            }
            Outcome::Organization => {
                for child in node.subdirectories() {
                    self.classify_tree(child, ctx.deeper(), accepted, report);
                }
            }
            Outcome::Rejected => {
                report.stats.rejected += 1;
                for child in node.subdirectories() {
                    self.classify_tree(child, ctx.deeper(), accepted, report);
                }
            }
        }
    }

    fn classify(
        &self,
        node: &SnapshotNode,
        ctx: DetectionContext,
        report: &mut DetectionReport,
    ) -> Outcome {
        // Rule P1: wrapper detection.
        if let Some(outcome) = self.classify_wrapper(node, ctx) {
            return outcome;
        }

        // Rule P2: explicit bundle.
        let bundle_hints = self.taxonomy.matches_bundle_hint(&node.name);
        if !bundle_hints.is_empty() {
            let children = self.qualifying_sub_packs(node, ctx);
            if children.len() >= 3 {
                let hints: Vec<String> = bundle_hints.iter().map(|h| h.to_string()).collect();
                let mut reasoning = vec![format!("bundle hint keywords: {}", hints.join(", "))];
                reasoning.push(format!("{} qualifying sub-packs", children.len()));
                let pack = self.make_bundle(node, children, reasoning);
                return Outcome::Accepted(Box::new(pack), 90.0);
            }
        }

        // Rule P3: scored evaluation.
        let breakdown = self.score_cached(node, ctx);
        let gate = PackScorer::new(&self.taxonomy, &self.config).content_gate(node, ctx);
        let score = breakdown.total();

        report.decisions.push(DirectoryDecision {
            path: node.path.clone(),
            state: DecisionState::Scored,
            score: Some(score),
            reasoning: breakdown.reasons.clone(),
        });

        if !gate.passed {
            report.decisions.push(DirectoryDecision {
                path: node.path.clone(),
                state: DecisionState::Rejected,
                score: Some(score),
                reasoning: gate.reasons,
            });
            return Outcome::Rejected;
        }

        let threshold = ctx.score_threshold(&self.config);
        // Depth-adjusted safety: deep structured candidates must also show
        // enough taxonomy structure to avoid over-segmenting hierarchies.
        // Flat directories have nothing to segment, so the guard is moot.
        let category_ok = ctx.depth < 2
            || node.subdirectories().count() == 0
            || breakdown.category_matches >= ctx.category_minimum(&self.config);

        if score >= threshold && category_ok {
            let mut reasoning = breakdown.reasons.clone();
            reasoning.extend(gate.reasons.clone());

            // Rule P4: bundle-versus-pack arbitration.
            let children = self.qualifying_sub_packs(node, ctx);
            if children.len() >= 2 {
                reasoning.push(format!(
                    "commercial name over {} qualifying sub-packs",
                    children.len()
                ));
                let pack = self.make_bundle(node, children, reasoning);
                return Outcome::Accepted(Box::new(pack), score);
            }

            let confidence = (score / 100.0).clamp(0.0, 1.0);
            let pack = self.make_pack(
                node,
                PackType::CommercialPack,
                confidence,
                reasoning,
                &breakdown,
            );
            return Outcome::Accepted(Box::new(pack), score);
        }

        // Organizational folders (category-named subfolders, no commercial
        // naming) are recorded but never emitted as packs, so their contents
        // remain detectable.
        if breakdown.category_matches >= 2 {
            report.decisions.push(DirectoryDecision {
                path: node.path.clone(),
                state: DecisionState::Accepted {
                    pack_type: PackType::OrganizationFolder,
                },
                score: Some(score),
                reasoning: vec![format!(
                    "{} category subfolders without commercial naming",
                    breakdown.category_matches
                )],
            });
            return Outcome::Organization;
        }

        // Substantial audio without commercial naming: a personal collection
        // rather than silence, so phase 2 can quarantine it for review.
        // Requires direct audio so bare passthrough directories keep
        // recursing instead.
        if node.audio_file_count >= ctx.audio_threshold(&self.config)
            && node.direct_audio_file_count() > 0
        {
            let mut reasoning = vec![format!(
                "{} audio files without commercial naming",
                node.audio_file_count
            )];
            reasoning.extend(gate.reasons);
            let confidence = (score / 100.0).clamp(0.3, 0.6);
            let pack = self.make_pack(
                node,
                PackType::PersonalCollection,
                confidence,
                reasoning,
                &breakdown,
            );
            return Outcome::Accepted(Box::new(pack), score);
        }

        report.decisions.push(DirectoryDecision {
            path: node.path.clone(),
            state: DecisionState::Rejected,
            score: Some(score),
            reasoning: vec![format!(
                "score {score:.0} below threshold {threshold:.0}"
            )],
        });
        Outcome::Rejected
    }

    /// Rule P1. A wrapper has exactly one subdirectory whose normalized name
    /// equals the parent's; wrappers with two or more subdirectories never
    /// classify here.
    fn classify_wrapper(&self, node: &SnapshotNode, ctx: DetectionContext) -> Option<Outcome> {
        let subdirs: Vec<&SnapshotNode> = node.subdirectories().collect();
        if subdirs.len() != 1 || node.direct_audio_file_count() > 0 {
            return None;
        }
        let inner = subdirs[0];
        if wrapper_normalize(&node.name) != wrapper_normalize(&inner.name) {
            return None;
        }

        // Re-classify the inner directory and propagate its evidence.
        let inner_breakdown = self.score_cached(inner, ctx);
        let inner_gate = PackScorer::new(&self.taxonomy, &self.config).content_gate(inner, ctx);
        let inner_score = inner_breakdown.total();

        let mut reasoning = vec![format!(
            "single subdirectory '{}' duplicates parent name",
            inner.name
        )];
        let inner_pack = if inner_gate.passed && inner_score >= ctx.score_threshold(&self.config) {
            reasoning.push("inner directory qualifies as a pack".to_string());
            let confidence = (inner_score / 100.0).clamp(0.0, 1.0);
            let mut inner_reasons = inner_breakdown.reasons.clone();
            inner_reasons.extend(inner_gate.reasons.clone());
            Some(self.make_pack(
                inner,
                PackType::CommercialPack,
                confidence,
                inner_reasons,
                &inner_breakdown,
            ))
        } else {
            None
        };

        let confidence = inner_pack
            .as_ref()
            .map(|p| p.confidence)
            .unwrap_or(0.6)
            .max(0.6);

        let mut pack = self.make_pack(
            node,
            PackType::WrapperFolder,
            confidence,
            reasoning,
            &inner_breakdown,
        );
        pack.should_extract = true;
        pack.actual_pack_path = Some(inner.path.clone());
        pack.sub_packs = inner_pack.into_iter().collect();

        Some(Outcome::Accepted(Box::new(pack), inner_score.max(50.0)))
    }

    /// Sub-pack qualification used by rules P2 and P4. Category-named
    /// subfolders ("Kicks", "FX") are internal structure, never sub-packs.
    fn qualifying_sub_packs(&self, node: &SnapshotNode, ctx: DetectionContext) -> Vec<DetectedPack> {
        let scorer = PackScorer::new(&self.taxonomy, &self.config);
        let mut out = Vec::new();
        for child in node.subdirectories() {
            if self.taxonomy.is_category_name(&child.name) {
                continue;
            }
            let child_ctx = DetectionContext::bundle_child(ctx.depth + 1);
            let gate = scorer.content_gate(child, child_ctx);
            if !gate.passed {
                continue;
            }
            let breakdown = self.score_cached(child, child_ctx);
            let score = breakdown.total();
            let strong_audio = child.audio_file_count >= child_ctx.audio_threshold(&self.config);
            if score >= self.config.sub_pack_score_threshold || strong_audio {
                let mut reasoning = breakdown.reasons.clone();
                reasoning.extend(gate.reasons);
                let confidence = (score / 100.0).max(0.5).clamp(0.0, 1.0);
                let mut pack = self.make_pack(
                    child,
                    PackType::CommercialPack,
                    confidence,
                    reasoning,
                    &breakdown,
                );
                pack.should_recurse_inside = false;
                out.push(pack);
            }
        }
        out
    }

    fn make_bundle(
        &self,
        node: &SnapshotNode,
        children: Vec<DetectedPack>,
        reasoning: Vec<String>,
    ) -> DetectedPack {
        let breakdown = ScoreBreakdown::default();
        let mut pack = self.make_pack(node, PackType::BundleContainer, 0.9, reasoning, &breakdown);
        // Children have been emitted as independent packs; detection stops.
        pack.should_recurse_inside = false;
        pack.sub_packs = children;
        pack
    }

    fn make_pack(
        &self,
        node: &SnapshotNode,
        pack_type: PackType,
        confidence: f64,
        reasoning: Vec<String>,
        breakdown: &ScoreBreakdown,
    ) -> DetectedPack {
        let subfolder_count = node.subdirectories().count();
        let direct_audio = node.direct_audio_file_count();
        let structure = StructureSummary {
            subfolder_count,
            depth: node.subtree_depth(),
            has_documentation: node.has_documentation(),
            has_presets: node.preset_file_count > 0,
            is_flat: subfolder_count == 0 || direct_audio == node.audio_file_count,
        };

        DetectedPack {
            id: DetectedPack::new_id(),
            name: node.name.clone(),
            path: node.path.clone(),
            pack_type,
            confidence,
            reasoning,
            audio_file_count: node.audio_file_count,
            preset_file_count: node.preset_file_count,
            total_file_count: node.file_count(),
            total_size: node.total_size,
            needs_reorganization: !structure.is_flat && breakdown.category_matches == 0,
            should_extract: false,
            should_recurse_inside: pack_type == PackType::OrganizationFolder,
            actual_pack_path: None,
            sub_packs: Vec::new(),
            structure,
        }
    }

    fn score_cached(&self, node: &SnapshotNode, ctx: DetectionContext) -> ScoreBreakdown {
        let nested = ctx.depth > 0 || ctx.inside_bundle;
        let key = (node.path.clone(), nested);
        if let Some(found) = self.score_cache.get(&key) {
            return found.clone();
        }
        let breakdown = PackScorer::new(&self.taxonomy, &self.config).score(node, ctx);
        self.score_cache.insert(key, breakdown.clone());
        breakdown
    }

    fn should_skip(&self, node: &SnapshotNode) -> bool {
        node.name.starts_with('.') || self.taxonomy.is_ignored(&node.name)
    }

    /// Sort accepted packs by decreasing score, drop descendants of kept
    /// packs, and deduplicate by canonical path.
    fn resolve_conflicts(&self, mut accepted: Vec<(DetectedPack, f64)>) -> Vec<DetectedPack> {
        accepted.sort_by(|(a, sa), (b, sb)| {
            sb.partial_cmp(sa)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.path.cmp(&b.path))
        });

        let all_paths: HashSet<PathBuf> = accepted.iter().map(|(p, _)| p.path.clone()).collect();
        let mut seen = HashSet::new();
        let mut kept = Vec::new();

        for (pack, _) in accepted {
            if !seen.insert(pack.path.clone()) {
                continue;
            }
            let has_accepted_ancestor = pack
                .path
                .ancestors()
                .skip(1)
                .any(|ancestor| all_paths.contains(ancestor));
            if has_accepted_ancestor {
                continue;
            }
            kept.push(pack);
        }
        kept
    }
}

/// Whitespace/underscore/dash-insensitive name equality for rule P1.
fn wrapper_normalize(name: &str) -> String {
    name.chars()
        .filter(|c| !matches!(c, ' ' | '_' | '-'))
        .flat_map(char::to_lowercase)
        .collect()
}
