//! Public result types consumed by the shell and the report writer.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::core::pipeline::{Phase, PhaseData, PipelineState, PipelineStatus};

/// Aggregate summary of one pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    /// Source directory
    pub source: PathBuf,
    /// Overall pipeline status
    pub status: PipelineStatus,
    /// Files indexed during preparation
    pub files_indexed: usize,
    /// Packs detected (bundle children included)
    pub packs_detected: usize,
    /// Duplicate groups found
    pub duplicate_groups: usize,
    /// Bytes recoverable from duplicates
    pub wasted_bytes: u64,
    /// Packs quarantined in classification
    pub quarantined: usize,
    /// Fusion groups planned
    pub fusion_groups: usize,
    /// Operations executed in organization
    pub operations_executed: usize,
    /// Operation failures in organization
    pub operation_failures: usize,
    /// Validation score, when phase 5 ran
    pub validation_score: Option<f64>,
    /// Validation verdict, when phase 5 ran
    pub validation_passed: Option<bool>,
}

impl RunSummary {
    /// Build a summary from the pipeline state.
    pub fn from_state(state: &PipelineState) -> Self {
        let mut summary = RunSummary {
            source: state.source.clone(),
            status: state.status,
            ..RunSummary::default()
        };

        if let Some(PhaseData::Preparation(prep)) = state.output(Phase::Preparation) {
            summary.files_indexed = prep.stats.files;
        }
        if let Some(PhaseData::Discovery(discovery)) = state.output(Phase::Discovery) {
            summary.packs_detected = discovery
                .enriched_packs()
                .map(|packs| packs.len())
                .unwrap_or(0);
            summary.duplicate_groups = discovery.duplicates.groups.len();
            summary.wasted_bytes = discovery.duplicates.total_wasted;
        }
        if let Some(PhaseData::Classification(classification)) =
            state.output(Phase::Classification)
        {
            summary.packs_detected = classification.enriched_packs.len();
            summary.quarantined = classification.quarantined.len();
        }
        if let Some(PhaseData::Matrix(matrix)) = state.output(Phase::Matrix) {
            summary.fusion_groups = matrix.fusion_groups.len();
        }
        if let Some(PhaseData::Organization(organization)) = state.output(Phase::Organization) {
            summary.operations_executed = organization.executed;
            summary.operation_failures = organization.failures.len();
        }
        if let Some(PhaseData::Validation(validation)) = state.output(Phase::Validation) {
            summary.validation_score = Some(validation.report.score);
            summary.validation_passed = Some(validation.report.passed);
        }

        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_from_fresh_state() {
        let state = PipelineState::new("/music");
        let summary = RunSummary::from_state(&state);
        assert_eq!(summary.source, PathBuf::from("/music"));
        assert_eq!(summary.packs_detected, 0);
        assert!(summary.validation_score.is_none());
    }
}
