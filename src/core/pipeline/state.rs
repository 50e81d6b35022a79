//! Pipeline state: phases, statuses, records, and per-phase outputs.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::core::snapshot::{ScanStats, Snapshot};
use crate::detectors::classifier::EnrichedPack;
use crate::detectors::duplicates::DuplicateReport;
use crate::detectors::fusion::FusionGroup;
use crate::detectors::structure::StructureProposal;
use crate::organize::validator::ValidationReport;

/// One of the six pipeline phases, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    /// Phase 0: quick scan + clean/reorganize
    Preparation,
    /// Phase 1: pack detection + duplicate report
    Discovery,
    /// Phase 2: tagging + quarantine
    Classification,
    /// Phase 3: structure proposals + fusion groups
    Matrix,
    /// Phase 4: planned and executed reorganization
    Organization,
    /// Phase 5: post-execution checks
    Validation,
}

impl Phase {
    /// All phases in order.
    pub const ALL: [Phase; 6] = [
        Phase::Preparation,
        Phase::Discovery,
        Phase::Classification,
        Phase::Matrix,
        Phase::Organization,
        Phase::Validation,
    ];

    /// Zero-based phase index.
    pub fn index(self) -> usize {
        match self {
            Phase::Preparation => 0,
            Phase::Discovery => 1,
            Phase::Classification => 2,
            Phase::Matrix => 3,
            Phase::Organization => 4,
            Phase::Validation => 5,
        }
    }

    /// Phase for a zero-based index.
    pub fn from_index(index: usize) -> Option<Phase> {
        Phase::ALL.get(index).copied()
    }

    /// Human-readable phase name.
    pub fn name(self) -> &'static str {
        match self {
            Phase::Preparation => "preparation",
            Phase::Discovery => "discovery",
            Phase::Classification => "classification",
            Phase::Matrix => "matrix",
            Phase::Organization => "organization",
            Phase::Validation => "validation",
        }
    }

    /// The next phase, if any.
    pub fn next(self) -> Option<Phase> {
        Phase::from_index(self.index() + 1)
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Completion status of one phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PhaseStatus {
    /// Not started
    #[default]
    Pending,
    /// Currently executing
    Running,
    /// Suspended at a user-interaction checkpoint
    AwaitingUser,
    /// Finished successfully
    Completed,
    /// Finished with an error
    Failed,
}

/// Overall pipeline status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PipelineStatus {
    /// Created, nothing executed yet
    #[default]
    Idle,
    /// A phase is running
    Running,
    /// Suspended at a checkpoint
    AwaitingUser,
    /// All phases completed
    Completed,
    /// A phase failed
    Failed,
    /// Stopped by request
    Stopped,
}

/// Frozen state persisted when a phase suspends for user input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingInteraction {
    /// Phase that suspended
    pub phase: Phase,
    /// Step the phase should resume from
    pub resume_from_step: u32,
    /// Human-readable prompt for the shell
    pub message: String,
    /// Opaque step payload handed back on resume
    pub payload: serde_json::Value,
}

/// Running summary owned by each phase.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseSummary {
    /// Wall-clock duration in milliseconds
    pub duration_ms: u64,
    /// Named counters (packs detected, operations executed, ...)
    pub counters: IndexMap<String, u64>,
    /// Errors accumulated during the phase
    pub errors: Vec<String>,
    /// Warnings accumulated during the phase
    pub warnings: Vec<String>,
}

/// Record of one phase inside the pipeline state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseRecord {
    /// Which phase this record describes
    pub phase: Phase,
    /// Completion status
    pub status: PhaseStatus,
    /// Running summary
    pub summary: PhaseSummary,
    /// Pending interaction while suspended
    pub pending: Option<PendingInteraction>,
    /// When the phase last started
    pub started_at: Option<DateTime<Utc>>,
    /// When the phase reached a terminal status
    pub finished_at: Option<DateTime<Utc>>,
}

impl PhaseRecord {
    /// Fresh record for a phase.
    pub fn new(phase: Phase) -> Self {
        Self {
            phase,
            status: PhaseStatus::Pending,
            summary: PhaseSummary::default(),
            pending: None,
            started_at: None,
            finished_at: None,
        }
    }
}

/// Output of phase 0 (preparation).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreparationOutput {
    /// Snapshot used by downstream phases
    pub snapshot: Snapshot,
    /// Scan statistics
    pub stats: ScanStats,
    /// Clean renames applied
    pub cleaned: usize,
    /// Wrappers unwrapped
    pub unwrapped: usize,
    /// Backup created before mutation, if any
    pub backup_path: Option<PathBuf>,
}

/// One enrichment result set; phase 2 falls back between them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichmentResult {
    /// Enriched packs produced by the enrichment pass
    pub enriched_packs: Vec<EnrichedPack>,
}

/// Output of phase 1 (discovery).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveryOutput {
    /// Primary enrichment result (metadata pass)
    pub metadata: Option<EnrichmentResult>,
    /// Secondary enrichment result (deep-analysis pass), used as fallback
    pub deep_analysis: Option<EnrichmentResult>,
    /// Duplicate report
    pub duplicates: DuplicateReport,
    /// Strategy the user selected at the duplicate checkpoint, if any
    pub duplicate_strategy: Option<crate::core::config::DuplicateStrategy>,
}

impl DiscoveryOutput {
    /// Enriched packs, preferring the metadata pass.
    pub fn enriched_packs(&self) -> Option<&[EnrichedPack]> {
        self.metadata
            .as_ref()
            .filter(|m| !m.enriched_packs.is_empty())
            .or(self.deep_analysis.as_ref())
            .map(|m| m.enriched_packs.as_slice())
    }
}

/// A low-confidence pack parked for user review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuarantinedPack {
    /// Identifier of the detected pack
    pub pack_id: String,
    /// Display name
    pub name: String,
    /// Source path
    pub path: PathBuf,
    /// Detection confidence
    pub confidence: f64,
    /// Why the pack was quarantined
    pub reasons: Vec<String>,
}

/// Output of phase 2 (classification).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassificationOutput {
    /// Tagged packs that passed the confidence bar
    pub enriched_packs: Vec<EnrichedPack>,
    /// Packs parked for review
    pub quarantined: Vec<QuarantinedPack>,
}

/// Output of phase 3 (matrix).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatrixOutput {
    /// Candidate target hierarchies
    pub proposals: Vec<StructureProposal>,
    /// Near-duplicate pack groups
    pub fusion_groups: Vec<FusionGroup>,
    /// Identifier of the proposal selected by the user
    pub selected_proposal: Option<String>,
}

/// Output of phase 4 (organization).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrganizationOutput {
    /// Identifier of the executed plan
    pub plan_id: String,
    /// Operations in the plan
    pub operations_total: usize,
    /// Operations applied
    pub executed: usize,
    /// Operations skipped
    pub skipped: usize,
    /// Failure descriptions
    pub failures: Vec<String>,
    /// Backup created before execution
    pub backup_path: Option<PathBuf>,
    /// Whether this was a dry run
    pub dry_run: bool,
    /// Execution duration in milliseconds
    pub duration_ms: u64,
}

/// Output of phase 5 (validation).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationOutput {
    /// Full validation report
    pub report: ValidationReport,
}

/// Typed per-phase output stored in the pipeline state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "kebab-case")]
pub enum PhaseData {
    /// Phase 0 output
    Preparation(PreparationOutput),
    /// Phase 1 output
    Discovery(DiscoveryOutput),
    /// Phase 2 output
    Classification(ClassificationOutput),
    /// Phase 3 output
    Matrix(MatrixOutput),
    /// Phase 4 output
    Organization(OrganizationOutput),
    /// Phase 5 output
    Validation(ValidationOutput),
}

impl PhaseData {
    /// Phase this output belongs to.
    pub fn phase(&self) -> Phase {
        match self {
            PhaseData::Preparation(_) => Phase::Preparation,
            PhaseData::Discovery(_) => Phase::Discovery,
            PhaseData::Classification(_) => Phase::Classification,
            PhaseData::Matrix(_) => Phase::Matrix,
            PhaseData::Organization(_) => Phase::Organization,
            PhaseData::Validation(_) => Phase::Validation,
        }
    }
}

/// Map from phase to its stored output.
pub type PhaseOutputs = IndexMap<Phase, PhaseData>;

/// Full mutable pipeline state owned by the controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineState {
    /// Source directory under organization
    pub source: PathBuf,
    /// Phase the pipeline is at
    pub current_phase: Phase,
    /// Overall status
    pub status: PipelineStatus,
    /// Per-phase records, indexed by phase order
    pub phases: Vec<PhaseRecord>,
    /// Stored phase outputs
    pub outputs: PhaseOutputs,
}

impl PipelineState {
    /// Fresh state for a source directory.
    pub fn new(source: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            current_phase: Phase::Preparation,
            status: PipelineStatus::Idle,
            phases: Phase::ALL.iter().map(|p| PhaseRecord::new(*p)).collect(),
            outputs: PhaseOutputs::new(),
        }
    }

    /// Record for a phase.
    pub fn record(&self, phase: Phase) -> &PhaseRecord {
        &self.phases[phase.index()]
    }

    /// Mutable record for a phase.
    pub fn record_mut(&mut self, phase: Phase) -> &mut PhaseRecord {
        &mut self.phases[phase.index()]
    }

    /// Stored output for a phase.
    pub fn output(&self, phase: Phase) -> Option<&PhaseData> {
        self.outputs.get(&phase)
    }

    /// Whether every phase completed.
    pub fn is_complete(&self) -> bool {
        self.phases
            .iter()
            .all(|r| r.status == PhaseStatus::Completed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_ordering() {
        assert_eq!(Phase::Preparation.index(), 0);
        assert_eq!(Phase::Validation.index(), 5);
        assert_eq!(Phase::Preparation.next(), Some(Phase::Discovery));
        assert_eq!(Phase::Validation.next(), None);
        assert_eq!(Phase::from_index(3), Some(Phase::Matrix));
        assert_eq!(Phase::from_index(6), None);
    }

    #[test]
    fn test_fresh_state() {
        let state = PipelineState::new("/music");
        assert_eq!(state.status, PipelineStatus::Idle);
        assert_eq!(state.phases.len(), 6);
        assert!(state
            .phases
            .iter()
            .all(|r| r.status == PhaseStatus::Pending));
        assert!(!state.is_complete());
    }

    #[test]
    fn test_discovery_fallback_prefers_metadata() {
        let output = DiscoveryOutput {
            metadata: Some(EnrichmentResult::default()),
            deep_analysis: None,
            duplicates: DuplicateReport::default(),
            duplicate_strategy: None,
        };
        // Empty metadata result falls through to the (absent) deep pass.
        assert!(output.enriched_packs().is_none());
    }
}
