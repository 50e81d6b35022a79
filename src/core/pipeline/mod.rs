//! Pipeline engine.
//!
//! The six-phase state machine with user-interaction checkpoints,
//! suspend/resume, and event emission:
//!
//! | Phase | Name | Produces |
//! |-------|------|----------|
//! | 0 | Preparation | snapshot + clean/unwrap |
//! | 1 | Discovery | enriched packs + duplicate report |
//! | 2 | Classification | tagged packs + quarantine |
//! | 3 | Matrix | proposals + fusion groups |
//! | 4 | Organization | planned and executed reorganization |
//! | 5 | Validation | pass/fail with report |

pub use controller::{PhaseExecution, PipelineController};
pub use phases::{PhaseContext, PhaseOutcome, PipelinePhase, ResumeRequest};
pub use state::{
    ClassificationOutput, DiscoveryOutput, EnrichmentResult, MatrixOutput, OrganizationOutput,
    PendingInteraction, Phase, PhaseData, PhaseOutputs, PhaseRecord, PhaseStatus, PhaseSummary,
    PipelineState, PipelineStatus, PreparationOutput, QuarantinedPack, ValidationOutput,
};

mod controller;
mod phases;
pub(crate) mod state;
