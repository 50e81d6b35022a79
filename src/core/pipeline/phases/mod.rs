//! Phase implementations.
//!
//! Each phase is atomic, restartable, and may suspend for user input. The
//! controller owns all mutable pipeline state; phases are functions over a
//! read-only context plus the outputs of earlier phases.

pub use classification::ClassificationPhase;
pub use discovery::DiscoveryPhase;
pub use matrix::MatrixPhase;
pub use organization::OrganizationPhase;
pub use preparation::PreparationPhase;
pub use validation::ValidationPhase;

mod classification;
mod discovery;
mod matrix;
mod organization;
mod preparation;
mod validation;

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::core::config::OrganizerConfig;
use crate::core::errors::{OrganizerError, Result};
use crate::core::events::{EventBus, PipelineEvent};
use crate::core::pipeline::state::{PendingInteraction, Phase, PhaseData, PhaseOutputs};
use crate::core::taxonomy::TaxonomyRegistry;

/// Result of driving a phase to its next boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum PhaseOutcome {
    /// The phase finished and produced its output
    Completed(PhaseData),
    /// The phase suspended at a user-interaction checkpoint
    AwaitingUser(PendingInteraction),
}

/// Resume parameters for a suspended phase.
#[derive(Debug, Clone, Default)]
pub struct ResumeRequest {
    /// Step the phase should resume from
    pub from_step: u32,
    /// The user's choice payload
    pub user_choice: serde_json::Value,
    /// The pending state frozen at suspension
    pub pending: serde_json::Value,
}

/// Read-only context shared by every phase.
#[derive(Clone)]
pub struct PhaseContext {
    /// Source directory under organization
    pub source: PathBuf,
    /// Organizer configuration
    pub config: Arc<OrganizerConfig>,
    /// Shared taxonomy
    pub taxonomy: Arc<TaxonomyRegistry>,
    /// Event bus
    pub events: Arc<EventBus>,
    /// Cooperative stop flag, checked at suspension points
    pub cancelled: Arc<AtomicBool>,
}

impl PhaseContext {
    /// Emit a progress event for a phase.
    pub fn progress(&self, phase: Phase, progress: f64, message: impl Into<String>) {
        self.events.emit(PipelineEvent::PhaseProgress {
            phase,
            progress,
            message: message.into(),
        });
    }

    /// Error out when a stop was requested; called at suspension points.
    pub fn check_cancelled(&self, phase: Phase) -> Result<()> {
        if self.cancelled.load(Ordering::Relaxed) {
            Err(OrganizerError::cancelled(phase.name()))
        } else {
            Ok(())
        }
    }
}

/// Contract implemented by each of the six phases.
#[async_trait]
pub trait PipelinePhase: Send + Sync {
    /// Which phase this implementation drives.
    fn phase(&self) -> Phase;

    /// Run the phase from its first step.
    async fn execute(&self, ctx: &PhaseContext, prior: &PhaseOutputs) -> Result<PhaseOutcome>;

    /// Re-enter the phase after a user-action checkpoint.
    async fn resume(
        &self,
        ctx: &PhaseContext,
        prior: &PhaseOutputs,
        request: ResumeRequest,
    ) -> Result<PhaseOutcome> {
        let _ = (ctx, prior, request);
        Err(OrganizerError::pipeline_cause(
            self.phase().name(),
            "phase does not support resumption",
            "not-resumable",
        ))
    }
}
