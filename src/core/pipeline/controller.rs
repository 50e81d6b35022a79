//! Pipeline controller.
//!
//! Owns the full mutable pipeline state and drives the six phases through
//! their contract: `execute(input) → Completed | AwaitingUser | Failed`.
//! Transition rules: on `Completed` advance and emit `phase:complete`; on
//! `AwaitingUser` freeze progress, persist the pending state, and emit
//! `phase:user-action-required`; on failure emit `phase:error`. Phase N+1 may
//! start only after phase N completed. `stop()` aborts at the next
//! suspension point.

use chrono::Utc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

use crate::core::config::OrganizerConfig;
use crate::core::errors::{OrganizerError, Result};
use crate::core::events::{EventBus, PipelineEvent};
use crate::core::pipeline::phases::{
    ClassificationPhase, DiscoveryPhase, MatrixPhase, OrganizationPhase, PhaseContext,
    PhaseOutcome, PipelinePhase, PreparationPhase, ResumeRequest, ValidationPhase,
};
use crate::core::pipeline::state::{
    PendingInteraction, Phase, PhaseData, PhaseStatus, PipelineState, PipelineStatus,
};
use crate::core::snapshot::{SnapshotBuilder, SnapshotStore, ScanStats};
use crate::core::taxonomy::TaxonomyRegistry;

/// Result of one `execute_phase`/`continue_phase` command.
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseExecution {
    /// Phase the command drove
    pub phase: Phase,
    /// Status after the command
    pub status: PhaseStatus,
    /// Output when the phase completed
    pub output: Option<PhaseData>,
    /// Pending state when the phase suspended
    pub pending: Option<PendingInteraction>,
}

/// Drives the six-phase state machine.
pub struct PipelineController {
    state: PipelineState,
    config: Arc<OrganizerConfig>,
    taxonomy: Arc<TaxonomyRegistry>,
    events: Arc<EventBus>,
    cancelled: Arc<AtomicBool>,
    phases: Vec<Box<dyn PipelinePhase>>,
}

impl std::fmt::Debug for PipelineController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineController")
            .field("state", &self.state)
            .field("config", &self.config)
            .field("taxonomy", &self.taxonomy)
            .field("cancelled", &self.cancelled)
            .field("phases", &format!("<{} phases>", self.phases.len()))
            .finish()
    }
}

impl PipelineController {
    /// Create a controller for a source directory.
    pub fn new(
        source: impl Into<std::path::PathBuf>,
        config: Arc<OrganizerConfig>,
        taxonomy: Arc<TaxonomyRegistry>,
    ) -> Result<Self> {
        let source = source.into();
        if !source.is_dir() {
            return Err(OrganizerError::precondition_at(
                format!("source directory does not exist: {}", source.display()),
                source,
            ));
        }

        let phases: Vec<Box<dyn PipelinePhase>> = vec![
            Box::new(PreparationPhase),
            Box::new(DiscoveryPhase),
            Box::new(ClassificationPhase),
            Box::new(MatrixPhase),
            Box::new(OrganizationPhase),
            Box::new(ValidationPhase),
        ];

        Ok(Self {
            state: PipelineState::new(source),
            config,
            taxonomy,
            events: Arc::new(EventBus::default()),
            cancelled: Arc::new(AtomicBool::new(false)),
            phases,
        })
    }

    /// Create pipeline state and produce the initial snapshot.
    pub fn initialize(&mut self) -> Result<ScanStats> {
        let builder = SnapshotBuilder::new(self.config.snapshot.clone())?;
        let (snapshot, stats) = builder.build(&self.state.source)?;
        SnapshotStore::new(&self.state.source).save_original(&snapshot)?;
        self.state.status = PipelineStatus::Idle;
        info!(
            files = stats.files,
            directories = stats.directories,
            "pipeline initialized"
        );
        Ok(stats)
    }

    /// Current pipeline state.
    pub fn state(&self) -> &PipelineState {
        &self.state
    }

    /// Stored output of a phase.
    pub fn phase_data(&self, phase: Phase) -> Option<&PhaseData> {
        self.state.output(phase)
    }

    /// Subscribe to pipeline events.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<PipelineEvent> {
        self.events.subscribe()
    }

    /// Event history for replay.
    pub fn event_history(&self) -> Vec<PipelineEvent> {
        self.events.history()
    }

    /// Request cancellation at the next suspension point.
    pub fn stop(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    /// Run a phase to completion or suspension.
    ///
    /// Executing an already-completed phase is a no-op returning the stored
    /// output.
    pub async fn execute_phase(&mut self, phase: Phase) -> Result<PhaseExecution> {
        // Idempotence: a completed phase is not re-run.
        if self.state.record(phase).status == PhaseStatus::Completed {
            return Ok(PhaseExecution {
                phase,
                status: PhaseStatus::Completed,
                output: self.state.output(phase).cloned(),
                pending: None,
            });
        }

        self.guard_order(phase)?;

        let ctx = self.phase_context();
        self.begin(phase);
        let started = Instant::now();
        let outcome = self.phases[phase.index()]
            .execute(&ctx, &self.state.outputs)
            .await;
        self.settle(phase, started, outcome)
    }

    /// Resume a suspended phase after a user action.
    ///
    /// Resuming a completed phase is rejected.
    pub async fn continue_phase(
        &mut self,
        phase: Phase,
        from_step: u32,
        user_choice: serde_json::Value,
    ) -> Result<PhaseExecution> {
        let record = self.state.record(phase);
        if record.status == PhaseStatus::Completed {
            return Err(OrganizerError::pipeline_cause(
                phase.name(),
                "phase already completed",
                "already-completed",
            ));
        }
        if record.status != PhaseStatus::AwaitingUser {
            return Err(OrganizerError::pipeline_cause(
                phase.name(),
                "phase is not awaiting user action",
                "not-awaiting-user",
            ));
        }
        let pending = record
            .pending
            .clone()
            .ok_or_else(|| {
                OrganizerError::pipeline_cause(
                    phase.name(),
                    "pending state is missing",
                    "missing-pending-state",
                )
            })?;
        if pending.resume_from_step != from_step {
            return Err(OrganizerError::pipeline_cause(
                phase.name(),
                format!(
                    "phase expects resume from step {}, got {}",
                    pending.resume_from_step, from_step
                ),
                "invalid-resume-step",
            ));
        }

        let ctx = self.phase_context();
        let request = ResumeRequest {
            from_step,
            user_choice,
            pending: pending.payload.clone(),
        };

        self.begin(phase);
        let started = Instant::now();
        let outcome = self.phases[phase.index()]
            .resume(&ctx, &self.state.outputs, request)
            .await;
        self.settle(phase, started, outcome)
    }

    /// Phase N+1 may start only after phase N completed.
    fn guard_order(&self, phase: Phase) -> Result<()> {
        for earlier in Phase::ALL.iter().take(phase.index()) {
            if self.state.record(*earlier).status != PhaseStatus::Completed {
                return Err(OrganizerError::pipeline_cause(
                    phase.name(),
                    format!("phase '{earlier}' has not completed"),
                    "phase-order",
                ));
            }
        }
        Ok(())
    }

    fn phase_context(&self) -> PhaseContext {
        PhaseContext {
            source: self.state.source.clone(),
            config: self.config.clone(),
            taxonomy: self.taxonomy.clone(),
            events: self.events.clone(),
            cancelled: self.cancelled.clone(),
        }
    }

    fn begin(&mut self, phase: Phase) {
        self.state.status = PipelineStatus::Running;
        self.state.current_phase = phase;
        let record = self.state.record_mut(phase);
        record.status = PhaseStatus::Running;
        record.started_at = Some(Utc::now());
        record.pending = None;
        self.events.emit(PipelineEvent::PhaseStart { phase });
    }

    fn settle(
        &mut self,
        phase: Phase,
        started: Instant,
        outcome: Result<PhaseOutcome>,
    ) -> Result<PhaseExecution> {
        let duration_ms = started.elapsed().as_millis() as u64;

        match outcome {
            Ok(PhaseOutcome::Completed(output)) => {
                let record = self.state.record_mut(phase);
                record.status = PhaseStatus::Completed;
                record.summary.duration_ms += duration_ms;
                record.finished_at = Some(Utc::now());
                self.state.outputs.insert(phase, output.clone());

                self.events.emit(PipelineEvent::PhaseComplete { phase });
                if let Some(next) = phase.next() {
                    self.state.current_phase = next;
                    self.state.status = PipelineStatus::Idle;
                } else {
                    self.state.status = PipelineStatus::Completed;
                }
                info!("phase '{phase}' completed in {duration_ms}ms");

                Ok(PhaseExecution {
                    phase,
                    status: PhaseStatus::Completed,
                    output: Some(output),
                    pending: None,
                })
            }
            Ok(PhaseOutcome::AwaitingUser(pending)) => {
                let record = self.state.record_mut(phase);
                record.status = PhaseStatus::AwaitingUser;
                record.summary.duration_ms += duration_ms;
                record.pending = Some(pending.clone());
                self.state.status = PipelineStatus::AwaitingUser;

                self.events.emit(PipelineEvent::PhaseUserActionRequired {
                    phase,
                    pending: pending.clone(),
                });
                info!("phase '{phase}' awaiting user action");

                Ok(PhaseExecution {
                    phase,
                    status: PhaseStatus::AwaitingUser,
                    output: None,
                    pending: Some(pending),
                })
            }
            Err(e) if e.is_cancelled() => {
                // Unwind: the phase may be re-run after a stop.
                let record = self.state.record_mut(phase);
                record.status = PhaseStatus::Pending;
                self.state.status = PipelineStatus::Stopped;
                info!("phase '{phase}' stopped at a suspension point");
                Err(e)
            }
            Err(e) => {
                let record = self.state.record_mut(phase);
                record.status = PhaseStatus::Failed;
                record.summary.duration_ms += duration_ms;
                record.summary.errors.push(e.to_string());
                record.finished_at = Some(Utc::now());
                self.state.status = PipelineStatus::Failed;

                self.events.emit(PipelineEvent::PhaseError {
                    phase,
                    message: e.to_string(),
                });
                error!("phase '{phase}' failed: {e}");
                Err(e)
            }
        }
    }
}
