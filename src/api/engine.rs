//! Main organizer engine implementation.
//!
//! `OrganizerEngine` is the process-boundary surface consumed by the shell:
//! a small command set (`initialize`, `execute_phase`, `continue_phase`,
//! `get_phase_data`, `get_state`, `stop`) plus an event stream.

use std::path::Path;
use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::info;

use crate::api::results::RunSummary;
use crate::core::config::OrganizerConfig;
use crate::core::errors::{OrganizerError, Result};
use crate::core::events::PipelineEvent;
use crate::core::pipeline::{
    Phase, PhaseData, PhaseExecution, PipelineController, PipelineState,
};
use crate::core::snapshot::ScanStats;
use crate::core::taxonomy::{TaxonomyOrigin, TaxonomyRegistry};

/// Main organizer engine.
#[derive(Debug)]
pub struct OrganizerEngine {
    controller: PipelineController,
    config: Arc<OrganizerConfig>,
    taxonomy: Arc<TaxonomyRegistry>,
}

impl OrganizerEngine {
    /// Create an engine for a source directory.
    pub fn new(source: impl AsRef<Path>, config: OrganizerConfig) -> Result<Self> {
        info!("initializing organizer engine");
        config.validate()?;

        let config = Arc::new(config);
        let taxonomy = Arc::new(TaxonomyRegistry::load());
        let controller =
            PipelineController::new(source.as_ref(), config.clone(), taxonomy.clone())?;

        Ok(Self {
            controller,
            config,
            taxonomy,
        })
    }

    /// Create pipeline state and produce the initial snapshot.
    pub fn initialize(&mut self) -> Result<ScanStats> {
        self.controller.initialize()
    }

    /// Run a phase (by index) to completion or suspension.
    pub async fn execute_phase(&mut self, phase_index: usize) -> Result<PhaseExecution> {
        let phase = resolve_phase(phase_index)?;
        self.controller.execute_phase(phase).await
    }

    /// Resume a suspended phase.
    pub async fn continue_phase(
        &mut self,
        phase_index: usize,
        from_step: u32,
        data: serde_json::Value,
    ) -> Result<PhaseExecution> {
        let phase = resolve_phase(phase_index)?;
        self.controller.continue_phase(phase, from_step, data).await
    }

    /// Stored output of a phase.
    pub fn get_phase_data(&self, phase_index: usize) -> Result<Option<&PhaseData>> {
        let phase = resolve_phase(phase_index)?;
        Ok(self.controller.phase_data(phase))
    }

    /// Current pipeline state.
    pub fn get_state(&self) -> &PipelineState {
        self.controller.state()
    }

    /// Cancel at the next suspension point.
    pub fn stop(&self) {
        self.controller.stop();
    }

    /// Subscribe to pipeline events.
    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.controller.subscribe()
    }

    /// In-order event history.
    pub fn event_history(&self) -> Vec<PipelineEvent> {
        self.controller.event_history()
    }

    /// The effective configuration.
    pub fn config(&self) -> &OrganizerConfig {
        &self.config
    }

    /// Summarize the run from the current pipeline state.
    pub fn run_summary(&self) -> RunSummary {
        RunSummary::from_state(self.controller.state())
    }

    /// Engine status snapshot.
    pub fn status(&self) -> EngineStatus {
        EngineStatus {
            source: self.controller.state().source.clone(),
            pipeline_status: self.controller.state().status,
            current_phase: self.controller.state().current_phase,
            taxonomy_origin: self.taxonomy.origin().clone(),
        }
    }

    /// Perform a health check of the engine.
    pub fn health_check(&self) -> HealthCheckResult {
        let mut checks = Vec::new();
        let mut overall = true;

        match self.config.validate() {
            Ok(()) => checks.push(HealthCheck {
                name: "Configuration".to_string(),
                status: HealthCheckStatus::Passed,
                message: None,
            }),
            Err(e) => {
                checks.push(HealthCheck {
                    name: "Configuration".to_string(),
                    status: HealthCheckStatus::Failed,
                    message: Some(e.to_string()),
                });
                overall = false;
            }
        }

        match self.taxonomy.origin() {
            TaxonomyOrigin::File(path) => checks.push(HealthCheck {
                name: "Taxonomy".to_string(),
                status: HealthCheckStatus::Passed,
                message: Some(format!("loaded from {}", path.display())),
            }),
            TaxonomyOrigin::Builtin => checks.push(HealthCheck {
                name: "Taxonomy".to_string(),
                status: HealthCheckStatus::Warning,
                message: Some("using builtin catalogue".to_string()),
            }),
        }

        if self.controller.state().source.is_dir() {
            checks.push(HealthCheck {
                name: "Source".to_string(),
                status: HealthCheckStatus::Passed,
                message: None,
            });
        } else {
            checks.push(HealthCheck {
                name: "Source".to_string(),
                status: HealthCheckStatus::Failed,
                message: Some("source directory vanished".to_string()),
            });
            overall = false;
        }

        HealthCheckResult {
            overall_status: overall,
            checks,
            timestamp: chrono::Utc::now(),
        }
    }
}

fn resolve_phase(index: usize) -> Result<Phase> {
    Phase::from_index(index)
        .ok_or_else(|| OrganizerError::validation(format!("invalid phase index {index}")))
}

/// Status information about the engine.
#[derive(Debug, Clone)]
pub struct EngineStatus {
    /// Source directory under organization
    pub source: std::path::PathBuf,
    /// Overall pipeline status
    pub pipeline_status: crate::core::pipeline::PipelineStatus,
    /// Phase the pipeline is at
    pub current_phase: Phase,
    /// Where the taxonomy came from
    pub taxonomy_origin: TaxonomyOrigin,
}

/// Result of an engine health check.
#[derive(Debug)]
pub struct HealthCheckResult {
    /// Overall health status
    pub overall_status: bool,
    /// Individual health checks
    pub checks: Vec<HealthCheck>,
    /// Timestamp of the check
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Individual health check result.
#[derive(Debug)]
pub struct HealthCheck {
    /// Name of the component being checked
    pub name: String,
    /// Status of this check
    pub status: HealthCheckStatus,
    /// Optional message with details
    pub message: Option<String>,
}

/// Health check status.
#[derive(Debug, PartialEq, Eq)]
pub enum HealthCheckStatus {
    /// Check passed successfully
    Passed,
    /// Check failed
    Failed,
    /// Check passed with warnings
    Warning,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn engine_for(tmp: &TempDir) -> OrganizerEngine {
        let source = tmp.path().join("src");
        fs::create_dir_all(&source).unwrap();
        OrganizerEngine::new(&source, OrganizerConfig::default()).unwrap()
    }

    #[test]
    fn test_engine_creation_validates_source() {
        let err = OrganizerEngine::new("/definitely/not/here", OrganizerConfig::default())
            .unwrap_err();
        assert!(matches!(err, OrganizerError::Precondition { .. }));
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("src");
        fs::create_dir_all(&source).unwrap();
        let mut config = OrganizerConfig::default();
        config.detector.min_audio_ratio = 3.0;
        let err = OrganizerEngine::new(&source, config).unwrap_err();
        assert!(matches!(err, OrganizerError::Config { .. }));
    }

    #[test]
    fn test_initialize_writes_snapshot() {
        let tmp = TempDir::new().unwrap();
        let mut engine = engine_for(&tmp);
        fs::write(tmp.path().join("src").join("kick.wav"), b"wav").unwrap();

        let stats = engine.initialize().unwrap();
        assert_eq!(stats.audio_files, 1);
        assert!(crate::core::snapshot::SnapshotStore::new(tmp.path().join("src")).has_original());
    }

    #[test]
    fn test_invalid_phase_index() {
        let tmp = TempDir::new().unwrap();
        let engine = engine_for(&tmp);
        assert!(engine.get_phase_data(9).is_err());
        assert!(engine.get_phase_data(5).unwrap().is_none());
    }

    #[test]
    fn test_health_check_reports_taxonomy_origin() {
        let tmp = TempDir::new().unwrap();
        let engine = engine_for(&tmp);
        let health = engine.health_check();
        assert!(health.overall_status);
        assert!(health.checks.iter().any(|c| c.name == "Taxonomy"));
    }
}
