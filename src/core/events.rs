//! Typed pipeline events.
//!
//! Events are published on a broadcast bus consumed by the shell. Emissions
//! for a given phase are totally ordered: `start` < progress* <
//! (`user-action-required` | `complete` | `error`); the bus also keeps an
//! in-order history so a run can be replayed.

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::broadcast;

use crate::core::pipeline::state::{PendingInteraction, Phase};

/// Progress callback used to wire console progress bars.
pub type ProgressCallback = Box<dyn Fn(&str, f64) + Send + Sync>;

/// Typed event published by the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum PipelineEvent {
    /// A phase started
    PhaseStart {
        /// Phase that started
        phase: Phase,
    },
    /// Progress inside a phase step; monotonic within a step
    PhaseProgress {
        /// Phase reporting progress
        phase: Phase,
        /// Progress percentage in [0, 100]
        progress: f64,
        /// Human-readable status line
        message: String,
    },
    /// The phase suspended at a user-interaction checkpoint
    PhaseUserActionRequired {
        /// Phase that suspended
        phase: Phase,
        /// Frozen pending state
        pending: PendingInteraction,
    },
    /// The phase completed
    PhaseComplete {
        /// Phase that completed
        phase: Phase,
    },
    /// The phase failed
    PhaseError {
        /// Phase that failed
        phase: Phase,
        /// Error description
        message: String,
    },
}

impl PipelineEvent {
    /// Phase this event belongs to.
    pub fn phase(&self) -> Phase {
        match self {
            PipelineEvent::PhaseStart { phase }
            | PipelineEvent::PhaseProgress { phase, .. }
            | PipelineEvent::PhaseUserActionRequired { phase, .. }
            | PipelineEvent::PhaseComplete { phase }
            | PipelineEvent::PhaseError { phase, .. } => *phase,
        }
    }
}

/// Broadcast bus with replayable history.
pub struct EventBus {
    sender: broadcast::Sender<PipelineEvent>,
    history: Mutex<Vec<PipelineEvent>>,
}

impl EventBus {
    /// Create a bus with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            history: Mutex::new(Vec::new()),
        }
    }

    /// Subscribe to future events.
    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.sender.subscribe()
    }

    /// Publish an event. Lagging or absent receivers are ignored.
    pub fn emit(&self, event: PipelineEvent) {
        self.history.lock().push(event.clone());
        let _ = self.sender.send(event);
    }

    /// In-order copy of everything emitted so far.
    pub fn history(&self) -> Vec<PipelineEvent> {
        self.history.lock().clone()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_preserves_order() {
        let bus = EventBus::default();
        bus.emit(PipelineEvent::PhaseStart {
            phase: Phase::Preparation,
        });
        bus.emit(PipelineEvent::PhaseProgress {
            phase: Phase::Preparation,
            progress: 50.0,
            message: "scanning".to_string(),
        });
        bus.emit(PipelineEvent::PhaseComplete {
            phase: Phase::Preparation,
        });

        let history = bus.history();
        assert_eq!(history.len(), 3);
        assert!(matches!(history[0], PipelineEvent::PhaseStart { .. }));
        assert!(matches!(history[2], PipelineEvent::PhaseComplete { .. }));
    }

    #[tokio::test]
    async fn test_subscribers_receive_events() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();
        bus.emit(PipelineEvent::PhaseStart {
            phase: Phase::Discovery,
        });
        let event = rx.recv().await.unwrap();
        assert_eq!(event.phase(), Phase::Discovery);
    }
}
