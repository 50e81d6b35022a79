//! # Packflow-RS: Audio Sample Pack Organizer Core
//!
//! Organizes large, unruly collections of audio sample packs into a clean,
//! taxonomically consistent directory tree. The engine ingests a source
//! directory, detects packs and bundles with structure + name heuristics,
//! indexes and de-duplicates files, classifies packs by style and type,
//! proposes target structures, executes a planned reorganization with backup
//! and rollback, and validates the result.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        API Layer                            │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Core Engine   │  Detectors    │  Organize    │  I/O        │
//! │                │               │              │             │
//! │ • Snapshot     │ • Packs       │ • Planner    │ • Reports   │
//! │ • Taxonomy     │ • Duplicates  │ • Executor   │             │
//! │ • Pipeline     │ • Classifier  │ • Rollback   │             │
//! │ • Config       │ • Fusion      │ • Validator  │             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use packflow_rs::{OrganizerConfig, OrganizerEngine};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut engine = OrganizerEngine::new("/music/packs", OrganizerConfig::default())?;
//!     engine.initialize()?;
//!
//!     let outcome = engine.execute_phase(0).await?;
//!     println!("phase 0: {:?}", outcome.status);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(unsafe_code)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

// Core engine modules
pub mod core {
    //! Core data model, configuration, and pipeline engine.

    pub mod config;
    pub mod errors;
    pub mod events;
    pub mod files;
    pub mod pipeline;
    pub mod snapshot;
    pub mod taxonomy;
}

// Specialized detection algorithms
pub mod detectors {
    //! Pack, duplicate, tag, proposal, and fusion detection.

    pub mod classifier;
    pub mod duplicates;
    pub mod fusion;
    pub mod packs;
    pub mod structure;
}

// Planning, execution, rollback, and validation
pub mod organize {
    //! Reorganization planning, execution, rollback, and validation.

    pub mod executor;
    pub mod plan;
    pub mod rollback;
    pub mod validator;
}

// I/O and reporting
pub mod io {
    //! Report generation.

    pub mod reports;
}

// Public API and engine interface
pub mod api {
    //! High-level API and engine interface.

    pub mod engine;
    pub mod results;
}

// Re-export primary types for convenience
pub use api::engine::OrganizerEngine;
pub use api::results::RunSummary;
pub use crate::core::config::OrganizerConfig;
pub use crate::core::errors::{OrganizerError, Result, ResultExt};
pub use crate::core::events::PipelineEvent;
pub use crate::core::pipeline::{Phase, PhaseData, PipelineState, PipelineStatus};

/// Library version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
