//! Error types for the packflow-rs library.
//!
//! This module provides structured error handling for all organizer
//! operations, preserving context so failures can be propagated through the
//! pipeline and surfaced to the shell with an error kind, a human sentence,
//! and the offending path(s) where available.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Main result type for organizer operations.
pub type Result<T> = std::result::Result<T, OrganizerError>;

/// Comprehensive error type for all organizer operations.
#[derive(Error, Debug)]
pub enum OrganizerError {
    /// I/O related errors (file operations, traversal, etc.)
    #[error("I/O error: {message}")]
    Io {
        /// Human-readable error message
        message: String,
        /// Underlying I/O error
        #[source]
        source: io::Error,
    },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Config {
        /// Error description
        message: String,
        /// Configuration field that caused the error
        field: Option<String>,
    },

    /// Taxonomy registry errors (unreadable catalogue, malformed file)
    #[error("Taxonomy error: {message}")]
    Taxonomy {
        /// Error description
        message: String,
        /// Catalogue file involved, if any
        path: Option<PathBuf>,
    },

    /// Snapshot construction or persistence errors
    #[error("Snapshot error: {message}")]
    Snapshot {
        /// Error description
        message: String,
        /// Path involved, if any
        path: Option<PathBuf>,
    },

    /// Precondition failures: missing source, missing snapshot, unreadable
    /// taxonomy. Surfaced immediately and non-recoverable.
    #[error("Precondition failed: {message}")]
    Precondition {
        /// Error description
        message: String,
        /// Path involved, if any
        path: Option<PathBuf>,
    },

    /// Pipeline phase errors with a machine-readable cause code
    #[error("Pipeline error in phase '{phase}': {message}")]
    Pipeline {
        /// Phase name where the error occurred
        phase: String,
        /// Error description
        message: String,
        /// Specific cause code for shell-side handling
        cause: Option<String>,
    },

    /// Plan construction or validation errors
    #[error("Plan error: {message}")]
    Plan {
        /// Error description
        message: String,
        /// Operation source path involved, if any
        operation: Option<PathBuf>,
    },

    /// Execution errors raised while applying operations
    #[error("Execution error: {message}")]
    Execution {
        /// Error description
        message: String,
        /// Operation source path involved, if any
        operation: Option<PathBuf>,
        /// Whether this failure aborts the run
        critical: bool,
    },

    /// Rollback failures: absent backup, corrupted snapshot. Fatal; the user
    /// is instructed to restore manually.
    #[error("Rollback error: {message}")]
    Rollback {
        /// Error description
        message: String,
    },

    /// Validation errors for input data
    #[error("Validation error: {message}")]
    Validation {
        /// Error description
        message: String,
        /// Field or input that failed validation
        field: Option<String>,
    },

    /// Serialization/deserialization errors
    #[error("Serialization error: {message}")]
    Serialization {
        /// Error description
        message: String,
        /// Data type being serialized
        data_type: Option<String>,
        /// Underlying serialization error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Cooperative cancellation observed at a suspension point
    #[error("Cancelled during '{stage}'")]
    Cancelled {
        /// Stage that observed the stop request
        stage: String,
    },

    /// Generic internal errors
    #[error("Internal error: {message}")]
    Internal {
        /// Error description
        message: String,
        /// Additional context
        context: Option<String>,
    },
}

impl OrganizerError {
    /// Create a new I/O error with context
    pub fn io(message: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            message: message.into(),
            source,
        }
    }

    /// Create a new configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            field: None,
        }
    }

    /// Create a new configuration error with field context
    pub fn config_field(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Create a new taxonomy error
    pub fn taxonomy(message: impl Into<String>) -> Self {
        Self::Taxonomy {
            message: message.into(),
            path: None,
        }
    }

    /// Create a new snapshot error with path context
    pub fn snapshot(message: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self::Snapshot {
            message: message.into(),
            path: Some(path.into()),
        }
    }

    /// Create a new precondition error
    pub fn precondition(message: impl Into<String>) -> Self {
        Self::Precondition {
            message: message.into(),
            path: None,
        }
    }

    /// Create a new precondition error with path context
    pub fn precondition_at(message: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self::Precondition {
            message: message.into(),
            path: Some(path.into()),
        }
    }

    /// Create a new pipeline error
    pub fn pipeline(phase: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Pipeline {
            phase: phase.into(),
            message: message.into(),
            cause: None,
        }
    }

    /// Create a new pipeline error with a cause code
    pub fn pipeline_cause(
        phase: impl Into<String>,
        message: impl Into<String>,
        cause: impl Into<String>,
    ) -> Self {
        Self::Pipeline {
            phase: phase.into(),
            message: message.into(),
            cause: Some(cause.into()),
        }
    }

    /// Create a new plan error
    pub fn plan(message: impl Into<String>) -> Self {
        Self::Plan {
            message: message.into(),
            operation: None,
        }
    }

    /// Create a non-critical execution error
    pub fn execution(message: impl Into<String>, operation: impl Into<PathBuf>) -> Self {
        Self::Execution {
            message: message.into(),
            operation: Some(operation.into()),
            critical: false,
        }
    }

    /// Create a critical execution error that aborts the run
    pub fn execution_critical(message: impl Into<String>) -> Self {
        Self::Execution {
            message: message.into(),
            operation: None,
            critical: true,
        }
    }

    /// Create a new rollback error
    pub fn rollback(message: impl Into<String>) -> Self {
        Self::Rollback {
            message: message.into(),
        }
    }

    /// Create a new validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            field: None,
        }
    }

    /// Create a new cancellation marker
    pub fn cancelled(stage: impl Into<String>) -> Self {
        Self::Cancelled {
            stage: stage.into(),
        }
    }

    /// Create a new internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
            context: None,
        }
    }

    /// Whether this error should abort the whole pipeline run.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Precondition { .. } | Self::Rollback { .. } => true,
            Self::Execution { critical, .. } => *critical,
            _ => false,
        }
    }

    /// Whether this error represents a cooperative stop.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }

    /// Add context to an existing error
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        if let Self::Internal { context: ctx, .. } = &mut self {
            *ctx = Some(context.into());
        }
        self
    }
}

// Implement From traits for common error types
impl From<io::Error> for OrganizerError {
    fn from(err: io::Error) -> Self {
        Self::io("I/O operation failed", err)
    }
}

impl From<serde_json::Error> for OrganizerError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            message: format!("JSON serialization failed: {err}"),
            data_type: Some("JSON".to_string()),
            source: Some(Box::new(err)),
        }
    }
}

impl From<serde_yaml::Error> for OrganizerError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Serialization {
            message: format!("YAML serialization failed: {err}"),
            data_type: Some("YAML".to_string()),
            source: Some(Box::new(err)),
        }
    }
}

/// Result extension trait for adding context to errors
pub trait ResultExt<T> {
    /// Add context to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;

    /// Add static context to an error result
    fn context(self, msg: &'static str) -> Result<T>;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: Into<OrganizerError>,
{
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.into().with_context(f()))
    }

    fn context(self, msg: &'static str) -> Result<T> {
        self.map_err(|e| e.into().with_context(msg))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = OrganizerError::config("Invalid configuration");
        assert!(matches!(err, OrganizerError::Config { .. }));

        let err = OrganizerError::pipeline("discovery", "missing snapshot");
        assert!(matches!(err, OrganizerError::Pipeline { .. }));
    }

    #[test]
    fn test_fatal_classification() {
        assert!(OrganizerError::precondition("no source").is_fatal());
        assert!(OrganizerError::rollback("no backup").is_fatal());
        assert!(OrganizerError::execution_critical("backup missing").is_fatal());
        assert!(!OrganizerError::execution("rename failed", "/a").is_fatal());
        assert!(!OrganizerError::validation("bad input").is_fatal());
    }

    #[test]
    fn test_cancelled_marker() {
        let err = OrganizerError::cancelled("organization");
        assert!(err.is_cancelled());
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_error_with_context() {
        let err = OrganizerError::internal("Something went wrong")
            .with_context("During snapshot persistence");

        if let OrganizerError::Internal { context, .. } = err {
            assert_eq!(context, Some("During snapshot persistence".to_string()));
        } else {
            panic!("Expected Internal error");
        }
    }
}
