//! Configuration for the organizer.
//!
//! `OrganizerConfig` groups per-component sections with serde-backed YAML
//! round-tripping and a `validate()` method that reports field-scoped errors.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::core::errors::{OrganizerError, Result};

/// Default name of the configuration file.
pub const CONFIG_FILE_NAME: &str = ".packflow.yml";

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrganizerConfig {
    /// Snapshot scanning settings
    pub snapshot: SnapshotConfig,
    /// Pack detection thresholds
    pub detector: DetectorConfig,
    /// Duplicate indexing settings
    pub duplicates: DuplicateConfig,
    /// Low-confidence quarantine settings
    pub classification: ClassificationConfig,
    /// Fusion matcher settings
    pub fusion: FusionConfig,
    /// Plan execution settings
    pub executor: ExecutorConfig,
    /// Post-execution validation settings
    pub validation: ValidationConfig,
}

/// Snapshot scanning settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapshotConfig {
    /// Maximum recursion depth for materialized nodes
    pub max_depth: usize,
    /// Glob patterns excluded from the scan
    pub exclude_patterns: Vec<String>,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            max_depth: 5,
            exclude_patterns: vec![
                ".git".to_string(),
                ".audio-organizer".to_string(),
                "*_backup_*".to_string(),
                "System Volume Information".to_string(),
                "$RECYCLE.BIN".to_string(),
                ".DS_Store".to_string(),
            ],
        }
    }
}

/// Pack detection thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Minimum score for a root-level candidate
    pub root_score_threshold: f64,
    /// Minimum score for a sub-pack candidate inside a bundle
    pub sub_pack_score_threshold: f64,
    /// Audio file gate at the root level
    pub min_audio_files_root: usize,
    /// Audio file gate inside bundles
    pub min_audio_files_nested: usize,
    /// Audio file gate for special packs (MIDI/presets/templates only)
    pub min_audio_files_special: usize,
    /// Size gate at the root level, in bytes
    pub min_size_root_bytes: u64,
    /// Size gate inside bundles, in bytes
    pub min_size_nested_bytes: u64,
    /// Audio-to-total file ratio gate
    pub min_audio_ratio: f64,
    /// Score floors indexed by depth (clamped to the last entry)
    pub depth_score_floors: Vec<f64>,
    /// Minimum taxonomy category matches indexed by depth
    pub depth_category_minimums: Vec<usize>,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            root_score_threshold: 45.0,
            sub_pack_score_threshold: 35.0,
            min_audio_files_root: 30,
            min_audio_files_nested: 15,
            min_audio_files_special: 5,
            min_size_root_bytes: 50 * 1024 * 1024,
            min_size_nested_bytes: 20 * 1024 * 1024,
            min_audio_ratio: 0.3,
            depth_score_floors: vec![50.0, 50.0, 70.0, 85.0, 95.0],
            depth_category_minimums: vec![2, 2, 3, 4, 5],
        }
    }
}

impl DetectorConfig {
    /// Score floor for candidates at the given depth.
    pub fn score_floor(&self, depth: usize) -> f64 {
        let idx = depth.min(self.depth_score_floors.len().saturating_sub(1));
        self.depth_score_floors.get(idx).copied().unwrap_or(50.0)
    }

    /// Minimum taxonomy category matches required at the given depth.
    pub fn category_minimum(&self, depth: usize) -> usize {
        let idx = depth.min(self.depth_category_minimums.len().saturating_sub(1));
        self.depth_category_minimums.get(idx).copied().unwrap_or(2)
    }
}

/// Duplicate index signature mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SignatureMode {
    /// (lowercased filename, size) surrogate
    #[default]
    NameSize,
    /// SHA-256 over content (opt-in, slower)
    ContentHash,
}

/// Strategy applied to duplicate groups.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DuplicateStrategy {
    /// Keep the newest copy, remove the rest
    AutoRemove,
    /// Keep every copy
    KeepAll,
    /// Suspend and let the user decide
    #[default]
    ManualReview,
}

/// Duplicate indexing settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DuplicateConfig {
    /// Signature mode
    pub signature: SignatureMode,
    /// Strategy applied when duplicate groups are found
    pub strategy: DuplicateStrategy,
}

/// Quarantine settings for phase 2.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassificationConfig {
    /// Packs below this confidence are quarantined for review
    pub quarantine_confidence: f64,
}

impl Default for ClassificationConfig {
    fn default() -> Self {
        Self {
            quarantine_confidence: 0.5,
        }
    }
}

/// Fusion matcher settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionConfig {
    /// Groups whose members all reach this confidence merge automatically
    pub auto_confidence_threshold: f64,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            auto_confidence_threshold: 0.8,
        }
    }
}

/// Plan execution settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Disable all mutating calls; counters still accumulate
    pub dry_run: bool,
    /// Copy the source tree aside before any destructive step
    pub create_backup: bool,
    /// Maximum execution time for phase 4, in seconds
    pub max_execution_time_secs: u64,
    /// Allowed relative deviation of post-execution file counts
    pub verification_tolerance: f64,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            dry_run: false,
            create_backup: true,
            max_execution_time_secs: 30 * 60,
            verification_tolerance: 0.05,
        }
    }
}

/// Post-execution validation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Minimum aggregate score to pass
    pub pass_score: f64,
    /// Maximum allowed hierarchy depth after reorganization
    pub max_depth: usize,
    /// Minimum fusion success rate
    pub min_fusion_success_rate: f64,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            pass_score: 0.8,
            max_depth: 10,
            min_fusion_success_rate: 0.8,
        }
    }
}

impl OrganizerConfig {
    /// Load configuration from a YAML file.
    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|e| OrganizerError::io(format!("reading {}", path.display()), e))?;
        let config: Self = serde_yaml::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize this configuration as YAML.
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Write this configuration to a YAML file.
    pub fn save_yaml_file(&self, path: &Path) -> Result<()> {
        fs::write(path, self.to_yaml()?)
            .map_err(|e| OrganizerError::io(format!("writing {}", path.display()), e))
    }

    /// Validate thresholds and ranges, reporting the offending field.
    pub fn validate(&self) -> Result<()> {
        if self.snapshot.max_depth == 0 {
            return Err(OrganizerError::config_field(
                "max_depth must be at least 1",
                "snapshot.max_depth",
            ));
        }
        if !(0.0..=1.0).contains(&self.detector.min_audio_ratio) {
            return Err(OrganizerError::config_field(
                "min_audio_ratio must be within [0, 1]",
                "detector.min_audio_ratio",
            ));
        }
        if self.detector.root_score_threshold < self.detector.sub_pack_score_threshold {
            return Err(OrganizerError::config_field(
                "root threshold must not be below the sub-pack threshold",
                "detector.root_score_threshold",
            ));
        }
        if self.detector.depth_score_floors.is_empty() {
            return Err(OrganizerError::config_field(
                "depth_score_floors must not be empty",
                "detector.depth_score_floors",
            ));
        }
        if self.detector.depth_category_minimums.is_empty() {
            return Err(OrganizerError::config_field(
                "depth_category_minimums must not be empty",
                "detector.depth_category_minimums",
            ));
        }
        if !(0.0..=1.0).contains(&self.classification.quarantine_confidence) {
            return Err(OrganizerError::config_field(
                "quarantine_confidence must be within [0, 1]",
                "classification.quarantine_confidence",
            ));
        }
        if !(0.0..=1.0).contains(&self.fusion.auto_confidence_threshold) {
            return Err(OrganizerError::config_field(
                "auto_confidence_threshold must be within [0, 1]",
                "fusion.auto_confidence_threshold",
            ));
        }
        if self.executor.max_execution_time_secs == 0 {
            return Err(OrganizerError::config_field(
                "max_execution_time_secs must be positive",
                "executor.max_execution_time_secs",
            ));
        }
        if !(0.0..1.0).contains(&self.executor.verification_tolerance) {
            return Err(OrganizerError::config_field(
                "verification_tolerance must be within [0, 1)",
                "executor.verification_tolerance",
            ));
        }
        if !(0.0..=1.0).contains(&self.validation.pass_score) {
            return Err(OrganizerError::config_field(
                "pass_score must be within [0, 1]",
                "validation.pass_score",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(OrganizerConfig::default().validate().is_ok());
    }

    #[test]
    fn test_yaml_round_trip() {
        let config = OrganizerConfig::default();
        let yaml = config.to_yaml().unwrap();
        let parsed: OrganizerConfig = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_invalid_ratio_reports_field() {
        let mut config = OrganizerConfig::default();
        config.detector.min_audio_ratio = 1.5;
        let err = config.validate().unwrap_err();
        match err {
            OrganizerError::Config { field, .. } => {
                assert_eq!(field.as_deref(), Some("detector.min_audio_ratio"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_depth_lookup_clamps() {
        let detector = DetectorConfig::default();
        assert_eq!(detector.score_floor(0), 50.0);
        assert_eq!(detector.score_floor(4), 95.0);
        assert_eq!(detector.score_floor(12), 95.0);
        assert_eq!(detector.category_minimum(2), 3);
        assert_eq!(detector.category_minimum(99), 5);
    }
}
