//! Detection result types.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

/// Classification of a directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PackType {
    /// A coherent commercial sample pack
    CommercialPack,
    /// A container whose immediate children are themselves packs
    BundleContainer,
    /// A single-child shell duplicating its only subdirectory's name
    WrapperFolder,
    /// A user-made folder that groups packs by theme, not a pack itself
    OrganizationFolder,
    /// A personal collection of samples without commercial naming
    PersonalCollection,
    /// Could not be classified
    Unknown,
}

impl std::fmt::Display for PackType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            PackType::CommercialPack => "commercial pack",
            PackType::BundleContainer => "bundle container",
            PackType::WrapperFolder => "wrapper folder",
            PackType::OrganizationFolder => "organization folder",
            PackType::PersonalCollection => "personal collection",
            PackType::Unknown => "unknown",
        };
        write!(f, "{label}")
    }
}

/// Shape summary of a detected pack's subtree.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructureSummary {
    /// Immediate subdirectories
    pub subfolder_count: usize,
    /// Maximum directory depth below the pack root
    pub depth: usize,
    /// Whether documentation files are present
    pub has_documentation: bool,
    /// Whether preset files are present
    pub has_presets: bool,
    /// Whether all audio sits directly at the pack root
    pub is_flat: bool,
}

/// A directory accepted by the detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectedPack {
    /// Stable identifier
    pub id: String,
    /// Display name
    pub name: String,
    /// Source path
    pub path: PathBuf,
    /// Classification
    pub pack_type: PackType,
    /// Confidence in [0, 1]
    pub confidence: f64,
    /// Ordered, human-readable explanation of the decision
    pub reasoning: Vec<String>,
    /// Audio files in the subtree
    pub audio_file_count: usize,
    /// Preset files in the subtree
    pub preset_file_count: usize,
    /// All files in the subtree
    pub total_file_count: usize,
    /// Total bytes in the subtree
    pub total_size: u64,
    /// Shape summary
    pub structure: StructureSummary,
    /// Whether the pack's internal layout should be normalized
    pub needs_reorganization: bool,
    /// Whether the pack should be pulled out of a shell (wrappers)
    pub should_extract: bool,
    /// Whether detection should continue below this directory
    pub should_recurse_inside: bool,
    /// Inner pack path for wrappers
    pub actual_pack_path: Option<PathBuf>,
    /// Children packs for bundles
    #[serde(default)]
    pub sub_packs: Vec<DetectedPack>,
}

impl DetectedPack {
    /// Allocate a fresh pack id.
    pub fn new_id() -> String {
        Uuid::new_v4().to_string()
    }
}

/// Terminal state of one directory in the detection state machine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", tag = "state")]
pub enum DecisionState {
    /// Scored but not yet resolved (transient)
    Scored,
    /// Accepted as a pack of the given type
    Accepted {
        /// Accepted classification
        pack_type: PackType,
    },
    /// Rejected with reasons
    Rejected,
}

/// Audit record for one evaluated directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryDecision {
    /// Directory path
    pub path: PathBuf,
    /// Terminal state
    pub state: DecisionState,
    /// Total score, when rule P3 ran
    pub score: Option<f64>,
    /// Ordered explanation used for audit and user-facing display
    pub reasoning: Vec<String>,
}

/// Aggregate detection counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionStats {
    /// Directories evaluated
    pub directories_evaluated: usize,
    /// Commercial packs accepted (including bundle children)
    pub packs_detected: usize,
    /// Bundles accepted
    pub bundles_detected: usize,
    /// Wrappers accepted
    pub wrappers_detected: usize,
    /// Directories rejected
    pub rejected: usize,
}

/// Full output of one detector run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionReport {
    /// Accepted packs after conflict resolution
    pub packs: Vec<DetectedPack>,
    /// Audit decisions for every evaluated directory
    pub decisions: Vec<DirectoryDecision>,
    /// Aggregate counters
    pub stats: DetectionStats,
}

impl DetectionReport {
    /// All packs including bundle children, flattened.
    pub fn all_packs(&self) -> Vec<&DetectedPack> {
        let mut out = Vec::new();
        for pack in &self.packs {
            out.push(pack);
            out.extend(pack.sub_packs.iter());
        }
        out
    }
}
