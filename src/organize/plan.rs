//! Reorganization planning.
//!
//! Converts the selected structure, fusion groups, and wrapper/clean
//! candidates into an ordered operation list. Priorities preserve causal
//! order: unwrap (1) → clean (2) → fuse (3) → move (4). Target collisions are
//! suffixed `_1`, `_2`, …; plan validation checks that every source exists
//! and that no two operations write the same target unless they are parts of
//! one fuse.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::core::errors::{OrganizerError, Result};
use crate::detectors::classifier::EnrichedPack;
use crate::detectors::fusion::FusionGroup;
use crate::detectors::packs::{DetectedPack, PackType};
use crate::detectors::structure::StructureProposal;

/// Kind of one reorganization operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OperationKind {
    /// Replace a wrapper with its inner pack
    Unwrap,
    /// Rename to a normalized form
    Clean,
    /// Merge multiple sources into one canonical target
    Fuse,
    /// Relocate a directory to its canonical target
    Move,
}

impl OperationKind {
    /// Execution priority; lower runs first.
    pub fn priority(self) -> u32 {
        match self {
            OperationKind::Unwrap => 1,
            OperationKind::Clean => 2,
            OperationKind::Fuse => 3,
            OperationKind::Move => 4,
        }
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            OperationKind::Unwrap => "unwrap",
            OperationKind::Clean => "clean",
            OperationKind::Fuse => "fuse",
            OperationKind::Move => "move",
        };
        write!(f, "{label}")
    }
}

/// One planned operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    /// Operation kind
    pub kind: OperationKind,
    /// Source path (must exist at plan start)
    pub source: PathBuf,
    /// Target path
    pub target: PathBuf,
    /// Execution priority; lower runs first
    pub priority: u32,
    /// Why this operation exists
    pub rationale: String,
}

/// An ordered, validated operation list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReorganizationPlan {
    /// Plan identifier
    pub id: String,
    /// Operations sorted by priority, then source path
    pub operations: Vec<Operation>,
    /// Non-fatal findings collected while planning
    pub warnings: Vec<String>,
}

impl ReorganizationPlan {
    /// Operations of one kind, in plan order.
    pub fn operations_of(&self, kind: OperationKind) -> impl Iterator<Item = &Operation> {
        self.operations.iter().filter(move |op| op.kind == kind)
    }

    /// Validate plan invariants against the filesystem.
    ///
    /// Every source must exist, and no two operations may write the same
    /// target unless both belong to one fuse.
    pub fn validate(&self) -> Result<()> {
        let mut move_targets: HashSet<&Path> = HashSet::new();
        for op in &self.operations {
            if !op.source.exists() {
                return Err(OrganizerError::Plan {
                    message: format!("source does not exist: {}", op.source.display()),
                    operation: Some(op.source.clone()),
                });
            }
            if op.kind != OperationKind::Fuse && !move_targets.insert(op.target.as_path()) {
                return Err(OrganizerError::Plan {
                    message: format!("colliding target: {}", op.target.display()),
                    operation: Some(op.target.clone()),
                });
            }
        }
        Ok(())
    }
}

/// Builds reorganization plans.
pub struct ReorganizationPlanner;

/// Inputs for a full phase-4 plan.
pub struct PlanInputs<'a> {
    /// Source root under reorganization
    pub root: &'a Path,
    /// Classified packs that should move
    pub packs: &'a [EnrichedPack],
    /// Selected target structure
    pub proposal: &'a StructureProposal,
    /// Fusion groups to merge
    pub fusion_groups: &'a [FusionGroup],
}

impl ReorganizationPlanner {
    /// Create a planner.
    pub fn new() -> Self {
        Self
    }

    /// Plan phase-0 preparation: unwrap wrappers and clean names in place.
    pub fn plan_preparation(&self, packs: &[DetectedPack]) -> ReorganizationPlan {
        let mut operations = Vec::new();
        let mut warnings = Vec::new();
        let mut taken = HashSet::new();

        for pack in packs {
            match pack.pack_type {
                PackType::WrapperFolder => {
                    let Some(inner) = pack.actual_pack_path.as_ref() else {
                        warnings.push(format!(
                            "wrapper without inner path: {}",
                            pack.path.display()
                        ));
                        continue;
                    };
                    let Some(parent) = pack.path.parent() else {
                        continue;
                    };
                    let inner_name = inner
                        .file_name()
                        .map(|n| n.to_string_lossy().to_string())
                        .unwrap_or_else(|| pack.name.clone());
                    let target =
                        unique_target(parent.join(clean_name(&inner_name)), &mut taken, &pack.path);
                    operations.push(Operation {
                        kind: OperationKind::Unwrap,
                        source: pack.path.clone(),
                        target,
                        priority: OperationKind::Unwrap.priority(),
                        rationale: "wrapper shell duplicates inner pack name".to_string(),
                    });
                }
                _ => {
                    let cleaned = clean_name(&pack.name);
                    if cleaned != pack.name {
                        let Some(parent) = pack.path.parent() else {
                            continue;
                        };
                        let target = unique_target(parent.join(&cleaned), &mut taken, &pack.path);
                        operations.push(Operation {
                            kind: OperationKind::Clean,
                            source: pack.path.clone(),
                            target,
                            priority: OperationKind::Clean.priority(),
                            rationale: format!("normalize name to '{cleaned}'"),
                        });
                    }
                }
            }
        }

        self.finish(operations, warnings)
    }

    /// Plan phase-4 organization: fuse near-duplicates, then move packs into
    /// the selected structure.
    pub fn plan_organization(&self, inputs: PlanInputs<'_>) -> ReorganizationPlan {
        let mut operations = Vec::new();
        let mut warnings = Vec::new();
        let mut taken: HashSet<PathBuf> = HashSet::new();

        // Paths consumed by fusion; they must not also move.
        let mut fused_sources: HashSet<&Path> = HashSet::new();

        for group in inputs.fusion_groups {
            let Some(representative) = match_pack(inputs.packs, &group.sources[0].path) else {
                warnings.push(format!(
                    "fusion source not among packs: {}",
                    group.sources[0].path.display()
                ));
                continue;
            };
            let target_dir = inputs
                .root
                .join(join_segments(&inputs.proposal.route(representative)))
                .join(clean_name(&group.canonical_name));
            let target = unique_fuse_target(target_dir, &taken);
            taken.insert(target.clone());

            for source in &group.sources {
                fused_sources.insert(source.path.as_path());
                operations.push(Operation {
                    kind: OperationKind::Fuse,
                    source: source.path.clone(),
                    target: target.clone(),
                    priority: OperationKind::Fuse.priority(),
                    rationale: format!("merge near-duplicates of '{}'", group.canonical_name),
                });
            }
        }

        for pack in inputs.packs {
            if fused_sources.contains(pack.pack.path.as_path()) {
                continue;
            }
            let segments = inputs.proposal.route(pack);
            let target_dir = inputs.root.join(join_segments(&segments));
            let desired = target_dir.join(clean_name(&pack.pack.name));
            if desired == pack.pack.path {
                continue;
            }
            let target = unique_target(desired, &mut taken, &pack.pack.path);
            operations.push(Operation {
                kind: OperationKind::Move,
                source: pack.pack.path.clone(),
                target,
                priority: OperationKind::Move.priority(),
                rationale: format!("file under {}", segments.join("/")),
            });
        }

        self.finish(operations, warnings)
    }

    fn finish(&self, mut operations: Vec<Operation>, warnings: Vec<String>) -> ReorganizationPlan {
        operations.sort_by(|a, b| {
            a.priority
                .cmp(&b.priority)
                .then_with(|| a.source.cmp(&b.source))
        });
        debug!(operations = operations.len(), "plan assembled");
        // Content-derived id: identical inputs yield byte-identical plans.
        let mut hasher = Sha256::new();
        for op in &operations {
            hasher.update(op.kind.to_string().as_bytes());
            hasher.update(op.source.to_string_lossy().as_bytes());
            hasher.update(op.target.to_string_lossy().as_bytes());
        }
        let id = format!("{:x}", hasher.finalize())[..16].to_string();
        ReorganizationPlan {
            id,
            operations,
            warnings,
        }
    }
}

impl Default for ReorganizationPlanner {
    fn default() -> Self {
        Self::new()
    }
}

/// Normalize a pack name: strip parenthesized/bracketed format markers,
/// trailing copy suffixes (`_1`), and surplus whitespace.
pub fn clean_name(name: &str) -> String {
    let mut cleaned = String::with_capacity(name.len());
    let mut depth = 0usize;
    for c in name.chars() {
        match c {
            '(' | '[' => depth += 1,
            ')' | ']' => depth = depth.saturating_sub(1),
            _ if depth == 0 => cleaned.push(c),
            _ => {}
        }
    }

    let mut result = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");

    // Trailing "_N" copy suffix.
    if let Some(idx) = result.rfind('_') {
        let suffix = &result[idx + 1..];
        if !suffix.is_empty() && suffix.chars().all(|c| c.is_ascii_digit()) {
            result.truncate(idx);
        }
    }

    let trimmed = result.trim_end_matches([' ', '.', '-']).trim().to_string();
    if trimmed.is_empty() {
        name.trim().to_string()
    } else {
        trimmed
    }
}

/// Suffix a target with `_1`, `_2`, … until it neither exists on disk (apart
/// from the operation's own source) nor collides with an already-planned
/// target.
fn unique_target(desired: PathBuf, taken: &mut HashSet<PathBuf>, source: &Path) -> PathBuf {
    let mut candidate = desired.clone();
    let mut counter = 1;
    while taken.contains(&candidate) || (candidate.exists() && candidate != source) {
        candidate = suffixed(&desired, counter);
        counter += 1;
    }
    taken.insert(candidate.clone());
    candidate
}

/// Like [`unique_target`] but does not reserve, since every member of a fuse
/// shares the same target.
fn unique_fuse_target(desired: PathBuf, taken: &HashSet<PathBuf>) -> PathBuf {
    let mut candidate = desired.clone();
    let mut counter = 1;
    while taken.contains(&candidate) || candidate.exists() {
        candidate = suffixed(&desired, counter);
        counter += 1;
    }
    candidate
}

fn suffixed(path: &Path, counter: u32) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    path.with_file_name(format!("{name}_{counter}"))
}

fn join_segments(segments: &[String]) -> PathBuf {
    let mut out = PathBuf::new();
    for segment in segments {
        out.push(segment);
    }
    out
}

fn match_pack<'a>(packs: &'a [EnrichedPack], path: &Path) -> Option<&'a EnrichedPack> {
    packs.iter().find(|p| p.pack.path == path)
}
