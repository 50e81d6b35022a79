//! Post-execution validation.
//!
//! Runs five check suites in order and aggregates a weighted score in [0,1]:
//! structure integrity, file integrity, fusion results, duplicate scan, and
//! consistency. The final verdict passes when no critical issues exist and
//! the score reaches the configured floor; a critical finding always fails
//! regardless of score.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::core::config::ValidationConfig;
use crate::core::snapshot::Snapshot;
use crate::detectors::duplicates::DuplicateReport;
use crate::detectors::fusion::FusionGroup;
use crate::detectors::structure::StructureProposal;
use crate::organize::executor::ExecutionReport;

/// Severity of one validation finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FindingSeverity {
    /// Informational
    Info,
    /// Should be reviewed but does not fail the run
    Warning,
    /// Fails the run regardless of score
    Critical,
}

/// One validation finding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationFinding {
    /// Severity of the finding
    pub severity: FindingSeverity,
    /// Human-readable description
    pub message: String,
    /// Offending path, if any
    pub path: Option<PathBuf>,
}

/// Outcome of one check suite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckOutcome {
    /// Suite name
    pub name: String,
    /// Suite score in [0,1]
    pub score: f64,
    /// Aggregation weight
    pub weight: f64,
    /// Findings raised by the suite
    pub findings: Vec<ValidationFinding>,
}

/// Aggregated validation report.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    /// Per-suite outcomes, in execution order
    pub checks: Vec<CheckOutcome>,
    /// Weighted aggregate score in [0,1]
    pub score: f64,
    /// Critical findings across all suites
    pub critical_count: usize,
    /// Warnings across all suites
    pub warning_count: usize,
    /// Final verdict
    pub passed: bool,
}

/// Inputs for a validation run.
pub struct ValidationContext<'a> {
    /// Source root after reorganization
    pub root: &'a Path,
    /// Snapshot taken after phase 4
    pub snapshot_after: &'a Snapshot,
    /// Snapshot file count before reorganization
    pub files_before: usize,
    /// Selected structure, if any
    pub proposal: Option<&'a StructureProposal>,
    /// Fusion groups planned in phase 3
    pub fusion_groups: &'a [FusionGroup],
    /// Execution report from phase 4
    pub execution: Option<&'a ExecutionReport>,
    /// Duplicate report over the post-reorganization snapshot
    pub duplicates_after: Option<&'a DuplicateReport>,
}

/// Runs the validation suites.
pub struct ResultValidator {
    config: ValidationConfig,
}

impl ResultValidator {
    /// Create a validator.
    pub fn new(config: ValidationConfig) -> Self {
        Self { config }
    }

    /// Run all five suites and aggregate the verdict.
    pub fn validate(&self, ctx: &ValidationContext<'_>) -> ValidationReport {
        let checks = vec![
            self.check_structure(ctx),
            self.check_file_integrity(ctx),
            self.check_fusion(ctx),
            self.check_duplicates(ctx),
            self.check_consistency(ctx),
        ];

        let total_weight: f64 = checks.iter().map(|c| c.weight).sum();
        let score = if total_weight > 0.0 {
            checks.iter().map(|c| c.score * c.weight).sum::<f64>() / total_weight
        } else {
            0.0
        };

        let critical_count = count_severity(&checks, FindingSeverity::Critical);
        let warning_count = count_severity(&checks, FindingSeverity::Warning);
        let passed = critical_count == 0 && score >= self.config.pass_score;

        info!(
            score = format!("{score:.2}"),
            critical = critical_count,
            warnings = warning_count,
            passed,
            "validation finished"
        );

        ValidationReport {
            checks,
            score,
            critical_count,
            warning_count,
            passed,
        }
    }

    /// Suite 1: target exists, hierarchy respects the chosen axes, depth
    /// bound holds, no empty folders.
    fn check_structure(&self, ctx: &ValidationContext<'_>) -> CheckOutcome {
        let mut findings = Vec::new();

        if !ctx.root.is_dir() {
            findings.push(ValidationFinding {
                severity: FindingSeverity::Critical,
                message: "reorganized root does not exist".to_string(),
                path: Some(ctx.root.to_path_buf()),
            });
            return CheckOutcome {
                name: "structure-integrity".to_string(),
                score: 0.0,
                weight: 0.25,
                findings,
            };
        }

        let depth = ctx.snapshot_after.root.subtree_depth();
        if depth > self.config.max_depth {
            findings.push(ValidationFinding {
                severity: FindingSeverity::Warning,
                message: format!("hierarchy depth {depth} exceeds {}", self.config.max_depth),
                path: None,
            });
        }

        let empties = empty_directories(&ctx.snapshot_after.root);
        for empty in &empties {
            findings.push(ValidationFinding {
                severity: FindingSeverity::Warning,
                message: "empty folder after reorganization".to_string(),
                path: Some(empty.clone()),
            });
        }

        if let Some(proposal) = ctx.proposal {
            // At least one top-level axis folder should exist once packs
            // routed somewhere.
            let top_level = ctx.snapshot_after.top_level_names();
            if !top_level.is_empty() && proposal.statistics.pack_count > 0 {
                let has_axis_dir = ctx
                    .snapshot_after
                    .root
                    .subdirectories()
                    .next()
                    .is_some();
                if !has_axis_dir {
                    findings.push(ValidationFinding {
                        severity: FindingSeverity::Critical,
                        message: "no hierarchy folders were created".to_string(),
                        path: None,
                    });
                }
            }
        }

        let deductions = 0.15 * findings.len() as f64;
        CheckOutcome {
            name: "structure-integrity".to_string(),
            score: (1.0 - deductions).max(0.0),
            weight: 0.25,
            findings,
        }
    }

    /// Suite 2: file counts within tolerance, files readable.
    fn check_file_integrity(&self, ctx: &ValidationContext<'_>) -> CheckOutcome {
        let mut findings = Vec::new();

        let after = ctx.snapshot_after.root.file_count();
        let before = ctx.files_before;
        if before > 0 {
            let deviation = (after as f64 - before as f64).abs() / before as f64;
            if deviation > 0.05 {
                findings.push(ValidationFinding {
                    severity: FindingSeverity::Critical,
                    message: format!(
                        "file count drifted beyond tolerance: {before} before, {after} after"
                    ),
                    path: None,
                });
            }
        }

        let mut unreadable = 0usize;
        for file in ctx.snapshot_after.root.files() {
            if fs::metadata(&file.path).is_err() {
                unreadable += 1;
                if unreadable <= 5 {
                    findings.push(ValidationFinding {
                        severity: FindingSeverity::Warning,
                        message: "file not readable".to_string(),
                        path: Some(file.path.clone()),
                    });
                }
            }
        }

        let score = if findings
            .iter()
            .any(|f| f.severity == FindingSeverity::Critical)
        {
            0.0
        } else if unreadable > 0 {
            0.7
        } else {
            1.0
        };

        CheckOutcome {
            name: "file-integrity".to_string(),
            score,
            weight: 0.3,
            findings,
        }
    }

    /// Suite 3: fusion success rate and target existence.
    fn check_fusion(&self, ctx: &ValidationContext<'_>) -> CheckOutcome {
        let mut findings = Vec::new();

        if ctx.fusion_groups.is_empty() {
            return CheckOutcome {
                name: "fusion-results".to_string(),
                score: 1.0,
                weight: 0.2,
                findings,
            };
        }

        let mut fused_ok = 0usize;
        for group in ctx.fusion_groups {
            // A fused group succeeded when none of its sources remain.
            let gone = group
                .sources
                .iter()
                .filter(|s| ctx.snapshot_after.find(&s.path).is_none())
                .count();
            if gone == group.sources.len() {
                fused_ok += 1;
            } else {
                findings.push(ValidationFinding {
                    severity: FindingSeverity::Warning,
                    message: format!("fusion incomplete for '{}'", group.canonical_name),
                    path: None,
                });
            }
        }

        let rate = fused_ok as f64 / ctx.fusion_groups.len() as f64;
        if rate < self.config.min_fusion_success_rate {
            findings.push(ValidationFinding {
                severity: FindingSeverity::Critical,
                message: format!(
                    "fusion success rate {:.0}% below {:.0}%",
                    rate * 100.0,
                    self.config.min_fusion_success_rate * 100.0
                ),
                path: None,
            });
        }

        CheckOutcome {
            name: "fusion-results".to_string(),
            score: rate,
            weight: 0.2,
            findings,
        }
    }

    /// Suite 4: no duplicate groups should remain (warn-level when they do).
    fn check_duplicates(&self, ctx: &ValidationContext<'_>) -> CheckOutcome {
        let mut findings = Vec::new();
        let score = match ctx.duplicates_after {
            Some(report) if report.has_duplicates() => {
                findings.push(ValidationFinding {
                    severity: FindingSeverity::Warning,
                    message: format!("{} duplicate groups remain", report.groups.len()),
                    path: None,
                });
                0.6
            }
            _ => 1.0,
        };
        CheckOutcome {
            name: "duplicate-scan".to_string(),
            score,
            weight: 0.15,
            findings,
        }
    }

    /// Suite 5: metrics, summary and error state are mutually coherent.
    fn check_consistency(&self, ctx: &ValidationContext<'_>) -> CheckOutcome {
        let mut findings = Vec::new();

        if let Some(execution) = ctx.execution {
            if execution.rolled_back {
                findings.push(ValidationFinding {
                    severity: FindingSeverity::Critical,
                    message: "execution was rolled back".to_string(),
                    path: None,
                });
            }
            for failure in &execution.failures {
                findings.push(ValidationFinding {
                    severity: FindingSeverity::Warning,
                    message: format!("operation failed: {}", failure.error),
                    path: Some(failure.source.clone()),
                });
            }
            if let Some(verification) = &execution.verification {
                if !verification.passed {
                    findings.push(ValidationFinding {
                        severity: FindingSeverity::Warning,
                        message: "executor verification reported issues".to_string(),
                        path: None,
                    });
                }
            }
        }

        let aggregated = ctx.snapshot_after.root.file_count();
        let summed: usize = ctx
            .snapshot_after
            .root
            .children
            .iter()
            .map(|c| c.file_count())
            .sum();
        if aggregated != summed {
            findings.push(ValidationFinding {
                severity: FindingSeverity::Critical,
                message: "snapshot aggregation is incoherent".to_string(),
                path: None,
            });
        }

        let score = if findings
            .iter()
            .any(|f| f.severity == FindingSeverity::Critical)
        {
            0.0
        } else {
            (1.0 - 0.1 * findings.len() as f64).max(0.5)
        };

        CheckOutcome {
            name: "consistency".to_string(),
            score,
            weight: 0.1,
            findings,
        }
    }
}

fn count_severity(checks: &[CheckOutcome], severity: FindingSeverity) -> usize {
    checks
        .iter()
        .flat_map(|c| c.findings.iter())
        .filter(|f| f.severity == severity)
        .count()
}

fn empty_directories(node: &crate::core::snapshot::SnapshotNode) -> Vec<PathBuf> {
    let mut out = Vec::new();
    collect_empty(node, &mut out);
    out
}

fn collect_empty(node: &crate::core::snapshot::SnapshotNode, out: &mut Vec<PathBuf>) {
    for dir in node.subdirectories() {
        if dir.children.is_empty() {
            out.push(dir.path.clone());
        }
        collect_empty(dir, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::snapshot::SnapshotNode;
    use chrono::Utc;
    use tempfile::TempDir;

    fn snapshot_for(root_path: &Path, children: Vec<SnapshotNode>) -> Snapshot {
        let mut root = SnapshotNode::directory(root_path.to_path_buf(), None);
        root.children = children;
        root.recompute_aggregates();
        Snapshot {
            source: root_path.to_path_buf(),
            generated_at: Utc::now(),
            max_depth: 5,
            root,
            warnings: Vec::new(),
        }
    }

    fn validator() -> ResultValidator {
        ResultValidator::new(ValidationConfig::default())
    }

    #[test]
    fn test_clean_run_passes() {
        let tmp = TempDir::new().unwrap();
        let file_path = tmp.path().join("Hardstyle/Pack A/kick.wav");
        std::fs::create_dir_all(file_path.parent().unwrap()).unwrap();
        std::fs::write(&file_path, b"wav").unwrap();

        let snapshot = snapshot_for(
            tmp.path(),
            vec![{
                let mut genre = SnapshotNode::directory(tmp.path().join("Hardstyle"), None);
                let mut pack =
                    SnapshotNode::directory(tmp.path().join("Hardstyle/Pack A"), None);
                pack.children = vec![SnapshotNode::file(file_path.clone(), 3, None)];
                genre.children = vec![pack];
                genre
            }],
        );

        let report = validator().validate(&ValidationContext {
            root: tmp.path(),
            snapshot_after: &snapshot,
            files_before: 1,
            proposal: None,
            fusion_groups: &[],
            execution: None,
            duplicates_after: None,
        });

        assert!(report.passed, "report: {report:?}");
        assert_eq!(report.checks.len(), 5);
        approx::assert_relative_eq!(report.score, 1.0);
    }

    #[test]
    fn test_count_drift_is_critical() {
        let tmp = TempDir::new().unwrap();
        let snapshot = snapshot_for(tmp.path(), vec![]);

        let report = validator().validate(&ValidationContext {
            root: tmp.path(),
            snapshot_after: &snapshot,
            files_before: 100,
            proposal: None,
            fusion_groups: &[],
            execution: None,
            duplicates_after: None,
        });

        assert!(!report.passed);
        assert!(report.critical_count >= 1);
    }

    #[test]
    fn test_remaining_duplicates_warn_but_can_pass() {
        let tmp = TempDir::new().unwrap();
        let file_path = tmp.path().join("Pack A/kick.wav");
        std::fs::create_dir_all(file_path.parent().unwrap()).unwrap();
        std::fs::write(&file_path, b"wav").unwrap();

        let mut pack = SnapshotNode::directory(tmp.path().join("Pack A"), None);
        pack.children = vec![SnapshotNode::file(file_path, 3, None)];
        let snapshot = snapshot_for(tmp.path(), vec![pack]);

        let duplicates = DuplicateReport {
            groups: vec![crate::detectors::duplicates::DuplicateGroup {
                signature: "kick.wav:3".to_string(),
                paths: vec![PathBuf::from("/a"), PathBuf::from("/b")],
                size_per_file: 3,
                count: 2,
                total_size: 6,
                wasted_size: 3,
            }],
            files_scanned: 2,
            total_wasted: 3,
            hash_errors: 0,
        };

        let report = validator().validate(&ValidationContext {
            root: tmp.path(),
            snapshot_after: &snapshot,
            files_before: 1,
            proposal: None,
            fusion_groups: &[],
            execution: None,
            duplicates_after: Some(&duplicates),
        });

        assert!(report.warning_count >= 1);
        assert!(report.critical_count == 0);
        // Weighted score: duplicates suite contributes 0.6 * 0.15.
        assert!(report.score < 1.0);
    }

    #[test]
    fn test_rolled_back_execution_is_critical() {
        let tmp = TempDir::new().unwrap();
        let snapshot = snapshot_for(tmp.path(), vec![]);
        let execution = ExecutionReport {
            rolled_back: true,
            ..ExecutionReport::default()
        };

        let report = validator().validate(&ValidationContext {
            root: tmp.path(),
            snapshot_after: &snapshot,
            files_before: 0,
            proposal: None,
            fusion_groups: &[],
            execution: Some(&execution),
            duplicates_after: None,
        });

        assert!(!report.passed);
    }
}
