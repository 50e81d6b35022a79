//! Plan execution.
//!
//! Applies operations in priority order with these contracts: a backup of the
//! source tree is a precondition for any destructive step; a dry-run flag
//! disables every mutating call while counters still accumulate; renames fall
//! back to copy-then-delete when source and target span devices; execution is
//! verified afterwards (targets exist, no unexpected empties, file counts
//! within tolerance); a critical verification failure restores the backup and
//! surfaces a fatal error.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use crate::core::config::ExecutorConfig;
use crate::core::errors::{OrganizerError, Result};
use crate::core::snapshot::METADATA_DIR;
use crate::organize::plan::{Operation, OperationKind, ReorganizationPlan};

/// One failed operation inside a report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationFailure {
    /// Kind of the failed operation
    pub kind: OperationKind,
    /// Source path of the failed operation
    pub source: PathBuf,
    /// Failure description
    pub error: String,
}

/// Post-execution verification outcome.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationReport {
    /// Move/fuse/unwrap targets missing after execution
    pub missing_targets: Vec<PathBuf>,
    /// Unexpectedly empty directories
    pub empty_directories: Vec<PathBuf>,
    /// Files counted before execution
    pub expected_file_count: usize,
    /// Files counted after execution
    pub actual_file_count: usize,
    /// Whether counts stayed within tolerance
    pub within_tolerance: bool,
    /// Whether verification passed overall
    pub passed: bool,
}

/// Outcome of executing one plan.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionReport {
    /// Operations applied
    pub executed: usize,
    /// Operations skipped
    pub skipped: usize,
    /// Per-operation failures
    pub failures: Vec<OperationFailure>,
    /// Backup created before execution
    pub backup_path: Option<PathBuf>,
    /// Whether this was a dry run
    pub dry_run: bool,
    /// Targets the run created (projected targets in dry-run mode)
    pub created_targets: Vec<PathBuf>,
    /// Wall-clock duration in milliseconds
    pub duration_ms: u64,
    /// Verification outcome (absent for dry runs)
    pub verification: Option<VerificationReport>,
    /// Whether the backup was restored after a critical failure
    pub rolled_back: bool,
}

/// Applies reorganization plans to the filesystem.
pub struct PlanExecutor {
    config: ExecutorConfig,
    cancelled: Arc<AtomicBool>,
}

impl PlanExecutor {
    /// Create an executor.
    pub fn new(config: ExecutorConfig) -> Self {
        Self {
            config,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Share a cancellation flag checked between operations.
    pub fn with_cancellation(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancelled = flag;
        self
    }

    /// Execute a plan rooted at `root`.
    pub fn execute(&self, plan: &ReorganizationPlan, root: &Path) -> Result<ExecutionReport> {
        let start = Instant::now();
        let deadline = start + Duration::from_secs(self.config.max_execution_time_secs);

        let mut report = ExecutionReport {
            dry_run: self.config.dry_run,
            ..ExecutionReport::default()
        };

        let expected_files = count_files(root);

        // Backup success is a precondition for any destructive step.
        if self.config.create_backup && !self.config.dry_run && !plan.operations.is_empty() {
            let backup = self.create_backup(root).map_err(|e| {
                OrganizerError::execution_critical(format!("backup failed: {e}"))
            })?;
            info!("backup created at {}", backup.display());
            report.backup_path = Some(backup);
        }

        let mut succeeded: Vec<&Operation> = Vec::new();
        for op in &plan.operations {
            if self.cancelled.load(Ordering::Relaxed) {
                return Err(OrganizerError::cancelled("organization"));
            }
            if Instant::now() > deadline {
                self.rollback_if_possible(root, &mut report)?;
                return Err(OrganizerError::execution_critical(format!(
                    "execution exceeded {}s; backup restored",
                    self.config.max_execution_time_secs
                )));
            }

            match self.apply(op) {
                Ok(true) => {
                    report.executed += 1;
                    report.created_targets.push(op.target.clone());
                    succeeded.push(op);
                }
                Ok(false) => report.skipped += 1,
                Err(e) => {
                    if e.is_fatal() {
                        self.rollback_if_possible(root, &mut report)?;
                        return Err(e);
                    }
                    warn!("operation failed ({}): {e}", op.source.display());
                    report.failures.push(OperationFailure {
                        kind: op.kind,
                        source: op.source.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        if !self.config.dry_run {
            let verification = self.verify(&succeeded, root, expected_files);
            let critical = !verification.missing_targets.is_empty();
            report.verification = Some(verification);
            if critical {
                self.rollback_if_possible(root, &mut report)?;
                return Err(OrganizerError::execution_critical(
                    "verification found missing targets; backup restored",
                ));
            }
        }

        report.duration_ms = start.elapsed().as_millis() as u64;
        info!(
            executed = report.executed,
            skipped = report.skipped,
            failures = report.failures.len(),
            "plan execution finished in {}ms",
            report.duration_ms
        );
        Ok(report)
    }

    /// Apply one operation. Returns `Ok(true)` when work happened, `Ok(false)`
    /// when skipped (dry-run or no-op).
    fn apply(&self, op: &Operation) -> Result<bool> {
        if self.config.dry_run {
            return Ok(true);
        }
        if !op.source.exists() {
            return Err(OrganizerError::execution(
                "source vanished before execution",
                op.source.clone(),
            ));
        }

        match op.kind {
            OperationKind::Move | OperationKind::Clean => {
                if op.source == op.target {
                    return Ok(false);
                }
                let target = self.resolve_collision(&op.target)?;
                ensure_parent(&target)?;
                rename_or_copy(&op.source, &target)?;
                Ok(true)
            }
            OperationKind::Unwrap => self.apply_unwrap(op),
            OperationKind::Fuse => self.apply_fuse(op),
        }
    }

    /// Resolve a wrapper's inner subdirectory and move it to the target;
    /// the outer shell is discarded.
    fn apply_unwrap(&self, op: &Operation) -> Result<bool> {
        let inner = single_subdirectory(&op.source).ok_or_else(|| {
            OrganizerError::execution(
                "wrapper does not have exactly one subdirectory",
                op.source.clone(),
            )
        })?;

        ensure_parent(&op.target)?;

        // Move the inner pack aside first so the target may reuse the
        // wrapper's own path.
        let staging = staging_path(&op.source);
        rename_or_copy(&inner, &staging)?;

        // Remaining shell content is superseded by the backup.
        fs::remove_dir_all(&op.source)
            .map_err(|e| OrganizerError::io(format!("removing {}", op.source.display()), e))?;

        let target = self.resolve_collision(&op.target)?;
        rename_or_copy(&staging, &target)?;
        Ok(true)
    }

    /// Merge the source directory into the fuse target, then drop the source.
    fn apply_fuse(&self, op: &Operation) -> Result<bool> {
        fs::create_dir_all(&op.target)
            .map_err(|e| OrganizerError::io(format!("creating {}", op.target.display()), e))?;

        let entries = fs::read_dir(&op.source)
            .map_err(|e| OrganizerError::io(format!("reading {}", op.source.display()), e))?;
        let mut names: Vec<PathBuf> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .collect();
        names.sort();

        for entry in names {
            let Some(file_name) = entry.file_name() else {
                continue;
            };
            let mut destination = op.target.join(file_name);
            let mut counter = 1;
            while destination.exists() {
                let name = file_name.to_string_lossy();
                destination = match name.rsplit_once('.') {
                    Some((stem, ext)) => op.target.join(format!("{stem}_{counter}.{ext}")),
                    None => op.target.join(format!("{name}_{counter}")),
                };
                counter += 1;
            }
            rename_or_copy(&entry, &destination)?;
        }

        fs::remove_dir_all(&op.source)
            .map_err(|e| OrganizerError::io(format!("removing {}", op.source.display()), e))?;
        Ok(true)
    }

    /// If the target exists, suffix with `_1`, `_2`, … and report a warning.
    fn resolve_collision(&self, target: &Path) -> Result<PathBuf> {
        if !target.exists() {
            return Ok(target.to_path_buf());
        }
        for counter in 1..1000 {
            let name = target
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            let candidate = target.with_file_name(format!("{name}_{counter}"));
            if !candidate.exists() {
                warn!(
                    "target {} exists; using {}",
                    target.display(),
                    candidate.display()
                );
                return Ok(candidate);
            }
        }
        Err(OrganizerError::execution(
            "could not find a free collision suffix",
            target.to_path_buf(),
        ))
    }

    /// Copy the source tree to `<parent>/<name>_backup_<iso-ts>`.
    pub fn create_backup(&self, root: &Path) -> Result<PathBuf> {
        let parent = root
            .parent()
            .ok_or_else(|| OrganizerError::execution_critical("source has no parent directory"))?;
        let name = root
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "source".to_string());
        let stamp = Utc::now().format("%Y-%m-%dT%H-%M-%S");
        let backup = parent.join(format!("{name}_backup_{stamp}"));

        copy_dir_recursive(root, &backup)?;
        Ok(backup)
    }

    /// Confirm every move target exists, no folder is unexpectedly empty, and
    /// file counts match projections within tolerance.
    fn verify(
        &self,
        executed: &[&Operation],
        root: &Path,
        expected_files: usize,
    ) -> VerificationReport {
        let mut verification = VerificationReport {
            expected_file_count: expected_files,
            ..VerificationReport::default()
        };

        for op in executed {
            let expect_exists = matches!(
                op.kind,
                OperationKind::Move | OperationKind::Fuse | OperationKind::Unwrap
            );
            // Collision suffixing may have shifted the exact target; accept
            // suffixed variants as present.
            if expect_exists && !op.target.exists() && !suffixed_variant_exists(&op.target) {
                verification.missing_targets.push(op.target.clone());
            }
        }

        verification.empty_directories = find_empty_directories(root);
        verification.actual_file_count = count_files(root);

        let tolerance = self.config.verification_tolerance;
        let expected = expected_files as f64;
        let deviation = if expected == 0.0 {
            0.0
        } else {
            (verification.actual_file_count as f64 - expected).abs() / expected
        };
        verification.within_tolerance = deviation <= tolerance;
        verification.passed = verification.missing_targets.is_empty()
            && verification.within_tolerance
            && verification.empty_directories.is_empty();
        verification
    }

    fn rollback_if_possible(&self, root: &Path, report: &mut ExecutionReport) -> Result<()> {
        let Some(backup) = report.backup_path.clone() else {
            return Err(OrganizerError::rollback(
                "no backup available; restore manually",
            ));
        };
        self.restore_backup(root, &backup)?;
        report.rolled_back = true;
        Ok(())
    }

    /// Restore `root` from a backup tree and write a rollback log.
    pub fn restore_backup(&self, root: &Path, backup: &Path) -> Result<()> {
        if !backup.is_dir() {
            return Err(OrganizerError::rollback(format!(
                "backup missing at {}; restore manually",
                backup.display()
            )));
        }

        let mut log_lines = vec![format!(
            "emergency rollback at {} from {}",
            Utc::now().to_rfc3339(),
            backup.display()
        )];

        // Clear current content (metadata directory survives for the log).
        let entries = fs::read_dir(root)
            .map_err(|e| OrganizerError::io(format!("reading {}", root.display()), e))?;
        for entry in entries.filter_map(|e| e.ok()) {
            let path = entry.path();
            if path.file_name().and_then(|n| n.to_str()) == Some(METADATA_DIR) {
                continue;
            }
            let result = if path.is_dir() {
                fs::remove_dir_all(&path)
            } else {
                fs::remove_file(&path)
            };
            if let Err(e) = result {
                log_lines.push(format!("failed to clear {}: {e}", path.display()));
            } else {
                log_lines.push(format!("cleared {}", path.display()));
            }
        }

        // Copy the backup back in.
        let entries = fs::read_dir(backup)
            .map_err(|e| OrganizerError::io(format!("reading {}", backup.display()), e))?;
        for entry in entries.filter_map(|e| e.ok()) {
            let from = entry.path();
            let Some(name) = from.file_name() else {
                continue;
            };
            let to = root.join(name);
            copy_entry(&from, &to)?;
            log_lines.push(format!("restored {}", to.display()));
        }

        let log_path = root
            .join(METADATA_DIR)
            .join(format!("rollback-{}.log", Utc::now().timestamp()));
        if let Some(parent) = log_path.parent() {
            let _ = fs::create_dir_all(parent);
        }
        if let Ok(mut f) = fs::File::create(&log_path) {
            for line in &log_lines {
                let _ = writeln!(f, "{line}");
            }
        }

        warn!("rollback completed; log at {}", log_path.display());
        Ok(())
    }
}

/// Rename, falling back to recursive copy + delete when the rename fails
/// (cross-device moves).
pub fn rename_or_copy(source: &Path, target: &Path) -> Result<()> {
    match fs::rename(source, target) {
        Ok(()) => Ok(()),
        Err(_) => {
            copy_entry(source, target)?;
            if source.is_dir() {
                fs::remove_dir_all(source)
                    .map_err(|e| OrganizerError::io(format!("removing {}", source.display()), e))?;
            } else {
                fs::remove_file(source)
                    .map_err(|e| OrganizerError::io(format!("removing {}", source.display()), e))?;
            }
            Ok(())
        }
    }
}

/// Copy a file or directory tree.
pub fn copy_entry(source: &Path, target: &Path) -> Result<()> {
    if source.is_dir() {
        copy_dir_recursive(source, target)
    } else {
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| OrganizerError::io(format!("creating {}", parent.display()), e))?;
        }
        fs::copy(source, target).map_err(|e| {
            OrganizerError::io(
                format!("copying {} to {}", source.display(), target.display()),
                e,
            )
        })?;
        Ok(())
    }
}

/// Recursively copy a directory tree.
pub fn copy_dir_recursive(source: &Path, target: &Path) -> Result<()> {
    fs::create_dir_all(target)
        .map_err(|e| OrganizerError::io(format!("creating {}", target.display()), e))?;

    for entry in walkdir::WalkDir::new(source).follow_links(false) {
        let entry = entry.map_err(|e| {
            OrganizerError::execution(format!("walking backup source: {e}"), source.to_path_buf())
        })?;
        let relative = entry
            .path()
            .strip_prefix(source)
            .map_err(|_| OrganizerError::internal("walkdir escaped its root"))?;
        if relative.as_os_str().is_empty() {
            continue;
        }
        let destination = target.join(relative);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&destination).map_err(|e| {
                OrganizerError::io(format!("creating {}", destination.display()), e)
            })?;
        } else if entry.file_type().is_file() {
            if let Some(parent) = destination.parent() {
                fs::create_dir_all(parent)
                    .map_err(|e| OrganizerError::io(format!("creating {}", parent.display()), e))?;
            }
            fs::copy(entry.path(), &destination).map_err(|e| {
                OrganizerError::io(format!("copying to {}", destination.display()), e)
            })?;
        }
    }
    Ok(())
}

/// Count files under a root, ignoring the metadata directory.
pub fn count_files(root: &Path) -> usize {
    walkdir::WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| e.file_name().to_str() != Some(METADATA_DIR))
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .count()
}

fn find_empty_directories(root: &Path) -> Vec<PathBuf> {
    let mut empties = Vec::new();
    for entry in walkdir::WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| e.file_name().to_str() != Some(METADATA_DIR))
        .filter_map(|e| e.ok())
    {
        if !entry.file_type().is_dir() || entry.path() == root {
            continue;
        }
        if fs::read_dir(entry.path())
            .map(|mut it| it.next().is_none())
            .unwrap_or(false)
        {
            empties.push(entry.path().to_path_buf());
        }
    }
    empties.sort();
    empties
}

fn suffixed_variant_exists(target: &Path) -> bool {
    (1..10).any(|i| {
        let name = target
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        target.with_file_name(format!("{name}_{i}")).exists()
    })
}

fn single_subdirectory(path: &Path) -> Option<PathBuf> {
    let entries = fs::read_dir(path).ok()?;
    let mut dirs: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .collect();
    if dirs.len() == 1 {
        dirs.pop()
    } else {
        None
    }
}

fn staging_path(source: &Path) -> PathBuf {
    let name = source
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "staging".to_string());
    source.with_file_name(format!(".{name}.unwrap-staging"))
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| OrganizerError::io(format!("creating {}", parent.display()), e))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn executor(dry_run: bool, backup: bool) -> PlanExecutor {
        PlanExecutor::new(ExecutorConfig {
            dry_run,
            create_backup: backup,
            ..ExecutorConfig::default()
        })
    }

    fn write_file(path: &Path, bytes: &[u8]) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, bytes).unwrap();
    }

    fn move_op(source: &Path, target: &Path) -> Operation {
        Operation {
            kind: OperationKind::Move,
            source: source.to_path_buf(),
            target: target.to_path_buf(),
            priority: OperationKind::Move.priority(),
            rationale: String::new(),
        }
    }

    fn plan_of(operations: Vec<Operation>) -> ReorganizationPlan {
        ReorganizationPlan {
            id: "test-plan".to_string(),
            operations,
            warnings: Vec::new(),
        }
    }

    #[test]
    fn test_move_with_backup() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("src");
        let pack = root.join("Pack A");
        write_file(&pack.join("kick.wav"), b"wav");

        let target = root.join("Hardstyle").join("Pack A");
        let report = executor(false, true)
            .execute(&plan_of(vec![move_op(&pack, &target)]), &root)
            .unwrap();

        assert_eq!(report.executed, 1);
        assert!(target.join("kick.wav").is_file());
        assert!(!pack.exists());
        let backup = report.backup_path.unwrap();
        assert!(backup.join("Pack A").join("kick.wav").is_file());
        assert!(report.verification.unwrap().missing_targets.is_empty());
    }

    #[test]
    fn test_dry_run_mutates_nothing() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("src");
        let pack = root.join("Pack A");
        write_file(&pack.join("kick.wav"), b"wav");

        let target = root.join("Moved").join("Pack A");
        let report = executor(true, true)
            .execute(&plan_of(vec![move_op(&pack, &target)]), &root)
            .unwrap();

        assert!(report.dry_run);
        assert_eq!(report.executed, 1);
        assert_eq!(report.created_targets, vec![target.clone()]);
        assert!(pack.exists());
        assert!(!target.exists());
        assert!(report.backup_path.is_none());
    }

    #[test]
    fn test_dry_run_projection_matches_real_run() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("src");
        let pack = root.join("Pack A");
        write_file(&pack.join("kick.wav"), b"wav");
        let target = root.join("Out").join("Pack A");
        let plan = plan_of(vec![move_op(&pack, &target)]);

        let dry = executor(true, false).execute(&plan, &root).unwrap();
        let real = executor(false, false).execute(&plan, &root).unwrap();

        assert_eq!(dry.created_targets, real.created_targets);
        for created in &real.created_targets {
            assert!(created.exists());
        }
    }

    #[test]
    fn test_unwrap_removes_shell() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("src");
        let wrapper = root.join("Pack A");
        let inner = wrapper.join("Pack A");
        write_file(&inner.join("kick.wav"), b"wav");

        let target = root.join("Pack A");
        let plan = plan_of(vec![Operation {
            kind: OperationKind::Unwrap,
            source: wrapper.clone(),
            target: target.clone(),
            priority: 1,
            rationale: String::new(),
        }]);

        let report = executor(false, false).execute(&plan, &root).unwrap();
        assert_eq!(report.executed, 1);
        assert!(target.join("kick.wav").is_file());
        assert!(!target.join("Pack A").exists());
    }

    #[test]
    fn test_fuse_merges_and_suffixes_collisions() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("src");
        let a = root.join("Kicks A");
        let b = root.join("Kicks B");
        write_file(&a.join("kick.wav"), b"one");
        write_file(&b.join("kick.wav"), b"two");
        write_file(&b.join("extra.wav"), b"three");

        let target = root.join("Kicks");
        let fuse = |source: &Path| Operation {
            kind: OperationKind::Fuse,
            source: source.to_path_buf(),
            target: target.clone(),
            priority: 3,
            rationale: String::new(),
        };
        let report = executor(false, false)
            .execute(&plan_of(vec![fuse(&a), fuse(&b)]), &root)
            .unwrap();

        assert_eq!(report.executed, 2);
        assert!(!a.exists());
        assert!(!b.exists());
        assert!(target.join("kick.wav").is_file());
        assert!(target.join("kick_1.wav").is_file());
        assert!(target.join("extra.wav").is_file());
    }

    #[test]
    fn test_collision_suffixing_on_move() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("src");
        let pack = root.join("Pack A");
        write_file(&pack.join("kick.wav"), b"wav");
        let occupied = root.join("Out").join("Pack A");
        write_file(&occupied.join("other.wav"), b"wav");

        let report = executor(false, false)
            .execute(&plan_of(vec![move_op(&pack, &occupied)]), &root)
            .unwrap();

        assert_eq!(report.executed, 1);
        assert!(occupied.join("other.wav").is_file());
        assert!(root.join("Out").join("Pack A_1").join("kick.wav").is_file());
    }

    #[test]
    fn test_missing_source_is_noncritical_failure() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("src");
        let present = root.join("Here");
        write_file(&present.join("kick.wav"), b"wav");

        // A source that vanishes between planning and execution is a
        // per-operation failure, not an abort.
        let vanish = root.join("Gone");
        fs::create_dir_all(&vanish).unwrap();
        let plan = plan_of(vec![
            move_op(&vanish, &root.join("Out").join("Gone")),
            move_op(&present, &root.join("Out").join("Here")),
        ]);
        plan.validate().unwrap();
        fs::remove_dir_all(&vanish).unwrap();

        let report = executor(false, false).execute(&plan, &root).unwrap();
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.executed, 1);
    }

    #[test]
    fn test_restore_backup_round_trip() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("src");
        write_file(&root.join("Pack A").join("kick.wav"), b"wav");

        let exec = executor(false, true);
        let backup = exec.create_backup(&root).unwrap();

        // Trash the tree, then restore.
        fs::remove_dir_all(root.join("Pack A")).unwrap();
        write_file(&root.join("junk.txt"), b"junk");

        exec.restore_backup(&root, &backup).unwrap();
        assert!(root.join("Pack A").join("kick.wav").is_file());
        assert!(!root.join("junk.txt").exists());

        // A rollback log was written.
        let logs: Vec<_> = fs::read_dir(root.join(METADATA_DIR))
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with("rollback-"))
            .collect();
        assert_eq!(logs.len(), 1);
    }

    #[test]
    fn test_missing_backup_is_fatal() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("src");
        fs::create_dir_all(&root).unwrap();
        let err = executor(false, true)
            .restore_backup(&root, &tmp.path().join("nope"))
            .unwrap_err();
        assert!(matches!(err, OrganizerError::Rollback { .. }));
    }
}
