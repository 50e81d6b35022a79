//! Snapshot-based rollback.
//!
//! Non-destructively reorganizes a source tree back to the layout recorded in
//! `structure-originale.json`: current entries that the snapshot places at
//! the top level are moved back there, missing directories are created, and
//! mtimes recorded in the snapshot are restored. Entries recorded in the
//! snapshot but absent on disk are logged and skipped; no placeholder files
//! are fabricated.

use chrono::Utc;
use filetime::FileTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::core::errors::{OrganizerError, Result};
use crate::core::snapshot::{SnapshotNode, SnapshotStore, METADATA_DIR};
use crate::organize::executor::rename_or_copy;

/// Search depth when locating displaced entries.
const SEARCH_DEPTH: usize = 6;

/// Outcome of a snapshot rollback.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RollbackReport {
    /// Entries moved back to their recorded location
    pub restored: usize,
    /// Entries already in place
    pub already_in_place: usize,
    /// Recorded entries that could not be found anywhere
    pub missing: Vec<String>,
    /// Empty leftover directories removed
    pub removed_directories: usize,
    /// Where the log was written
    pub log_path: Option<PathBuf>,
}

/// Restore the top-level layout recorded in the original snapshot.
///
/// Preconditions: `source` exists and `structure-originale.json` is present
/// under its metadata directory; both failures are fatal.
pub fn rollback_from_snapshot(source: &Path) -> Result<RollbackReport> {
    if !source.is_dir() {
        return Err(OrganizerError::precondition_at(
            format!("source directory does not exist: {}", source.display()),
            source,
        ));
    }

    let store = SnapshotStore::new(source);
    let snapshot = store.load_original()?;

    let mut report = RollbackReport::default();
    let mut log_lines = vec![format!(
        "snapshot rollback at {} for {}",
        Utc::now().to_rfc3339(),
        source.display()
    )];

    // Index every current entry by name so displaced ones can be found.
    let located = index_entries_by_name(source);

    for recorded in &snapshot.root.children {
        let expected = source.join(&recorded.name);
        if expected.exists() {
            report.already_in_place += 1;
            restore_mtime(&expected, recorded);
            continue;
        }

        match located.get(&recorded.name) {
            Some(candidates) => {
                // Earliest path lexicographically wins when duplicated; a
                // candidate may have moved along with an already-restored
                // ancestor, so stale ones are skipped.
                let Some(found) = candidates.iter().find(|c| c.exists()) else {
                    report.missing.push(recorded.name.clone());
                    log_lines.push(format!("missing: '{}'", recorded.name));
                    continue;
                };
                if candidates.len() > 1 {
                    log_lines.push(format!(
                        "multiple candidates for '{}'; using {}",
                        recorded.name,
                        found.display()
                    ));
                }
                rename_or_copy(found, &expected)?;
                restore_mtime(&expected, recorded);
                report.restored += 1;
                log_lines.push(format!(
                    "restored '{}' from {}",
                    recorded.name,
                    found.display()
                ));
            }
            None => {
                // Never fabricate placeholders for vanished entries.
                warn!("recorded entry '{}' not found on disk", recorded.name);
                report.missing.push(recorded.name.clone());
                log_lines.push(format!("missing: '{}'", recorded.name));
            }
        }
    }

    // Drop now-empty folders the reorganization introduced at the top level.
    report.removed_directories = remove_empty_top_level(source, &snapshot.root, &mut log_lines);

    let log_path = store.rollback_log_path(Utc::now().timestamp());
    if let Some(parent) = log_path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| OrganizerError::io(format!("creating {}", parent.display()), e))?;
    }
    let mut f = fs::File::create(&log_path)
        .map_err(|e| OrganizerError::io(format!("writing {}", log_path.display()), e))?;
    for line in &log_lines {
        writeln!(f, "{line}")
            .map_err(|e| OrganizerError::io(format!("writing {}", log_path.display()), e))?;
    }
    report.log_path = Some(log_path);

    info!(
        restored = report.restored,
        in_place = report.already_in_place,
        missing = report.missing.len(),
        "rollback finished"
    );
    Ok(report)
}

/// Map entry name → sorted locations anywhere under the source (bounded
/// depth), excluding the metadata directory and the top level itself.
fn index_entries_by_name(source: &Path) -> BTreeMap<String, Vec<PathBuf>> {
    let mut index: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();
    for entry in walkdir::WalkDir::new(source)
        .min_depth(2)
        .max_depth(SEARCH_DEPTH)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| e.file_name().to_str() != Some(METADATA_DIR))
        .filter_map(|e| e.ok())
    {
        let name = entry.file_name().to_string_lossy().to_string();
        index.entry(name).or_default().push(entry.path().to_path_buf());
    }
    for paths in index.values_mut() {
        paths.sort();
    }
    index
}

fn restore_mtime(path: &Path, recorded: &SnapshotNode) {
    if let Some(mtime) = recorded.modified_at {
        let ft = FileTime::from_unix_time(mtime.timestamp(), mtime.timestamp_subsec_nanos());
        if let Err(e) = filetime::set_file_mtime(path, ft) {
            warn!("could not restore mtime of {}: {e}", path.display());
        }
    }
}

/// Remove empty top-level directories that the original snapshot does not
/// record, so the final top-level listing matches the snapshot.
fn remove_empty_top_level(
    source: &Path,
    original_root: &SnapshotNode,
    log_lines: &mut Vec<String>,
) -> usize {
    let recorded: Vec<&str> = original_root
        .children
        .iter()
        .map(|c| c.name.as_str())
        .collect();

    let Ok(entries) = fs::read_dir(source) else {
        return 0;
    };
    let mut removed = 0;
    let mut paths: Vec<PathBuf> = entries.filter_map(|e| e.ok()).map(|e| e.path()).collect();
    paths.sort();

    for path in paths {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if name == METADATA_DIR || recorded.contains(&name) || !path.is_dir() {
            continue;
        }
        if directory_is_effectively_empty(&path) {
            if fs::remove_dir_all(&path).is_ok() {
                log_lines.push(format!("removed leftover directory {}", path.display()));
                removed += 1;
            }
        } else {
            log_lines.push(format!(
                "left unrecorded non-empty directory {}",
                path.display()
            ));
        }
    }
    removed
}

/// A directory counts as empty when it holds no files at any depth.
fn directory_is_effectively_empty(path: &Path) -> bool {
    !walkdir::WalkDir::new(path)
        .follow_links(false)
        .into_iter()
        .filter_map(|e| e.ok())
        .any(|e| e.file_type().is_file())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::SnapshotConfig;
    use crate::core::snapshot::SnapshotBuilder;
    use tempfile::TempDir;

    fn write_file(path: &Path, bytes: &[u8]) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, bytes).unwrap();
    }

    fn snapshot_source(source: &Path) {
        let builder = SnapshotBuilder::new(SnapshotConfig::default()).unwrap();
        let (snapshot, _) = builder.build(source).unwrap();
        SnapshotStore::new(source).save_original(&snapshot).unwrap();
    }

    #[test]
    fn test_missing_snapshot_is_fatal() {
        let tmp = TempDir::new().unwrap();
        let err = rollback_from_snapshot(tmp.path()).unwrap_err();
        assert!(matches!(err, OrganizerError::Precondition { .. }));
    }

    #[test]
    fn test_restores_displaced_top_level_entries() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("src");
        write_file(&source.join("Pack A").join("kick.wav"), b"wav");
        write_file(&source.join("Pack B").join("snare.wav"), b"wav");
        snapshot_source(&source);

        // Simulate a reorganization: packs were filed under a genre folder.
        fs::create_dir_all(source.join("Hardstyle")).unwrap();
        rename_or_copy(&source.join("Pack A"), &source.join("Hardstyle").join("Pack A")).unwrap();
        rename_or_copy(&source.join("Pack B"), &source.join("Hardstyle").join("Pack B")).unwrap();

        let report = rollback_from_snapshot(&source).unwrap();
        assert_eq!(report.restored, 2);
        assert!(source.join("Pack A").join("kick.wav").is_file());
        assert!(source.join("Pack B").join("snare.wav").is_file());
        // The leftover genre folder is gone and the top-level listing matches
        // the snapshot again.
        assert!(!source.join("Hardstyle").exists());
        assert!(report.log_path.unwrap().is_file());
    }

    #[test]
    fn test_top_level_names_match_snapshot_after_rollback() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("src");
        write_file(&source.join("Alpha").join("a.wav"), b"a");
        write_file(&source.join("Beta").join("b.wav"), b"b");
        snapshot_source(&source);
        let recorded = SnapshotStore::new(&source)
            .load_original()
            .unwrap()
            .top_level_names();

        fs::create_dir_all(source.join("Sorted").join("Deep")).unwrap();
        rename_or_copy(&source.join("Alpha"), &source.join("Sorted").join("Deep").join("Alpha"))
            .unwrap();

        rollback_from_snapshot(&source).unwrap();

        let mut current: Vec<String> = fs::read_dir(&source)
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().to_string())
            .filter(|n| n != METADATA_DIR)
            .collect();
        current.sort();
        let mut expected = recorded;
        expected.sort();
        assert_eq!(current, expected);
    }

    #[test]
    fn test_vanished_entries_logged_not_fabricated() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("src");
        write_file(&source.join("Pack A").join("kick.wav"), b"wav");
        snapshot_source(&source);

        fs::remove_dir_all(source.join("Pack A")).unwrap();

        let report = rollback_from_snapshot(&source).unwrap();
        assert_eq!(report.missing, vec!["Pack A".to_string()]);
        assert!(!source.join("Pack A").exists());
    }
}
