//! Snapshot construction.
//!
//! Builds a lightweight tree rooted at the source path. Recursion is bounded
//! by a configurable max depth and by exclude patterns; aggregations are
//! computed bottom-up in a single pass so later phases never rescan the disk.
//!
//! Failure modes: an unreadable directory is recorded as an empty node with a
//! warning; symlink cycles are suppressed by a visited (device, inode) set;
//! an I/O error at a leaf omits the file and shrinks the aggregated counters.

use chrono::{DateTime, Utc};
use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, warn};

use crate::core::config::SnapshotConfig;
use crate::core::errors::{OrganizerError, Result};
use crate::core::snapshot::node::{Snapshot, SnapshotNode};

/// Statistics from a snapshot scan.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanStats {
    /// Files indexed
    pub files: usize,
    /// Directories indexed
    pub directories: usize,
    /// Audio files indexed
    pub audio_files: usize,
    /// Preset files indexed
    pub preset_files: usize,
    /// Total bytes indexed
    pub total_size: u64,
    /// Entries skipped due to read errors
    pub errors: usize,
    /// Scan duration in milliseconds
    pub duration_ms: u64,
}

/// Builds snapshots from the real filesystem.
pub struct SnapshotBuilder {
    config: SnapshotConfig,
    excludes: GlobSet,
}

impl SnapshotBuilder {
    /// Create a builder from snapshot configuration.
    pub fn new(config: SnapshotConfig) -> Result<Self> {
        let mut globs = GlobSetBuilder::new();
        for pattern in &config.exclude_patterns {
            let glob = Glob::new(pattern).map_err(|e| {
                OrganizerError::config_field(
                    format!("invalid exclude pattern '{pattern}': {e}"),
                    "snapshot.exclude_patterns",
                )
            })?;
            globs.add(glob);
        }
        let excludes = globs
            .build()
            .map_err(|e| OrganizerError::config(format!("exclude pattern set: {e}")))?;

        Ok(Self { config, excludes })
    }

    /// Build a snapshot rooted at `source`.
    pub fn build(&self, source: &Path) -> Result<(Snapshot, ScanStats)> {
        if !source.exists() {
            return Err(OrganizerError::precondition_at(
                format!("source directory does not exist: {}", source.display()),
                source,
            ));
        }
        if !source.is_dir() {
            return Err(OrganizerError::precondition_at(
                format!("source path is not a directory: {}", source.display()),
                source,
            ));
        }

        let start = Instant::now();
        let mut stats = ScanStats::default();
        let mut warnings = Vec::new();
        let mut visited = HashSet::new();

        let mut root = SnapshotNode::directory(source.to_path_buf(), modified_at(source));
        self.scan_directory(source, &mut root, 0, &mut visited, &mut stats, &mut warnings);
        root.recompute_aggregates();

        stats.audio_files = root.audio_file_count;
        stats.preset_files = root.preset_file_count;
        stats.total_size = root.total_size;
        stats.duration_ms = start.elapsed().as_millis() as u64;

        debug!(
            files = stats.files,
            directories = stats.directories,
            audio = stats.audio_files,
            "snapshot scan finished in {}ms",
            stats.duration_ms
        );

        let snapshot = Snapshot {
            source: source.to_path_buf(),
            generated_at: Utc::now(),
            max_depth: self.config.max_depth,
            root,
            warnings,
        };

        Ok((snapshot, stats))
    }

    fn scan_directory(
        &self,
        dir: &Path,
        node: &mut SnapshotNode,
        depth: usize,
        visited: &mut HashSet<(u64, u64)>,
        stats: &mut ScanStats,
        warnings: &mut Vec<String>,
    ) {
        stats.directories += 1;

        if let Some(id) = inode_id(dir) {
            if !visited.insert(id) {
                warnings.push(format!("cycle suppressed at {}", dir.display()));
                return;
            }
        }

        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                // Unreadable directory stays in the tree as an empty node.
                warn!("unreadable directory {}: {e}", dir.display());
                warnings.push(format!("unreadable directory: {}", dir.display()));
                stats.errors += 1;
                return;
            }
        };

        let mut names: Vec<_> = entries
            .filter_map(|entry| match entry {
                Ok(e) => Some(e.path()),
                Err(e) => {
                    warnings.push(format!("unreadable entry under {}: {e}", dir.display()));
                    stats.errors += 1;
                    None
                }
            })
            .collect();
        // Deterministic child ordering regardless of readdir order.
        names.sort();

        for path in names {
            if self.is_excluded(&path) {
                continue;
            }

            let metadata = match fs::symlink_metadata(&path) {
                Ok(m) => m,
                Err(e) => {
                    warnings.push(format!("skipped {}: {e}", path.display()));
                    stats.errors += 1;
                    continue;
                }
            };

            if metadata.file_type().is_symlink() {
                // Symlinks are never followed; cycles cannot enter the tree.
                continue;
            }

            if metadata.is_dir() {
                let mut child = SnapshotNode::directory(path.clone(), modified(&metadata));
                if depth + 1 < self.config.max_depth {
                    self.scan_directory(&path, &mut child, depth + 1, visited, stats, warnings);
                } else {
                    // Depth bound reached: aggregate the remainder without
                    // materializing deeper nodes.
                    self.aggregate_deep(&path, &mut child, stats, warnings);
                    stats.directories += 1;
                }
                node.children.push(child);
            } else {
                stats.files += 1;
                node.children
                    .push(SnapshotNode::file(path, metadata.len(), modified(&metadata)));
            }
        }
    }

    /// Fold files below the depth bound into the counts of the boundary
    /// directory, keeping the snapshot lightweight.
    fn aggregate_deep(
        &self,
        dir: &Path,
        node: &mut SnapshotNode,
        stats: &mut ScanStats,
        warnings: &mut Vec<String>,
    ) {
        for entry in walkdir::WalkDir::new(dir)
            .follow_links(false)
            .into_iter()
            .filter_entry(|e| !self.is_excluded(e.path()))
        {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    warnings.push(format!("skipped below depth bound: {e}"));
                    stats.errors += 1;
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
            let leaf = SnapshotNode::file(entry.path().to_path_buf(), size, None);
            node.audio_file_count += leaf.audio_file_count;
            node.preset_file_count += leaf.preset_file_count;
            node.total_size += leaf.total_size;
            stats.files += 1;
        }
        // Mark as aggregated-only: counts without children. The recompute
        // pass must not zero these out, so store them as a synthetic file
        // child holding the rollup.
        if node.audio_file_count > 0 || node.preset_file_count > 0 || node.total_size > 0 {
            let mut rollup = SnapshotNode::file(node.path.join("…"), node.total_size, None);
            rollup.name = "…".to_string();
            rollup.extension = None;
            rollup.audio_file_count = node.audio_file_count;
            rollup.preset_file_count = node.preset_file_count;
            node.children.push(rollup);
        }
    }

    fn is_excluded(&self, path: &Path) -> bool {
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            if self.excludes.is_match(name) {
                return true;
            }
        }
        self.excludes.is_match(path)
    }
}

fn modified(metadata: &fs::Metadata) -> Option<DateTime<Utc>> {
    metadata.modified().ok().map(DateTime::<Utc>::from)
}

fn modified_at(path: &Path) -> Option<DateTime<Utc>> {
    fs::metadata(path).ok().and_then(|m| m.modified().ok()).map(DateTime::<Utc>::from)
}

#[cfg(unix)]
fn inode_id(path: &Path) -> Option<(u64, u64)> {
    use std::os::unix::fs::MetadataExt;
    fs::metadata(path).ok().map(|m| (m.dev(), m.ino()))
}

#[cfg(not(unix))]
fn inode_id(_path: &Path) -> Option<(u64, u64)> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_file(dir: &Path, name: &str, bytes: usize) {
        let mut f = File::create(dir.join(name)).unwrap();
        f.write_all(&vec![0u8; bytes]).unwrap();
    }

    fn builder() -> SnapshotBuilder {
        SnapshotBuilder::new(SnapshotConfig::default()).unwrap()
    }

    #[test]
    fn test_build_aggregates_counts() {
        let tmp = TempDir::new().unwrap();
        let pack = tmp.path().join("Vendor - Kicks Vol.2");
        fs::create_dir(&pack).unwrap();
        for i in 0..5 {
            write_file(&pack, &format!("kick{i:02}.wav"), 16);
        }
        write_file(&pack, "patch.fxp", 8);

        let (snapshot, stats) = builder().build(tmp.path()).unwrap();
        assert_eq!(stats.audio_files, 5);
        assert_eq!(stats.preset_files, 1);
        assert_eq!(snapshot.root.audio_file_count, 5);
        assert_eq!(snapshot.root.total_size, 5 * 16 + 8);

        let pack_node = snapshot.find(&pack).unwrap();
        assert_eq!(pack_node.audio_file_count, 5);
        assert_eq!(pack_node.direct_audio_file_count(), 5);
    }

    #[test]
    fn test_missing_source_is_precondition_error() {
        let err = builder().build(Path::new("/nonexistent/packs")).unwrap_err();
        assert!(matches!(err, OrganizerError::Precondition { .. }));
    }

    #[test]
    fn test_excluded_directories_are_skipped() {
        let tmp = TempDir::new().unwrap();
        let meta = tmp.path().join(".audio-organizer");
        fs::create_dir(&meta).unwrap();
        write_file(&meta, "structure-originale.json", 4);
        write_file(tmp.path(), "kick.wav", 4);

        let (snapshot, stats) = builder().build(tmp.path()).unwrap();
        assert_eq!(stats.audio_files, 1);
        assert!(snapshot.find(&meta).is_none());
    }

    #[test]
    fn test_depth_bound_folds_counts() {
        let tmp = TempDir::new().unwrap();
        let mut deep = tmp.path().to_path_buf();
        for level in 0..7 {
            deep = deep.join(format!("level{level}"));
        }
        fs::create_dir_all(&deep).unwrap();
        write_file(&deep, "buried.wav", 4);

        let (snapshot, _) = builder().build(tmp.path()).unwrap();
        // The deep file is counted even though its node is not materialized.
        assert_eq!(snapshot.root.audio_file_count, 1);
        assert!(snapshot.find(&deep.join("buried.wav")).is_none());
    }

    #[test]
    fn test_children_sorted_for_determinism() {
        let tmp = TempDir::new().unwrap();
        write_file(tmp.path(), "b.wav", 1);
        write_file(tmp.path(), "a.wav", 1);
        write_file(tmp.path(), "c.wav", 1);

        let (snapshot, _) = builder().build(tmp.path()).unwrap();
        let names: Vec<_> = snapshot.root.children.iter().map(|c| c.name.clone()).collect();
        assert_eq!(names, vec!["a.wav", "b.wav", "c.wav"]);
    }
}
