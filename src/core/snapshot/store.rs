//! Snapshot persistence.
//!
//! Snapshots are serialized as pretty JSON into a hidden metadata directory
//! under the source path so later phases can run without re-walking the disk.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::core::errors::{OrganizerError, Result};
use crate::core::snapshot::node::Snapshot;

/// Hidden metadata directory created under the source path.
pub const METADATA_DIR: &str = ".audio-organizer";

/// Snapshot of the source tree before any reorganization.
pub const ORIGINAL_SNAPSHOT_FILE: &str = "structure-originale.json";

/// Snapshot of the source tree after phase 4 execution.
pub const REORGANIZED_SNAPSHOT_FILE: &str = "structure-reorganized.json";

/// Planned structure with operation annotations.
pub const PROPOSED_STRUCTURE_FILE: &str = "structure-proposee.json";

/// Reads and writes snapshots for one source directory.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    source: PathBuf,
}

impl SnapshotStore {
    /// Create a store for the given source directory.
    pub fn new(source: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
        }
    }

    /// The source directory this store serves.
    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Path of the metadata directory.
    pub fn metadata_dir(&self) -> PathBuf {
        self.source.join(METADATA_DIR)
    }

    /// Create the metadata directory if needed.
    pub fn ensure_metadata_dir(&self) -> Result<PathBuf> {
        let dir = self.metadata_dir();
        fs::create_dir_all(&dir)
            .map_err(|e| OrganizerError::io(format!("creating {}", dir.display()), e))?;
        Ok(dir)
    }

    /// Persist the original (pre-reorganization) snapshot.
    pub fn save_original(&self, snapshot: &Snapshot) -> Result<PathBuf> {
        self.save(ORIGINAL_SNAPSHOT_FILE, snapshot)
    }

    /// Load the original snapshot; a missing file is a precondition failure.
    pub fn load_original(&self) -> Result<Snapshot> {
        self.load(ORIGINAL_SNAPSHOT_FILE)
    }

    /// Persist the post-reorganization snapshot.
    pub fn save_reorganized(&self, snapshot: &Snapshot) -> Result<PathBuf> {
        self.save(REORGANIZED_SNAPSHOT_FILE, snapshot)
    }

    /// Load the post-reorganization snapshot.
    pub fn load_reorganized(&self) -> Result<Snapshot> {
        self.load(REORGANIZED_SNAPSHOT_FILE)
    }

    /// Whether the original snapshot exists.
    pub fn has_original(&self) -> bool {
        self.metadata_dir().join(ORIGINAL_SNAPSHOT_FILE).is_file()
    }

    /// Persist the planned structure (any serializable annotation payload).
    pub fn save_proposed<T: serde::Serialize>(&self, proposed: &T) -> Result<PathBuf> {
        let dir = self.ensure_metadata_dir()?;
        let path = dir.join(PROPOSED_STRUCTURE_FILE);
        let json = serde_json::to_string_pretty(proposed)?;
        fs::write(&path, json)
            .map_err(|e| OrganizerError::io(format!("writing {}", path.display()), e))?;
        info!("saved proposed structure to {}", path.display());
        Ok(path)
    }

    /// Path for an emergency rollback log stamped with a Unix epoch.
    pub fn rollback_log_path(&self, epoch: i64) -> PathBuf {
        self.metadata_dir().join(format!("rollback-{epoch}.log"))
    }

    fn save(&self, file_name: &str, snapshot: &Snapshot) -> Result<PathBuf> {
        let dir = self.ensure_metadata_dir()?;
        let path = dir.join(file_name);
        let json = serde_json::to_string_pretty(snapshot)?;
        fs::write(&path, json)
            .map_err(|e| OrganizerError::io(format!("writing {}", path.display()), e))?;
        info!("saved snapshot to {}", path.display());
        Ok(path)
    }

    fn load(&self, file_name: &str) -> Result<Snapshot> {
        let path = self.metadata_dir().join(file_name);
        if !path.is_file() {
            return Err(OrganizerError::precondition_at(
                format!("snapshot not found: {}", path.display()),
                path,
            ));
        }
        let raw = fs::read_to_string(&path)
            .map_err(|e| OrganizerError::io(format!("reading {}", path.display()), e))?;
        let snapshot = serde_json::from_str(&raw)?;
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::snapshot::node::SnapshotNode;
    use chrono::Utc;
    use tempfile::TempDir;

    fn sample_snapshot(source: &Path) -> Snapshot {
        Snapshot {
            source: source.to_path_buf(),
            generated_at: Utc::now(),
            max_depth: 5,
            root: SnapshotNode::directory(source.to_path_buf(), None),
            warnings: Vec::new(),
        }
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let tmp = TempDir::new().unwrap();
        let store = SnapshotStore::new(tmp.path());
        let snapshot = sample_snapshot(tmp.path());

        store.save_original(&snapshot).unwrap();
        assert!(store.has_original());

        let loaded = store.load_original().unwrap();
        assert_eq!(loaded.source, snapshot.source);
        assert_eq!(loaded.max_depth, 5);
    }

    #[test]
    fn test_missing_snapshot_is_precondition_error() {
        let tmp = TempDir::new().unwrap();
        let store = SnapshotStore::new(tmp.path());
        let err = store.load_original().unwrap_err();
        assert!(matches!(err, OrganizerError::Precondition { .. }));
    }

    #[test]
    fn test_rollback_log_path_is_epoch_stamped() {
        let store = SnapshotStore::new("/music");
        let path = store.rollback_log_path(1700000000);
        assert!(path.ends_with(".audio-organizer/rollback-1700000000.log"));
    }
}
