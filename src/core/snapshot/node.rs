//! Snapshot node definitions.
//!
//! A snapshot is a lightweight, pre-computed directory tree capturing
//! aggregated audio counts, preset counts, and sizes without rescanning the
//! filesystem. Parent relationships are recoverable from path strings, so the
//! model stays a pure tree with lookup by path.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::core::files::{is_documentation_extension, FileClass};

/// Kind of node in a snapshot tree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    /// Regular file
    #[default]
    File,
    /// Directory with aggregated counts
    Directory,
}

/// A single node in the snapshot tree.
///
/// Directories aggregate `audio_file_count`, `preset_file_count`, and
/// `total_size` across their whole subtree. Aggregations are computed
/// bottom-up in a single pass at build time and never recomputed during
/// detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotNode {
    /// Absolute path of this node
    pub path: PathBuf,

    /// Base name of this node
    pub name: String,

    /// File or directory
    pub kind: NodeKind,

    /// File size in bytes (0 for directories)
    #[serde(default)]
    pub size: u64,

    /// Lowercased extension without the leading dot (files only)
    #[serde(default)]
    pub extension: Option<String>,

    /// Last modification timestamp, when readable
    #[serde(default)]
    pub modified_at: Option<DateTime<Utc>>,

    /// Audio files in this subtree (for a file: 1 if audio, else 0)
    #[serde(default)]
    pub audio_file_count: usize,

    /// Preset files in this subtree (for a file: 1 if preset, else 0)
    #[serde(default)]
    pub preset_file_count: usize,

    /// Total bytes in this subtree
    #[serde(default)]
    pub total_size: u64,

    /// Ordered children (directories only)
    #[serde(default)]
    pub children: Vec<SnapshotNode>,
}

impl SnapshotNode {
    /// Create a file node. Class counts are derived from the extension.
    pub fn file(path: PathBuf, size: u64, modified_at: Option<DateTime<Utc>>) -> Self {
        let name = base_name(&path);
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        let class = extension
            .as_deref()
            .map(FileClass::from_extension)
            .unwrap_or(FileClass::Other);

        Self {
            path,
            name,
            kind: NodeKind::File,
            size,
            extension,
            modified_at,
            audio_file_count: usize::from(class == FileClass::Audio),
            preset_file_count: usize::from(class == FileClass::Preset),
            total_size: size,
            children: Vec::new(),
        }
    }

    /// Create an empty directory node.
    pub fn directory(path: PathBuf, modified_at: Option<DateTime<Utc>>) -> Self {
        let name = base_name(&path);
        Self {
            path,
            name,
            kind: NodeKind::Directory,
            size: 0,
            extension: None,
            modified_at,
            audio_file_count: 0,
            preset_file_count: 0,
            total_size: 0,
            children: Vec::new(),
        }
    }

    /// Check if this node is a directory
    pub fn is_directory(&self) -> bool {
        self.kind == NodeKind::Directory
    }

    /// Check if this node is a file
    pub fn is_file(&self) -> bool {
        self.kind == NodeKind::File
    }

    /// File class of a file node (`Other` for directories).
    pub fn file_class(&self) -> FileClass {
        if self.is_directory() {
            return FileClass::Other;
        }
        self.extension
            .as_deref()
            .map(FileClass::from_extension)
            .unwrap_or(FileClass::Other)
    }

    /// Recompute the aggregated counts of this subtree, bottom-up.
    ///
    /// Invariant afterwards: a directory's counts equal the sum of its
    /// children's counts.
    pub fn recompute_aggregates(&mut self) {
        if self.is_file() {
            return;
        }
        let mut audio = 0;
        let mut presets = 0;
        let mut size = 0;
        for child in &mut self.children {
            child.recompute_aggregates();
            audio += child.audio_file_count;
            presets += child.preset_file_count;
            size += child.total_size;
        }
        self.audio_file_count = audio;
        self.preset_file_count = presets;
        self.total_size = size;
    }

    /// Look up a node by absolute path anywhere in this subtree.
    pub fn find(&self, path: &Path) -> Option<&SnapshotNode> {
        if self.path == path {
            return Some(self);
        }
        if !path.starts_with(&self.path) {
            return None;
        }
        self.children.iter().find_map(|child| child.find(path))
    }

    /// Immediate subdirectories, in order.
    pub fn subdirectories(&self) -> impl Iterator<Item = &SnapshotNode> {
        self.children.iter().filter(|c| c.is_directory())
    }

    /// Immediate file children, in order.
    pub fn direct_files(&self) -> impl Iterator<Item = &SnapshotNode> {
        self.children.iter().filter(|c| c.is_file())
    }

    /// Count of audio files directly inside this directory (depth 0).
    pub fn direct_audio_file_count(&self) -> usize {
        self.direct_files()
            .filter(|f| f.file_class() == FileClass::Audio)
            .count()
    }

    /// Total files in this subtree.
    pub fn file_count(&self) -> usize {
        if self.is_file() {
            return 1;
        }
        self.children.iter().map(SnapshotNode::file_count).sum()
    }

    /// Count files in the subtree matching a predicate.
    pub fn count_files_where<F>(&self, predicate: &F) -> usize
    where
        F: Fn(&SnapshotNode) -> bool,
    {
        if self.is_file() {
            return usize::from(predicate(self));
        }
        self.children
            .iter()
            .map(|c| c.count_files_where(predicate))
            .sum()
    }

    /// Visit every node in the subtree, depth-first, parents before children.
    pub fn for_each<F>(&self, f: &mut F)
    where
        F: FnMut(&SnapshotNode),
    {
        f(self);
        for child in &self.children {
            child.for_each(f);
        }
    }

    /// All file nodes in this subtree.
    pub fn files(&self) -> Vec<&SnapshotNode> {
        let mut out = Vec::new();
        self.collect_files(&mut out);
        out
    }

    fn collect_files<'a>(&'a self, out: &mut Vec<&'a SnapshotNode>) {
        if self.is_file() {
            out.push(self);
            return;
        }
        for child in &self.children {
            child.collect_files(out);
        }
    }

    /// Maximum directory depth below this node (a flat directory is 0).
    pub fn subtree_depth(&self) -> usize {
        self.subdirectories()
            .map(|d| 1 + d.subtree_depth())
            .max()
            .unwrap_or(0)
    }

    /// Ratio of audio files to all files in this subtree, in [0,1].
    pub fn audio_ratio(&self) -> f64 {
        let total = self.file_count();
        if total == 0 {
            return 0.0;
        }
        self.audio_file_count as f64 / total as f64
    }

    /// Whether the subtree carries any documentation file.
    pub fn has_documentation(&self) -> bool {
        self.count_files_where(&|f| {
            f.extension
                .as_deref()
                .map(is_documentation_extension)
                .unwrap_or(false)
                || f.name.to_ascii_lowercase().contains("readme")
        }) > 0
    }
}

fn base_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string_lossy().to_string())
}

/// A complete snapshot: the root node plus provenance metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    /// Source directory the snapshot was taken from
    pub source: PathBuf,

    /// When the snapshot was generated
    pub generated_at: DateTime<Utc>,

    /// Maximum recursion depth used during the scan
    pub max_depth: usize,

    /// Root node of the tree
    pub root: SnapshotNode,

    /// Warnings collected during the scan (unreadable dirs, skipped leaves)
    #[serde(default)]
    pub warnings: Vec<String>,
}

impl Snapshot {
    /// Look up a node by absolute path.
    pub fn find(&self, path: &Path) -> Option<&SnapshotNode> {
        self.root.find(path)
    }

    /// Names of the top-level entries, in tree order.
    pub fn top_level_names(&self) -> Vec<String> {
        self.root.children.iter().map(|c| c.name.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(path: &str, size: u64) -> SnapshotNode {
        SnapshotNode::file(PathBuf::from(path), size, None)
    }

    fn dir(path: &str, children: Vec<SnapshotNode>) -> SnapshotNode {
        let mut d = SnapshotNode::directory(PathBuf::from(path), None);
        d.children = children;
        d.recompute_aggregates();
        d
    }

    #[test]
    fn test_aggregation_sums_children() {
        let tree = dir(
            "/src",
            vec![
                dir(
                    "/src/a",
                    vec![file("/src/a/kick.wav", 100), file("/src/a/lead.fxp", 10)],
                ),
                file("/src/snare.wav", 50),
            ],
        );

        assert_eq!(tree.audio_file_count, 2);
        assert_eq!(tree.preset_file_count, 1);
        assert_eq!(tree.total_size, 160);

        let child_audio: usize = tree.children.iter().map(|c| c.audio_file_count).sum();
        assert_eq!(tree.audio_file_count, child_audio);
    }

    #[test]
    fn test_find_by_path() {
        let tree = dir("/src", vec![dir("/src/a", vec![file("/src/a/k.wav", 1)])]);
        assert!(tree.find(Path::new("/src/a/k.wav")).is_some());
        assert!(tree.find(Path::new("/src/b")).is_none());
    }

    #[test]
    fn test_direct_audio_count_ignores_nested() {
        let tree = dir(
            "/p",
            vec![
                file("/p/a.wav", 1),
                dir("/p/inner", vec![file("/p/inner/b.wav", 1)]),
            ],
        );
        assert_eq!(tree.direct_audio_file_count(), 1);
        assert_eq!(tree.audio_file_count, 2);
    }

    #[test]
    fn test_subtree_depth() {
        let tree = dir("/p", vec![dir("/p/a", vec![dir("/p/a/b", vec![])])]);
        assert_eq!(tree.subtree_depth(), 2);

        let flat = dir("/p", vec![file("/p/a.wav", 1)]);
        assert_eq!(flat.subtree_depth(), 0);
    }

    #[test]
    fn test_documentation_detection() {
        let with_doc = dir("/p", vec![file("/p/info.pdf", 1)]);
        assert!(with_doc.has_documentation());

        let readme = dir("/p", vec![file("/p/ReadMe", 1)]);
        assert!(readme.has_documentation());

        let plain = dir("/p", vec![file("/p/kick.wav", 1)]);
        assert!(!plain.has_documentation());
    }
}
