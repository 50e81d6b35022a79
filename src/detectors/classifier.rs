//! Lexical classification of detected packs.
//!
//! Tags are extracted from pack and subfolder names using the taxonomy; no
//! audio analysis happens here. BPM/key slots stay empty placeholders.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

use crate::core::files::FileClass;
use crate::core::snapshot::Snapshot;
use crate::core::taxonomy::TaxonomyRegistry;
use crate::detectors::packs::DetectedPack;

/// File paths of a pack grouped by class.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilesByClass {
    /// Audio sample paths
    pub audio: Vec<PathBuf>,
    /// Preset paths
    pub presets: Vec<PathBuf>,
    /// Everything else
    pub other: Vec<PathBuf>,
}

/// A detected pack enriched with derived metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichedPack {
    /// The underlying detected pack
    pub pack: DetectedPack,
    /// Audio formats present (lowercased extensions)
    pub formats: BTreeSet<String>,
    /// Lexical tags: genres and audio types found in names
    pub tags: Vec<String>,
    /// Genre tags subset, in taxonomy order
    pub genres: Vec<String>,
    /// Whether loop material is present
    pub has_loops: bool,
    /// Whether one-shot material is present
    pub has_one_shots: bool,
    /// Whether presets are present
    pub has_presets: bool,
    /// Known label matched in the name, if any
    pub label: Option<String>,
    /// Average file size in bytes
    pub average_file_size: u64,
    /// Placeholder analysis tags (BPM/key); never populated lexically
    pub analysis_tags: Vec<String>,
    /// Files grouped by class, a strict subset of the snapshot at the pack
    /// path
    pub files: FilesByClass,
}

/// Assigns style/type tags to detected packs.
pub struct TagClassifier {
    taxonomy: Arc<TaxonomyRegistry>,
}

impl TagClassifier {
    /// Create a classifier over a shared taxonomy.
    pub fn new(taxonomy: Arc<TaxonomyRegistry>) -> Self {
        Self { taxonomy }
    }

    /// Enrich one detected pack using the snapshot it was detected in.
    pub fn enrich(&self, pack: &DetectedPack, snapshot: &Snapshot) -> EnrichedPack {
        let node = snapshot.find(&pack.path);

        let mut formats = BTreeSet::new();
        let mut files = FilesByClass::default();
        let mut loops = false;
        let mut one_shots = false;

        if let Some(node) = node {
            for f in node.files() {
                match f.file_class() {
                    FileClass::Audio => {
                        if let Some(ext) = &f.extension {
                            formats.insert(ext.clone());
                        }
                        files.audio.push(f.path.clone());
                    }
                    FileClass::Preset => files.presets.push(f.path.clone()),
                    FileClass::Other => files.other.push(f.path.clone()),
                }
            }

            for dir in node.subdirectories() {
                let lowered = dir.name.to_lowercase();
                loops |= lowered.contains("loop");
                one_shots |= lowered.contains("one shot")
                    || lowered.contains("one-shot")
                    || lowered.contains("oneshot");
            }
        }

        let lowered_name = pack.name.to_lowercase();
        loops |= lowered_name.contains("loop");
        one_shots |= lowered_name.contains("one shot") || lowered_name.contains("oneshot");

        let genres: Vec<String> = self
            .taxonomy
            .matches_genre(&pack.name)
            .into_iter()
            .map(str::to_string)
            .collect();

        let mut tags: Vec<String> = genres.clone();
        if let Some(category) = self.taxonomy.category_for(&pack.name) {
            tags.push(category.to_string());
        }
        if let Some(node) = node {
            for dir in node.subdirectories() {
                if let Some(category) = self.taxonomy.category_for(&dir.name) {
                    if !tags.iter().any(|t| t == category) {
                        tags.push(category.to_string());
                    }
                }
            }
        }

        let label = self
            .taxonomy
            .matches_label(&pack.name)
            .first()
            .map(|l| l.to_string());

        let total_files = pack.total_file_count.max(1) as u64;

        EnrichedPack {
            formats,
            tags,
            genres,
            has_loops: loops,
            has_one_shots: one_shots,
            has_presets: pack.preset_file_count > 0,
            label,
            average_file_size: pack.total_size / total_files,
            analysis_tags: Vec::new(),
            files,
            pack: pack.clone(),
        }
    }

    /// Enrich every pack of a detection run, bundle children included.
    pub fn enrich_all(&self, packs: &[DetectedPack], snapshot: &Snapshot) -> Vec<EnrichedPack> {
        let mut out = Vec::new();
        for pack in packs {
            match pack.pack_type {
                crate::detectors::packs::PackType::BundleContainer => {
                    for child in &pack.sub_packs {
                        out.push(self.enrich(child, snapshot));
                    }
                }
                crate::detectors::packs::PackType::WrapperFolder => {
                    // Classify the inner pack; the shell disappears later.
                    if let Some(inner) = pack.sub_packs.first() {
                        out.push(self.enrich(inner, snapshot));
                    } else {
                        out.push(self.enrich(pack, snapshot));
                    }
                }
                _ => out.push(self.enrich(pack, snapshot)),
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::DetectorConfig;
    use crate::core::snapshot::SnapshotNode;
    use crate::detectors::packs::PackDetector;
    use chrono::Utc;

    fn file(path: &str, size: u64) -> SnapshotNode {
        SnapshotNode::file(PathBuf::from(path), size, None)
    }

    fn dir(path: &str, children: Vec<SnapshotNode>) -> SnapshotNode {
        let mut d = SnapshotNode::directory(PathBuf::from(path), None);
        d.children = children;
        d.recompute_aggregates();
        d
    }

    fn snapshot(root: SnapshotNode) -> Snapshot {
        Snapshot {
            source: root.path.clone(),
            generated_at: Utc::now(),
            max_depth: 5,
            root,
            warnings: Vec::new(),
        }
    }

    #[test]
    fn test_enrichment_extracts_tags_and_formats() {
        let pack_path = "/src/Singomakers - Hardstyle Kick Loops Vol 2";
        let mut children: Vec<SnapshotNode> = (0..35)
            .map(|i| file(&format!("{pack_path}/kick{i:02}.wav"), 2 * 1024 * 1024))
            .collect();
        children.push(file(&format!("{pack_path}/patch.fxp"), 1024));
        let root = dir("/src", vec![dir(pack_path, children)]);
        let snap = snapshot(root);

        let taxonomy = Arc::new(TaxonomyRegistry::builtin());
        let detector = PackDetector::new(taxonomy.clone(), DetectorConfig::default());
        let report = detector.detect(&snap);
        assert_eq!(report.packs.len(), 1);

        let classifier = TagClassifier::new(taxonomy);
        let enriched = classifier.enrich(&report.packs[0], &snap);

        assert!(enriched.genres.contains(&"hardstyle".to_string()));
        assert!(enriched.tags.iter().any(|t| t == "Kicks"));
        assert!(enriched.has_loops);
        assert!(enriched.has_presets);
        assert_eq!(enriched.label.as_deref(), Some("singomakers"));
        assert!(enriched.formats.contains("wav"));
        assert_eq!(enriched.files.audio.len(), 35);
        assert_eq!(enriched.files.presets.len(), 1);
        assert!(enriched.analysis_tags.is_empty());
    }

    #[test]
    fn test_file_list_is_subset_of_snapshot() {
        let pack_path = "/src/Vendor - Vocal Pack";
        let children: Vec<SnapshotNode> = (0..32)
            .map(|i| file(&format!("{pack_path}/vox{i:02}.wav"), 1024 * 1024 * 2))
            .collect();
        let root = dir("/src", vec![dir(pack_path, children)]);
        let snap = snapshot(root);

        let taxonomy = Arc::new(TaxonomyRegistry::builtin());
        let detector = PackDetector::new(taxonomy.clone(), DetectorConfig::default());
        let report = detector.detect(&snap);
        let enriched = TagClassifier::new(taxonomy).enrich(&report.packs[0], &snap);

        for path in &enriched.files.audio {
            assert!(snap.find(path).is_some());
        }
    }

    #[test]
    fn test_enrich_all_flattens_bundle_children() {
        let bundle = "/src/Ultimate Bundle Collection";
        let mk = |name: &str| {
            let p = format!("{bundle}/{name}");
            dir(
                &p,
                (0..30)
                    .map(|i| file(&format!("{p}/s{i}.wav"), 1024 * 1024))
                    .collect(),
            )
        };
        let root = dir(
            "/src",
            vec![dir(
                bundle,
                vec![mk("A - Pack One"), mk("B - Pack Two"), mk("C - Pack Three")],
            )],
        );
        let snap = snapshot(root);

        let taxonomy = Arc::new(TaxonomyRegistry::builtin());
        let detector = PackDetector::new(taxonomy.clone(), DetectorConfig::default());
        let report = detector.detect(&snap);

        let enriched = TagClassifier::new(taxonomy).enrich_all(&report.packs, &snap);
        assert_eq!(enriched.len(), 3);
    }
}
