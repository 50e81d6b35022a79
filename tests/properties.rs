//! Property-based tests for the quantified invariants.

use proptest::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use packflow_rs::core::config::{DetectorConfig, DuplicateConfig};
use packflow_rs::core::snapshot::{Snapshot, SnapshotNode};
use packflow_rs::core::taxonomy::TaxonomyRegistry;
use packflow_rs::detectors::duplicates::DuplicateIndexer;
use packflow_rs::detectors::packs::PackDetector;

/// Specification of one generated file.
#[derive(Debug, Clone)]
struct FileSpec {
    dir: Vec<u8>,
    name: String,
    size: u64,
}

fn file_spec() -> impl Strategy<Value = FileSpec> {
    (
        proptest::collection::vec(0u8..3, 0..3),
        prop_oneof![
            "[a-z]{3,8}\\.wav",
            "[a-z]{3,8}\\.fxp",
            "[a-z]{3,8}\\.txt",
        ],
        1u64..10_000,
    )
        .prop_map(|(dir, name, size)| FileSpec { dir, name, size })
}

/// Build a snapshot tree from generated file specs.
fn build_tree(specs: &[FileSpec]) -> SnapshotNode {
    let mut root = SnapshotNode::directory(PathBuf::from("/gen"), None);
    for spec in specs {
        let mut dir_path = PathBuf::from("/gen");
        for seg in &spec.dir {
            dir_path.push(format!("d{seg}"));
        }
        insert_file(&mut root, &dir_path, &spec.name, spec.size);
    }
    root.recompute_aggregates();
    root
}

fn insert_file(node: &mut SnapshotNode, dir_path: &Path, name: &str, size: u64) {
    if node.path == dir_path {
        let file_path = dir_path.join(name);
        if node.children.iter().any(|c| c.path == file_path) {
            return;
        }
        node.children
            .push(SnapshotNode::file(file_path, size, None));
        return;
    }
    // Descend into (or create) the next segment on the way to dir_path.
    let next: PathBuf = {
        let relative = dir_path.strip_prefix(&node.path).unwrap();
        let first = relative.components().next().unwrap();
        node.path.join(first)
    };
    if let Some(child) = node.children.iter_mut().find(|c| c.path == next) {
        insert_file(child, dir_path, name, size);
        return;
    }
    let mut child = SnapshotNode::directory(next, None);
    insert_file(&mut child, dir_path, name, size);
    node.children.push(child);
}

fn assert_aggregation(node: &SnapshotNode) {
    if node.is_file() {
        return;
    }
    let audio: usize = node.children.iter().map(|c| c.audio_file_count).sum();
    let presets: usize = node.children.iter().map(|c| c.preset_file_count).sum();
    let size: u64 = node.children.iter().map(|c| c.total_size).sum();
    assert_eq!(node.audio_file_count, audio, "audio at {:?}", node.path);
    assert_eq!(node.preset_file_count, presets, "presets at {:?}", node.path);
    assert_eq!(node.total_size, size, "size at {:?}", node.path);
    for child in &node.children {
        assert_aggregation(child);
    }
}

fn snapshot_of(root: SnapshotNode) -> Snapshot {
    Snapshot {
        source: root.path.clone(),
        generated_at: chrono::Utc::now(),
        max_depth: 5,
        root,
        warnings: Vec::new(),
    }
}

proptest! {
    /// Invariant 1: every directory's counts equal the sum of its children's.
    #[test]
    fn snapshot_aggregation_holds(specs in proptest::collection::vec(file_spec(), 0..40)) {
        let root = build_tree(&specs);
        assert_aggregation(&root);
    }

    /// Invariant 2: running the detector twice yields identical pack sets.
    #[test]
    fn detector_is_idempotent(specs in proptest::collection::vec(file_spec(), 0..40)) {
        let snapshot = snapshot_of(build_tree(&specs));
        let detector = PackDetector::new(
            Arc::new(TaxonomyRegistry::builtin()),
            DetectorConfig::default(),
        );

        let shape = |report: &packflow_rs::detectors::packs::DetectionReport| {
            report
                .packs
                .iter()
                .map(|p| (p.path.clone(), p.pack_type, p.audio_file_count, p.sub_packs.len()))
                .collect::<Vec<_>>()
        };
        let first = detector.detect(&snapshot);
        let second = detector.detect(&snapshot);
        prop_assert_eq!(shape(&first), shape(&second));
        prop_assert_eq!(first.stats, second.stats);
    }

    /// Invariant 3: no emitted pack has an ancestor that is also emitted.
    #[test]
    fn emitted_packs_are_ancestor_free(specs in proptest::collection::vec(file_spec(), 0..40)) {
        let snapshot = snapshot_of(build_tree(&specs));
        let detector = PackDetector::new(
            Arc::new(TaxonomyRegistry::builtin()),
            DetectorConfig::default(),
        );
        let report = detector.detect(&snapshot);
        let paths: Vec<&Path> = report.packs.iter().map(|p| p.path.as_path()).collect();
        for path in &paths {
            prop_assert!(!path.ancestors().skip(1).any(|a| paths.contains(&a)));
        }
    }

    /// Invariant 4: duplicate groups partition their members.
    #[test]
    fn duplicate_groups_are_disjoint(specs in proptest::collection::vec(file_spec(), 0..60)) {
        let snapshot = snapshot_of(build_tree(&specs));
        let report = DuplicateIndexer::new(DuplicateConfig::default()).index(&snapshot);

        let mut seen = std::collections::HashSet::new();
        for group in &report.groups {
            prop_assert!(group.count >= 2);
            prop_assert_eq!(group.wasted_size, group.size_per_file * (group.count as u64 - 1));
            for path in &group.paths {
                prop_assert!(seen.insert(path.clone()), "path in two groups: {:?}", path);
            }
        }
        let expected_total: u64 = report.groups.iter().map(|g| g.wasted_size).sum();
        prop_assert_eq!(report.total_wasted, expected_total);
    }
}

/// Invariant 5: identical inputs produce byte-identical plans.
#[test]
fn plans_are_byte_identical_for_identical_inputs() {
    use packflow_rs::detectors::classifier::TagClassifier;
    use packflow_rs::detectors::fusion::FusionMatcher;
    use packflow_rs::detectors::structure::StructureProposer;
    use packflow_rs::organize::plan::{PlanInputs, ReorganizationPlanner};

    let taxonomy = Arc::new(TaxonomyRegistry::builtin());

    let mk_plan = || {
        let mut root = SnapshotNode::directory(PathBuf::from("/src"), None);
        for name in ["Vendor - Hardstyle Kicks Vol 1", "Vendor - Techno Loops Vol 3"] {
            let dir = PathBuf::from("/src").join(name);
            let mut pack = SnapshotNode::directory(dir.clone(), None);
            for i in 0..35 {
                pack.children.push(SnapshotNode::file(
                    dir.join(format!("s{i:02}.wav")),
                    1024 * 1024,
                    None,
                ));
            }
            root.children.push(pack);
        }
        root.recompute_aggregates();
        let snapshot = snapshot_of(root);

        let detector = PackDetector::new(taxonomy.clone(), DetectorConfig::default());
        let report = detector.detect(&snapshot);
        let enriched = TagClassifier::new(taxonomy.clone()).enrich_all(&report.packs, &snapshot);
        let proposals = StructureProposer::new().propose(&enriched);
        let proposal = proposals.iter().find(|p| p.recommended).unwrap();
        let groups = FusionMatcher::new(taxonomy.clone(), Default::default()).group(&enriched);

        let plan = ReorganizationPlanner::new().plan_organization(PlanInputs {
            root: Path::new("/src"),
            packs: &enriched,
            proposal,
            fusion_groups: &groups,
        });
        // Strip volatile pack ids by serializing only operation fields.
        serde_json::to_vec(&plan).unwrap()
    };

    assert_eq!(mk_plan(), mk_plan());
}
