//! End-to-end pipeline tests over real temporary directories.

use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use packflow_rs::core::config::{DuplicateStrategy, OrganizerConfig};
use packflow_rs::core::pipeline::{Phase, PhaseData, PhaseStatus};
use packflow_rs::core::snapshot::{SnapshotStore, METADATA_DIR};
use packflow_rs::organize::rollback::rollback_from_snapshot;
use packflow_rs::{OrganizerEngine, PipelineStatus};

fn write_file(path: &Path, bytes: &[u8]) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, bytes).unwrap();
}

fn flat_pack(root: &Path, name: &str, wavs: usize) -> PathBuf {
    let pack = root.join(name);
    for i in 0..wavs {
        write_file(&pack.join(format!("sample{i:03}.wav")), &[0u8; 256]);
    }
    pack
}

fn quiet_config() -> OrganizerConfig {
    let mut config = OrganizerConfig::default();
    config.duplicates.strategy = DuplicateStrategy::KeepAll;
    config
}

/// Drive every phase to completion, answering checkpoints with defaults.
async fn run_pipeline(engine: &mut OrganizerEngine) {
    for phase in Phase::ALL {
        let mut outcome = engine.execute_phase(phase.index()).await.unwrap();
        while outcome.status == PhaseStatus::AwaitingUser {
            let pending = outcome.pending.clone().unwrap();
            let choice = match phase {
                Phase::Preparation => json!({ "approve": true }),
                Phase::Discovery => json!({ "strategy": "keep-all" }),
                Phase::Classification => json!({ "keep": [] }),
                _ => json!({}),
            };
            outcome = engine
                .continue_phase(phase.index(), pending.resume_from_step, choice)
                .await
                .unwrap();
        }
        assert_eq!(outcome.status, PhaseStatus::Completed, "phase {phase}");
    }
}

#[tokio::test]
async fn scenario_flat_commercial_pack() {
    let tmp = TempDir::new().unwrap();
    let source = tmp.path().join("collection");
    flat_pack(&source, "Vendor - Kicks Vol.2", 45);

    let mut engine = OrganizerEngine::new(&source, quiet_config()).unwrap();
    engine.initialize().unwrap();
    run_pipeline(&mut engine).await;

    // One commercial pack with the expected reasoning.
    let Some(PhaseData::Discovery(discovery)) = engine.get_phase_data(1).unwrap() else {
        panic!("discovery output missing");
    };
    let packs = discovery.enriched_packs().unwrap();
    assert_eq!(packs.len(), 1);
    let pack = &packs[0].pack;
    assert!(pack.reasoning.iter().any(|r| r.contains("Artist - Title")));
    assert!(pack
        .reasoning
        .iter()
        .any(|r| r.to_lowercase().contains("commercial keywords")));
    assert!(discovery.duplicates.groups.is_empty());

    // Validation verdict at or above 0.9.
    let Some(PhaseData::Validation(validation)) = engine.get_phase_data(5).unwrap() else {
        panic!("validation output missing");
    };
    assert!(validation.report.score >= 0.9);
    assert!(validation.report.passed);
    assert_eq!(engine.get_state().status, PipelineStatus::Completed);
}

#[tokio::test]
async fn scenario_explicit_bundle() {
    let tmp = TempDir::new().unwrap();
    let source = tmp.path().join("collection");
    let bundle = source.join("Ultimate Hardstyle Bundle");
    flat_pack(&bundle, "Alpha - Kick Pack", 32);
    flat_pack(&bundle, "Beta - Lead Pack", 31);
    flat_pack(&bundle, "Gamma - Vocal Pack", 30);

    let mut engine = OrganizerEngine::new(&source, quiet_config()).unwrap();
    engine.initialize().unwrap();

    engine.execute_phase(0).await.unwrap();
    engine.execute_phase(1).await.unwrap();

    let Some(PhaseData::Discovery(discovery)) = engine.get_phase_data(1).unwrap() else {
        panic!("discovery output missing");
    };
    // The bundle's children are emitted as independent packs; the container
    // itself is not one of them.
    let packs = discovery.enriched_packs().unwrap();
    assert_eq!(packs.len(), 3);
    assert!(packs.iter().all(|p| p.pack.path != bundle));
}

#[tokio::test]
async fn scenario_wrapper_unwrapped_in_preparation() {
    let tmp = TempDir::new().unwrap();
    let source = tmp.path().join("collection");
    let outer = source.join("Dabro Music - DnB Vol 1");
    flat_pack(&outer, "Dabro Music - DnB Vol 1", 40);

    let mut engine = OrganizerEngine::new(&source, quiet_config()).unwrap();
    engine.initialize().unwrap();

    let outcome = engine.execute_phase(0).await.unwrap();
    assert_eq!(outcome.status, PhaseStatus::AwaitingUser);
    let pending = outcome.pending.unwrap();
    assert_eq!(pending.resume_from_step, 2);

    let done = engine
        .continue_phase(0, 2, json!({ "approve": true }))
        .await
        .unwrap();
    assert_eq!(done.status, PhaseStatus::Completed);

    // The shell is gone; the inner pack now sits at the top level.
    assert!(outer.join("sample000.wav").is_file());
    assert!(!outer.join("Dabro Music - DnB Vol 1").exists());

    let Some(PhaseData::Preparation(prep)) = engine.get_phase_data(0).unwrap() else {
        panic!("preparation output missing");
    };
    assert_eq!(prep.unwrapped, 1);
    assert!(prep.backup_path.is_some());
}

#[tokio::test]
async fn scenario_duplicates_manual_review() {
    let tmp = TempDir::new().unwrap();
    let source = tmp.path().join("collection");
    for i in 0..10 {
        write_file(&source.join(format!("p{i}")).join("Kick01.wav"), &[7u8; 64]);
    }

    let mut config = OrganizerConfig::default();
    config.duplicates.strategy = DuplicateStrategy::ManualReview;

    let mut engine = OrganizerEngine::new(&source, config).unwrap();
    engine.initialize().unwrap();
    engine.execute_phase(0).await.unwrap();

    let outcome = engine.execute_phase(1).await.unwrap();
    assert_eq!(outcome.status, PhaseStatus::AwaitingUser);
    let pending = outcome.pending.unwrap();
    assert!(pending.message.contains("duplicate"));

    // One group of ten with wasted space of nine copies.
    let duplicates = pending.payload.get("duplicates").unwrap();
    let groups = duplicates.get("groups").unwrap().as_array().unwrap();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].get("count").unwrap().as_u64(), Some(10));
    assert_eq!(groups[0].get("wastedSize").unwrap().as_u64(), Some(9 * 64));

    let done = engine
        .continue_phase(1, 2, json!({ "strategy": "keep-all" }))
        .await
        .unwrap();
    assert_eq!(done.status, PhaseStatus::Completed);
}

#[tokio::test]
async fn scenario_resume_carries_step_one_payload() {
    let tmp = TempDir::new().unwrap();
    let source = tmp.path().join("collection");
    flat_pack(&source, "Vendor - Dirty Kicks Vol 2 (WAV)", 35);

    let mut engine = OrganizerEngine::new(&source, quiet_config()).unwrap();
    engine.initialize().unwrap();

    let outcome = engine.execute_phase(0).await.unwrap();
    assert_eq!(outcome.status, PhaseStatus::AwaitingUser);
    let pending = outcome.pending.unwrap();

    // The step-1 payload is exposed to the shell and travels into step 2.
    let candidates = pending.payload.get("candidates").unwrap().as_array().unwrap();
    assert!(!candidates.is_empty());

    let done = engine
        .continue_phase(0, 2, json!({ "approve": true }))
        .await
        .unwrap();
    assert_eq!(done.status, PhaseStatus::Completed);
    assert!(source.join("Vendor - Dirty Kicks Vol 2").is_dir());
    assert!(!source.join("Vendor - Dirty Kicks Vol 2 (WAV)").exists());

    // Law: continuing a completed phase is rejected.
    assert!(engine
        .continue_phase(0, 2, json!({ "approve": true }))
        .await
        .is_err());
}

#[tokio::test]
async fn scenario_rollback_restores_top_level() {
    let tmp = TempDir::new().unwrap();
    let source = tmp.path().join("collection");
    flat_pack(&source, "Vendor - Kicks Vol 2", 40);
    flat_pack(&source, "Vendor - Leads Vol 1", 35);

    let mut engine = OrganizerEngine::new(&source, quiet_config()).unwrap();
    engine.initialize().unwrap();

    let recorded = SnapshotStore::new(&source)
        .load_original()
        .unwrap()
        .top_level_names();

    run_pipeline(&mut engine).await;

    // The pipeline filed packs under hierarchy folders.
    let after_run: Vec<String> = top_level_names(&source);
    assert_ne!(after_run, sorted(recorded.clone()));

    rollback_from_snapshot(&source).unwrap();

    // Property: the top-level listing equals the snapshot's again.
    assert_eq!(top_level_names(&source), sorted(recorded));
}

#[tokio::test]
async fn events_are_ordered_per_phase() {
    let tmp = TempDir::new().unwrap();
    let source = tmp.path().join("collection");
    flat_pack(&source, "Vendor - Kicks Vol 2", 40);

    let mut engine = OrganizerEngine::new(&source, quiet_config()).unwrap();
    engine.initialize().unwrap();
    run_pipeline(&mut engine).await;

    use packflow_rs::PipelineEvent;
    let history = engine.event_history();
    for phase in Phase::ALL {
        let indices: Vec<(usize, u8)> = history
            .iter()
            .enumerate()
            .filter_map(|(i, e)| match e {
                PipelineEvent::PhaseStart { phase: p } if *p == phase => Some((i, 0)),
                PipelineEvent::PhaseProgress { phase: p, .. } if *p == phase => Some((i, 1)),
                PipelineEvent::PhaseUserActionRequired { phase: p, .. } if *p == phase => {
                    Some((i, 2))
                }
                PipelineEvent::PhaseComplete { phase: p } if *p == phase => Some((i, 3)),
                _ => None,
            })
            .collect();
        assert!(!indices.is_empty(), "no events for {phase}");
        // start is first, complete is last.
        assert_eq!(indices.first().unwrap().1, 0);
        assert_eq!(indices.last().unwrap().1, 3);
    }
}

#[tokio::test]
async fn executing_completed_phase_is_noop() {
    let tmp = TempDir::new().unwrap();
    let source = tmp.path().join("collection");
    flat_pack(&source, "Vendor - Kicks Vol 2", 40);

    let mut engine = OrganizerEngine::new(&source, quiet_config()).unwrap();
    engine.initialize().unwrap();

    let first = engine.execute_phase(0).await.unwrap();
    assert_eq!(first.status, PhaseStatus::Completed);
    let second = engine.execute_phase(0).await.unwrap();
    assert_eq!(second.output, first.output);
}

fn top_level_names(source: &Path) -> Vec<String> {
    sorted(
        fs::read_dir(source)
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().to_string())
            .filter(|n| n != METADATA_DIR)
            .collect(),
    )
}

fn sorted(mut names: Vec<String>) -> Vec<String> {
    names.sort();
    names
}
