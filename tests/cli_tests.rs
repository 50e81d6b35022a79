//! Binary end-to-end tests.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn write_file(path: &Path, bytes: &[u8]) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, bytes).unwrap();
}

#[test]
fn print_default_config_emits_yaml() {
    Command::cargo_bin("packflow")
        .unwrap()
        .arg("print-default-config")
        .assert()
        .success()
        .stdout(predicate::str::contains("snapshot:"))
        .stdout(predicate::str::contains("detector:"));
}

#[test]
fn init_config_refuses_to_overwrite() {
    let tmp = TempDir::new().unwrap();
    let out = tmp.path().join(".packflow.yml");
    fs::write(&out, "snapshot: {}").unwrap();

    Command::cargo_bin("packflow")
        .unwrap()
        .args(["init-config", "--output"])
        .arg(&out)
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));

    Command::cargo_bin("packflow")
        .unwrap()
        .args(["init-config", "--force", "--output"])
        .arg(&out)
        .assert()
        .success();
}

#[test]
fn validate_config_rejects_bad_values() {
    let tmp = TempDir::new().unwrap();
    let config = tmp.path().join("bad.yml");
    fs::write(&config, "detector:\n  min_audio_ratio: 5.0\n").unwrap();

    Command::cargo_bin("packflow")
        .unwrap()
        .args(["validate-config", "--config"])
        .arg(&config)
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid configuration"));
}

#[test]
fn scan_reports_detected_packs() {
    let tmp = TempDir::new().unwrap();
    let source = tmp.path().join("collection");
    let pack = source.join("Vendor - Kicks Vol 2");
    for i in 0..35 {
        write_file(&pack.join(format!("kick{i:02}.wav")), &[0u8; 128]);
    }

    Command::cargo_bin("packflow")
        .unwrap()
        .arg("scan")
        .arg(&source)
        .assert()
        .success()
        .stdout(predicate::str::contains("Vendor - Kicks Vol 2"));
}

#[test]
fn scan_json_format_is_machine_readable() {
    let tmp = TempDir::new().unwrap();
    let source = tmp.path().join("collection");
    write_file(&source.join("loose.wav"), &[0u8; 16]);

    let output = Command::cargo_bin("packflow")
        .unwrap()
        .args(["scan", "--format", "json"])
        .arg(&source)
        .output()
        .unwrap();
    assert!(output.status.success());
    let parsed: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert!(parsed.get("detection").is_some());
    assert!(parsed.get("duplicates").is_some());
}

#[test]
fn rollback_requires_snapshot() {
    let tmp = TempDir::new().unwrap();

    Command::cargo_bin("organizer-rollback")
        .unwrap()
        .arg(tmp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("error"));
}

#[test]
fn rollback_restores_moved_entries() {
    let tmp = TempDir::new().unwrap();
    let source = tmp.path().join("collection");
    let pack = source.join("Vendor - Kicks Vol 2");
    for i in 0..35 {
        write_file(&pack.join(format!("kick{i:02}.wav")), &[0u8; 128]);
    }

    // Take the snapshot, then displace the pack as a reorganization would.
    Command::cargo_bin("packflow")
        .unwrap()
        .arg("scan")
        .arg(&source)
        .assert()
        .success();
    // `scan` is read-only; write the snapshot with the library instead.
    let builder = packflow_rs::core::snapshot::SnapshotBuilder::new(
        packflow_rs::core::config::SnapshotConfig::default(),
    )
    .unwrap();
    let (snapshot, _) = builder.build(&source).unwrap();
    packflow_rs::core::snapshot::SnapshotStore::new(&source)
        .save_original(&snapshot)
        .unwrap();

    fs::create_dir_all(source.join("Hardstyle")).unwrap();
    fs::rename(&pack, source.join("Hardstyle").join("Vendor - Kicks Vol 2")).unwrap();

    Command::cargo_bin("organizer-rollback")
        .unwrap()
        .arg(&source)
        .assert()
        .success()
        .stdout(predicate::str::contains("restored 1"));

    assert!(pack.join("kick00.wav").is_file());
    assert!(!source.join("Hardstyle").exists());
}
