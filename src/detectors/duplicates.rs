//! Duplicate indexing.
//!
//! Builds a mapping from signature to file paths and emits groups with
//! `count >= 2`. The default signature is the (lowercased filename, size)
//! surrogate computed entirely from the snapshot; SHA-256 content hashing is
//! an opt-in mode that reads from disk, fanning the hashing out over a rayon
//! pool and folding results back before returning.

use ahash::AHashMap;
use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::Read;
use std::path::PathBuf;
use tracing::{debug, warn};

use crate::core::config::{DuplicateConfig, DuplicateStrategy, SignatureMode};
use crate::core::snapshot::Snapshot;

/// A group of files sharing one signature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateGroup {
    /// Content fingerprint or (name, size) surrogate
    pub signature: String,
    /// Paths sharing the signature, sorted
    pub paths: Vec<PathBuf>,
    /// Size of each member in bytes
    pub size_per_file: u64,
    /// Number of members
    pub count: usize,
    /// Bytes held by all members
    pub total_size: u64,
    /// Bytes recoverable by keeping one member
    pub wasted_size: u64,
}

/// Full duplicate report for one snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateReport {
    /// Groups with two or more members, largest waste first
    pub groups: Vec<DuplicateGroup>,
    /// Files examined
    pub files_scanned: usize,
    /// Total wasted space: sum of (count - 1) * size per group
    pub total_wasted: u64,
    /// Files skipped because their content could not be hashed
    pub hash_errors: usize,
}

impl DuplicateReport {
    /// Whether any duplicates were found.
    pub fn has_duplicates(&self) -> bool {
        !self.groups.is_empty()
    }
}

/// Resolution for one duplicate group under a strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateResolution {
    /// Signature of the resolved group
    pub signature: String,
    /// Member kept
    pub keep: PathBuf,
    /// Members to remove
    pub remove: Vec<PathBuf>,
}

/// Indexes duplicates over a snapshot.
pub struct DuplicateIndexer {
    config: DuplicateConfig,
}

impl DuplicateIndexer {
    /// Create an indexer with the given configuration.
    pub fn new(config: DuplicateConfig) -> Self {
        Self { config }
    }

    /// Build the duplicate report for a snapshot.
    pub fn index(&self, snapshot: &Snapshot) -> DuplicateReport {
        let files: Vec<_> = snapshot
            .root
            .files()
            .into_iter()
            .filter(|f| f.extension.is_some())
            .collect();

        let mut report = DuplicateReport {
            files_scanned: files.len(),
            ..DuplicateReport::default()
        };

        let signatures: Vec<(String, PathBuf, u64, Option<DateTime<Utc>>)> =
            match self.config.signature {
                SignatureMode::NameSize => files
                    .iter()
                    .map(|f| {
                        (
                            format!("{}:{}", f.name.to_lowercase(), f.size),
                            f.path.clone(),
                            f.size,
                            f.modified_at,
                        )
                    })
                    .collect(),
                SignatureMode::ContentHash => {
                    let hashed: Vec<_> = files
                        .par_iter()
                        .map(|f| (hash_file(&f.path), f))
                        .collect();
                    let mut out = Vec::with_capacity(hashed.len());
                    for (digest, f) in hashed {
                        match digest {
                            Ok(digest) => {
                                out.push((digest, f.path.clone(), f.size, f.modified_at));
                            }
                            Err(e) => {
                                warn!("hashing {} failed: {e}", f.path.display());
                                report.hash_errors += 1;
                            }
                        }
                    }
                    out
                }
            };

        let mut by_signature: AHashMap<String, Vec<(PathBuf, u64, Option<DateTime<Utc>>)>> =
            AHashMap::new();
        for (signature, path, size, mtime) in signatures {
            by_signature
                .entry(signature)
                .or_default()
                .push((path, size, mtime));
        }

        let mut groups: Vec<DuplicateGroup> = by_signature
            .into_iter()
            .filter(|(_, members)| members.len() >= 2)
            .map(|(signature, mut members)| {
                members.sort_by(|a, b| a.0.cmp(&b.0));
                let size_per_file = members[0].1;
                let count = members.len();
                DuplicateGroup {
                    signature,
                    paths: members.into_iter().map(|(p, _, _)| p).collect(),
                    size_per_file,
                    count,
                    total_size: size_per_file * count as u64,
                    wasted_size: size_per_file * (count as u64 - 1),
                }
            })
            .collect();

        groups.sort_by(|a, b| {
            b.wasted_size
                .cmp(&a.wasted_size)
                .then_with(|| a.signature.cmp(&b.signature))
        });

        report.total_wasted = groups.iter().map(|g| g.wasted_size).sum();
        report.groups = groups;

        debug!(
            groups = report.groups.len(),
            wasted = report.total_wasted,
            "duplicate index finished"
        );
        report
    }

    /// Resolve groups under a strategy.
    ///
    /// `AutoRemove` keeps the newest member (earliest path on ties);
    /// `KeepAll` and `ManualReview` produce no removals.
    pub fn resolve(
        &self,
        report: &DuplicateReport,
        strategy: DuplicateStrategy,
        snapshot: &Snapshot,
    ) -> Vec<DuplicateResolution> {
        if strategy != DuplicateStrategy::AutoRemove {
            return Vec::new();
        }

        report
            .groups
            .iter()
            .map(|group| {
                let mut members: Vec<(&PathBuf, Option<DateTime<Utc>>)> = group
                    .paths
                    .iter()
                    .map(|p| (p, snapshot.find(p).and_then(|n| n.modified_at)))
                    .collect();
                // Newest first; path order breaks ties deterministically.
                members.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
                let keep = members[0].0.clone();
                DuplicateResolution {
                    signature: group.signature.clone(),
                    keep,
                    remove: members[1..].iter().map(|(p, _)| (*p).clone()).collect(),
                }
            })
            .collect()
    }
}

fn hash_file(path: &PathBuf) -> std::io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 64 * 1024];
    loop {
        let read = file.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}
