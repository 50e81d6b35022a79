//! Snapshot model: lightweight directory trees with aggregated counts.

pub use builder::{ScanStats, SnapshotBuilder};
pub use node::{NodeKind, Snapshot, SnapshotNode};
pub use store::{
    SnapshotStore, METADATA_DIR, ORIGINAL_SNAPSHOT_FILE, PROPOSED_STRUCTURE_FILE,
    REORGANIZED_SNAPSHOT_FILE,
};

mod builder;
mod node;
mod store;
