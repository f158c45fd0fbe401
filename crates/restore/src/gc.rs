//! Scanning the backend for files not referenced by any current
//! snapshot (specification §13.4, supplemented from `cmd_garbage_collect`).
//!
//! This never deletes anything itself: the core's lifecycle rule is
//! that nothing here removes segment *data* from the backend. Callers
//! that want to act on the report decide for themselves.

use cumulus_core::Result;
use cumulus_snapshot::{list_snapshots, load_snapshot};
use cumulus_store::{CumulusStore, FileType};
use std::collections::BTreeSet;

/// A backend file found not to be referenced by any current snapshot.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct OrphanFile {
    /// Full path under the backend root.
    pub path: String,
}

/// Every backend file reachable from a current snapshot, and every file
/// found across all file categories that isn't.
#[derive(Debug, Clone, Default)]
pub struct OrphanScanReport {
    /// Paths kept because some snapshot's descriptor references their logical name.
    pub referenced: BTreeSet<String>,
    /// Paths with no current snapshot referencing them.
    pub orphans: Vec<OrphanFile>,
}

/// Scan the backend for segments, meta logs, and checksum files not
/// named by any current snapshot descriptor's `Segments:` field (or,
/// for snapshot descriptors themselves, not present at all — every
/// snapshot descriptor that exists is referenced by definition).
pub fn scan_for_orphans(store: &CumulusStore) -> Result<OrphanScanReport> {
    let mut referenced = BTreeSet::new();

    for snapshot_name in list_snapshots(store)? {
        let descriptor = load_snapshot(store, &snapshot_name)?;
        referenced.insert(snapshot_name);
        if let Some(segments) = descriptor.fields.get("Segments") {
            referenced.extend(segments.split_whitespace().map(String::from));
        }
    }

    let mut orphans = Vec::new();
    for file_type in [
        FileType::Snapshots,
        FileType::Segments,
        FileType::Meta,
        FileType::Checksums,
    ] {
        for (path, name) in store.backend().list_generic_paths(file_type)? {
            if !referenced.contains(&name) {
                orphans.push(OrphanFile { path });
            }
        }
    }
    orphans.sort();

    Ok(OrphanScanReport { referenced, orphans })
}
