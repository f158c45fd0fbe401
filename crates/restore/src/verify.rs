//! Verifying that a snapshot's files are intact and that its segment
//! list accurately reflects what restoring it actually reads
//! (specification §13.3, supplemented from `cmd_verify_snapshots`).

use cumulus_core::{ChecksumVerifier, CoreError, Result};
use cumulus_metadata::iterate_metadata;
use cumulus_snapshot::SnapshotDescriptor;
use cumulus_store::CumulusStore;
use std::collections::BTreeSet;

/// One file-level problem found while verifying a snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileProblem {
    /// The reconstructed file size didn't match the metadata's `size` field.
    SizeMismatch {
        /// Path within the snapshot.
        path: String,
        /// Size recorded in the metadata log.
        expected: u64,
        /// Size actually read back from the segments.
        actual: u64,
    },
    /// The reconstructed file's checksum didn't match the metadata's `checksum` field.
    ChecksumMismatch {
        /// Path within the snapshot.
        path: String,
    },
}

/// The outcome of verifying one snapshot.
#[derive(Debug, Clone, Default)]
pub struct VerifyReport {
    /// Files whose restored content didn't match their recorded size or checksum.
    pub file_problems: Vec<FileProblem>,
    /// Segments actually read while verifying that the descriptor's
    /// `Segments:` field never listed.
    pub unlisted_segments: BTreeSet<String>,
    /// Segments the descriptor's `Segments:` field listed but verification
    /// never needed to read (stale entries, not necessarily a corruption).
    pub unused_listed_segments: BTreeSet<String>,
}

impl VerifyReport {
    /// Whether every file checked out and the segment list was exact.
    pub fn is_clean(&self) -> bool {
        self.file_problems.is_empty() && self.unlisted_segments.is_empty()
    }
}

/// Walk every regular file named by `descriptor`'s metadata log,
/// re-reading its data blocks and checking size and checksum, then
/// cross-check the segments actually touched against the descriptor's
/// `Segments:` field.
pub fn verify_snapshot(store: &CumulusStore, descriptor: &SnapshotDescriptor) -> Result<VerifyReport> {
    let mut report = VerifyReport::default();

    for item in iterate_metadata(store, &descriptor.root)? {
        let item = item?;
        let is_regular_file = matches!(item.items.file_type.as_deref(), Some("-") | Some("f"));
        if !is_regular_file {
            continue;
        }

        let path = item.items.name.clone().unwrap_or_default();
        let checksum = item.items.checksum.as_deref().ok_or_else(|| {
            CoreError::Corrupt(format!("{}: missing checksum field", path))
        })?;
        let expected_size = item
            .items
            .size
            .ok_or_else(|| CoreError::Corrupt(format!("{}: missing size field", path)))?;

        let mut verifier = ChecksumVerifier::new(checksum)?;
        let mut actual_size = 0u64;
        for block in item.data(store)? {
            let data = store.get_ref(&block?)?;
            verifier.update(&data);
            actual_size += data.len() as u64;
        }

        if actual_size != expected_size {
            report.file_problems.push(FileProblem::SizeMismatch {
                path: path.clone(),
                expected: expected_size,
                actual: actual_size,
            });
            continue;
        }
        if !verifier.valid() {
            report.file_problems.push(FileProblem::ChecksumMismatch { path });
        }
    }

    let listed_segments: BTreeSet<String> = descriptor
        .fields
        .get("Segments")
        .unwrap_or("")
        .split_whitespace()
        .map(String::from)
        .collect();
    let accessed: BTreeSet<String> = store.accessed_segments().into_iter().collect();

    report.unlisted_segments = accessed.difference(&listed_segments).cloned().collect();
    report.unused_listed_segments = listed_segments.difference(&accessed).cloned().collect();

    Ok(report)
}
