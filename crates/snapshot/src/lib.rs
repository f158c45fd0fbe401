//! Loading and version-gating a snapshot's root descriptor
//! (specification §4.8).
//!
//! A snapshot descriptor is a single RFC822 stanza naming the format
//! version and the root of the metadata log (`Root: <reference>`). It
//! is itself stored under the `snapshots` file category, so opening one
//! goes through the same search path as everything else.

#![warn(missing_docs)]

use cumulus_core::{CoreError, Result};
use cumulus_metadata::{check_version, parse_metadata_version, parse_full, Stanza};
use cumulus_store::CumulusStore;
use std::collections::HashSet;
use std::io::Read;

/// A parsed, version-checked snapshot root descriptor.
#[derive(Debug, Clone)]
pub struct SnapshotDescriptor {
    /// The raw `Format:` field (e.g. `"Cumulus Snapshot v0.11"`).
    pub format: String,
    /// The format version, parsed from `format`.
    pub version: Vec<u32>,
    /// The object reference at the root of the metadata log.
    pub root: String,
    /// All other fields present in the descriptor stanza, for callers
    /// that want producer/backup-time/scheme-style metadata.
    pub fields: Stanza,
}

/// Load and parse the snapshot descriptor named `name`, checking that
/// its format version is not newer than this crate understands.
pub fn load_snapshot(store: &CumulusStore, name: &str) -> Result<SnapshotDescriptor> {
    let mut stream = store.backend().open_snapshot(name)?;
    let mut text = String::new();
    stream
        .read_to_string(&mut text)
        .map_err(|e| CoreError::from_io(format!("snapshot {}", name), e))?;

    let fields = parse_full(text.lines());

    let format = fields
        .get("Format")
        .ok_or_else(|| CoreError::Corrupt(format!("snapshot {}: missing Format field", name)))?
        .to_string();
    let root = fields
        .get("Root")
        .ok_or_else(|| CoreError::Corrupt(format!("snapshot {}: missing Root field", name)))?
        .to_string();
    fields
        .get("Segments")
        .ok_or_else(|| CoreError::Corrupt(format!("snapshot {}: missing Segments field", name)))?;

    let version = parse_metadata_version(&format);
    check_version(&version)?;

    Ok(SnapshotDescriptor {
        format,
        version,
        root,
        fields,
    })
}

/// The set of snapshot names known to the backend.
pub fn list_snapshots(store: &CumulusStore) -> Result<HashSet<String>> {
    store.backend().list_generic(cumulus_store::FileType::Snapshots)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cumulus_backend::LocalBackend;
    use std::io::Cursor;
    use tempfile::tempdir;

    fn put_snapshot(dir: &std::path::Path, name: &str, body: &str) {
        let backend = LocalBackend::new(dir);
        backend
            .put(
                &format!("snapshots/snapshot-{}.cumulus", name),
                &mut Cursor::new(body.as_bytes().to_vec()),
            )
            .unwrap();
    }

    #[test]
    fn loads_a_well_formed_descriptor() {
        let dir = tempdir().unwrap();
        put_snapshot(
            dir.path(),
            "daily",
            "Format: Cumulus Snapshot v0.11\nProducer: cumulus\nRoot: zero[0]\nSegments: \n",
        );
        let store = CumulusStore::new(Box::new(LocalBackend::new(dir.path()))).unwrap();

        let descriptor = load_snapshot(&store, "daily").unwrap();
        assert_eq!(descriptor.version, vec![0, 11]);
        assert_eq!(descriptor.root, "zero[0]");
        assert_eq!(descriptor.fields.get("Producer"), Some("cumulus"));
    }

    #[test]
    fn rejects_missing_root_field() {
        let dir = tempdir().unwrap();
        put_snapshot(dir.path(), "bad", "Format: Cumulus Snapshot v0.11\nSegments: \n");
        let store = CumulusStore::new(Box::new(LocalBackend::new(dir.path()))).unwrap();

        let err = load_snapshot(&store, "bad").unwrap_err();
        assert!(matches!(err, CoreError::Corrupt(_)));
    }

    #[test]
    fn rejects_missing_segments_field() {
        let dir = tempdir().unwrap();
        put_snapshot(
            dir.path(),
            "bad",
            "Format: Cumulus Snapshot v0.11\nRoot: zero[0]\n",
        );
        let store = CumulusStore::new(Box::new(LocalBackend::new(dir.path()))).unwrap();

        let err = load_snapshot(&store, "bad").unwrap_err();
        assert!(matches!(err, CoreError::Corrupt(_)));
    }

    #[test]
    fn rejects_unsupported_future_version() {
        let dir = tempdir().unwrap();
        put_snapshot(
            dir.path(),
            "future",
            "Format: Cumulus Snapshot v99.0\nRoot: zero[0]\nSegments: \n",
        );
        let store = CumulusStore::new(Box::new(LocalBackend::new(dir.path()))).unwrap();

        let err = load_snapshot(&store, "future").unwrap_err();
        assert!(matches!(err, CoreError::UnsupportedVersion { .. }));
    }

    #[test]
    fn list_snapshots_finds_all_descriptors() {
        let dir = tempdir().unwrap();
        put_snapshot(
            dir.path(),
            "a",
            "Format: Cumulus Snapshot v0.11\nRoot: zero[0]\nSegments: \n",
        );
        put_snapshot(
            dir.path(),
            "b",
            "Format: Cumulus Snapshot v0.11\nRoot: zero[0]\nSegments: \n",
        );
        let store = CumulusStore::new(Box::new(LocalBackend::new(dir.path()))).unwrap();

        let names = list_snapshots(&store).unwrap();
        assert_eq!(names, HashSet::from(["a".to_string(), "b".to_string()]));
    }
}
