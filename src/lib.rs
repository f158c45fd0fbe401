//! # Cumulus
//!
//! A content-addressed, incremental filesystem backup system's core
//! snapshot engine — segments, objects, the metadata log, and the
//! operations built on top of them (snapshot loading, restore,
//! verification, orphan scanning, and local-database-driven cleaning).
//!
//! Cumulus never mutates a segment once written. A backup run appends
//! new segments and a new snapshot descriptor; restoring, verifying, and
//! scanning only ever read. Reclaiming space from superseded data is a
//! separate "cleaning" step that rewrites still-live objects into fresh
//! segments and marks the old ones expired — see [`cumulus_localdb`].
//!
//! # Quick Start
//!
//! ```no_run
//! use cumulus::{Engine, RestoreSelection};
//!
//! fn main() -> cumulus::Result<()> {
//!     let engine = Engine::open_local("/var/backups/cumulus")?;
//!
//!     for name in engine.list_snapshots()? {
//!         println!("snapshot: {name}");
//!     }
//!
//!     let snapshot = engine.load_snapshot("2026-07-28")?;
//!     engine.restore(&snapshot, "/tmp/restore-here".as_ref(), &RestoreSelection::everything())?;
//!
//!     let report = engine.verify(&snapshot)?;
//!     assert!(report.problems.is_empty());
//!
//!     Ok(())
//! }
//! ```
//!
//! # Components
//!
//! | Crate | Purpose |
//! |-------|---------|
//! | [`cumulus_core`] | Reference grammar, checksums, the shared error type |
//! | [`cumulus_backend`] | The storage transport contract (`file://` today) |
//! | [`cumulus_searchpath`] | Locating files across an ordered, reorderable set of directories |
//! | [`cumulus_filter`] | Running segment (de)compression/encryption filters as subprocesses |
//! | [`cumulus_store`] | Segment extraction, the LRU cache, and reference resolution |
//! | [`cumulus_metadata`] | Parsing and traversing the metadata log |
//! | [`cumulus_snapshot`] | Loading and version-gating snapshot descriptors |
//! | [`cumulus_restore`] | Restore, verification, and read-only orphan scanning |
//! | [`cumulus_localdb`] | The local database of snapshot contents, and segment cleaning |
//!
//! [`Engine`] is a thin façade over these; using a crate directly is
//! equally supported for callers that only need one piece (a read-only
//! verifier, say, with no local database at all).

#![warn(missing_docs)]

pub use cumulus_backend::{Backend, LocalBackend, Stat};
pub use cumulus_core::{
    ChecksumCreator, ChecksumVerifier, CoreError, Reference, Result, FORMAT_VERSION,
};
pub use cumulus_localdb::{CleanerConfig, CleaningReport, GcReport, LocalDatabase};
pub use cumulus_restore::{
    restore_snapshot, scan_for_orphans, verify_snapshot, OrphanFile, OrphanScanReport,
    RestoreSelection, VerifyReport,
};
pub use cumulus_snapshot::{list_snapshots, load_snapshot, SnapshotDescriptor};
pub use cumulus_store::CumulusStore;

use std::collections::HashSet;
use std::path::Path;

/// A convenience entry point bundling a [`CumulusStore`] over a
/// [`LocalBackend`] with the operations the rest of this workspace
/// exposes as free functions.
///
/// `Engine` itself holds no local database connection — cleaning and
/// the snapshot-contents bookkeeping in [`cumulus_localdb`] are a
/// separate concern a caller opens alongside it with
/// [`LocalDatabase::open`], since not every Cumulus user (a bare
/// verifier or restorer, for instance) needs one.
pub struct Engine {
    store: CumulusStore,
}

impl Engine {
    /// Open an engine backed by a `file://`-scheme backend rooted at
    /// `root`.
    pub fn open_local(root: impl Into<std::path::PathBuf>) -> Result<Self> {
        let root = root.into();
        let backend = LocalBackend::new(&root);
        let store = CumulusStore::new(Box::new(backend))
            .map_err(|e| CoreError::from_io(root.display().to_string(), e))?;
        Ok(Engine { store })
    }

    /// Wrap an already-constructed store, for callers using a backend
    /// other than [`LocalBackend`].
    pub fn with_store(store: CumulusStore) -> Self {
        Engine { store }
    }

    /// Direct access to the underlying store, for operations this
    /// façade doesn't wrap.
    pub fn store(&self) -> &CumulusStore {
        &self.store
    }

    /// Every snapshot name present in the backend.
    pub fn list_snapshots(&self) -> Result<HashSet<String>> {
        list_snapshots(&self.store)
    }

    /// Load and version-gate the snapshot descriptor named `name`.
    pub fn load_snapshot(&self, name: &str) -> Result<SnapshotDescriptor> {
        load_snapshot(&self.store, name)
    }

    /// Restore `descriptor`'s snapshot into `destdir`, limited to `selection`.
    pub fn restore(
        &self,
        descriptor: &SnapshotDescriptor,
        destdir: &Path,
        selection: &RestoreSelection,
    ) -> Result<()> {
        restore_snapshot(&self.store, descriptor, destdir, selection)
    }

    /// Verify every regular file in `descriptor`'s snapshot against its
    /// recorded checksum and size, without restoring anything to disk.
    pub fn verify(&self, descriptor: &SnapshotDescriptor) -> Result<VerifyReport> {
        verify_snapshot(&self.store, descriptor)
    }

    /// Scan the backend for files not referenced by any current
    /// snapshot. Read-only: callers decide what, if anything, to delete.
    pub fn scan_for_orphans(&self) -> Result<OrphanScanReport> {
        scan_for_orphans(&self.store)
    }
}

/// Install a `tracing_subscriber::fmt` subscriber reading its filter
/// from the `RUST_LOG` environment variable, defaulting to `info`.
///
/// Library crates in this workspace only emit `tracing` events; it is
/// this façade's job, not theirs, to decide how those events are
/// rendered. Binaries embedding Cumulus are free to install their own
/// subscriber instead and skip this entirely.
pub fn init_logging() {
    use tracing_subscriber::EnvFilter;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_local_creates_an_engine_over_an_empty_backend() {
        let dir = tempfile::tempdir().unwrap();
        let engine = Engine::open_local(dir.path()).unwrap();
        assert!(engine.list_snapshots().unwrap().is_empty());
    }
}
