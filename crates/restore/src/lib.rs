//! Restoring snapshots back to the local filesystem, verifying their
//! integrity, and scanning the backend for orphaned files
//! (specification §4.9, §13.3, §13.4).

#![warn(missing_docs)]

pub mod gc;
pub mod restore;
pub mod verify;

pub use gc::{scan_for_orphans, OrphanFile, OrphanScanReport};
pub use restore::{restore_snapshot, RestoreSelection};
pub use verify::{verify_snapshot, FileProblem, VerifyReport};
