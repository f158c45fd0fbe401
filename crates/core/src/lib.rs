//! Shared types for the Cumulus snapshot engine core.
//!
//! This crate defines the foundational pieces used throughout the
//! workspace:
//! - [`error`]: the cross-cutting error kinds of the error handling design.
//! - [`refstr`]: the object reference grammar (`zero[N]`, `SEG/OBJ(...)[...]`).
//! - [`checksum`]: checksum computation/verification over the supported
//!   algorithms (sha1, sha224, sha256).
//! - [`refencode`]: the URI-style string escaping used in metadata logs.

#![warn(missing_docs)]

pub mod checksum;
pub mod error;
pub mod refencode;
pub mod refstr;

pub use checksum::{ChecksumCreator, ChecksumVerifier};
pub use error::{CoreError, Result};
pub use refstr::{parse as parse_reference, Algorithm, Checksum, Reference, Slice};

/// The largest snapshot format version this workspace understands:
/// `"Cumulus Snapshot v0.11"` / `"LBS Snapshot v0.11"`.
pub const FORMAT_VERSION: (u32, u32) = (0, 11);

/// Maximum depth of nested indirect references permitted when following
/// the metadata log or a file's block-reference list.
pub const MAX_RECURSION_DEPTH: usize = 3;

/// Number of distinct segment directories kept in the extraction cache
/// before the least-recently-used one is evicted.
pub const CACHE_SIZE: usize = 16;

/// Minimum age, in days, below which expired objects are folded into
/// bucket 0 rather than given their own age bucket.
pub const MIN_AGE_DAYS: f64 = 4.0;
