//! Shared error kinds for the Cumulus snapshot engine.
//!
//! Every crate in this workspace that can fail wraps this error with its
//! own `#[from]` conversion rather than redefining these kinds, so that a
//! `NotFound` raised deep in a backend implementation and a `NotFound`
//! raised by the object store compare equal in shape to callers.

use std::fmt;
use std::io;
use thiserror::Error;

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

/// The error kinds named in the specification's error handling design.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Backend could not locate the requested path.
    #[error("not found: {0}")]
    NotFound(String),

    /// An object reference failed to parse.
    #[error("bad reference: {0}")]
    BadReference(String),

    /// An embedded checksum did not match the fetched bytes.
    #[error("checksum mismatch for {object}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        /// Object the checksum was computed over.
        object: String,
        /// Checksum embedded in the reference.
        expected: String,
        /// Checksum actually computed.
        actual: String,
    },

    /// A slice extended past the end of the source object.
    #[error("short object: requested {requested} bytes from an object of {available} bytes")]
    ShortObject {
        /// Bytes requested by the slice.
        requested: u64,
        /// Bytes actually available.
        available: u64,
    },

    /// An exact-size slice (`[=N]`) disagreed with the object's real length.
    #[error("exact-size violation: reference asserted {asserted} bytes, object is {actual} bytes")]
    ExactSizeViolation {
        /// Size asserted by the `[=N]` slice.
        asserted: u64,
        /// Size actually observed.
        actual: u64,
    },

    /// An indirect-reference chain exceeded `MAX_RECURSION_DEPTH`.
    #[error("recursion too deep: exceeded depth {limit}")]
    RecursionTooDeep {
        /// The configured recursion limit that was exceeded.
        limit: usize,
    },

    /// The snapshot's format version is newer than this reader supports.
    #[error("unsupported snapshot format version: {found:?}, supported up to {max:?}")]
    UnsupportedVersion {
        /// Version parsed from the snapshot.
        found: Vec<u32>,
        /// Highest version this reader understands.
        max: (u32, u32),
    },

    /// The checksum string named an algorithm this reader doesn't know.
    #[error("unsupported checksum algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// Malformed tar, a non-zero filter exit, or an impossible database row set.
    #[error("corrupt: {0}")]
    Corrupt(String),

    /// A retryable I/O failure.
    #[error("transient I/O error: {0}")]
    Transient(String),

    /// A non-retryable I/O failure (auth, permission).
    #[error("permanent I/O error: {0}")]
    Permanent(String),
}

impl CoreError {
    /// True for error kinds a caller might reasonably retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CoreError::Transient(_))
    }

    /// Wrap a `std::io::Error`, classifying it as `NotFound`, `Permanent`,
    /// or `Transient` the way the backend contract requires.
    pub fn from_io(path: impl fmt::Display, err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => CoreError::NotFound(path.to_string()),
            io::ErrorKind::PermissionDenied => {
                CoreError::Permanent(format!("{}: {}", path, err))
            }
            _ => CoreError::Transient(format!("{}: {}", path, err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_display() {
        let e = CoreError::NotFound("segments/x.tar".into());
        assert!(e.to_string().contains("segments/x.tar"));
    }

    #[test]
    fn io_error_classification() {
        let e = CoreError::from_io(
            "foo",
            io::Error::new(io::ErrorKind::NotFound, "no such file"),
        );
        assert!(matches!(e, CoreError::NotFound(_)));

        let e = CoreError::from_io(
            "foo",
            io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(matches!(e, CoreError::Permanent(_)));

        let e = CoreError::from_io("foo", io::Error::new(io::ErrorKind::Other, "oops"));
        assert!(e.is_retryable());
    }
}
