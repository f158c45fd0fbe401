//! The backend contract (specification §4.1) and a `file://` implementation.
//!
//! A backend exposes a namespace of `/`-separated relative paths with six
//! operations: `list`, `get`, `put`, `delete`, `stat`, `scan`, plus
//! `close` for transports that hold a persistent connection. This crate
//! only implements the `file` scheme (`LocalBackend`); S3/SFTP/FTP are
//! external transport collaborators per the specification's scope — the
//! core only ever consumes the trait below.

#![warn(missing_docs)]

mod local;

pub use local::LocalBackend;

use cumulus_core::CoreError;
use std::io::Read;

/// Result type alias for backend operations.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Metadata about a stored object, as returned by [`Backend::stat`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stat {
    /// Size of the object, in bytes.
    pub size: u64,
}

/// The uniform storage contract consumed by the rest of the core.
///
/// Implementations must classify every I/O failure into one of the four
/// outcomes in the error handling design: [`CoreError::NotFound`] (key
/// missing), [`CoreError::Transient`] (retryable I/O),
/// [`CoreError::Permanent`] (auth/permission), or [`CoreError::Corrupt`]
/// (unexpected response shape). The core retries none of these; callers
/// decide.
pub trait Backend: Send + Sync {
    /// List the basenames present directly under `dir`.
    ///
    /// Fails with [`CoreError::NotFound`] if `dir` itself does not exist.
    fn list(&self, dir: &str) -> Result<Vec<String>>;

    /// Open `path` for reading.
    fn get(&self, path: &str) -> Result<Box<dyn Read + Send>>;

    /// Write `data` to `path`, creating or overwriting it.
    fn put(&self, path: &str, data: &mut dyn Read) -> Result<()>;

    /// Remove `path`.
    fn delete(&self, path: &str) -> Result<()>;

    /// Retrieve metadata about `path` without reading its contents.
    fn stat(&self, path: &str) -> Result<Stat>;

    /// Best-effort prefetch of metadata for everything under `dir`.
    ///
    /// Transports that maintain a directory listing cache (S3, SFTP) can
    /// use this to warm it; the default implementation is a no-op.
    fn scan(&self, _dir: &str) -> Result<()> {
        Ok(())
    }

    /// Release any persistent connection held by this backend.
    fn close(&self) -> Result<()> {
        Ok(())
    }
}
