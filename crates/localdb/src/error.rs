//! Errors specific to the local database, layered on top of the shared
//! core error kinds.

use thiserror::Error;

/// Result type alias for local database operations.
pub type Result<T> = std::result::Result<T, LocalDbError>;

/// Error kinds arising from local database access.
#[derive(Debug, Error)]
pub enum LocalDbError {
    /// The underlying SQLite connection or a query against it failed.
    #[error("local database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// An error from the shared core error kinds, propagated through.
    #[error(transparent)]
    Core(#[from] cumulus_core::CoreError),

    /// A caller passed a segment id or name the database has no record of.
    #[error("unknown segment: {0}")]
    UnknownSegment(String),

    /// A [`crate::CleanerConfig`] value failed validation.
    #[error("invalid cleaner configuration: {0}")]
    InvalidConfig(String),
}
