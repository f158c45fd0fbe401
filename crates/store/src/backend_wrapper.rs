//! A backend decorated with knowledge of Cumulus file categories, so
//! callers can ask for "the segment named X" without knowing which
//! directory or compression suffix it is actually stored under.

use cumulus_backend::Backend;
use cumulus_core::Result;
use cumulus_searchpath::{categories, SearchPath};
use std::collections::HashSet;
use std::io::Read;

/// Which [`SearchPath`] governs a file category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileType {
    /// `snapshot-NAME.{cumulus,lbs}` descriptor files.
    Snapshots,
    /// `UUID.tar[.filter]` segment files.
    Segments,
    /// `snapshot-NAME.meta[.filter]` metadata log files.
    Meta,
    /// `snapshot-NAME.ALGOsums` checksum list files.
    Checksums,
}

/// A segment or meta stream together with the filter command (if any)
/// needed to decode it, as found by the relevant search path.
pub struct OpenedFiltered {
    /// The raw (possibly still compressed) byte stream.
    pub stream: Box<dyn Read + Send>,
    /// Path it was found under, for diagnostics.
    pub path: String,
    /// Shell command to decode it, or `None` if stored uncompressed.
    pub filter_cmd: Option<String>,
}

/// Decorates a [`Backend`] with the four built-in search paths.
pub struct BackendWrapper {
    backend: Box<dyn Backend>,
    snapshots: SearchPath,
    segments: SearchPath,
    meta: SearchPath,
    checksums: SearchPath,
}

impl BackendWrapper {
    /// Wrap `backend` with the standard Cumulus file-category search paths.
    pub fn new(backend: Box<dyn Backend>) -> Self {
        BackendWrapper {
            backend,
            snapshots: categories::snapshots(),
            segments: categories::segments(),
            meta: categories::meta(),
            checksums: categories::checksums(),
        }
    }

    fn path_for(&self, file_type: FileType) -> &SearchPath {
        match file_type {
            FileType::Snapshots => &self.snapshots,
            FileType::Segments => &self.segments,
            FileType::Meta => &self.meta,
            FileType::Checksums => &self.checksums,
        }
    }

    /// Open `snapshot-NAME.{cumulus,lbs}`.
    pub fn open_snapshot(&self, name: &str) -> Result<Box<dyn Read + Send>> {
        let found = self
            .snapshots
            .get(self.backend.as_ref(), &format!("snapshot-{}", name))?;
        Ok(found.value)
    }

    /// Open and decode-ready-to-filter a segment named `name` (without `.tar`).
    pub fn open_segment(&self, name: &str) -> Result<OpenedFiltered> {
        let found = self.segments.get(self.backend.as_ref(), name)?;
        Ok(OpenedFiltered {
            stream: found.value,
            path: found.path,
            filter_cmd: found.context,
        })
    }

    /// Open and decode-ready-to-filter the metadata log named `name`.
    pub fn open_meta(&self, name: &str) -> Result<OpenedFiltered> {
        let found = self
            .meta
            .get(self.backend.as_ref(), &format!("snapshot-{}", name))?;
        Ok(OpenedFiltered {
            stream: found.value,
            path: found.path,
            filter_cmd: found.context,
        })
    }

    /// List the logical names present for a given file category.
    pub fn list_generic(&self, file_type: FileType) -> Result<HashSet<String>> {
        let entries = self.path_for(file_type).list(self.backend.as_ref())?;
        Ok(entries.into_iter().map(|(_, name)| name).collect())
    }

    /// List `(path, logical_name)` pairs for a given file category,
    /// for callers that need to act on the backend path itself (e.g. deletion).
    pub fn list_generic_paths(&self, file_type: FileType) -> Result<Vec<(String, String)>> {
        self.path_for(file_type).list(self.backend.as_ref())
    }

    /// Best-effort prefetch of directory listings for every category.
    pub fn prefetch_generic(&self) {
        let mut directories = HashSet::new();
        for ft in [
            FileType::Snapshots,
            FileType::Segments,
            FileType::Meta,
            FileType::Checksums,
        ] {
            directories.extend(self.path_for(ft).directories());
        }
        for dir in directories {
            if let Err(e) = self.backend.scan(&dir) {
                tracing::warn!(directory = %dir, error = %e, "prefetch scan failed");
            }
        }
    }

    /// The wrapped backend, for callers that need direct access (e.g. garbage collection scans).
    pub fn raw_backend(&self) -> &dyn Backend {
        self.backend.as_ref()
    }
}
