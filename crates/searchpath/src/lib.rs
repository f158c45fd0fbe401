//! Locating Cumulus files that may live under one of several possible
//! names or directories (specification §4.2).
//!
//! Some files can be stored under multiple possible locations: due to
//! format (different compression suffixes), locality (segments split
//! across directories for archiving policy), or backwards compatibility
//! (the default location changed over time). A [`SearchPath`] holds an
//! ordered list of candidate [`SearchPathEntry`] locations and tries
//! them in order, moving a hit to the front so future lookups for the
//! same file type find it immediately.

#![warn(missing_docs)]

pub mod categories;

use cumulus_backend::Backend;
use cumulus_core::CoreError;
use parking_lot::Mutex;
use std::collections::HashSet;

/// One candidate location for a file, relative to the backend root.
#[derive(Debug, Clone)]
pub struct SearchPathEntry {
    directory_prefix: String,
    suffix: String,
    /// Arbitrary data associated with this entry, such as the filter
    /// command needed to decompress a segment found at this location.
    pub context: Option<String>,
}

impl SearchPathEntry {
    /// Create an entry: files are looked for at `directory_prefix/basename+suffix`.
    pub fn new(
        directory_prefix: impl Into<String>,
        suffix: impl Into<String>,
        context: Option<String>,
    ) -> Self {
        SearchPathEntry {
            directory_prefix: directory_prefix.into(),
            suffix: suffix.into(),
            context,
        }
    }

    /// The directory this entry searches under.
    pub fn directory_prefix(&self) -> &str {
        &self.directory_prefix
    }

    /// Build the path to try for a file named `basename`.
    pub fn build_path(&self, basename: &str) -> String {
        if self.directory_prefix.is_empty() {
            format!("{}{}", basename, self.suffix)
        } else {
            format!("{}/{}{}", self.directory_prefix, basename, self.suffix)
        }
    }
}

/// The result of a successful [`SearchPath::get`] or [`SearchPath::stat`].
pub struct Found<T> {
    /// The value retrieved (an open stream, or stat metadata).
    pub value: T,
    /// The full path under which it was found.
    pub path: String,
    /// The context associated with the entry that found it.
    pub context: Option<String>,
}

/// A file name matcher used by [`SearchPath::list`] to recognize files
/// of this category and extract the logical name embedded in them
/// (e.g. the snapshot name out of `snapshot-2024-01-01.cumulus`).
pub trait NameMatcher: Send + Sync {
    /// Return the embedded logical name if `filename` matches this
    /// category, `None` otherwise.
    fn extract_name(&self, filename: &str) -> Option<String>;
}

/// An ordered collection of candidate locations for one file category,
/// with move-to-front reordering on successful lookups.
pub struct SearchPath {
    matcher: Box<dyn NameMatcher>,
    entries: Mutex<Vec<SearchPathEntry>>,
}

impl SearchPath {
    /// Build a search path from a matcher and an initial entry ordering.
    pub fn new(matcher: Box<dyn NameMatcher>, entries: Vec<SearchPathEntry>) -> Self {
        SearchPath {
            matcher,
            entries: Mutex::new(entries),
        }
    }

    /// Append another candidate location, tried only after the existing ones.
    pub fn add_search_entry(&self, entry: SearchPathEntry) {
        self.entries.lock().push(entry);
    }

    /// The distinct directories this search path may look under.
    pub fn directories(&self) -> HashSet<String> {
        self.entries
            .lock()
            .iter()
            .map(|e| e.directory_prefix.clone())
            .collect()
    }

    /// Open `basename` at whichever candidate location has it, promoting
    /// that entry to the front of the path on success.
    pub fn get(
        &self,
        backend: &dyn Backend,
        basename: &str,
    ) -> cumulus_core::Result<Found<Box<dyn std::io::Read + Send>>> {
        self.try_each(basename, |path| backend.get(path))
    }

    /// Stat `basename` at whichever candidate location has it, promoting
    /// that entry to the front of the path on success.
    pub fn stat(
        &self,
        backend: &dyn Backend,
        basename: &str,
    ) -> cumulus_core::Result<Found<cumulus_backend::Stat>> {
        self.try_each(basename, |path| backend.stat(path))
    }

    fn try_each<T>(
        &self,
        basename: &str,
        mut op: impl FnMut(&str) -> cumulus_core::Result<T>,
    ) -> cumulus_core::Result<Found<T>> {
        let snapshot = self.entries.lock().clone();
        for (i, entry) in snapshot.iter().enumerate() {
            let path = entry.build_path(basename);
            match op(&path) {
                Ok(value) => {
                    if i > 0 {
                        let mut entries = self.entries.lock();
                        let entry = entries.remove(i);
                        entries.insert(0, entry);
                    }
                    return Ok(Found {
                        value,
                        path,
                        context: entry.context.clone(),
                    });
                }
                Err(CoreError::NotFound(_)) => continue,
                Err(e) => return Err(e),
            }
        }
        Err(CoreError::NotFound(basename.to_string()))
    }

    /// List every file across all candidate directories that matches
    /// this category, returning `(path, logical_name)` pairs.
    ///
    /// Fails with [`CoreError::NotFound`] only if every candidate
    /// directory was itself absent (i.e. nothing of this category
    /// exists anywhere).
    pub fn list(&self, backend: &dyn Backend) -> cumulus_core::Result<Vec<(String, String)>> {
        let mut results = Vec::new();
        let mut any_directory_present = false;

        for dir in self.directories() {
            match backend.list(&dir) {
                Ok(files) => {
                    any_directory_present = true;
                    for f in files {
                        if let Some(name) = self.matcher.extract_name(&f) {
                            let path = if dir.is_empty() {
                                f
                            } else {
                                format!("{}/{}", dir, f)
                            };
                            results.push((path, name));
                        }
                    }
                }
                Err(CoreError::NotFound(_)) => continue,
                Err(e) => return Err(e),
            }
        }

        if !any_directory_present {
            return Err(CoreError::NotFound(format!("{:?}", self.directories())));
        }
        Ok(results)
    }
}
