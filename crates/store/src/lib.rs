//! Object retrieval: segment extraction, an LRU extraction cache, and
//! the reference-resolution algorithm (specification §4.5).

#![warn(missing_docs)]

pub mod backend_wrapper;

pub use backend_wrapper::{BackendWrapper, FileType, OpenedFiltered};

use cumulus_backend::Backend;
use cumulus_core::{ChecksumVerifier, CoreError, Reference, Result};
use parking_lot::Mutex;
use std::collections::{HashSet, VecDeque};
use std::fs;
use std::io::Read;
use std::path::PathBuf;
use tempfile::TempDir;

/// Retrieves objects named by [`Reference`]s, caching extracted segments
/// on local disk so repeated object fetches from the same segment don't
/// re-run the filter pipeline or re-parse the tar archive.
pub struct CumulusStore {
    backend: BackendWrapper,
    cache_dir: TempDir,
    lru: Mutex<VecDeque<String>>,
    accessed_segments: Mutex<HashSet<String>>,
}

impl CumulusStore {
    /// Create a store over `backend`, with a fresh on-disk extraction cache.
    pub fn new(backend: Box<dyn Backend>) -> std::io::Result<Self> {
        Ok(CumulusStore {
            backend: BackendWrapper::new(backend),
            cache_dir: tempfile::Builder::new().prefix("cumulus-").tempdir()?,
            lru: Mutex::new(VecDeque::new()),
            accessed_segments: Mutex::new(HashSet::new()),
        })
    }

    /// The wrapped backend, for callers needing direct search-path access.
    pub fn backend(&self) -> &BackendWrapper {
        &self.backend
    }

    /// Every segment name this store has fetched an object from so far.
    ///
    /// Kept as an instance field rather than process-global state, so
    /// concurrent stores (e.g. in tests) never share accounting.
    pub fn accessed_segments(&self) -> HashSet<String> {
        self.accessed_segments.lock().clone()
    }

    fn segment_dir(&self, segment: &str) -> PathBuf {
        self.cache_dir.path().join(segment)
    }

    /// Extract every object out of `segment`'s tar archive into the
    /// on-disk cache, applying its filter command first.
    fn extract_segment(&self, segment: &str) -> Result<()> {
        let opened = self.backend.open_segment(segment)?;
        let decoded = cumulus_filter::apply(opened.stream, opened.filter_cmd.as_deref())
            .map_err(|e| {
                CoreError::Corrupt(format!("segment {} ({}): {}", segment, opened.path, e))
            })?;

        let dir = self.segment_dir(segment);
        fs::create_dir_all(&dir)
            .map_err(|e| CoreError::from_io(dir.display().to_string(), e))?;

        let mut archive = tar::Archive::new(decoded);
        let entries = archive
            .entries()
            .map_err(|e| CoreError::Corrupt(format!("segment {}: {}", segment, e)))?;

        for entry in entries {
            let mut entry =
                entry.map_err(|e| CoreError::Corrupt(format!("segment {}: {}", segment, e)))?;
            let path = entry
                .path()
                .map_err(|e| CoreError::Corrupt(format!("segment {}: {}", segment, e)))?
                .into_owned();
            let parts: Vec<_> = path.components().collect();
            if parts.len() != 2 {
                continue;
            }
            let top = parts[0].as_os_str().to_string_lossy();
            if top != segment {
                continue;
            }
            let object_name = parts[1].as_os_str().to_string_lossy().into_owned();

            let mut buf = Vec::new();
            entry
                .read_to_end(&mut buf)
                .map_err(|e| CoreError::from_io(format!("{}/{}", segment, object_name), e))?;
            fs::write(dir.join(&object_name), &buf)
                .map_err(|e| CoreError::from_io(format!("{}/{}", segment, object_name), e))?;
        }

        Ok(())
    }

    fn touch_lru(&self, segment: &str) {
        let mut lru = self.lru.lock();
        lru.retain(|s| s != segment);
        lru.push_back(segment.to_string());
        while lru.len() > cumulus_core::CACHE_SIZE {
            if let Some(evict) = lru.pop_front() {
                let _ = fs::remove_dir_all(self.segment_dir(&evict));
            }
        }
    }

    /// Load a single object's raw bytes out of `segment`, extracting the
    /// segment into the cache first if it isn't already present there.
    fn load_object(&self, segment: &str, object: &str) -> Result<Vec<u8>> {
        self.accessed_segments.lock().insert(segment.to_string());

        let object_path = self.segment_dir(segment).join(object);
        if !object_path.exists() {
            self.extract_segment(segment)?;
        }
        self.touch_lru(segment);

        if !object_path.exists() {
            return Err(CoreError::NotFound(format!("{}/{}", segment, object)));
        }
        fs::read(&object_path).map_err(|e| CoreError::from_io(object_path.display().to_string(), e))
    }

    /// Resolve a parsed [`Reference`] to its bytes, verifying any inline
    /// checksum and applying any slice.
    pub fn get(&self, reference: &Reference) -> Result<Vec<u8>> {
        match reference {
            Reference::Zero { length } => Ok(vec![0u8; *length as usize]),
            Reference::Object {
                segment,
                object,
                checksum,
                slice,
            } => {
                let mut data = self.load_object(segment, object)?;

                if let Some(checksum) = checksum {
                    let mut verifier = ChecksumVerifier::new(&checksum.to_string())?;
                    verifier.update(&data);
                    if !verifier.valid() {
                        return Err(CoreError::ChecksumMismatch {
                            object: format!("{}/{}", segment, object),
                            expected: checksum.to_string(),
                            actual: "<computed>".to_string(),
                        });
                    }
                }

                if let Some(slice) = slice {
                    if slice.exact && data.len() as u64 != slice.length {
                        return Err(CoreError::ExactSizeViolation {
                            asserted: slice.length,
                            actual: data.len() as u64,
                        });
                    }
                    let start = slice.start as usize;
                    let end = start
                        .checked_add(slice.length as usize)
                        .filter(|&end| end <= data.len())
                        .ok_or(CoreError::ShortObject {
                            requested: slice.length,
                            available: data.len().saturating_sub(start) as u64,
                        })?;
                    data = data[start..end].to_vec();
                }

                Ok(data)
            }
        }
    }

    /// Fetch the object named by a reference string directly.
    pub fn get_ref(&self, refstr: &str) -> Result<Vec<u8>> {
        let reference = cumulus_core::parse_reference(refstr)?;
        self.get(&reference)
    }

    /// Best-effort prefetch of directory listings across all categories.
    pub fn prefetch(&self) {
        self.backend.prefetch_generic();
    }
}
