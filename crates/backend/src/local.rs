//! The `file` scheme backend: a backend rooted at a directory on the
//! local filesystem.

use crate::{Backend, Result, Stat};
use cumulus_core::CoreError;
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

/// A [`Backend`] rooted at a directory on the local filesystem.
///
/// Paths passed to the trait methods are `/`-separated relative paths;
/// they are joined onto the root and never allowed to escape it.
pub struct LocalBackend {
    root: PathBuf,
}

impl LocalBackend {
    /// Create a backend rooted at `root`. The directory is not created
    /// here; callers that need it to exist should create it up front.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        LocalBackend { root: root.into() }
    }

    fn resolve(&self, path: &str) -> Result<PathBuf> {
        if path.split('/').any(|part| part == "..") {
            return Err(CoreError::Permanent(format!(
                "path escapes backend root: {}",
                path
            )));
        }
        Ok(self.root.join(path))
    }
}

impl Backend for LocalBackend {
    fn list(&self, dir: &str) -> Result<Vec<String>> {
        let full = self.resolve(dir)?;
        let entries = fs::read_dir(&full).map_err(|e| CoreError::from_io(dir, e))?;

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| CoreError::from_io(dir, e))?;
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    fn get(&self, path: &str) -> Result<Box<dyn Read + Send>> {
        let full = self.resolve(path)?;
        let file = fs::File::open(&full).map_err(|e| CoreError::from_io(path, e))?;
        Ok(Box::new(file))
    }

    fn put(&self, path: &str, data: &mut dyn Read) -> Result<()> {
        let full = self.resolve(path)?;
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).map_err(|e| CoreError::from_io(path, e))?;
        }

        let tmp_path = tmp_path_for(&full);
        let mut tmp = fs::File::create(&tmp_path).map_err(|e| CoreError::from_io(path, e))?;
        let written = io::copy(data, &mut tmp).map_err(|e| CoreError::from_io(path, e));
        if let Err(e) = written {
            let _ = fs::remove_file(&tmp_path);
            return Err(e);
        }
        tmp.sync_all().map_err(|e| CoreError::from_io(path, e))?;
        drop(tmp);

        fs::rename(&tmp_path, &full).map_err(|e| {
            let _ = fs::remove_file(&tmp_path);
            CoreError::from_io(path, e)
        })
    }

    fn delete(&self, path: &str) -> Result<()> {
        let full = self.resolve(path)?;
        fs::remove_file(&full).map_err(|e| CoreError::from_io(path, e))
    }

    fn stat(&self, path: &str) -> Result<Stat> {
        let full = self.resolve(path)?;
        let meta = fs::metadata(&full).map_err(|e| CoreError::from_io(path, e))?;
        Ok(Stat { size: meta.len() })
    }
}

fn tmp_path_for(full: &Path) -> PathBuf {
    let file_name = full
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("tmp");
    full.with_file_name(format!(".{}.part", file_name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tempfile::tempdir;

    #[test]
    fn put_then_get_round_trips() {
        let dir = tempdir().unwrap();
        let backend = LocalBackend::new(dir.path());

        backend
            .put("segments/0001.tar", &mut Cursor::new(b"segment bytes"))
            .unwrap();

        let mut buf = Vec::new();
        backend
            .get("segments/0001.tar")
            .unwrap()
            .read_to_end(&mut buf)
            .unwrap();
        assert_eq!(buf, b"segment bytes");
    }

    #[test]
    fn put_creates_parent_directories() {
        let dir = tempdir().unwrap();
        let backend = LocalBackend::new(dir.path());
        backend
            .put("a/b/c/leaf", &mut Cursor::new(b"x"))
            .unwrap();
        assert!(dir.path().join("a/b/c/leaf").exists());
    }

    #[test]
    fn list_returns_sorted_basenames() {
        let dir = tempdir().unwrap();
        let backend = LocalBackend::new(dir.path());
        backend.put("snapshots/b", &mut Cursor::new(b"")).unwrap();
        backend.put("snapshots/a", &mut Cursor::new(b"")).unwrap();

        let names = backend.list("snapshots").unwrap();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn list_missing_directory_is_not_found() {
        let dir = tempdir().unwrap();
        let backend = LocalBackend::new(dir.path());
        let err = backend.list("does-not-exist").unwrap_err();
        assert!(matches!(err, CoreError::NotFound(_)));
    }

    #[test]
    fn get_missing_file_is_not_found() {
        let dir = tempdir().unwrap();
        let backend = LocalBackend::new(dir.path());
        let err = backend.get("nope").unwrap_err();
        assert!(matches!(err, CoreError::NotFound(_)));
    }

    #[test]
    fn stat_reports_size() {
        let dir = tempdir().unwrap();
        let backend = LocalBackend::new(dir.path());
        backend
            .put("meta/0", &mut Cursor::new(b"twelve bytes"))
            .unwrap();
        let stat = backend.stat("meta/0").unwrap();
        assert_eq!(stat.size, 12);
    }

    #[test]
    fn delete_removes_file() {
        let dir = tempdir().unwrap();
        let backend = LocalBackend::new(dir.path());
        backend.put("x", &mut Cursor::new(b"y")).unwrap();
        backend.delete("x").unwrap();
        assert!(backend.get("x").is_err());
    }

    #[test]
    fn path_cannot_escape_root() {
        let dir = tempdir().unwrap();
        let backend = LocalBackend::new(dir.path());
        let err = backend.get("../outside").unwrap_err();
        assert!(matches!(err, CoreError::Permanent(_)));
    }
}
