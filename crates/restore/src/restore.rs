//! Two-phase restore: build the directory structure and a segment-to-file
//! index in one pass over the metadata log, then extract file contents
//! grouped by segment so each segment is fetched and decoded only once,
//! and finally lay down special files and restore attributes in reverse
//! metadata order so a directory's mtime is set only after everything
//! inside it has been written (specification §4.9).

use cumulus_core::{ChecksumVerifier, CoreError, Result};
use cumulus_metadata::{iterate_metadata, MetadataItem};
use cumulus_snapshot::SnapshotDescriptor;
use cumulus_store::CumulusStore;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs;
use std::path::{Component, Path, PathBuf};

/// Restricts a restore to a subset of the snapshot's files.
///
/// An empty selection means "restore everything", matching the
/// original's `paths == []` convention.
#[derive(Debug, Default, Clone)]
pub struct RestoreSelection {
    paths: Vec<String>,
}

impl RestoreSelection {
    /// Restore only `paths` (and anything nested under them).
    pub fn only(paths: Vec<String>) -> Self {
        RestoreSelection { paths }
    }

    /// Restore everything in the snapshot.
    pub fn everything() -> Self {
        RestoreSelection::default()
    }

    fn matches(&self, path: &str) -> bool {
        if self.paths.is_empty() {
            return true;
        }
        self.paths
            .iter()
            .any(|p| path == p || path.starts_with(&format!("{}/", p)))
    }
}

/// Collapse `.`/`..` components and strip any leading root, refusing to
/// restore a path that would still try to escape the destination
/// directory. Metadata log entries are not supposed to contain such
/// paths, but a corrupted or hostile log must never be allowed to write
/// outside `destdir`.
fn sanitize_relative_path(name: &str) -> Option<PathBuf> {
    let mut out = PathBuf::new();
    for component in Path::new(name).components() {
        match component {
            Component::Normal(part) => out.push(part),
            Component::RootDir | Component::Prefix(_) | Component::CurDir => {}
            Component::ParentDir => return None,
        }
    }
    if out.as_os_str().is_empty() {
        None
    } else {
        Some(out)
    }
}

struct PlannedItem {
    pathname: String,
    item: MetadataItem,
}

/// Restore `descriptor`'s snapshot into `destdir`, limited to `selection`.
pub fn restore_snapshot(
    store: &CumulusStore,
    descriptor: &SnapshotDescriptor,
    destdir: &Path,
    selection: &RestoreSelection,
) -> Result<()> {
    let mut planned: Vec<PlannedItem> = Vec::new();
    let mut pending_files: HashMap<String, MetadataItem> = HashMap::new();
    let mut segment_to_paths: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();

    for item in iterate_metadata(store, &descriptor.root)? {
        let item = item?;
        let raw_name = item
            .items
            .name
            .as_deref()
            .ok_or_else(|| CoreError::Corrupt("metadata item missing name field".to_string()))?;

        let Some(pathname) = sanitize_relative_path(raw_name) else {
            tracing::warn!(name = raw_name, "skipping path that escapes destination");
            continue;
        };
        let pathname = pathname.to_string_lossy().replace('\\', "/");
        if !selection.matches(&pathname) {
            continue;
        }

        let destpath = destdir.join(&pathname);
        let is_dir = item.items.file_type.as_deref() == Some("d");
        let dir_to_create = if is_dir {
            destpath.clone()
        } else {
            destpath.parent().map(Path::to_path_buf).unwrap_or_else(|| destdir.to_path_buf())
        };

        let is_regular_file = matches!(item.items.file_type.as_deref(), Some("-") | Some("f"));
        if is_regular_file {
            for block in item.data(store)? {
                let block = block?;
                let reference = cumulus_core::parse_reference(&block)?;
                if let cumulus_core::Reference::Object { segment, .. } = reference {
                    segment_to_paths
                        .entry(segment)
                        .or_default()
                        .insert(pathname.clone());
                }
            }
            pending_files.insert(pathname.clone(), item.clone());
        }

        if !dir_to_create.is_dir() {
            if let Err(e) = fs::create_dir_all(&dir_to_create) {
                tracing::warn!(name = raw_name, error = %e, "error creating directory structure");
            }
        }

        planned.push(PlannedItem { pathname, item });
    }

    // Phase 2: restore file contents, grouped by the segment their
    // blocks live in, so each segment is decoded once regardless of how
    // many files draw blocks from it.
    while let Some((segment, paths)) = pop_first(&mut segment_to_paths) {
        tracing::debug!(segment = %segment, "restoring segment");
        for pathname in paths {
            if let Some(item) = pending_files.remove(&pathname) {
                restore_file(store, destdir, &pathname, &item)?;
            }
        }
    }
    for (pathname, item) in pending_files.drain() {
        restore_file(store, destdir, &pathname, &item)?;
    }

    // Phases 3-4: special files, then permissions and timestamps, in
    // reverse metadata order so directory mtimes are set last.
    for planned_item in planned.iter().rev() {
        restore_attributes(destdir, planned_item);
    }

    Ok(())
}

fn pop_first(map: &mut BTreeMap<String, BTreeSet<String>>) -> Option<(String, BTreeSet<String>)> {
    let key = map.keys().next().cloned()?;
    map.remove_entry(&key)
}

fn restore_file(
    store: &CumulusStore,
    destdir: &Path,
    pathname: &str,
    item: &MetadataItem,
) -> Result<()> {
    let destpath = destdir.join(pathname);
    tracing::info!(path = %pathname, "extracting file");

    let checksum = item
        .items
        .checksum
        .as_deref()
        .ok_or_else(|| CoreError::Corrupt(format!("{}: missing checksum field", pathname)))?;
    let mut verifier = ChecksumVerifier::new(checksum)?;
    let mut size = 0u64;
    let mut contents = Vec::new();

    for block in item.data(store)? {
        let data = store.get_ref(&block?)?;
        verifier.update(&data);
        size += data.len() as u64;
        contents.extend_from_slice(&data);
    }

    fs::write(&destpath, &contents)
        .map_err(|e| CoreError::from_io(destpath.display().to_string(), e))?;

    let expected_size = item.items.size.ok_or_else(|| {
        CoreError::Corrupt(format!("{}: missing size field", pathname))
    })?;
    if size != expected_size {
        return Err(CoreError::Corrupt(format!(
            "{}: size mismatch: expected {}, restored {}",
            pathname, expected_size, size
        )));
    }
    if !verifier.valid() {
        return Err(CoreError::ChecksumMismatch {
            object: pathname.to_string(),
            expected: checksum.to_string(),
            actual: "<computed>".to_string(),
        });
    }
    Ok(())
}

fn restore_attributes(destdir: &Path, planned: &PlannedItem) {
    let destpath = destdir.join(&planned.pathname);
    let item = &planned.item;
    let type_tag = item.items.file_type.as_deref().unwrap_or("");

    let result = create_special_file(&destpath, item, type_tag);
    if let Err(e) = result {
        tracing::warn!(path = %planned.pathname, error = %e, "error restoring special file");
        return;
    }

    match (item.items.user, item.items.group) {
        (Some((uid, _)), Some((gid, _))) => {
            if let Err(e) = lchown(&destpath, uid as u32, gid as u32) {
                tracing::warn!(path = %planned.pathname, error = %e, "error restoring file ownership");
            }
        }
        (Some(_), None) | (None, Some(_)) => {
            tracing::warn!(
                path = %planned.pathname,
                "skipping ownership restore: only one of user/group present"
            );
        }
        (None, None) => {}
    }

    if type_tag == "l" {
        return;
    }

    if let Some(mode) = item.items.mode {
        use std::os::unix::fs::PermissionsExt;
        if let Err(e) = fs::set_permissions(&destpath, fs::Permissions::from_mode(mode as u32)) {
            tracing::warn!(path = %planned.pathname, error = %e, "error restoring file permissions");
        }
    }

    if let Some(mtime) = item.items.mtime {
        if let Err(e) = set_mtime(&destpath, mtime) {
            tracing::warn!(path = %planned.pathname, error = %e, "error restoring file timestamps");
        }
    }
}

fn create_special_file(destpath: &Path, item: &MetadataItem, type_tag: &str) -> std::io::Result<()> {
    match type_tag {
        "-" | "f" | "d" => Ok(()),
        "l" => {
            let target = item
                .items
                .target
                .as_deref()
                .or(item.items.contents.as_deref())
                .unwrap_or("");
            std::os::unix::fs::symlink(target, destpath)
        }
        "p" => nix::unistd::mkfifo(destpath, nix::sys::stat::Mode::from_bits_truncate(0o600))
            .map_err(io_err),
        "c" | "b" => {
            let (major, minor) = item.items.device.unwrap_or((0, 0));
            let kind = if type_tag == "c" {
                nix::sys::stat::SFlag::S_IFCHR
            } else {
                nix::sys::stat::SFlag::S_IFBLK
            };
            let dev = nix::sys::stat::makedev(major, minor);
            nix::sys::stat::mknod(
                destpath,
                kind,
                nix::sys::stat::Mode::from_bits_truncate(0o600),
                dev,
            )
            .map_err(io_err)
        }
        "s" => {
            tracing::warn!(path = %destpath.display(), "socket restoration is not implemented");
            Ok(())
        }
        other => {
            tracing::warn!(path = %destpath.display(), type_tag = other, "unknown file type code");
            Ok(())
        }
    }
}

fn lchown(path: &Path, uid: u32, gid: u32) -> std::io::Result<()> {
    nix::unistd::fchownat(
        None,
        path,
        Some(nix::unistd::Uid::from_raw(uid)),
        Some(nix::unistd::Gid::from_raw(gid)),
        nix::unistd::FchownatFlags::NoFollowSymlink,
    )
    .map_err(io_err)
}

fn set_mtime(path: &Path, mtime: u64) -> std::io::Result<()> {
    use nix::sys::stat::UtimensatFlags;
    use nix::sys::time::TimeSpec;
    let now = TimeSpec::new(0, libc::UTIME_NOW as i64);
    let mtime = TimeSpec::new(mtime as i64, 0);
    nix::sys::stat::utimensat(None, path, &now, &mtime, UtimensatFlags::NoFollowSymlink)
        .map_err(io_err)
}

fn io_err(e: nix::Error) -> std::io::Error {
    std::io::Error::from_raw_os_error(e as i32)
}
