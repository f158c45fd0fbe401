//! The four built-in file categories: checksums, meta, segments, snapshots.
//!
//! Segments and meta files may additionally be stored compressed or
//! encrypted, tried in the order given by the segment filter table
//! (`.gpg`, `.gz`, `.bz2`, uncompressed), each across the directory
//! names that have historically held them (`segments0`, `segments1`,
//! `segments`, the backend root).

use crate::{NameMatcher, SearchPath, SearchPathEntry};

/// `(suffix, filter command)` pairs tried in order when locating a
/// segment or meta file, matching the table in the version and format
/// constants section.
pub const SEGMENT_FILTERS: &[(&str, Option<&str>)] = &[
    (".gpg", Some("cumulus-filter-gpg --decrypt")),
    (".gz", Some("gzip -dc")),
    (".bz2", Some("bzip2 -dc")),
    ("", None),
];

fn segment_entries(prefix: &str) -> Vec<SearchPathEntry> {
    SEGMENT_FILTERS
        .iter()
        .map(|(suffix, filter)| {
            SearchPathEntry::new(prefix, *suffix, filter.map(|s| s.to_string()))
        })
        .collect()
}

struct ChecksumsMatcher;
impl NameMatcher for ChecksumsMatcher {
    fn extract_name(&self, filename: &str) -> Option<String> {
        let rest = filename.strip_prefix("snapshot-")?;
        let rest = rest.strip_suffix("sums")?;
        if rest.is_empty() || !rest.ends_with(|c: char| c.is_ascii_alphanumeric()) {
            return None;
        }
        // rest is "<name>.<algo>" where algo is the trailing word component
        let dot = rest.rfind('.')?;
        let (name, algo) = (&rest[..dot], &rest[dot + 1..]);
        if name.is_empty() || algo.is_empty() || !algo.chars().all(|c| c.is_ascii_alphanumeric()) {
            return None;
        }
        Some(name.to_string())
    }
}

struct MetaMatcher;
impl NameMatcher for MetaMatcher {
    fn extract_name(&self, filename: &str) -> Option<String> {
        let rest = filename.strip_prefix("snapshot-")?;
        let rest = rest.strip_suffix(".meta").or_else(|| {
            let idx = rest.find(".meta.")?;
            Some(&rest[..idx])
        })?;
        if rest.is_empty() {
            return None;
        }
        Some(rest.to_string())
    }
}

fn is_uuid(s: &str) -> bool {
    cumulus_core::refstr::is_canonical_uuid(s)
}

struct SegmentsMatcher;
impl NameMatcher for SegmentsMatcher {
    fn extract_name(&self, filename: &str) -> Option<String> {
        let rest = filename.strip_suffix(".tar").or_else(|| {
            let idx = filename.find(".tar.")?;
            Some(&filename[..idx])
        })?;
        if is_uuid(rest) {
            Some(rest.to_string())
        } else {
            None
        }
    }
}

struct SnapshotsMatcher;
impl NameMatcher for SnapshotsMatcher {
    fn extract_name(&self, filename: &str) -> Option<String> {
        let rest = filename.strip_prefix("snapshot-")?;
        let rest = rest
            .strip_suffix(".cumulus")
            .or_else(|| rest.strip_suffix(".lbs"))?;
        if rest.is_empty() {
            None
        } else {
            Some(rest.to_string())
        }
    }
}

/// `snapshot-NAME.ALGOsums` files: `meta/`, `checksums/`, or the backend root.
pub fn checksums() -> SearchPath {
    SearchPath::new(
        Box::new(ChecksumsMatcher),
        vec![
            SearchPathEntry::new("meta", ".sha1sums", None),
            SearchPathEntry::new("checksums", ".sha1sums", None),
            SearchPathEntry::new("", ".sha1sums", None),
        ],
    )
}

/// `snapshot-NAME.meta[.filter]` files: the `meta` directory under every filter suffix.
pub fn meta() -> SearchPath {
    SearchPath::new(Box::new(MetaMatcher), segment_entries("meta"))
}

/// `UUID.tar[.filter]` segment files, tried across `segments0`,
/// `segments1`, the backend root, then `segments`.
pub fn segments() -> SearchPath {
    let mut entries = segment_entries("segments0");
    entries.extend(segment_entries("segments1"));
    entries.extend(segment_entries(""));
    entries.extend(segment_entries("segments"));
    SearchPath::new(Box::new(SegmentsMatcher), entries)
}

/// `snapshot-NAME.{cumulus,lbs}` descriptor files.
pub fn snapshots() -> SearchPath {
    SearchPath::new(
        Box::new(SnapshotsMatcher),
        vec![
            SearchPathEntry::new("snapshots", ".cumulus", None),
            SearchPathEntry::new("snapshots", ".lbs", None),
            SearchPathEntry::new("", ".cumulus", None),
            SearchPathEntry::new("", ".lbs", None),
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshots_matcher_extracts_name() {
        let m = SnapshotsMatcher;
        assert_eq!(
            m.extract_name("snapshot-2024-01-01.cumulus"),
            Some("2024-01-01".to_string())
        );
        assert_eq!(m.extract_name("snapshot-x.lbs"), Some("x".to_string()));
        assert_eq!(m.extract_name("garbage"), None);
    }

    #[test]
    fn segments_matcher_requires_uuid() {
        let m = SegmentsMatcher;
        let uuid = "0199e1c4-6c1a-7cda-9b1e-0123456789ab";
        assert_eq!(m.extract_name(&format!("{}.tar", uuid)), Some(uuid.to_string()));
        assert_eq!(
            m.extract_name(&format!("{}.tar.gz", uuid)),
            Some(uuid.to_string())
        );
        assert_eq!(m.extract_name("not-a-uuid.tar"), None);
    }

    #[test]
    fn meta_matcher_extracts_name() {
        let m = MetaMatcher;
        assert_eq!(
            m.extract_name("snapshot-daily.meta"),
            Some("daily".to_string())
        );
        assert_eq!(
            m.extract_name("snapshot-daily.meta.gpg"),
            Some("daily".to_string())
        );
    }

    #[test]
    fn checksums_matcher_extracts_name() {
        let m = ChecksumsMatcher;
        assert_eq!(
            m.extract_name("snapshot-daily.sha1sums"),
            Some("daily".to_string())
        );
    }
}
