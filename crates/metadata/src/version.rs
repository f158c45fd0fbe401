//! Parsing and checking the `Cumulus Snapshot vX.Y` / `LBS Snapshot vX.Y`
//! version line found at the top of every snapshot descriptor.

use cumulus_core::{CoreError, Result, FORMAT_VERSION};

/// Parse a version string like `Cumulus Snapshot v0.11` into its dotted
/// component numbers. Returns an empty vector if `s` isn't a
/// recognized version line (matching the original's tolerant `()` return).
pub fn parse_metadata_version(s: &str) -> Vec<u32> {
    let rest = match s
        .strip_prefix("Cumulus Snapshot v")
        .or_else(|| s.strip_prefix("LBS Snapshot v"))
    {
        Some(rest) => rest,
        None => return Vec::new(),
    };

    let mut parts = Vec::new();
    for component in rest.split('.') {
        match component.parse::<u32>() {
            Ok(n) => parts.push(n),
            Err(_) => return Vec::new(),
        }
    }
    parts
}

/// Check that a parsed version is not newer than [`FORMAT_VERSION`].
///
/// Comparison is lexicographic over the dotted components, so `0.11.1`
/// is newer than `0.11` but `0.9` is older.
pub fn check_version(version: &[u32]) -> Result<()> {
    let max = [FORMAT_VERSION.0, FORMAT_VERSION.1];
    if version > max.as_slice() {
        return Err(CoreError::UnsupportedVersion {
            found: version.to_vec(),
            max: FORMAT_VERSION,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_cumulus_version_line() {
        assert_eq!(parse_metadata_version("Cumulus Snapshot v0.11"), vec![0, 11]);
    }

    #[test]
    fn parses_lbs_version_line() {
        assert_eq!(parse_metadata_version("LBS Snapshot v0.8"), vec![0, 8]);
    }

    #[test]
    fn unrecognized_line_is_empty() {
        assert!(parse_metadata_version("not a version line").is_empty());
    }

    #[test]
    fn current_version_passes_check() {
        assert!(check_version(&[0, 11]).is_ok());
    }

    #[test]
    fn older_version_passes_check() {
        assert!(check_version(&[0, 8]).is_ok());
    }

    #[test]
    fn newer_version_is_rejected() {
        let err = check_version(&[0, 12]).unwrap_err();
        assert!(matches!(err, CoreError::UnsupportedVersion { .. }));
    }
}
