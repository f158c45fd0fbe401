//! The object reference grammar (specification §4.4).
//!
//! ```text
//! ref    := zero_ref | normal_ref
//! zero_ref := "zero" "[" NUM "]"
//! normal_ref := SEG "/" OBJ ( "(" CKSUM ")" )? ( "[" slice "]" )?
//! slice  := NUM | NUM "+" NUM | "=" NUM
//! ```
//!
//! Parsing is hand-written rather than regex-based: the grammar is a fixed
//! shape with a handful of optional suffixes, and a small state machine
//! reads more naturally than an escaped regular expression here.

use crate::error::{CoreError, Result};
use std::fmt;

/// A checksum algorithm accepted in an inline checksum assertion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    /// SHA-1, 20-byte digest.
    Sha1,
    /// SHA-224, 28-byte digest.
    Sha224,
    /// SHA-256, 32-byte digest.
    Sha256,
}

impl Algorithm {
    /// Parse the algorithm name as it appears before the `=` in a checksum string.
    pub fn parse(name: &str) -> Result<Self> {
        match name {
            "sha1" => Ok(Algorithm::Sha1),
            "sha224" => Ok(Algorithm::Sha224),
            "sha256" => Ok(Algorithm::Sha256),
            other => Err(CoreError::UnsupportedAlgorithm(other.to_string())),
        }
    }

    /// The name used in checksum strings.
    pub fn name(&self) -> &'static str {
        match self {
            Algorithm::Sha1 => "sha1",
            Algorithm::Sha224 => "sha224",
            Algorithm::Sha256 => "sha256",
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An inline checksum assertion, `ALGO=HEX`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checksum {
    /// The algorithm named in the checksum string.
    pub algorithm: Algorithm,
    /// Lowercase hex digest.
    pub hex: String,
}

impl Checksum {
    /// Parse a `ALGO=HEX` checksum string.
    pub fn parse(s: &str) -> Result<Self> {
        let (algo, hex) = s
            .split_once('=')
            .ok_or_else(|| CoreError::BadReference(format!("malformed checksum: {}", s)))?;
        Ok(Checksum {
            algorithm: Algorithm::parse(algo)?,
            hex: hex.to_string(),
        })
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.algorithm, self.hex)
    }
}

/// A byte-range slice of an object: `[N]`, `[S+N]`, or `[=N]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slice {
    /// Start offset within the object.
    pub start: u64,
    /// Number of bytes to take.
    pub length: u64,
    /// Whether the full object must be exactly `length` bytes (`[=N]` form).
    pub exact: bool,
}

impl fmt::Display for Slice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.exact {
            write!(f, "=" )?;
            write!(f, "{}", self.length)
        } else if self.start == 0 {
            write!(f, "{}", self.length)
        } else {
            write!(f, "{}+{}", self.start, self.length)
        }
    }
}

/// A fully parsed object reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reference {
    /// `zero[N]`: N bytes of zeros, no backing segment.
    Zero {
        /// Number of zero bytes denoted.
        length: u64,
    },
    /// `SEGMENT/OBJECT(CHECKSUM)?[SLICE]?`
    Object {
        /// Canonical segment UUID.
        segment: String,
        /// Hex object id within the segment.
        object: String,
        /// Optional inline checksum assertion.
        checksum: Option<Checksum>,
        /// Optional byte-range slice.
        slice: Option<Slice>,
    },
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reference::Zero { length } => write!(f, "zero[{}]", length),
            Reference::Object {
                segment,
                object,
                checksum,
                slice,
            } => {
                write!(f, "{}/{}", segment, object)?;
                if let Some(c) = checksum {
                    write!(f, "({})", c)?;
                }
                if let Some(s) = slice {
                    write!(f, "[{}]", s)?;
                }
                Ok(())
            }
        }
    }
}

fn is_lowercase_hex(s: &str) -> bool {
    !s.is_empty()
        && s.bytes()
            .all(|b| b.is_ascii_digit() || matches!(b, b'a'..=b'f'))
}

/// Check that `s` is a canonical lowercase 8-4-4-4-12 UUID.
pub fn is_canonical_uuid(s: &str) -> bool {
    let parts: Vec<&str> = s.split('-').collect();
    let lengths = [8, 4, 4, 4, 12];
    parts.len() == 5
        && parts
            .iter()
            .zip(lengths.iter())
            .all(|(p, len)| p.len() == *len && is_lowercase_hex(p))
}

fn parse_u64(s: &str, ctx: &str) -> Result<u64> {
    s.parse::<u64>()
        .map_err(|_| CoreError::BadReference(format!("not a number in {}: {}", ctx, s)))
}

/// Parse a slice body (the contents between `[` and `]`, excluding brackets).
fn parse_slice(body: &str) -> Result<Slice> {
    if let Some(rest) = body.strip_prefix('=') {
        let length = parse_u64(rest, "exact slice")?;
        Ok(Slice {
            start: 0,
            length,
            exact: true,
        })
    } else if let Some((start, length)) = body.split_once('+') {
        Ok(Slice {
            start: parse_u64(start, "slice start")?,
            length: parse_u64(length, "slice length")?,
            exact: false,
        })
    } else {
        Ok(Slice {
            start: 0,
            length: parse_u64(body, "slice length")?,
            exact: false,
        })
    }
}

/// Split a trailing `(...)` checksum and/or `[...]` slice off the end of
/// `rest`, returning `(core, checksum_body, slice_body)`.
fn split_suffixes(rest: &str) -> Result<(&str, Option<&str>, Option<&str>)> {
    let (core, slice_body) = if rest.ends_with(']') {
        let open = rest
            .rfind('[')
            .ok_or_else(|| CoreError::BadReference(format!("unbalanced '[' in: {}", rest)))?;
        (&rest[..open], Some(&rest[open + 1..rest.len() - 1]))
    } else {
        (rest, None)
    };

    let (core, checksum_body) = if core.ends_with(')') {
        let open = core
            .rfind('(')
            .ok_or_else(|| CoreError::BadReference(format!("unbalanced '(' in: {}", core)))?;
        (&core[..open], Some(&core[open + 1..core.len() - 1]))
    } else {
        (core, None)
    };

    Ok((core, checksum_body, slice_body))
}

/// Parse an object reference in its canonical textual form.
pub fn parse(refstr: &str) -> Result<Reference> {
    if let Some(body) = refstr
        .strip_prefix("zero[")
        .and_then(|s| s.strip_suffix(']'))
    {
        let length = parse_u64(body, "zero length")?;
        return Ok(Reference::Zero { length });
    }

    let slash = refstr
        .find('/')
        .ok_or_else(|| CoreError::BadReference(format!("missing '/' in reference: {}", refstr)))?;
    let segment = &refstr[..slash];
    let rest = &refstr[slash + 1..];

    if !is_canonical_uuid(segment) {
        return Err(CoreError::BadReference(format!(
            "segment is not a canonical UUID: {}",
            segment
        )));
    }

    let (object, checksum_body, slice_body) = split_suffixes(rest)?;

    if !is_lowercase_hex(object) {
        return Err(CoreError::BadReference(format!(
            "object id is not hex: {}",
            object
        )));
    }

    let checksum = checksum_body.map(Checksum::parse).transpose()?;
    let slice = slice_body.map(parse_slice).transpose()?;

    Ok(Reference::Object {
        segment: segment.to_string(),
        object: object.to_string(),
        checksum,
        slice,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_zero_ref() {
        let r = parse("zero[64]").unwrap();
        assert_eq!(r, Reference::Zero { length: 64 });
    }

    #[test]
    fn parses_zero_ref_zero_length() {
        let r = parse("zero[0]").unwrap();
        assert_eq!(r, Reference::Zero { length: 0 });
    }

    #[test]
    fn parses_plain_object_ref() {
        let r = parse("0e8f1234-1234-1234-1234-aaaaaaaaaaaa/3f").unwrap();
        match r {
            Reference::Object {
                segment,
                object,
                checksum,
                slice,
            } => {
                assert_eq!(segment, "0e8f1234-1234-1234-1234-aaaaaaaaaaaa");
                assert_eq!(object, "3f");
                assert!(checksum.is_none());
                assert!(slice.is_none());
            }
            _ => panic!("expected Object"),
        }
    }

    #[test]
    fn parses_checksum_and_exact_slice() {
        let r = parse("0e8f1234-1234-1234-1234-aaaaaaaaaaaa/3f(sha1=deadbeef)[=128]").unwrap();
        match r {
            Reference::Object {
                segment,
                object,
                checksum,
                slice,
            } => {
                assert_eq!(segment, "0e8f1234-1234-1234-1234-aaaaaaaaaaaa");
                assert_eq!(object, "3f");
                let c = checksum.unwrap();
                assert_eq!(c.algorithm, Algorithm::Sha1);
                assert_eq!(c.hex, "deadbeef");
                let s = slice.unwrap();
                assert_eq!(s, Slice { start: 0, length: 128, exact: true });
            }
            _ => panic!("expected Object"),
        }
    }

    #[test]
    fn parses_start_plus_length_slice() {
        let r = parse("0e8f1234-1234-1234-1234-aaaaaaaaaaaa/3f[10+20]").unwrap();
        match r {
            Reference::Object { slice, .. } => {
                assert_eq!(slice.unwrap(), Slice { start: 10, length: 20, exact: false });
            }
            _ => panic!("expected Object"),
        }
    }

    #[test]
    fn parses_abbreviated_slice() {
        let r = parse("0e8f1234-1234-1234-1234-aaaaaaaaaaaa/3f[40]").unwrap();
        match r {
            Reference::Object { slice, .. } => {
                assert_eq!(slice.unwrap(), Slice { start: 0, length: 40, exact: false });
            }
            _ => panic!("expected Object"),
        }
    }

    #[test]
    fn rejects_non_uuid_segment() {
        assert!(parse("not-a-uuid/3f").is_err());
    }

    #[test]
    fn rejects_missing_slash() {
        assert!(parse("justtext").is_err());
    }

    #[test]
    fn rejects_unknown_algorithm() {
        let err = parse("0e8f1234-1234-1234-1234-aaaaaaaaaaaa/3f(md5=deadbeef)").unwrap_err();
        assert!(matches!(err, CoreError::UnsupportedAlgorithm(_)));
    }

    fn roundtrip(s: &str) {
        let parsed = parse(s).unwrap();
        let rendered = parsed.to_string();
        let reparsed = parse(&rendered).unwrap();
        assert_eq!(parsed, reparsed);
    }

    #[test]
    fn round_trips_canonical_forms() {
        roundtrip("0e8f1234-1234-1234-1234-aaaaaaaaaaaa/3f");
        roundtrip("0e8f1234-1234-1234-1234-aaaaaaaaaaaa/3f(sha1=deadbeef)");
        roundtrip("0e8f1234-1234-1234-1234-aaaaaaaaaaaa/3f[40]");
        roundtrip("0e8f1234-1234-1234-1234-aaaaaaaaaaaa/3f[10+20]");
        roundtrip("0e8f1234-1234-1234-1234-aaaaaaaaaaaa/3f[=128]");
        roundtrip("zero[64]");
    }

    proptest::proptest! {
        #[test]
        fn round_trip_arbitrary_slices(start in 0u64..1_000_000, length in 0u64..1_000_000) {
            let r = Reference::Object {
                segment: "0e8f1234-1234-1234-1234-aaaaaaaaaaaa".to_string(),
                object: "3f".to_string(),
                checksum: None,
                slice: Some(Slice { start, length, exact: false }),
            };
            let rendered = r.to_string();
            let reparsed = parse(&rendered).unwrap();
            assert_eq!(r, reparsed);
        }
    }
}
