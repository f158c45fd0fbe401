//! Metadata log parsing and traversal (specification §4.6-4.7).
//!
//! The metadata log is a sequence of RFC822-style stanzas, one per file
//! in the snapshot, separated by blank lines. Stanzas and the snapshot
//! root descriptor share the same underlying [`stanza::parse`]; the log
//! itself is a chain of objects linked by `@`-prefixed indirect
//! references, followed depth-first by [`log::MetadataLog`].

#![warn(missing_docs)]

pub mod item;
pub mod log;
pub mod stanza;
pub mod version;

pub use item::{decode_device, decode_int, decode_str, decode_user, ItemFields, MetadataItem};
pub use log::MetadataLog;
pub use stanza::{parse, parse_full, Stanza};
pub use version::{check_version, parse_metadata_version};

use cumulus_core::Result;
use cumulus_store::CumulusStore;

/// Iterate over every file's [`MetadataItem`] in the metadata log rooted
/// at `root`, splitting the log into stanzas on blank lines.
pub fn iterate_metadata<'a>(
    store: &'a CumulusStore,
    root: &str,
) -> Result<impl Iterator<Item = Result<MetadataItem>> + 'a> {
    let log = MetadataLog::new(store, root)?;
    let mut lines = Vec::new();
    for line in log {
        lines.push(line?);
    }

    let terminate: &dyn Fn(&str) -> bool = &|l: &str| l.is_empty();
    let owned_lines = lines;
    let stanzas = stanza::parse(owned_lines.iter().map(|s| s.as_str()), Some(terminate));
    Ok(stanzas.into_iter().map(MetadataItem::decode))
}
