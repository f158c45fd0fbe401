//! Typed decoding of a single metadata log stanza into a [`MetadataItem`],
//! plus traversal of the block references that make up a file's data.

use crate::stanza::Stanza;
use cumulus_core::{refencode, CoreError, Result, MAX_RECURSION_DEPTH};
use cumulus_store::CumulusStore;
use std::collections::VecDeque;

/// Decode an integer field, expressed in decimal, octal (`0...`), or
/// hexadecimal (`0x...`) — the same ambiguity the original format uses
/// for Unix mode bits and similar fields.
pub fn decode_int(s: &str) -> Result<u64> {
    let parse = |radix, body: &str| {
        u64::from_str_radix(body, radix)
            .map_err(|_| CoreError::Corrupt(format!("not a base-{} integer: {}", radix, s)))
    };
    if let Some(hex) = s.strip_prefix("0x") {
        parse(16, hex)
    } else if s.starts_with('0') && s.len() > 1 {
        parse(8, &s[1..])
    } else {
        parse(10, s)
    }
}

/// Decode a URI-escaped string field (names, symlink targets).
pub fn decode_str(s: &str) -> String {
    refencode::decode(s)
}

/// Decode a `uid (name)` or bare `uid` user/group field.
pub fn decode_user(s: &str) -> Result<(u64, Option<String>)> {
    let mut parts = s.split_whitespace();
    let uid = decode_int(
        parts
            .next()
            .ok_or_else(|| CoreError::Corrupt(format!("empty user/group field: {:?}", s)))?,
    )?;
    let name = parts
        .next()
        .and_then(|tok| tok.strip_prefix('(').and_then(|t| t.strip_suffix(')')))
        .map(decode_str);
    Ok((uid, name))
}

/// Decode a `major/minor` device number field.
pub fn decode_device(s: &str) -> Result<(u64, u64)> {
    let (major, minor) = s
        .split_once('/')
        .ok_or_else(|| CoreError::Corrupt(format!("malformed device field: {}", s)))?;
    Ok((decode_int(major)?, decode_int(minor)?))
}

/// Typed view over the well-known fields of one metadata log stanza.
#[derive(Debug, Clone, Default)]
pub struct ItemFields {
    /// Decoded file name.
    pub name: Option<String>,
    /// Raw type tag (`f`, `d`, `l`, `s`, `c`, `b`, `p`, ...).
    pub file_type: Option<String>,
    /// Unix permission/mode bits.
    pub mode: Option<u64>,
    /// Device major/minor, for character and block special files.
    pub device: Option<(u64, u64)>,
    /// Owning user: `(uid, name)`.
    pub user: Option<(u64, Option<String>)>,
    /// Owning group: `(gid, name)`.
    pub group: Option<(u64, Option<String>)>,
    /// Inode change time, Unix epoch seconds.
    pub ctime: Option<u64>,
    /// Modification time, Unix epoch seconds.
    pub mtime: Option<u64>,
    /// Hard link count.
    pub links: Option<u64>,
    /// Opaque inode identifier, used to detect hard links within a snapshot.
    pub inode: Option<String>,
    /// Whole-file checksum, when the original tree still tracked one.
    pub checksum: Option<String>,
    /// File size in bytes.
    pub size: Option<u64>,
    /// Decoded symlink target or small-file inline contents.
    pub contents: Option<String>,
    /// Decoded symlink target.
    pub target: Option<String>,
}

/// Metadata describing a single file (or directory, symlink, device
/// node...) from a snapshot's metadata log.
#[derive(Debug, Clone)]
pub struct MetadataItem {
    /// The raw stanza this item was decoded from.
    pub fields: Stanza,
    /// The decoded, typed view of the stanza's well-known fields.
    pub items: ItemFields,
}

impl MetadataItem {
    /// Decode `fields` into typed values, ignoring any unrecognized keys.
    pub fn decode(fields: Stanza) -> Result<Self> {
        let mut items = ItemFields::default();
        for (key, value) in fields.iter() {
            match key {
                "name" => items.name = Some(decode_str(value)),
                "type" => items.file_type = Some(value.to_string()),
                "mode" => items.mode = Some(decode_int(value)?),
                "device" => items.device = Some(decode_device(value)?),
                "user" => items.user = Some(decode_user(value)?),
                "group" => items.group = Some(decode_user(value)?),
                "ctime" => items.ctime = Some(decode_int(value)?),
                "mtime" => items.mtime = Some(decode_int(value)?),
                "links" => items.links = Some(decode_int(value)?),
                "inode" => items.inode = Some(value.to_string()),
                "checksum" => items.checksum = Some(decode_str(value)),
                "size" => items.size = Some(decode_int(value)?),
                "contents" => items.contents = Some(decode_str(value)),
                "target" => items.target = Some(decode_str(value)),
                _ => {}
            }
        }
        Ok(MetadataItem { fields, items })
    }

    /// Iterate over the object references making up this file's data,
    /// following indirect (`@`-prefixed) references up to
    /// [`MAX_RECURSION_DEPTH`] levels deep, the same way the metadata
    /// log itself does.
    pub fn data<'a>(&self, store: &'a CumulusStore) -> Result<DataRefs<'a>> {
        let objects = self
            .fields
            .get("data")
            .unwrap_or("")
            .split_whitespace()
            .map(String::from)
            .collect();
        Ok(DataRefs {
            store,
            stack: vec![objects],
        })
    }
}

/// An iterator over the block references making up a file's contents.
pub struct DataRefs<'a> {
    store: &'a CumulusStore,
    stack: Vec<VecDeque<String>>,
}

impl<'a> DataRefs<'a> {
    fn follow_ref(&mut self, refstr: &str) -> Result<()> {
        if self.stack.len() >= MAX_RECURSION_DEPTH {
            return Err(CoreError::RecursionTooDeep {
                limit: MAX_RECURSION_DEPTH,
            });
        }
        let data = self.store.get_ref(refstr)?;
        let text = String::from_utf8_lossy(&data);
        let objects: VecDeque<String> = text.split_whitespace().map(String::from).collect();
        self.stack.push(objects);
        Ok(())
    }
}

impl<'a> Iterator for DataRefs<'a> {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Result<String>> {
        loop {
            match self.stack.last_mut() {
                None => return None,
                Some(top) if top.is_empty() => {
                    self.stack.pop();
                    continue;
                }
                Some(top) => {
                    let refstr = top.pop_front().unwrap();
                    if let Some(indirect) = refstr.strip_prefix('@') {
                        if let Err(e) = self.follow_ref(indirect) {
                            return Some(Err(e));
                        }
                        continue;
                    }
                    return Some(Ok(refstr));
                }
            }
        }
    }
}
