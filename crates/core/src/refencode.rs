//! URI-style escaping used for metadata log strings (names, symlink
//! targets, user/group names).
//!
//! The rule is specific to Cumulus, not a generic percent-encoding
//! profile: a character passes through literally iff it is greater than
//! `'+'`, less than `0x7f`, and not `'@'`; everything else (including
//! bytes above ASCII, handled here with surrogate-escape-equivalent
//! lossy decoding) is emitted as `%xx`.

/// Percent-encode a string using the Cumulus metadata-log escaping rule.
pub fn encode(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for byte in s.as_bytes() {
        let c = *byte;
        if c > b'+' && c < 0x7f && c != b'@' {
            out.push(c as char);
        } else {
            out.push_str(&format!("%{:02x}", c));
        }
    }
    out
}

/// Decode a `%xx`-escaped string back to its original bytes, interpreted
/// as UTF-8 (lossily, for byte sequences that are not valid UTF-8 — the
/// Python original uses surrogate-escape; since this is only used on
/// filesystem path components, lossy replacement is an acceptable
/// degradation for the rare non-UTF-8 path).
fn is_lowercase_hex_digit(b: u8) -> bool {
    b.is_ascii_digit() || matches!(b, b'a'..=b'f')
}

pub fn decode(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out: Vec<u8> = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%'
            && i + 2 < bytes.len()
            && is_lowercase_hex_digit(bytes[i + 1])
            && is_lowercase_hex_digit(bytes[i + 2])
        {
            if let Ok(hex_str) = std::str::from_utf8(&bytes[i + 1..i + 3]) {
                if let Ok(value) = u8::from_str_radix(hex_str, 16) {
                    out.push(value);
                    i += 3;
                    continue;
                }
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}
