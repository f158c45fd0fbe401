//! RFC822-style "Key: Value" stanza parsing, used for both the
//! metadata log and snapshot root descriptor files.

/// One parsed stanza: an ordered set of key/value pairs, with later
/// occurrences of a key overwriting earlier ones (matching the Python
/// original's use of a plain `dict`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Stanza {
    fields: Vec<(String, String)>,
}

impl Stanza {
    fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    fn set(&mut self, key: &str, value: String) {
        if let Some(entry) = self.fields.iter_mut().find(|(k, _)| k == key) {
            entry.1 = value;
        } else {
            self.fields.push((key.to_string(), value));
        }
    }

    fn append(&mut self, key: &str, suffix: &str) {
        if let Some(entry) = self.fields.iter_mut().find(|(k, _)| k == key) {
            entry.1.push_str(suffix);
        }
    }

    /// Look up a field by name.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    /// Iterate over the fields in the order they were first set.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

fn parse_key_value(line: &str) -> Option<(&str, &str)> {
    let colon = line.find(':')?;
    let key = &line[..colon];
    if key.is_empty()
        || !key
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
    {
        return None;
    }
    Some((key, line[colon + 1..].trim_start()))
}

/// Parse a sequence of lines into a series of stanzas.
///
/// Lines matching `KEY: VALUE` start or extend a field; a line starting
/// with whitespace continues the previous field's value; any other line
/// resets the "continuable" key (matching the original's tolerant
/// parsing of stray lines). When `terminate` returns true for a line, the
/// stanza accumulated so far (if non-empty) is emitted and a new one begun.
pub fn parse<'a>(
    lines: impl Iterator<Item = &'a str>,
    terminate: Option<&dyn Fn(&str) -> bool>,
) -> Vec<Stanza> {
    let mut stanzas = Vec::new();
    let mut current = Stanza::default();
    let mut last_key: Option<String> = None;

    for line in lines {
        let line = line.strip_suffix('\n').unwrap_or(line);

        if let Some(pred) = terminate {
            if pred(line) {
                if !current.is_empty() {
                    stanzas.push(std::mem::take(&mut current));
                }
                last_key = None;
                continue;
            }
        }

        if let Some((key, value)) = parse_key_value(line) {
            current.set(key, value.to_string());
            last_key = Some(key.to_string());
        } else if !line.is_empty()
            && line.starts_with(|c: char| c.is_whitespace())
            && last_key.is_some()
        {
            current.append(last_key.as_deref().unwrap(), line);
        } else {
            last_key = None;
        }
    }

    if !current.is_empty() {
        stanzas.push(current);
    }
    stanzas
}

/// Parse lines into a single stanza, returning an empty one if there is
/// no input (matching the original's `parse_full`, which returns `{}`
/// on `StopIteration`).
pub fn parse_full<'a>(lines: impl Iterator<Item = &'a str>) -> Stanza {
    parse(lines, None).into_iter().next().unwrap_or_default()
}
