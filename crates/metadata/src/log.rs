//! Depth-first traversal of the metadata log, following `@`-prefixed
//! indirect references with a bounded recursion depth.

use cumulus_core::{CoreError, Result, MAX_RECURSION_DEPTH};
use cumulus_store::CumulusStore;
use std::collections::VecDeque;

fn to_lines(data: &[u8]) -> VecDeque<String> {
    String::from_utf8_lossy(data)
        .lines()
        .map(String::from)
        .collect()
}

/// An iterator over the logical lines of a metadata log, transparently
/// following indirect references (lines of the form `@REF`) up to
/// [`MAX_RECURSION_DEPTH`] levels deep.
pub struct MetadataLog<'a> {
    store: &'a CumulusStore,
    stack: Vec<VecDeque<String>>,
}

impl<'a> MetadataLog<'a> {
    /// Begin reading the metadata log rooted at `root` (an object reference).
    pub fn new(store: &'a CumulusStore, root: &str) -> Result<Self> {
        let mut log = MetadataLog {
            store,
            stack: Vec::new(),
        };
        log.follow_ref(root)?;
        Ok(log)
    }

    fn follow_ref(&mut self, refstr: &str) -> Result<()> {
        if self.stack.len() >= MAX_RECURSION_DEPTH {
            return Err(CoreError::RecursionTooDeep {
                limit: MAX_RECURSION_DEPTH,
            });
        }
        let data = self.store.get_ref(refstr)?;
        self.stack.push(to_lines(&data));
        Ok(())
    }
}

impl<'a> Iterator for MetadataLog<'a> {
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
                    let line = top.pop_front().unwrap();
                    if let Some(refstr) = line.strip_prefix('@') {
                        if let Err(e) = self.follow_ref(refstr.trim()) {
                            return Some(Err(e));
                        }
                        continue;
                    }
                    return Some(Ok(line));
                }
            }
        }
    }
}
