use hashbrown::HashMap;
use sha2::{Digest, Sha256};

use super::FingerprintIdx;

/// Bijection between subtree digests and dense indices.
///
/// Indices are handed out in first-seen order, so the traversal order of the
/// callers decides them. One table is shared by both trees of a run.
#[derive(Debug, Default)]
pub struct FingerprintTable {
    indices: HashMap<String, FingerprintIdx>,
}

impl FingerprintTable {
    pub fn index_for(&mut self, signature: &str) -> FingerprintIdx {
        if let Some(i) = self.indices.get(signature) {
            return *i;
        }
        let i = self.indices.len() as FingerprintIdx;
        self.indices.insert(signature.to_owned(), i);
        i
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

/// Hex rendered SHA-256 of a canonical signature.
pub fn digest(signature: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(signature.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// `kind(c0,c1,...)` over the children digests.
pub fn shape_signature<'a>(kind: impl std::fmt::Display, children: impl Iterator<Item = &'a str>) -> String {
    let mut s = format!("{kind}(");
    push_joined(&mut s, children);
    s.push(')');
    s
}

/// `kind[label](c0,c1,...)` over the children digests.
pub fn content_signature<'a>(
    kind: impl std::fmt::Display,
    label: &str,
    children: impl Iterator<Item = &'a str>,
) -> String {
    let mut s = format!("{kind}[{label}](");
    push_joined(&mut s, children);
    s.push(')');
    s
}

fn push_joined<'a>(s: &mut String, children: impl Iterator<Item = &'a str>) {
    for (i, c) in children.enumerate() {
        if i > 0 {
            s.push(',');
        }
        s.push_str(c);
    }
}
