//! The canonical serializer: every fingerprint input category is appended as
//! a NUL-delimited record, in the fixed order spec.md §4.3 prescribes, then
//! hashed as one contiguous buffer. Committing to a single serializer means
//! any future change to its shape is a cache-invalidating version bump
//! encoded in [`crate::RUNNER_VERSION`] (Design Note §9), not a silent
//! format drift.

use sha2::{Digest, Sha256};

#[derive(Default)]
pub struct Canonical {
    buf: Vec<u8>,
}

impl Canonical {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one record, terminated by a NUL byte so that e.g. `"a"` then
    /// `"bc"` never collides with `"ab"` then `"c"`.
    pub fn push(&mut self, record: impl AsRef<[u8]>) -> &mut Self {
        self.buf.extend_from_slice(record.as_ref());
        self.buf.push(0);
        self
    }

    pub fn push_pair(&mut self, key: &str, value: &str) -> &mut Self {
        self.push(format!("{key}={value}"))
    }

    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(&self.buf);
        hex::encode(hasher.finalize())
    }
}

/// Hashes a byte slice to the same 256-bit hex digest shape the fingerprint
/// itself uses, for hashing individual file contents.
pub fn hash_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}
