//! Content-addressed type identity.
//!
//! Every closed schema node is identified by a SHA-256 digest of its
//! structural content. Two independently declared types with identical
//! content produce identical hashes and collapse to one canonical instance
//! in the registry.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Hex-encoded SHA-256 digest identifying a closed schema type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypeHash(String);

impl TypeHash {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TypeHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Incremental digest over the structural content of a schema node.
///
/// Each field is fed with an unambiguous framing: text is length-prefixed
/// and numbers use fixed-width little-endian encodings, so adjacent fields
/// cannot alias (`"ab" + "c"` hashes differently from `"a" + "bc"`).
#[derive(Debug)]
pub struct HashBuilder {
    hasher: Sha256,
}

impl HashBuilder {
    /// Start a digest for one node kind; the tag separates kinds that
    /// would otherwise feed identical content.
    pub fn new(tag: &str) -> Self {
        let mut builder = Self {
            hasher: Sha256::new(),
        };
        builder.text(tag);
        builder
    }

    /// Feed a length-prefixed text field.
    pub fn text(&mut self, value: &str) {
        self.hasher.update((value.len() as u64).to_le_bytes());
        self.hasher.update(value.as_bytes());
    }

    pub fn int(&mut self, value: i64) {
        self.hasher.update(value.to_le_bytes());
    }

    pub fn uint(&mut self, value: u64) {
        self.hasher.update(value.to_le_bytes());
    }

    /// Feed a float through its bit pattern, so `-0.0` and `0.0` stay
    /// distinct and `NaN` payloads are stable.
    pub fn float(&mut self, value: f64) {
        self.hasher.update(value.to_bits().to_le_bytes());
    }

    /// Feed the digest of a child node.
    pub fn child(&mut self, hash: &TypeHash) {
        self.text(hash.as_str());
    }

    pub fn finish(self) -> TypeHash {
        let digest = self.hasher.finalize();
        TypeHash(format!("{digest:x}"))
    }
}
