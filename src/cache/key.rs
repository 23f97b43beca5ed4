//! Canonical request fingerprints.

use std::collections::BTreeMap;
use std::fmt;

use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::types::Params;

/// Fields always treated as bulk content, whatever their size.
pub const BULK_FIELDS: &[&str] = &[
    "messages", "prompt", "text", "content", "system", "documents", "input",
];

/// Strings longer than this are treated as free text and digested.
const FREE_TEXT_THRESHOLD: usize = 256;

/// Hex characters kept from a bulk field's digest.
const BULK_DIGEST_LEN: usize = 16;

/// Deterministic cache key for a use case and its key-relevant fields.
///
/// Components live in a `BTreeMap`, so the fingerprint never depends on the
/// order fields arrived in. Bulk content (message lists, free text) is
/// reduced to a digest prefix, which bounds key length and keeps raw
/// content out of keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheKey {
    use_case: String,
    components: BTreeMap<String, String>,
}

impl CacheKey {
    /// Build a key from request fields. A `use_case` entry in `fields` is ignored.
    pub fn new(use_case: impl Into<String>, fields: &Params) -> Self {
        let components = fields
            .iter()
            .filter(|(name, _)| name.as_str() != "use_case")
            .map(|(name, value)| (name.clone(), component(name, value)))
            .collect();
        Self {
            use_case: use_case.into(),
            components,
        }
    }

    pub fn use_case(&self) -> &str {
        &self.use_case
    }

    /// Stringified components, sorted by field name.
    pub fn components(&self) -> &BTreeMap<String, String> {
        &self.components
    }

    /// Stable SHA-256 digest (hex) over the use case and sorted components.
    ///
    /// Stable across processes, so warm-tier entries written by one worker
    /// are found by every other.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.use_case.as_bytes());
        for (name, value) in &self.components {
            hasher.update(b"\n");
            hasher.update(name.as_bytes());
            hasher.update(b"=");
            hasher.update(value.as_bytes());
        }
        hex::encode(hasher.finalize())
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.use_case, self.digest())
    }
}

fn component(name: &str, value: &Value) -> String {
    let raw = match value {
        Value::String(s) => s.clone(),
        // serde_json's map is ordered, so nested objects serialize canonically.
        other => other.to_string(),
    };
    if is_bulk(name, value) {
        digest_prefix(&raw)
    } else {
        raw
    }
}

fn is_bulk(name: &str, value: &Value) -> bool {
    BULK_FIELDS.contains(&name)
        || value.is_array()
        || value.as_str().is_some_and(|s| s.len() > FREE_TEXT_THRESHOLD)
}

fn digest_prefix(raw: &str) -> String {
    let digest = hex::encode(Sha256::digest(raw.as_bytes()));
    digest[..BULK_DIGEST_LEN].to_string()
}
