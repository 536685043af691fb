// src/metadata.rs
//
// Per-key object metadata and the in-process store the adapter merges into
// every request.

use std::collections::BTreeMap;
use std::collections::btree_map;

use dashmap::DashMap;

pub const CONTENT_TYPE: &str = "ContentType";
pub const CACHE_CONTROL: &str = "CacheControl";
pub const CONTENT_ENCODING: &str = "ContentEncoding";
pub const CONTENT_DISPOSITION: &str = "ContentDisposition";
pub const CONTENT_LANGUAGE: &str = "ContentLanguage";

/// Names the backend maps onto dedicated headers. Anything else is user metadata.
pub const STANDARD_NAMES: [&str; 5] = [
    CONTENT_TYPE,
    CACHE_CONTROL,
    CONTENT_ENCODING,
    CONTENT_DISPOSITION,
    CONTENT_LANGUAGE,
];

/// String-to-string metadata for one object.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata(BTreeMap<String, String>);

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.0.insert(name.into(), value.into())
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.0.remove(name)
    }

    pub fn content_type(&self) -> Option<&str> {
        self.get(CONTENT_TYPE)
    }

    pub fn set_content_type(&mut self, content_type: impl Into<String>) {
        self.insert(CONTENT_TYPE, content_type);
    }

    pub fn cache_control(&self) -> Option<&str> {
        self.get(CACHE_CONTROL)
    }

    pub fn content_encoding(&self) -> Option<&str> {
        self.get(CONTENT_ENCODING)
    }

    pub fn content_disposition(&self) -> Option<&str> {
        self.get(CONTENT_DISPOSITION)
    }

    pub fn content_language(&self) -> Option<&str> {
        self.get(CONTENT_LANGUAGE)
    }

    /// Entries that are not standard headers (sent as `x-amz-meta-*` on S3).
    pub fn user_entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0
            .iter()
            .filter(|(k, _)| !STANDARD_NAMES.contains(&k.as_str()))
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Overlay `other` on top of `self`; `other` wins on conflicts.
    pub fn merge(&mut self, other: &Metadata) {
        for (k, v) in &other.0 {
            self.0.insert(k.clone(), v.clone());
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, String> {
        self.0.iter()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Metadata {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Metadata(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl<'a> IntoIterator for &'a Metadata {
    type Item = (&'a String, &'a String);
    type IntoIter = btree_map::Iter<'a, String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Thread-safe key → metadata map owned by one adapter instance.
///
/// Last writer wins. Entries are never invalidated by writes made elsewhere,
/// so a stored value can go stale relative to the backend.
#[derive(Debug, Default)]
pub struct MetadataStore {
    entries: DashMap<String, Metadata>,
}

impl MetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace whatever is stored for `key`.
    pub fn set(&self, key: &str, metadata: Metadata) {
        tracing::trace!("metadata set: {} ({} entries)", key, metadata.len());
        self.entries.insert(key.to_string(), metadata);
    }

    /// Stored metadata for `key`, empty if none was recorded.
    pub fn get(&self, key: &str) -> Metadata {
        self.entries
            .get(key)
            .map(|m| m.value().clone())
            .unwrap_or_default()
    }

    /// Record a single observed value without dropping other stored entries.
    pub fn record(&self, key: &str, name: &str, value: &str) {
        self.entries
            .entry(key.to_string())
            .or_default()
            .insert(name, value);
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_prefers_overlay() {
        let mut base = Metadata::new()
            .with(CONTENT_TYPE, "text/plain")
            .with("owner", "alice");
        base.merge(&Metadata::new().with(CONTENT_TYPE, "text/html"));
        assert_eq!(base.content_type(), Some("text/html"));
        assert_eq!(base.get("owner"), Some("alice"));
    }

    #[test]
    fn user_entries_skip_standard_headers() {
        let md = Metadata::new()
            .with(CONTENT_TYPE, "image/png")
            .with(CACHE_CONTROL, "max-age=60")
            .with("camera", "x100");
        let user: Vec<_> = md.user_entries().collect();
        assert_eq!(user, vec![("camera", "x100")]);
    }

    #[test]
    fn store_set_replaces_and_record_merges() {
        let store = MetadataStore::new();
        store.set("k", Metadata::new().with("a", "1").with("b", "2"));
        store.set("k", Metadata::new().with("a", "3"));
        assert_eq!(store.get("k"), Metadata::new().with("a", "3"));

        store.record("k", CONTENT_TYPE, "text/csv");
        let md = store.get("k");
        assert_eq!(md.get("a"), Some("3"));
        assert_eq!(md.content_type(), Some("text/csv"));
    }

    #[test]
    fn missing_key_yields_empty_metadata() {
        let store = MetadataStore::new();
        assert!(store.get("nope").is_empty());
        assert!(!store.contains("nope"));
    }
}
