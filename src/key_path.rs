// src/key_path.rs
//
// Translation between logical keys and backend object paths.

use crate::constants::PATH_SEPARATOR;

/// Maps logical keys onto backend paths under an optional directory prefix.
///
/// With directory `"media"`, key `"a/b.png"` lives at path `"media/a/b.png"`.
/// `to_key` strips the prefix by length rather than by match, so a key must
/// not itself start with the directory string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyPathMapper {
    directory: String,
}

impl KeyPathMapper {
    /// Trailing separators on `directory` are dropped.
    pub fn new(directory: impl Into<String>) -> Self {
        let directory = directory.into();
        let directory = directory.trim_end_matches(PATH_SEPARATOR).to_string();
        Self { directory }
    }

    pub fn directory(&self) -> &str {
        &self.directory
    }

    pub fn to_path(&self, key: &str) -> String {
        if self.directory.is_empty() {
            key.to_string()
        } else {
            format!("{}{}{}", self.directory, PATH_SEPARATOR, key)
        }
    }

    pub fn to_key(&self, path: &str) -> String {
        let rest = path.get(self.directory.len()..).unwrap_or("");
        rest.trim_start_matches(PATH_SEPARATOR).to_string()
    }

    /// Listing prefix that selects everything "inside" `key` as a directory.
    pub fn directory_prefix(&self, key: &str) -> String {
        let path = self.to_path(key);
        format!("{}{}", path.trim_end_matches(PATH_SEPARATOR), PATH_SEPARATOR)
    }
}
