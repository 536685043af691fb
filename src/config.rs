// src/config.rs
//
// Construction-time adapter options, with bound checks and environment loading.

use std::env;
use std::str::FromStr;

use crate::constants::{
    DEFAULT_ACL, DEFAULT_PART_SIZE, DEFAULT_SIZE_LIMIT, MAX_SINGLE_PUT_SIZE,
    MIN_MULTIPART_PART_SIZE, PATH_SEPARATOR,
};
use crate::error::{StorageError, StorageResult};

/// Options recognised by [`S3Adapter`](crate::S3Adapter).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterOptions {
    /// Create the bucket on first use if it is missing.
    pub create: bool,
    /// Logical prefix under which every key lives. Empty for the bucket root.
    pub directory: String,
    /// Canned ACL applied to every write.
    pub acl: String,
    /// Streaming writes larger than this use multipart upload (≤ 5 GiB).
    /// Streams at or under the limit are buffered whole before a single put,
    /// so this is also the peak memory held by one streaming write.
    pub size_limit: u64,
    /// Multipart chunk size (≥ 5 MiB).
    pub part_size: u64,
    /// Infer ContentType from the payload when none is set.
    pub detect_content_type: bool,
}

impl Default for AdapterOptions {
    fn default() -> Self {
        Self {
            create: false,
            directory: String::new(),
            acl: DEFAULT_ACL.to_string(),
            size_limit: DEFAULT_SIZE_LIMIT,
            part_size: DEFAULT_PART_SIZE,
            detect_content_type: false,
        }
    }
}

impl AdapterOptions {
    pub fn with_create(mut self, create: bool) -> Self {
        self.create = create;
        self
    }

    pub fn with_directory(mut self, directory: impl Into<String>) -> Self {
        self.directory = directory.into();
        self
    }

    pub fn with_acl(mut self, acl: impl Into<String>) -> Self {
        self.acl = acl.into();
        self
    }

    pub fn with_size_limit(mut self, size_limit: u64) -> Self {
        self.size_limit = size_limit;
        self
    }

    pub fn with_part_size(mut self, part_size: u64) -> Self {
        self.part_size = part_size;
        self
    }

    pub fn with_detect_content_type(mut self, detect: bool) -> Self {
        self.detect_content_type = detect;
        self
    }

    /// Check backend bounds and normalise the directory.
    pub fn validate(mut self) -> StorageResult<Self> {
        if self.size_limit == 0 {
            return Err(StorageError::Config("size_limit must be greater than zero".into()));
        }
        if self.size_limit > MAX_SINGLE_PUT_SIZE {
            return Err(StorageError::Config(format!(
                "size_limit {} exceeds the backend maximum of {} bytes",
                self.size_limit, MAX_SINGLE_PUT_SIZE
            )));
        }
        if self.part_size < MIN_MULTIPART_PART_SIZE {
            return Err(StorageError::Config(format!(
                "part_size {} is below the backend minimum of {} bytes",
                self.part_size, MIN_MULTIPART_PART_SIZE
            )));
        }
        if self.part_size > MAX_SINGLE_PUT_SIZE {
            return Err(StorageError::Config(format!(
                "part_size {} exceeds the backend maximum of {} bytes",
                self.part_size, MAX_SINGLE_PUT_SIZE
            )));
        }
        self.directory = self.directory.trim_end_matches(PATH_SEPARATOR).to_string();
        Ok(self)
    }

    /// Load options from `OBJFS_*` variables (and `.env`), falling back to defaults.
    ///
    /// | Variable | Field |
    /// |---|---|
    /// | `OBJFS_CREATE_BUCKET` | `create` |
    /// | `OBJFS_DIRECTORY` | `directory` |
    /// | `OBJFS_ACL` | `acl` |
    /// | `OBJFS_SIZE_LIMIT` | `size_limit` |
    /// | `OBJFS_PART_SIZE` | `part_size` |
    /// | `OBJFS_DETECT_CONTENT_TYPE` | `detect_content_type` |
    pub fn from_env() -> StorageResult<Self> {
        dotenvy::dotenv().ok();
        let defaults = Self::default();
        Self {
            create: env_parse("OBJFS_CREATE_BUCKET", defaults.create)?,
            directory: env::var("OBJFS_DIRECTORY").unwrap_or(defaults.directory),
            acl: env::var("OBJFS_ACL").unwrap_or(defaults.acl),
            size_limit: env_parse("OBJFS_SIZE_LIMIT", defaults.size_limit)?,
            part_size: env_parse("OBJFS_PART_SIZE", defaults.part_size)?,
            detect_content_type: env_parse(
                "OBJFS_DETECT_CONTENT_TYPE",
                defaults.detect_content_type,
            )?,
        }
        .validate()
    }
}

fn env_parse<T: FromStr>(name: &str, default: T) -> StorageResult<T> {
    match env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|_| StorageError::Config(format!("{name}={raw:?} could not be parsed"))),
        _ => Ok(default),
    }
}
