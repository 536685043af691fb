// src/adapter.rs
//
// The uniform adapter contract plus optional capability traits.
//
// A backend implements `Adapter` and only those capabilities it genuinely
// supports. Callers detect capabilities statically through trait bounds
// (`A: Adapter + SizeCalculator`) or dynamically through the `as_*` queries,
// which return `None` unless the adapter overrides them.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};

use crate::content::Content;
use crate::error::StorageResult;
use crate::metadata::Metadata;

/// Core operations every backend provides.
#[async_trait]
pub trait Adapter: Send + Sync {
    /// Full object content. Absence is an error of kind `NotFound`.
    async fn read(&self, key: &str) -> StorageResult<Bytes>;

    /// Store `content` under `key`; returns the number of bytes written.
    async fn write(&self, key: &str, content: Content) -> StorageResult<u64>;

    /// `Ok(false)` when absent; `Err` only when existence could not be decided.
    async fn exists(&self, key: &str) -> StorageResult<bool>;

    async fn delete(&self, key: &str) -> StorageResult<()>;

    /// Move `source` to `target`.
    async fn rename(&self, source: &str, target: &str) -> StorageResult<()>;

    fn as_metadata_supporter(&self) -> Option<&dyn MetadataSupporter> {
        None
    }

    fn as_size_calculator(&self) -> Option<&dyn SizeCalculator> {
        None
    }

    fn as_mtime_calculator(&self) -> Option<&dyn MtimeCalculator> {
        None
    }

    fn as_mime_type_provider(&self) -> Option<&dyn MimeTypeProvider> {
        None
    }

    fn as_list_keys_aware(&self) -> Option<&dyn ListKeysAware> {
        None
    }

    fn as_directory_aware(&self) -> Option<&dyn DirectoryAware> {
        None
    }
}

/// Per-key metadata applied to subsequent operations on that key.
pub trait MetadataSupporter: Send + Sync {
    /// Replace the metadata recorded for `key`.
    fn set_metadata(&self, key: &str, metadata: Metadata);

    /// Metadata recorded for `key`; empty if none.
    fn get_metadata(&self, key: &str) -> Metadata;
}

#[async_trait]
pub trait SizeCalculator: Send + Sync {
    async fn size(&self, key: &str) -> StorageResult<u64>;
}

#[async_trait]
pub trait MtimeCalculator: Send + Sync {
    async fn mtime(&self, key: &str) -> StorageResult<DateTime<Utc>>;
}

#[async_trait]
pub trait MimeTypeProvider: Send + Sync {
    async fn mime_type(&self, key: &str) -> StorageResult<String>;
}

#[async_trait]
pub trait ListKeysAware: Send + Sync {
    /// Keys starting with `prefix`, in backend listing order.
    async fn list_keys(&self, prefix: &str) -> StorageResult<Vec<String>>;

    async fn keys(&self) -> StorageResult<Vec<String>> {
        self.list_keys("").await
    }
}

#[async_trait]
pub trait DirectoryAware: Send + Sync {
    /// True iff at least one object lives under `key + "/"`.
    async fn is_directory(&self, key: &str) -> StorageResult<bool>;
}
