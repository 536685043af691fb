// src/client/mod.rs
//
// The object store client contract the adapter is written against.
// Implementations: AwsS3Client (aws-sdk-s3) and MemoryClient (in-process).

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};

use crate::error::StorageResult;
use crate::metadata::Metadata;

pub mod memory;
pub mod s3;

pub use memory::{ClientCall, MemoryClient};
pub use s3::AwsS3Client;

/// Options attached to writes, copies and multipart creation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PutOptions {
    /// Canned ACL, e.g. `private` or `public-read`.
    pub acl: Option<String>,
    pub metadata: Metadata,
}

impl PutOptions {
    pub fn content_type(&self) -> Option<&str> {
        self.metadata.content_type()
    }
}

#[derive(Debug, Clone, Default)]
pub struct PutOutput {
    pub e_tag: Option<String>,
}

#[derive(Debug, Clone)]
pub struct GetOutput {
    pub body: Bytes,
    pub content_type: Option<String>,
    pub metadata: Metadata,
}

/// HEAD result.
#[derive(Debug, Clone, Default)]
pub struct ObjectHead {
    pub size: u64,
    pub last_modified: Option<DateTime<Utc>>,
    pub content_type: Option<String>,
    pub e_tag: Option<String>,
    pub metadata: Metadata,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListedObject {
    pub key: String,
    pub size: u64,
    pub last_modified: Option<DateTime<Utc>>,
}

/// One page of a prefix listing. `next_continuation` is `None` on the last page.
#[derive(Debug, Clone, Default)]
pub struct ListPage {
    pub objects: Vec<ListedObject>,
    pub next_continuation: Option<String>,
}

/// A part acknowledged by the backend, as required by complete-upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedPart {
    pub part_number: i32,
    pub e_tag: String,
}

/// Remote blob-store endpoint.
///
/// Errors are reported as [`StorageError::Client`](crate::StorageError::Client)
/// with an [`ErrorKind`](crate::ErrorKind); absence must map to `NotFound`.
#[async_trait]
pub trait ObjectStoreClient: Send + Sync {
    async fn bucket_exists(&self, bucket: &str) -> StorageResult<bool>;

    /// Create `bucket` in the client's own region. A bucket that already
    /// exists may be reported as `AlreadyExists`.
    async fn create_bucket(&self, bucket: &str) -> StorageResult<()>;

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
        options: &PutOptions,
    ) -> StorageResult<PutOutput>;

    async fn get_object(&self, bucket: &str, key: &str) -> StorageResult<GetOutput>;

    async fn head_object(&self, bucket: &str, key: &str) -> StorageResult<ObjectHead>;

    async fn delete_object(&self, bucket: &str, key: &str) -> StorageResult<()>;

    async fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        continuation: Option<String>,
        max_keys: Option<i32>,
    ) -> StorageResult<ListPage>;

    /// Server-side copy within `bucket`. `options` replace the target's metadata
    /// when they carry any.
    async fn copy_object(
        &self,
        bucket: &str,
        source_key: &str,
        target_key: &str,
        options: &PutOptions,
    ) -> StorageResult<()>;

    /// Returns the upload id.
    async fn create_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        options: &PutOptions,
    ) -> StorageResult<String>;

    /// Returns the part's ETag.
    async fn upload_part(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        part_number: i32,
        body: Bytes,
    ) -> StorageResult<String>;

    async fn complete_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        parts: &[CompletedPart],
    ) -> StorageResult<()>;

    async fn abort_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
    ) -> StorageResult<()>;
}
