// src/s3_adapter.rs
//
// Copyright, 2025.  Signal65 / Futurum Group.
//
// Capability adapter over any S3-class ObjectStoreClient.
//
// Every operation first passes the bucket guard, resolves the key to a backend
// path, and sends the adapter ACL plus the key's stored metadata. Streaming
// writes above `size_limit` go through the multipart coordinator.

use std::io::Cursor;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, warn};

use crate::adapter::{
    Adapter, DirectoryAware, ListKeysAware, MetadataSupporter, MimeTypeProvider, MtimeCalculator,
    SizeCalculator,
};
use crate::bucket::{BucketGuard, BucketState};
use crate::client::{ObjectHead, ObjectStoreClient, PutOptions};
use crate::config::AdapterOptions;
use crate::constants::SNIFF_LEN;
use crate::content::{Content, read_up_to};
use crate::error::{ErrorKind, OpContext, StorageError, StorageResult};
use crate::key_path::KeyPathMapper;
use crate::metadata::{CONTENT_TYPE, Metadata, MetadataStore};
use crate::multipart::{MultipartUploadConfig, MultipartUploadCoordinator};
use crate::sniff::ContentTypeSniffer;

/// Filesystem-style adapter for one bucket of an S3-class store.
///
/// ```no_run
/// use std::sync::Arc;
/// use objfs::{Adapter, AdapterOptions, AwsS3Client, S3Adapter};
///
/// # async fn example() -> anyhow::Result<()> {
/// let client = Arc::new(AwsS3Client::from_env().await?);
/// let adapter = S3Adapter::new(client, "media", AdapterOptions::default().with_create(true))?;
/// adapter.write("hello.txt", "Hello, world!".into()).await?;
/// assert_eq!(&adapter.read("hello.txt").await?[..], b"Hello, world!");
/// # Ok(())
/// # }
/// ```
pub struct S3Adapter {
    client: Arc<dyn ObjectStoreClient>,
    guard: BucketGuard,
    options: AdapterOptions,
    paths: KeyPathMapper,
    metadata: MetadataStore,
    multipart: MultipartUploadCoordinator,
    sniffer: ContentTypeSniffer,
}

impl std::fmt::Debug for S3Adapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Adapter")
            .field("bucket", &self.guard.bucket())
            .field("bucket_state", &self.guard.state())
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl S3Adapter {
    /// Validates `options`; out-of-bounds sizes are a fatal `Config` error.
    pub fn new(
        client: Arc<dyn ObjectStoreClient>,
        bucket: impl Into<String>,
        options: AdapterOptions,
    ) -> StorageResult<Self> {
        let options = options.validate()?;
        let multipart = MultipartUploadCoordinator::new(
            client.clone(),
            MultipartUploadConfig {
                part_size: options.part_size,
                ..Default::default()
            },
        )?;
        Ok(Self {
            guard: BucketGuard::new(bucket, options.create),
            paths: KeyPathMapper::new(options.directory.clone()),
            metadata: MetadataStore::new(),
            sniffer: ContentTypeSniffer::new(),
            client,
            options,
            multipart,
        })
    }

    pub fn bucket(&self) -> &str {
        self.guard.bucket()
    }

    pub fn bucket_state(&self) -> BucketState {
        self.guard.state()
    }

    pub fn options(&self) -> &AdapterOptions {
        &self.options
    }

    pub fn paths(&self) -> &KeyPathMapper {
        &self.paths
    }

    pub fn client(&self) -> &Arc<dyn ObjectStoreClient> {
        &self.client
    }

    async fn ensure_bucket(&self) -> StorageResult<()> {
        self.guard.ensure(self.client.as_ref()).await
    }

    /// Adapter defaults overlaid with the metadata stored for `key`.
    fn put_options(&self, key: &str) -> PutOptions {
        PutOptions {
            acl: (!self.options.acl.is_empty()).then(|| self.options.acl.clone()),
            metadata: self.metadata.get(key),
        }
    }

    async fn head(&self, op: &'static str, key: &str) -> StorageResult<ObjectHead> {
        self.ensure_bucket().await.op(op, key)?;
        self.client
            .head_object(self.bucket(), &self.paths.to_path(key))
            .await
            .op(op, key)
    }

    async fn put_single(&self, path: &str, body: Bytes, options: &PutOptions) -> StorageResult<u64> {
        let len = body.len() as u64;
        self.client
            .put_object(self.bucket(), path, body, options)
            .await?;
        Ok(len)
    }

    async fn put_multipart<R>(&self, path: &str, reader: &mut R, options: &PutOptions) -> StorageResult<u64>
    where
        R: AsyncRead + Unpin + Send + ?Sized,
    {
        let info = self
            .multipart
            .upload(self.bucket(), path, options, reader)
            .await?;
        Ok(info.total_bytes)
    }

    async fn write_content(&self, key: &str, content: Content) -> StorageResult<u64> {
        let path = self.paths.to_path(key);
        let mut options = self.put_options(key);
        let limit = self.options.size_limit;

        let content = if self.options.detect_content_type && options.content_type().is_none() {
            let (head, content) = content.peek(SNIFF_LEN).await?;
            let content_type = self.sniffer.sniff(&head, key);
            debug!("Detected content type {} for {}", content_type, key);
            options.metadata.set_content_type(content_type);
            content
        } else {
            content
        };

        match content {
            Content::Buffer(body) => {
                if body.len() as u64 > limit {
                    return Err(StorageError::invalid(format!(
                        "buffer of {} bytes exceeds size limit {}; pass a stream to use multipart upload",
                        body.len(),
                        limit
                    )));
                }
                self.put_single(&path, body, &options).await
            }
            Content::Stream {
                mut reader,
                len: Some(len),
            } if len > limit => {
                debug!("Streaming {} ({} bytes) via multipart upload", key, len);
                self.put_multipart(&path, &mut reader, &options).await
            }
            Content::Stream { mut reader, .. } => {
                // Length unknown (or claimed small): buffer at most limit + 1 bytes to decide.
                let head = read_up_to(&mut reader, limit + 1).await?;
                if head.len() as u64 <= limit {
                    return self.put_single(&path, Bytes::from(head), &options).await;
                }
                debug!("Stream for {} exceeded {} bytes; switching to multipart upload", key, limit);
                let mut chained = Cursor::new(head).chain(reader);
                self.put_multipart(&path, &mut chained, &options).await
            }
        }
    }
}

#[async_trait]
impl Adapter for S3Adapter {
    async fn read(&self, key: &str) -> StorageResult<Bytes> {
        self.ensure_bucket().await.op("read", key)?;
        let out = self
            .client
            .get_object(self.bucket(), &self.paths.to_path(key))
            .await
            .op("read", key)?;
        if let Some(content_type) = &out.content_type {
            self.metadata.record(key, CONTENT_TYPE, content_type);
        }
        Ok(out.body)
    }

    async fn write(&self, key: &str, content: Content) -> StorageResult<u64> {
        self.ensure_bucket().await.op("write", key)?;
        self.write_content(key, content).await.op("write", key)
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        match self.head("exists", key).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() && !e.is_fatal() => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        self.ensure_bucket().await.op("delete", key)?;
        self.client
            .delete_object(self.bucket(), &self.paths.to_path(key))
            .await
            .op("delete", key)
    }

    /// Server-side copy with the target key's options, then delete of the
    /// source. If the delete fails the copy stands, both keys hold the data,
    /// and the rename still reports success.
    async fn rename(&self, source: &str, target: &str) -> StorageResult<()> {
        self.ensure_bucket().await.op("rename", source)?;
        let source_path = self.paths.to_path(source);
        let target_path = self.paths.to_path(target);
        if source_path == target_path {
            // Copy-then-delete onto itself would destroy the object.
            self.client
                .head_object(self.bucket(), &source_path)
                .await
                .op("rename", source)?;
            return Ok(());
        }
        self.client
            .copy_object(
                self.bucket(),
                &source_path,
                &target_path,
                &self.put_options(target),
            )
            .await
            .op("rename", source)?;

        if let Err(e) = self.client.delete_object(self.bucket(), &source_path).await {
            warn!(
                "Renamed {} to {} but could not delete the source; both keys now exist: {}",
                source, target, e
            );
        }
        Ok(())
    }

    fn as_metadata_supporter(&self) -> Option<&dyn MetadataSupporter> {
        Some(self)
    }

    fn as_size_calculator(&self) -> Option<&dyn SizeCalculator> {
        Some(self)
    }

    fn as_mtime_calculator(&self) -> Option<&dyn MtimeCalculator> {
        Some(self)
    }

    fn as_mime_type_provider(&self) -> Option<&dyn MimeTypeProvider> {
        Some(self)
    }

    fn as_list_keys_aware(&self) -> Option<&dyn ListKeysAware> {
        Some(self)
    }

    fn as_directory_aware(&self) -> Option<&dyn DirectoryAware> {
        Some(self)
    }
}

impl MetadataSupporter for S3Adapter {
    fn set_metadata(&self, key: &str, metadata: Metadata) {
        self.metadata.set(key, metadata);
    }

    fn get_metadata(&self, key: &str) -> Metadata {
        self.metadata.get(key)
    }
}

#[async_trait]
impl SizeCalculator for S3Adapter {
    async fn size(&self, key: &str) -> StorageResult<u64> {
        Ok(self.head("size", key).await?.size)
    }
}

#[async_trait]
impl MtimeCalculator for S3Adapter {
    async fn mtime(&self, key: &str) -> StorageResult<DateTime<Utc>> {
        self.head("mtime", key).await?.last_modified.ok_or_else(|| {
            StorageError::client(ErrorKind::Other, "backend reported no LastModified").for_op("mtime", key)
        })
    }
}

#[async_trait]
impl MimeTypeProvider for S3Adapter {
    async fn mime_type(&self, key: &str) -> StorageResult<String> {
        self.head("mime_type", key).await?.content_type.ok_or_else(|| {
            StorageError::client(ErrorKind::Other, "backend reported no ContentType").for_op("mime_type", key)
        })
    }
}

#[async_trait]
impl ListKeysAware for S3Adapter {
    async fn list_keys(&self, prefix: &str) -> StorageResult<Vec<String>> {
        self.ensure_bucket().await.op("list_keys", prefix)?;
        let path_prefix = self.paths.to_path(prefix);
        let mut keys = Vec::new();
        let mut continuation: Option<String> = None;
        loop {
            let page = self
                .client
                .list_objects(self.bucket(), &path_prefix, continuation.take(), None)
                .await
                .op("list_keys", prefix)?;
            keys.extend(page.objects.iter().map(|o| self.paths.to_key(&o.key)));
            match page.next_continuation {
                Some(token) => continuation = Some(token),
                None => break,
            }
        }
        Ok(keys)
    }
}

#[async_trait]
impl DirectoryAware for S3Adapter {
    async fn is_directory(&self, key: &str) -> StorageResult<bool> {
        self.ensure_bucket().await.op("is_directory", key)?;
        let page = self
            .client
            .list_objects(self.bucket(), &self.paths.directory_prefix(key), None, Some(1))
            .await
            .op("is_directory", key)?;
        Ok(!page.objects.is_empty())
    }
}
