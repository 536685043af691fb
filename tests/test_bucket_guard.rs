// tests/test_bucket_guard.rs
//
// Lazy bucket verification and creation.

mod common;

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use futures::future::join_all;

use common::{BUCKET, count_calls, init_tracing};
use objfs::{
    Adapter, AdapterOptions, BucketGuard, BucketState, ClientCall, CompletedPart, ErrorKind,
    GetOutput, ListPage, MemoryClient, ObjectHead, ObjectStoreClient, PutOptions, PutOutput,
    S3Adapter, StorageError, StorageResult,
};

fn bucket_checks(client: &MemoryClient) -> usize {
    count_calls(&client.calls(), |c| matches!(c, ClientCall::BucketExists { .. }))
}

#[tokio::test]
async fn missing_bucket_without_create_fails_fast() -> Result<()> {
    init_tracing();
    let client = Arc::new(MemoryClient::new());
    let adapter = S3Adapter::new(client.clone(), "absent", AdapterOptions::default())?;

    let err = adapter.write("k", "v".into()).await.unwrap_err();
    assert!(matches!(err, StorageError::BucketMissing { ref bucket } if bucket == "absent"));
    assert!(err.is_fatal());
    assert_eq!(adapter.bucket_state(), BucketState::Failed);

    // Later operations fail without touching the backend again.
    let calls_before = client.calls().len();
    assert!(adapter.read("k").await.unwrap_err().is_fatal());
    assert!(adapter.exists("k").await.unwrap_err().is_fatal());
    assert_eq!(client.calls().len(), calls_before);
    assert_eq!(bucket_checks(&client), 1);
    assert!(!client.has_bucket("absent"));
    Ok(())
}

#[tokio::test]
async fn missing_bucket_is_created_once() -> Result<()> {
    init_tracing();
    let client = Arc::new(MemoryClient::new());
    let adapter = S3Adapter::new(client.clone(), "fresh", AdapterOptions::default().with_create(true))?;

    let writes = (0..8).map(|i| {
        let adapter = &adapter;
        async move { adapter.write(&format!("k{i}"), "v".into()).await }
    });
    for result in join_all(writes).await {
        result?;
    }

    assert!(client.has_bucket("fresh"));
    assert_eq!(client.create_bucket_calls(), 1);
    assert_eq!(bucket_checks(&client), 1);
    assert_eq!(adapter.bucket_state(), BucketState::Exists);
    Ok(())
}

#[tokio::test]
async fn existing_bucket_is_checked_once_and_never_created() -> Result<()> {
    let client = Arc::new(MemoryClient::new().with_bucket(BUCKET));
    let adapter = S3Adapter::new(client.clone(), BUCKET, AdapterOptions::default().with_create(true))?;
    assert_eq!(adapter.bucket_state(), BucketState::Unchecked);

    adapter.write("a", "1".into()).await?;
    adapter.read("a").await?;
    adapter.delete("a").await?;

    assert_eq!(client.create_bucket_calls(), 0);
    assert_eq!(bucket_checks(&client), 1);
    Ok(())
}

#[tokio::test]
async fn transient_check_failure_is_retried_on_next_use() -> Result<()> {
    let client = Arc::new(MemoryClient::new().with_bucket(BUCKET));
    let adapter = S3Adapter::new(client.clone(), BUCKET, AdapterOptions::default())?;

    client.fail_all_with(ErrorKind::TransientIo);
    let err = adapter.write("k", "v".into()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TransientIo);
    assert!(!err.is_fatal());
    assert_eq!(adapter.bucket_state(), BucketState::Unchecked);

    client.clear_faults();
    adapter.write("k", "v".into()).await?;
    assert_eq!(adapter.bucket_state(), BucketState::Exists);
    assert_eq!(bucket_checks(&client), 2);
    Ok(())
}

/// Reports the bucket as missing even though it exists, so the create loses
/// the race and the backend answers "already exists".
struct RacingClient {
    inner: MemoryClient,
}

#[async_trait]
impl ObjectStoreClient for RacingClient {
    async fn bucket_exists(&self, _bucket: &str) -> StorageResult<bool> {
        Ok(false)
    }

    async fn create_bucket(&self, bucket: &str) -> StorageResult<()> {
        self.inner.create_bucket(bucket).await
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
        options: &PutOptions,
    ) -> StorageResult<PutOutput> {
        self.inner.put_object(bucket, key, body, options).await
    }

    async fn get_object(&self, bucket: &str, key: &str) -> StorageResult<GetOutput> {
        self.inner.get_object(bucket, key).await
    }

    async fn head_object(&self, bucket: &str, key: &str) -> StorageResult<ObjectHead> {
        self.inner.head_object(bucket, key).await
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> StorageResult<()> {
        self.inner.delete_object(bucket, key).await
    }

    async fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        continuation: Option<String>,
        max_keys: Option<i32>,
    ) -> StorageResult<ListPage> {
        self.inner.list_objects(bucket, prefix, continuation, max_keys).await
    }

    async fn copy_object(
        &self,
        bucket: &str,
        source_key: &str,
        target_key: &str,
        options: &PutOptions,
    ) -> StorageResult<()> {
        self.inner.copy_object(bucket, source_key, target_key, options).await
    }

    async fn create_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        options: &PutOptions,
    ) -> StorageResult<String> {
        self.inner.create_multipart_upload(bucket, key, options).await
    }

    async fn upload_part(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        part_number: i32,
        body: Bytes,
    ) -> StorageResult<String> {
        self.inner.upload_part(bucket, key, upload_id, part_number, body).await
    }

    async fn complete_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        parts: &[CompletedPart],
    ) -> StorageResult<()> {
        self.inner.complete_multipart_upload(bucket, key, upload_id, parts).await
    }

    async fn abort_multipart_upload(&self, bucket: &str, key: &str, upload_id: &str) -> StorageResult<()> {
        self.inner.abort_multipart_upload(bucket, key, upload_id).await
    }
}

#[tokio::test]
async fn lost_create_race_counts_as_existing() -> Result<()> {
    let client = RacingClient {
        inner: MemoryClient::new().with_bucket(BUCKET),
    };
    let guard = BucketGuard::new(BUCKET, true);

    guard.ensure(&client).await?;
    assert_eq!(guard.state(), BucketState::Exists);
    assert_eq!(client.inner.create_bucket_calls(), 1);

    // Settled: no further backend traffic.
    guard.ensure(&client).await?;
    assert_eq!(client.inner.create_bucket_calls(), 1);
    Ok(())
}

#[tokio::test]
async fn guard_without_create_never_creates() -> Result<()> {
    let client = MemoryClient::new();
    let guard = BucketGuard::new("nowhere", false);

    let err = guard.ensure(&client).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(guard.state(), BucketState::Failed);
    assert_eq!(client.create_bucket_calls(), 0);
    Ok(())
}
