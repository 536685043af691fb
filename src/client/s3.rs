// src/client/s3.rs
//
// Copyright, 2025.  Signal65 / Futurum Group.
//
//! ObjectStoreClient over the async AWS Rust SDK.
//!
//! Works against AWS S3 and S3-compatible endpoints (MinIO, Ceph RGW, ...).
//! SDK failures are classified into [`ErrorKind`]s from the service error
//! code, falling back to the HTTP status.

use std::collections::HashMap;
use std::env;

use anyhow::Result;
use async_trait::async_trait;
use aws_config::meta::region::RegionProviderChain;
use aws_sdk_s3::config::http::HttpResponse;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_s3::primitives::{ByteStream, DateTime as SdkDateTime};
use aws_sdk_s3::types::{
    BucketLocationConstraint, CompletedMultipartUpload, CompletedPart as SdkCompletedPart,
    CreateBucketConfiguration, MetadataDirective, ObjectCannedAcl,
};
use aws_sdk_s3::Client;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use tracing::debug;

use super::{
    CompletedPart, GetOutput, ListPage, ListedObject, ObjectHead, ObjectStoreClient, PutOptions,
    PutOutput,
};
use crate::error::{ErrorKind, StorageError, StorageResult};
use crate::metadata::Metadata;

pub const DEFAULT_REGION: &str = "us-east-1";

/// Characters left unescaped in an `x-amz-copy-source` header.
const COPY_SOURCE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'/')
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// [`ObjectStoreClient`] backed by `aws_sdk_s3::Client`.
#[derive(Debug, Clone)]
pub struct AwsS3Client {
    client: Client,
    region: Option<String>,
}

impl AwsS3Client {
    pub fn new(client: Client) -> Self {
        let region = client.config().region().map(|r| r.to_string());
        Self { client, region }
    }

    /// Build from the environment (and `.env`).
    ///
    /// Region: `AWS_REGION`, then the default provider chain, then `us-east-1`.
    /// `AWS_ENDPOINT_URL` selects an S3-compatible endpoint and switches to
    /// path-style addressing.
    pub async fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let region = RegionProviderChain::first_try(env::var("AWS_REGION").ok().map(Region::new))
            .or_default_provider()
            .or_else(Region::new(DEFAULT_REGION));

        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest()).region(region);
        let endpoint = env::var("AWS_ENDPOINT_URL").ok().filter(|e| !e.is_empty());
        if let Some(endpoint) = &endpoint {
            debug!("Using custom S3 endpoint {}", endpoint);
            loader = loader.endpoint_url(endpoint);
        }
        let cfg = loader.load().await;

        let s3_cfg = aws_sdk_s3::config::Builder::from(&cfg)
            .force_path_style(endpoint.is_some())
            .build();
        Ok(Self::new(Client::from_conf(s3_cfg)))
    }

    pub fn inner(&self) -> &Client {
        &self.client
    }
}

// -----------------------------------------------------------------------------
// Error classification
// -----------------------------------------------------------------------------

fn kind_for(code: Option<&str>, status: Option<u16>) -> ErrorKind {
    match code {
        Some("NoSuchKey" | "NoSuchBucket" | "NoSuchUpload" | "NotFound") => ErrorKind::NotFound,
        Some(
            "AccessDenied" | "Forbidden" | "InvalidAccessKeyId" | "SignatureDoesNotMatch"
            | "AllAccessDisabled",
        ) => ErrorKind::PermissionDenied,
        Some("BucketAlreadyOwnedByYou" | "BucketAlreadyExists") => ErrorKind::AlreadyExists,
        Some(
            "SlowDown" | "InternalError" | "ServiceUnavailable" | "RequestTimeout"
            | "RequestTimeTooSkewed",
        ) => ErrorKind::TransientIo,
        Some(
            "InvalidArgument" | "InvalidPart" | "InvalidPartOrder" | "EntityTooSmall"
            | "EntityTooLarge" | "MalformedXML" | "InvalidBucketName" | "KeyTooLongError",
        ) => ErrorKind::InvalidArgument,
        _ => match status {
            Some(404) => ErrorKind::NotFound,
            Some(401 | 403) => ErrorKind::PermissionDenied,
            Some(409) => ErrorKind::AlreadyExists,
            Some(408 | 429) => ErrorKind::TransientIo,
            Some(s) if s >= 500 => ErrorKind::TransientIo,
            Some(400) => ErrorKind::InvalidArgument,
            _ => ErrorKind::Other,
        },
    }
}

fn sdk_error<E>(op: &str, err: SdkError<E, HttpResponse>) -> StorageError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
{
    let kind = match &err {
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) | SdkError::ResponseError(_) => {
            ErrorKind::TransientIo
        }
        SdkError::ConstructionFailure(_) => ErrorKind::InvalidArgument,
        SdkError::ServiceError(se) => kind_for(se.err().code(), Some(se.raw().status().as_u16())),
        _ => ErrorKind::Other,
    };
    StorageError::client(kind, format!("{op}: {}", DisplayErrorContext(&err)))
}

fn to_chrono(dt: &SdkDateTime) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(dt.secs(), dt.subsec_nanos())
}

fn user_metadata(md: &Metadata) -> Option<HashMap<String, String>> {
    let user: HashMap<String, String> = md
        .user_entries()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    (!user.is_empty()).then_some(user)
}

fn metadata_from(user: Option<&HashMap<String, String>>) -> Metadata {
    user.map(|m| m.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
        .unwrap_or_default()
}

/// Every write-shaped request builder exposes the same setters.
macro_rules! apply_put_options {
    ($req:expr, $opts:expr) => {{
        let opts: &PutOptions = $opts;
        let md = &opts.metadata;
        $req.set_acl(opts.acl.as_deref().map(ObjectCannedAcl::from))
            .set_content_type(md.content_type().map(str::to_string))
            .set_cache_control(md.cache_control().map(str::to_string))
            .set_content_encoding(md.content_encoding().map(str::to_string))
            .set_content_disposition(md.content_disposition().map(str::to_string))
            .set_content_language(md.content_language().map(str::to_string))
            .set_metadata(user_metadata(md))
    }};
}

#[async_trait]
impl ObjectStoreClient for AwsS3Client {
    async fn bucket_exists(&self, bucket: &str) -> StorageResult<bool> {
        match self.client.head_bucket().bucket(bucket).send().await {
            Ok(_) => Ok(true),
            Err(e) => match sdk_error("HeadBucket", e) {
                err if err.is_not_found() => Ok(false),
                err => Err(err),
            },
        }
    }

    async fn create_bucket(&self, bucket: &str) -> StorageResult<()> {
        let mut req = self.client.create_bucket().bucket(bucket);
        // us-east-1 rejects an explicit location constraint.
        if let Some(region) = self.region.as_deref().filter(|r| *r != DEFAULT_REGION) {
            let cfg = CreateBucketConfiguration::builder()
                .location_constraint(BucketLocationConstraint::from(region))
                .build();
            req = req.create_bucket_configuration(cfg);
        }
        req.send()
            .await
            .map(|_| ())
            .map_err(|e| sdk_error("CreateBucket", e))
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
        options: &PutOptions,
    ) -> StorageResult<PutOutput> {
        let req = self
            .client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(ByteStream::from(body));
        let resp = apply_put_options!(req, options)
            .send()
            .await
            .map_err(|e| sdk_error("PutObject", e))?;
        Ok(PutOutput {
            e_tag: resp.e_tag().map(str::to_string),
        })
    }

    async fn get_object(&self, bucket: &str, key: &str) -> StorageResult<GetOutput> {
        let resp = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| sdk_error("GetObject", e))?;
        let content_type = resp.content_type().map(str::to_string);
        let metadata = metadata_from(resp.metadata());
        let body = resp
            .body
            .collect()
            .await
            .map_err(|e| StorageError::client(ErrorKind::TransientIo, format!("GetObject body: {e}")))?
            .into_bytes();
        Ok(GetOutput {
            body,
            content_type,
            metadata,
        })
    }

    async fn head_object(&self, bucket: &str, key: &str) -> StorageResult<ObjectHead> {
        let resp = self
            .client
            .head_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| sdk_error("HeadObject", e))?;
        Ok(ObjectHead {
            size: resp.content_length().unwrap_or_default().max(0) as u64,
            last_modified: resp.last_modified().and_then(to_chrono),
            content_type: resp.content_type().map(str::to_string),
            e_tag: resp.e_tag().map(str::to_string),
            metadata: metadata_from(resp.metadata()),
        })
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> StorageResult<()> {
        self.client
            .delete_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map(|_| ())
            .map_err(|e| sdk_error("DeleteObject", e))
    }

    async fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        continuation: Option<String>,
        max_keys: Option<i32>,
    ) -> StorageResult<ListPage> {
        let resp = self
            .client
            .list_objects_v2()
            .bucket(bucket)
            .prefix(prefix)
            .set_continuation_token(continuation)
            .set_max_keys(max_keys)
            .send()
            .await
            .map_err(|e| sdk_error("ListObjectsV2", e))?;

        let objects = resp
            .contents()
            .iter()
            .filter_map(|obj| {
                obj.key().map(|k| ListedObject {
                    key: k.to_string(),
                    size: obj.size().unwrap_or_default().max(0) as u64,
                    last_modified: obj.last_modified().and_then(to_chrono),
                })
            })
            .collect();
        Ok(ListPage {
            objects,
            next_continuation: resp.next_continuation_token().map(str::to_string),
        })
    }

    async fn copy_object(
        &self,
        bucket: &str,
        source_key: &str,
        target_key: &str,
        options: &PutOptions,
    ) -> StorageResult<()> {
        let source = format!("{}/{}", bucket, utf8_percent_encode(source_key, COPY_SOURCE));
        let mut req = self
            .client
            .copy_object()
            .bucket(bucket)
            .key(target_key)
            .copy_source(source);
        if !options.metadata.is_empty() {
            req = req.metadata_directive(MetadataDirective::Replace);
        }
        apply_put_options!(req, options)
            .send()
            .await
            .map(|_| ())
            .map_err(|e| sdk_error("CopyObject", e))
    }

    async fn create_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        options: &PutOptions,
    ) -> StorageResult<String> {
        let req = self.client.create_multipart_upload().bucket(bucket).key(key);
        let resp = apply_put_options!(req, options)
            .send()
            .await
            .map_err(|e| sdk_error("CreateMultipartUpload", e))?;
        match resp.upload_id() {
            Some(id) if !id.is_empty() => Ok(id.to_string()),
            _ => Err(StorageError::client(
                ErrorKind::Other,
                "CreateMultipartUpload returned empty upload_id",
            )),
        }
    }

    async fn upload_part(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        part_number: i32,
        body: Bytes,
    ) -> StorageResult<String> {
        let resp = self
            .client
            .upload_part()
            .bucket(bucket)
            .key(key)
            .upload_id(upload_id)
            .part_number(part_number)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| sdk_error("UploadPart", e))?;
        match resp.e_tag() {
            Some(etag) if !etag.is_empty() => Ok(etag.to_string()),
            _ => Err(StorageError::client(
                ErrorKind::Other,
                format!("UploadPart {part_number} returned empty ETag"),
            )),
        }
    }

    async fn complete_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        parts: &[CompletedPart],
    ) -> StorageResult<()> {
        let completed: Vec<SdkCompletedPart> = parts
            .iter()
            .map(|p| {
                SdkCompletedPart::builder()
                    .part_number(p.part_number)
                    .e_tag(&p.e_tag)
                    .build()
            })
            .collect();
        let cmu = CompletedMultipartUpload::builder()
            .set_parts(Some(completed))
            .build();
        self.client
            .complete_multipart_upload()
            .bucket(bucket)
            .key(key)
            .upload_id(upload_id)
            .multipart_upload(cmu)
            .send()
            .await
            .map(|_| ())
            .map_err(|e| sdk_error("CompleteMultipartUpload", e))
    }

    async fn abort_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
    ) -> StorageResult<()> {
        self.client
            .abort_multipart_upload()
            .bucket(bucket)
            .key(key)
            .upload_id(upload_id)
            .send()
            .await
            .map(|_| ())
            .map_err(|e| sdk_error("AbortMultipartUpload", e))
    }
}
