// src/client/memory.rs
//
// In-process ObjectStoreClient. Emulates S3 bucket, object and multipart
// semantics closely enough to exercise the adapter without a network, and
// records every call so tests can assert on the exact request sequence.

use std::collections::{BTreeMap, HashMap, HashSet};

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use chrono::{DateTime, Utc};
use md5::{Digest, Md5};
use parking_lot::Mutex;
use uuid::Uuid;

use super::{
    CompletedPart, GetOutput, ListPage, ListedObject, ObjectHead, ObjectStoreClient, PutOptions,
    PutOutput,
};
use crate::constants::{DEFAULT_LIST_PAGE_SIZE, MIN_MULTIPART_PART_SIZE};
use crate::error::{ErrorKind, StorageError, StorageResult};
use crate::metadata::Metadata;

/// One request received by a [`MemoryClient`], in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientCall {
    BucketExists { bucket: String },
    CreateBucket { bucket: String },
    PutObject { key: String, len: usize },
    GetObject { key: String },
    HeadObject { key: String },
    DeleteObject { key: String },
    ListObjects { prefix: String, max_keys: Option<i32> },
    CopyObject { source: String, target: String },
    CreateMultipartUpload { key: String },
    UploadPart { key: String, part_number: i32, len: usize },
    CompleteMultipartUpload { key: String, part_numbers: Vec<i32> },
    AbortMultipartUpload { key: String },
}

#[derive(Debug, Clone)]
struct StoredObject {
    body: Bytes,
    options: PutOptions,
    e_tag: String,
    last_modified: DateTime<Utc>,
}

impl StoredObject {
    fn new(body: Bytes, options: PutOptions, e_tag: String) -> Self {
        Self {
            body,
            options,
            e_tag,
            last_modified: Utc::now(),
        }
    }

    fn user_metadata(&self) -> Metadata {
        self.options.metadata.user_entries().collect()
    }
}

#[derive(Debug)]
struct PendingUpload {
    bucket: String,
    key: String,
    options: PutOptions,
    parts: BTreeMap<i32, (String, Bytes)>,
}

#[derive(Debug, Default)]
struct State {
    buckets: BTreeMap<String, BTreeMap<String, StoredObject>>,
    uploads: HashMap<String, PendingUpload>,
}

#[derive(Debug, Default)]
struct Faults {
    all: Option<ErrorKind>,
    upload_part: Option<(i32, ErrorKind)>,
    delete_keys: HashSet<String>,
    abort: bool,
}

/// In-memory S3-style client.
///
/// ```
/// use objfs::client::MemoryClient;
/// let client = MemoryClient::new().with_bucket("media");
/// assert!(client.has_bucket("media"));
/// ```
#[derive(Debug)]
pub struct MemoryClient {
    state: Mutex<State>,
    faults: Mutex<Faults>,
    calls: Mutex<Vec<ClientCall>>,
    page_size: i32,
}

impl Default for MemoryClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryClient {
    /// A client with no buckets.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
            faults: Mutex::new(Faults::default()),
            calls: Mutex::new(Vec::new()),
            page_size: DEFAULT_LIST_PAGE_SIZE,
        }
    }

    pub fn with_bucket(self, bucket: &str) -> Self {
        self.state
            .lock()
            .buckets
            .entry(bucket.to_string())
            .or_default();
        self
    }

    /// Cap listing pages at `page_size` keys regardless of the requested maximum.
    pub fn with_page_size(mut self, page_size: i32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    // ---- inspection ------------------------------------------------------

    pub fn calls(&self) -> Vec<ClientCall> {
        self.calls.lock().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    pub fn create_bucket_calls(&self) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| matches!(c, ClientCall::CreateBucket { .. }))
            .count()
    }

    pub fn has_bucket(&self, bucket: &str) -> bool {
        self.state.lock().buckets.contains_key(bucket)
    }

    /// Raw stored body, bypassing the call journal.
    pub fn object(&self, bucket: &str, key: &str) -> Option<Bytes> {
        self.state
            .lock()
            .buckets
            .get(bucket)
            .and_then(|b| b.get(key))
            .map(|o| o.body.clone())
    }

    /// Options the object was last written or copied with.
    pub fn object_options(&self, bucket: &str, key: &str) -> Option<PutOptions> {
        self.state
            .lock()
            .buckets
            .get(bucket)
            .and_then(|b| b.get(key))
            .map(|o| o.options.clone())
    }

    pub fn pending_uploads(&self) -> usize {
        self.state.lock().uploads.len()
    }

    /// Seed an object directly, bypassing the call journal.
    pub fn insert_object(&self, bucket: &str, key: &str, body: impl Into<Bytes>) {
        let body = body.into();
        let e_tag = etag_of(&body);
        self.state
            .lock()
            .buckets
            .entry(bucket.to_string())
            .or_default()
            .insert(key.to_string(), StoredObject::new(body, PutOptions::default(), e_tag));
    }

    // ---- fault injection -------------------------------------------------

    /// Every subsequent call fails with `kind`.
    pub fn fail_all_with(&self, kind: ErrorKind) {
        self.faults.lock().all = Some(kind);
    }

    /// Uploading part `part_number` fails with `kind`.
    pub fn fail_upload_part(&self, part_number: i32, kind: ErrorKind) {
        self.faults.lock().upload_part = Some((part_number, kind));
    }

    /// Deleting `key` fails with `PermissionDenied`.
    pub fn fail_delete(&self, key: &str) {
        self.faults.lock().delete_keys.insert(key.to_string());
    }

    /// Abort calls fail (the pending upload is left in place).
    pub fn fail_abort(&self) {
        self.faults.lock().abort = true;
    }

    pub fn clear_faults(&self) {
        *self.faults.lock() = Faults::default();
    }

    // ---- internals -------------------------------------------------------

    fn record(&self, call: ClientCall) -> StorageResult<()> {
        self.calls.lock().push(call);
        match self.faults.lock().all {
            Some(kind) => Err(StorageError::client(kind, "injected failure")),
            None => Ok(()),
        }
    }
}

fn etag_of(body: &[u8]) -> String {
    format!("\"{}\"", hex::encode(Md5::digest(body)))
}

fn no_such_bucket(bucket: &str) -> StorageError {
    StorageError::not_found(format!("NoSuchBucket: {bucket}"))
}

fn no_such_key(key: &str) -> StorageError {
    StorageError::not_found(format!("NoSuchKey: {key}"))
}

#[async_trait]
impl ObjectStoreClient for MemoryClient {
    async fn bucket_exists(&self, bucket: &str) -> StorageResult<bool> {
        self.record(ClientCall::BucketExists {
            bucket: bucket.to_string(),
        })?;
        Ok(self.has_bucket(bucket))
    }

    async fn create_bucket(&self, bucket: &str) -> StorageResult<()> {
        self.record(ClientCall::CreateBucket {
            bucket: bucket.to_string(),
        })?;
        let mut state = self.state.lock();
        if state.buckets.contains_key(bucket) {
            return Err(StorageError::client(
                ErrorKind::AlreadyExists,
                format!("BucketAlreadyOwnedByYou: {bucket}"),
            ));
        }
        state.buckets.insert(bucket.to_string(), BTreeMap::new());
        Ok(())
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
        options: &PutOptions,
    ) -> StorageResult<PutOutput> {
        self.record(ClientCall::PutObject {
            key: key.to_string(),
            len: body.len(),
        })?;
        let mut state = self.state.lock();
        let objects = state
            .buckets
            .get_mut(bucket)
            .ok_or_else(|| no_such_bucket(bucket))?;
        let e_tag = etag_of(&body);
        objects.insert(
            key.to_string(),
            StoredObject::new(body, options.clone(), e_tag.clone()),
        );
        Ok(PutOutput { e_tag: Some(e_tag) })
    }

    async fn get_object(&self, bucket: &str, key: &str) -> StorageResult<GetOutput> {
        self.record(ClientCall::GetObject {
            key: key.to_string(),
        })?;
        let state = self.state.lock();
        let object = state
            .buckets
            .get(bucket)
            .ok_or_else(|| no_such_bucket(bucket))?
            .get(key)
            .ok_or_else(|| no_such_key(key))?;
        Ok(GetOutput {
            body: object.body.clone(),
            content_type: object.options.content_type().map(str::to_string),
            metadata: object.user_metadata(),
        })
    }

    async fn head_object(&self, bucket: &str, key: &str) -> StorageResult<ObjectHead> {
        self.record(ClientCall::HeadObject {
            key: key.to_string(),
        })?;
        let state = self.state.lock();
        let object = state
            .buckets
            .get(bucket)
            .ok_or_else(|| no_such_bucket(bucket))?
            .get(key)
            .ok_or_else(|| no_such_key(key))?;
        Ok(ObjectHead {
            size: object.body.len() as u64,
            last_modified: Some(object.last_modified),
            content_type: object.options.content_type().map(str::to_string),
            e_tag: Some(object.e_tag.clone()),
            metadata: object.user_metadata(),
        })
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> StorageResult<()> {
        self.record(ClientCall::DeleteObject {
            key: key.to_string(),
        })?;
        if self.faults.lock().delete_keys.contains(key) {
            return Err(StorageError::client(
                ErrorKind::PermissionDenied,
                format!("AccessDenied: {key}"),
            ));
        }
        let mut state = self.state.lock();
        let objects = state
            .buckets
            .get_mut(bucket)
            .ok_or_else(|| no_such_bucket(bucket))?;
        // S3 reports success for absent keys.
        objects.remove(key);
        Ok(())
    }

    async fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        continuation: Option<String>,
        max_keys: Option<i32>,
    ) -> StorageResult<ListPage> {
        self.record(ClientCall::ListObjects {
            prefix: prefix.to_string(),
            max_keys,
        })?;
        let state = self.state.lock();
        let objects = state
            .buckets
            .get(bucket)
            .ok_or_else(|| no_such_bucket(bucket))?;
        let limit = max_keys.unwrap_or(self.page_size).clamp(1, self.page_size) as usize;

        let mut matching = objects
            .iter()
            .filter(|(k, _)| k.starts_with(prefix))
            .filter(|(k, _)| continuation.as_deref().is_none_or(|after| k.as_str() > after));

        let mut page = ListPage::default();
        for (key, object) in matching.by_ref().take(limit) {
            page.objects.push(ListedObject {
                key: key.clone(),
                size: object.body.len() as u64,
                last_modified: Some(object.last_modified),
            });
        }
        if matching.next().is_some() {
            page.next_continuation = page.objects.last().map(|o| o.key.clone());
        }
        Ok(page)
    }

    async fn copy_object(
        &self,
        bucket: &str,
        source_key: &str,
        target_key: &str,
        options: &PutOptions,
    ) -> StorageResult<()> {
        self.record(ClientCall::CopyObject {
            source: source_key.to_string(),
            target: target_key.to_string(),
        })?;
        let mut state = self.state.lock();
        let objects = state
            .buckets
            .get_mut(bucket)
            .ok_or_else(|| no_such_bucket(bucket))?;
        let source = objects
            .get(source_key)
            .ok_or_else(|| no_such_key(source_key))?;

        let mut copied_options = if options.metadata.is_empty() {
            source.options.clone()
        } else {
            options.clone()
        };
        if options.acl.is_some() {
            copied_options.acl = options.acl.clone();
        }
        let copy = StoredObject::new(source.body.clone(), copied_options, source.e_tag.clone());
        objects.insert(target_key.to_string(), copy);
        Ok(())
    }

    async fn create_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        options: &PutOptions,
    ) -> StorageResult<String> {
        self.record(ClientCall::CreateMultipartUpload {
            key: key.to_string(),
        })?;
        let mut state = self.state.lock();
        if !state.buckets.contains_key(bucket) {
            return Err(no_such_bucket(bucket));
        }
        let upload_id = Uuid::new_v4().simple().to_string();
        state.uploads.insert(
            upload_id.clone(),
            PendingUpload {
                bucket: bucket.to_string(),
                key: key.to_string(),
                options: options.clone(),
                parts: BTreeMap::new(),
            },
        );
        Ok(upload_id)
    }

    async fn upload_part(
        &self,
        _bucket: &str,
        key: &str,
        upload_id: &str,
        part_number: i32,
        body: Bytes,
    ) -> StorageResult<String> {
        self.record(ClientCall::UploadPart {
            key: key.to_string(),
            part_number,
            len: body.len(),
        })?;
        if let Some((failing, kind)) = self.faults.lock().upload_part {
            if failing == part_number {
                return Err(StorageError::client(
                    kind,
                    format!("injected failure on part {part_number}"),
                ));
            }
        }
        let mut state = self.state.lock();
        let upload = state
            .uploads
            .get_mut(upload_id)
            .ok_or_else(|| StorageError::not_found(format!("NoSuchUpload: {upload_id}")))?;
        let e_tag = etag_of(&body);
        upload.parts.insert(part_number, (e_tag.clone(), body));
        Ok(e_tag)
    }

    async fn complete_multipart_upload(
        &self,
        _bucket: &str,
        key: &str,
        upload_id: &str,
        parts: &[CompletedPart],
    ) -> StorageResult<()> {
        self.record(ClientCall::CompleteMultipartUpload {
            key: key.to_string(),
            part_numbers: parts.iter().map(|p| p.part_number).collect(),
        })?;
        let mut state = self.state.lock();
        let upload = state
            .uploads
            .get(upload_id)
            .ok_or_else(|| StorageError::not_found(format!("NoSuchUpload: {upload_id}")))?;

        if parts.is_empty() {
            return Err(StorageError::invalid("MalformedXML: no parts"));
        }
        if parts.windows(2).any(|w| w[0].part_number >= w[1].part_number) {
            return Err(StorageError::invalid("InvalidPartOrder"));
        }

        let mut body = BytesMut::new();
        let mut digests = Vec::with_capacity(parts.len() * 16);
        for (i, part) in parts.iter().enumerate() {
            let (e_tag, data) = upload
                .parts
                .get(&part.part_number)
                .ok_or_else(|| StorageError::invalid(format!("InvalidPart: {}", part.part_number)))?;
            if *e_tag != part.e_tag {
                return Err(StorageError::invalid(format!(
                    "InvalidPart: etag mismatch on {}",
                    part.part_number
                )));
            }
            if i + 1 < parts.len() && (data.len() as u64) < MIN_MULTIPART_PART_SIZE {
                return Err(StorageError::invalid(format!(
                    "EntityTooSmall: part {}",
                    part.part_number
                )));
            }
            digests.extend_from_slice(&Md5::digest(data));
            body.extend_from_slice(data);
        }

        let e_tag = format!("\"{}-{}\"", hex::encode(Md5::digest(&digests)), parts.len());
        let Some(upload) = state.uploads.remove(upload_id) else {
            return Err(StorageError::not_found(format!("NoSuchUpload: {upload_id}")));
        };
        let objects = state
            .buckets
            .get_mut(&upload.bucket)
            .ok_or_else(|| no_such_bucket(&upload.bucket))?;
        objects.insert(
            upload.key,
            StoredObject::new(body.freeze(), upload.options, e_tag),
        );
        Ok(())
    }

    async fn abort_multipart_upload(
        &self,
        _bucket: &str,
        key: &str,
        upload_id: &str,
    ) -> StorageResult<()> {
        self.record(ClientCall::AbortMultipartUpload {
            key: key.to_string(),
        })?;
        if self.faults.lock().abort {
            return Err(StorageError::client(ErrorKind::TransientIo, "injected abort failure"));
        }
        match self.state.lock().uploads.remove(upload_id) {
            Some(_) => Ok(()),
            None => Err(StorageError::not_found(format!("NoSuchUpload: {upload_id}"))),
        }
    }
}
