// src/multipart.rs
//
// Streaming multipart upload (MPU) for payloads too large to buffer.
//
// Design:
// - UploadSession owns one backend upload id and the ordered list of
//   acknowledged parts: Initiated -> Uploading -> Completed | Aborted.
// - MultipartUploadCoordinator drains a reader one part_size chunk at a time,
//   uploads parts strictly in order starting at 1, and completes the upload
//   only after the reader is exhausted. Any failure aborts the session so no
//   partial object becomes visible.
// - A session dropped before completion fires a best-effort abort on the
//   current runtime (abort_on_drop).

use std::sync::Arc;
use std::time::SystemTime;

use bytes::Bytes;
use tokio::io::AsyncRead;
use tracing::{debug, info, warn};

use crate::client::{CompletedPart, ObjectStoreClient, PutOptions};
use crate::constants::{DEFAULT_PART_SIZE, MAX_MULTIPART_PARTS, MAX_SINGLE_PUT_SIZE, MIN_MULTIPART_PART_SIZE};
use crate::content::read_up_to;
use crate::error::{StorageError, StorageResult};

#[derive(Clone, Debug)]
pub struct MultipartUploadConfig {
    /// Size of every part except the last (S3 minimum is 5 MiB).
    pub part_size: u64,
    /// Abort the MPU automatically if the session is dropped unfinished.
    pub abort_on_drop: bool,
}

impl Default for MultipartUploadConfig {
    fn default() -> Self {
        Self {
            part_size: DEFAULT_PART_SIZE,
            abort_on_drop: true,
        }
    }
}

/// Result info returned once the upload is completed.
#[derive(Clone, Debug)]
pub struct MultipartCompleteInfo {
    pub upload_id: String,
    pub total_bytes: u64,
    pub parts: usize,
    pub started_at: SystemTime,
    pub completed_at: SystemTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadState {
    Initiated,
    Uploading,
    Completed,
    Aborted,
}

impl UploadState {
    pub fn is_open(self) -> bool {
        matches!(self, UploadState::Initiated | UploadState::Uploading)
    }
}

/// One in-flight multipart upload.
pub struct UploadSession {
    client: Arc<dyn ObjectStoreClient>,
    bucket: String,
    key: String,
    upload_id: String,
    state: UploadState,
    parts: Vec<CompletedPart>,
    next_part_number: i32,
    total_bytes: u64,
    started_at: SystemTime,
    abort_on_drop: bool,
}

impl std::fmt::Debug for UploadSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadSession")
            .field("bucket", &self.bucket)
            .field("key", &self.key)
            .field("upload_id", &self.upload_id)
            .field("state", &self.state)
            .field("parts", &self.parts.len())
            .field("total_bytes", &self.total_bytes)
            .finish()
    }
}

impl Drop for UploadSession {
    fn drop(&mut self) {
        if !self.abort_on_drop || !self.state.is_open() {
            return;
        }
        // Can't .await here. Fire-and-forget on the current runtime, if any.
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!(
                "Multipart upload {} for {} dropped outside a runtime; not aborted",
                self.upload_id, self.key
            );
            return;
        };
        let client = self.client.clone();
        let bucket = self.bucket.clone();
        let key = self.key.clone();
        let upload_id = self.upload_id.clone();
        debug!("Aborting dropped multipart upload {} for {}", upload_id, key);
        handle.spawn(async move {
            if let Err(e) = client.abort_multipart_upload(&bucket, &key, &upload_id).await {
                warn!("Abort of dropped multipart upload {} failed: {}", upload_id, e);
            }
        });
    }
}

impl UploadSession {
    /// Issues create-multipart-upload for `key` with its resolved options.
    pub async fn initiate(
        client: Arc<dyn ObjectStoreClient>,
        bucket: &str,
        key: &str,
        options: &PutOptions,
        abort_on_drop: bool,
    ) -> StorageResult<Self> {
        let upload_id = client.create_multipart_upload(bucket, key, options).await?;
        if upload_id.is_empty() {
            return Err(StorageError::client(
                crate::error::ErrorKind::Other,
                "CreateMultipartUpload returned empty upload_id",
            ));
        }
        debug!("Initiated multipart upload {} for {}", upload_id, key);
        Ok(Self {
            client,
            bucket: bucket.to_string(),
            key: key.to_string(),
            upload_id,
            state: UploadState::Initiated,
            parts: Vec::new(),
            next_part_number: 1,
            total_bytes: 0,
            started_at: SystemTime::now(),
            abort_on_drop,
        })
    }

    pub fn upload_id(&self) -> &str {
        &self.upload_id
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn state(&self) -> UploadState {
        self.state
    }

    /// Acknowledged parts in submission order.
    pub fn parts(&self) -> &[CompletedPart] {
        &self.parts
    }

    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    /// Upload `body` as the next part. Returns its part number.
    pub async fn upload_part(&mut self, body: Bytes) -> StorageResult<i32> {
        if !self.state.is_open() {
            return Err(StorageError::invalid(format!(
                "multipart upload {} is {:?}",
                self.upload_id, self.state
            )));
        }
        if body.is_empty() {
            return Err(StorageError::invalid("refusing to upload an empty part"));
        }
        if self.next_part_number > MAX_MULTIPART_PARTS {
            return Err(StorageError::invalid(format!(
                "multipart upload for {} needs more than {} parts",
                self.key, MAX_MULTIPART_PARTS
            )));
        }

        let part_number = self.next_part_number;
        let len = body.len() as u64;
        let e_tag = self
            .client
            .upload_part(&self.bucket, &self.key, &self.upload_id, part_number, body)
            .await?;
        debug!(
            "Uploaded part {} ({} bytes) of {} [{}]",
            part_number, len, self.key, self.upload_id
        );

        self.parts.push(CompletedPart { part_number, e_tag });
        self.next_part_number += 1;
        self.total_bytes += len;
        self.state = UploadState::Uploading;
        Ok(part_number)
    }

    /// Issue complete-upload with the ordered part list. Only this makes the
    /// object visible.
    pub async fn complete(&mut self) -> StorageResult<MultipartCompleteInfo> {
        if self.state != UploadState::Uploading {
            return Err(StorageError::invalid(format!(
                "cannot complete multipart upload {} in state {:?}",
                self.upload_id, self.state
            )));
        }
        self.client
            .complete_multipart_upload(&self.bucket, &self.key, &self.upload_id, &self.parts)
            .await?;
        self.state = UploadState::Completed;
        info!(
            "Completed multipart upload of {} ({} parts, {} bytes)",
            self.key,
            self.parts.len(),
            self.total_bytes
        );
        Ok(MultipartCompleteInfo {
            upload_id: self.upload_id.clone(),
            total_bytes: self.total_bytes,
            parts: self.parts.len(),
            started_at: self.started_at,
            completed_at: SystemTime::now(),
        })
    }

    /// Abort the upload so the backend discards stored parts. The session is
    /// marked Aborted even if the call fails.
    pub async fn abort(&mut self) -> StorageResult<()> {
        if !self.state.is_open() {
            return Ok(());
        }
        self.state = UploadState::Aborted;
        self.client
            .abort_multipart_upload(&self.bucket, &self.key, &self.upload_id)
            .await?;
        info!("Aborted multipart upload {} for {}", self.upload_id, self.key);
        Ok(())
    }
}

/// Drives a reader through an [`UploadSession`].
#[derive(Clone)]
pub struct MultipartUploadCoordinator {
    client: Arc<dyn ObjectStoreClient>,
    cfg: MultipartUploadConfig,
}

impl std::fmt::Debug for MultipartUploadCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MultipartUploadCoordinator")
            .field("cfg", &self.cfg)
            .finish_non_exhaustive()
    }
}

impl MultipartUploadCoordinator {
    pub fn new(client: Arc<dyn ObjectStoreClient>, cfg: MultipartUploadConfig) -> StorageResult<Self> {
        if cfg.part_size < MIN_MULTIPART_PART_SIZE {
            return Err(StorageError::Config(
                "part_size must be at least 5 MiB for multipart upload".into(),
            ));
        }
        if cfg.part_size > MAX_SINGLE_PUT_SIZE {
            return Err(StorageError::Config(
                "part_size must be at most 5 GiB for multipart upload".into(),
            ));
        }
        Ok(Self { client, cfg })
    }

    pub fn part_size(&self) -> u64 {
        self.cfg.part_size
    }

    /// Upload everything `reader` yields to `key` as one object.
    ///
    /// Parts are `part_size` bytes except the last. On any read or part
    /// failure the upload is aborted and the original error returned; a failed
    /// abort is only logged.
    pub async fn upload<R>(
        &self,
        bucket: &str,
        key: &str,
        options: &PutOptions,
        reader: &mut R,
    ) -> StorageResult<MultipartCompleteInfo>
    where
        R: AsyncRead + Unpin + Send + ?Sized,
    {
        let mut session = UploadSession::initiate(
            self.client.clone(),
            bucket,
            key,
            options,
            self.cfg.abort_on_drop,
        )
        .await?;

        let outcome = match self.drive(&mut session, reader).await {
            Ok(()) => session.complete().await,
            Err(e) => Err(e),
        };

        match outcome {
            Ok(info) => Ok(info),
            Err(e) => {
                warn!(
                    "Multipart upload {} for {} failed after {} part(s): {}",
                    session.upload_id(),
                    key,
                    session.parts().len(),
                    e
                );
                if let Err(abort_err) = session.abort().await {
                    warn!("Abort of multipart upload {} failed: {}", session.upload_id(), abort_err);
                }
                Err(e)
            }
        }
    }

    async fn drive<R>(&self, session: &mut UploadSession, reader: &mut R) -> StorageResult<()>
    where
        R: AsyncRead + Unpin + Send + ?Sized,
    {
        loop {
            let chunk = read_up_to(&mut *reader, self.cfg.part_size).await?;
            if chunk.is_empty() {
                break;
            }
            let exhausted = (chunk.len() as u64) < self.cfg.part_size;
            session.upload_part(Bytes::from(chunk)).await?;
            if exhausted {
                break;
            }
        }
        if session.parts().is_empty() {
            return Err(StorageError::invalid(format!(
                "stream for {} yielded no data",
                session.key()
            )));
        }
        Ok(())
    }
}
