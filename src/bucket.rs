// src/bucket.rs
//
// Copyright, 2025.  Signal65 / Futurum Group.
//
// Lazy verification (and optional creation) of the backing bucket.

use std::sync::atomic::{AtomicU8, Ordering};

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::client::ObjectStoreClient;
use crate::error::{ErrorKind, StorageError, StorageResult};

/// Cached knowledge about the backing bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BucketState {
    /// Not yet checked in this adapter's lifetime.
    Unchecked,
    /// Present (found or created). Never re-checked.
    Exists,
    /// Missing with auto-create disabled. Every operation fails fast.
    Failed,
}

impl BucketState {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => BucketState::Exists,
            2 => BucketState::Failed,
            _ => BucketState::Unchecked,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            BucketState::Unchecked => 0,
            BucketState::Exists => 1,
            BucketState::Failed => 2,
        }
    }
}

/// Gates adapter operations on the bucket existing.
///
/// The Unchecked → Exists/Failed transition runs under a mutex, so concurrent
/// first use through one adapter issues a single existence check and at most
/// one create. A create rejected as "already exists" (another process won the
/// race) counts as success. Transient failures leave the state Unchecked.
#[derive(Debug)]
pub struct BucketGuard {
    bucket: String,
    create: bool,
    state: AtomicU8,
    transition: Mutex<()>,
}

impl BucketGuard {
    pub fn new(bucket: impl Into<String>, create: bool) -> Self {
        Self {
            bucket: bucket.into(),
            create,
            state: AtomicU8::new(BucketState::Unchecked.as_u8()),
            transition: Mutex::new(()),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn state(&self) -> BucketState {
        BucketState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: BucketState) {
        self.state.store(state.as_u8(), Ordering::Release);
    }

    fn missing(&self) -> StorageError {
        StorageError::BucketMissing {
            bucket: self.bucket.clone(),
        }
    }

    /// Ok once the bucket is known to exist.
    pub async fn ensure(&self, client: &dyn ObjectStoreClient) -> StorageResult<()> {
        match self.state() {
            BucketState::Exists => return Ok(()),
            BucketState::Failed => return Err(self.missing()),
            BucketState::Unchecked => {}
        }

        let _transition = self.transition.lock().await;
        // Another task may have finished the check while we waited.
        match self.state() {
            BucketState::Exists => return Ok(()),
            BucketState::Failed => return Err(self.missing()),
            BucketState::Unchecked => {}
        }

        if client.bucket_exists(&self.bucket).await? {
            debug!("Bucket {} exists", self.bucket);
            self.set_state(BucketState::Exists);
            return Ok(());
        }

        if !self.create {
            warn!("Bucket {} does not exist and create is disabled", self.bucket);
            self.set_state(BucketState::Failed);
            return Err(self.missing());
        }

        match client.create_bucket(&self.bucket).await {
            Ok(()) => info!("Created bucket {}", self.bucket),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                debug!("Bucket {} was created concurrently: {}", self.bucket, e)
            }
            Err(e) => return Err(e),
        }
        self.set_state(BucketState::Exists);
        Ok(())
    }
}
