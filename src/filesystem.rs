// src/filesystem.rs
//
// Caller-facing wrapper over any Adapter: existence guards for write/rename
// and capability-backed helpers that fail cleanly when a backend lacks them.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use md5::{Digest, Md5};

use crate::adapter::Adapter;
use crate::content::Content;
use crate::error::{ErrorKind, StorageError, StorageResult};
use crate::metadata::Metadata;

#[derive(Debug)]
pub struct Filesystem<A: Adapter> {
    adapter: A,
}

fn unsupported(op: &'static str, key: &str, capability: &str) -> StorageError {
    StorageError::invalid(format!("adapter cannot {capability}")).for_op(op, key)
}

impl<A: Adapter> Filesystem<A> {
    pub fn new(adapter: A) -> Self {
        Self { adapter }
    }

    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    pub fn into_inner(self) -> A {
        self.adapter
    }

    pub async fn has(&self, key: &str) -> StorageResult<bool> {
        self.adapter.exists(key).await
    }

    pub async fn read(&self, key: &str) -> StorageResult<Bytes> {
        self.adapter.read(key).await
    }

    /// Write `content` to `key`. With `overwrite == false` an existing key is
    /// an `AlreadyExists` error and nothing is written.
    pub async fn write(&self, key: &str, content: impl Into<Content>, overwrite: bool) -> StorageResult<u64> {
        if !overwrite && self.has(key).await? {
            return Err(StorageError::client(ErrorKind::AlreadyExists, "key already exists").for_op("write", key));
        }
        self.adapter.write(key, content.into()).await
    }

    pub async fn rename(&self, source: &str, target: &str) -> StorageResult<()> {
        if !self.has(source).await? {
            return Err(StorageError::not_found("source key does not exist").for_op("rename", source));
        }
        if self.has(target).await? {
            return Err(StorageError::client(ErrorKind::AlreadyExists, "target key already exists")
                .for_op("rename", target));
        }
        self.adapter.rename(source, target).await
    }

    pub async fn delete(&self, key: &str) -> StorageResult<()> {
        self.adapter.delete(key).await
    }

    pub async fn keys(&self) -> StorageResult<Vec<String>> {
        self.list_keys("").await
    }

    pub async fn list_keys(&self, prefix: &str) -> StorageResult<Vec<String>> {
        match self.adapter.as_list_keys_aware() {
            Some(lister) => lister.list_keys(prefix).await,
            None => Err(unsupported("list_keys", prefix, "list keys")),
        }
    }

    /// Object size, from the backend when it can report one, otherwise by
    /// reading the content.
    pub async fn size(&self, key: &str) -> StorageResult<u64> {
        match self.adapter.as_size_calculator() {
            Some(calc) => calc.size(key).await,
            None => Ok(self.read(key).await?.len() as u64),
        }
    }

    pub async fn mtime(&self, key: &str) -> StorageResult<DateTime<Utc>> {
        match self.adapter.as_mtime_calculator() {
            Some(calc) => calc.mtime(key).await,
            None => Err(unsupported("mtime", key, "report modification times")),
        }
    }

    pub async fn mime_type(&self, key: &str) -> StorageResult<String> {
        match self.adapter.as_mime_type_provider() {
            Some(provider) => provider.mime_type(key).await,
            None => Err(unsupported("mime_type", key, "report content types")),
        }
    }

    pub async fn is_directory(&self, key: &str) -> StorageResult<bool> {
        match self.adapter.as_directory_aware() {
            Some(dirs) => dirs.is_directory(key).await,
            None => Err(unsupported("is_directory", key, "detect directories")),
        }
    }

    /// Lowercase hex MD5 of the object content.
    pub async fn checksum(&self, key: &str) -> StorageResult<String> {
        let body = self.read(key).await?;
        Ok(hex::encode(Md5::digest(&body)))
    }

    pub fn set_metadata(&self, key: &str, metadata: Metadata) -> StorageResult<()> {
        match self.adapter.as_metadata_supporter() {
            Some(store) => {
                store.set_metadata(key, metadata);
                Ok(())
            }
            None => Err(unsupported("set_metadata", key, "store metadata")),
        }
    }

    pub fn get_metadata(&self, key: &str) -> StorageResult<Metadata> {
        match self.adapter.as_metadata_supporter() {
            Some(store) => Ok(store.get_metadata(key)),
            None => Err(unsupported("get_metadata", key, "store metadata")),
        }
    }
}
