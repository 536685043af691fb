// tests/test_filesystem.rs
//
// Filesystem facade over a full-featured adapter and over a bare one.

mod common;

use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;

use common::{BUCKET, adapter};
use objfs::metadata::CONTENT_TYPE;
use objfs::{Adapter, Content, ErrorKind, Filesystem, Metadata, StorageError, StorageResult};

#[tokio::test]
async fn write_refuses_to_overwrite_unless_asked() -> Result<()> {
    let (client, adapter) = adapter();
    let fs = Filesystem::new(adapter);

    fs.write("note", "first", false).await?;
    let err = fs.write("note", "second", false).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AlreadyExists);
    assert_eq!(client.object(BUCKET, "note"), Some(Bytes::from_static(b"first")));

    fs.write("note", "second", true).await?;
    assert_eq!(fs.read("note").await?, Bytes::from_static(b"second"));
    Ok(())
}

#[tokio::test]
async fn rename_checks_source_and_target() -> Result<()> {
    let (_client, adapter) = adapter();
    let fs = Filesystem::new(adapter);
    fs.write("a", "1", true).await?;
    fs.write("b", "2", true).await?;

    assert_eq!(fs.rename("missing", "c").await.unwrap_err().kind(), ErrorKind::NotFound);
    assert_eq!(fs.rename("a", "b").await.unwrap_err().kind(), ErrorKind::AlreadyExists);

    fs.rename("a", "c").await?;
    assert!(!fs.has("a").await?);
    assert_eq!(fs.read("c").await?, Bytes::from_static(b"1"));
    Ok(())
}

#[tokio::test]
async fn checksum_is_hex_md5() -> Result<()> {
    let (_client, adapter) = adapter();
    let fs = Filesystem::new(adapter);
    fs.write("hello", "hello", true).await?;

    assert_eq!(fs.checksum("hello").await?, "5d41402abc4b2a76b9719d911017c592");
    Ok(())
}

#[tokio::test]
async fn capability_helpers_delegate_to_the_adapter() -> Result<()> {
    let (_client, adapter) = adapter();
    let fs = Filesystem::new(adapter);
    fs.set_metadata("dir/page.html", Metadata::new().with(CONTENT_TYPE, "text/html"))?;
    fs.write("dir/page.html", "<p>hi</p>", true).await?;
    fs.write("dir/other", "x", true).await?;

    assert_eq!(fs.size("dir/page.html").await?, 9);
    assert_eq!(fs.mime_type("dir/page.html").await?, "text/html");
    assert!(fs.mtime("dir/page.html").await.is_ok());
    assert!(fs.is_directory("dir").await?);
    assert_eq!(fs.list_keys("dir/").await?, vec!["dir/other", "dir/page.html"]);
    assert_eq!(fs.keys().await?.len(), 2);
    assert_eq!(fs.get_metadata("dir/page.html")?.content_type(), Some("text/html"));

    fs.delete("dir/other").await?;
    assert!(!fs.has("dir/other").await?);
    Ok(())
}

/// Core operations only; no optional capabilities.
#[derive(Default)]
struct BareAdapter {
    objects: Mutex<HashMap<String, Bytes>>,
}

#[async_trait]
impl Adapter for BareAdapter {
    async fn read(&self, key: &str) -> StorageResult<Bytes> {
        self.objects
            .lock()
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::not_found("no such key").for_op("read", key))
    }

    async fn write(&self, key: &str, content: Content) -> StorageResult<u64> {
        let body = content.into_bytes().await?;
        let len = body.len() as u64;
        self.objects.lock().insert(key.to_string(), body);
        Ok(len)
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        Ok(self.objects.lock().contains_key(key))
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        self.objects.lock().remove(key);
        Ok(())
    }

    async fn rename(&self, source: &str, target: &str) -> StorageResult<()> {
        let mut objects = self.objects.lock();
        let body = objects
            .remove(source)
            .ok_or_else(|| StorageError::not_found("no such key").for_op("rename", source))?;
        objects.insert(target.to_string(), body);
        Ok(())
    }
}

#[tokio::test]
async fn missing_capabilities_are_reported_not_faked() -> Result<()> {
    let fs = Filesystem::new(BareAdapter::default());
    fs.write("k", "12345", true).await?;

    // Size falls back to reading the content.
    assert_eq!(fs.size("k").await?, 5);

    assert_eq!(fs.keys().await.unwrap_err().kind(), ErrorKind::InvalidArgument);
    assert_eq!(fs.mtime("k").await.unwrap_err().kind(), ErrorKind::InvalidArgument);
    assert_eq!(fs.mime_type("k").await.unwrap_err().kind(), ErrorKind::InvalidArgument);
    assert_eq!(fs.is_directory("k").await.unwrap_err().kind(), ErrorKind::InvalidArgument);
    assert_eq!(
        fs.set_metadata("k", Metadata::new()).unwrap_err().kind(),
        ErrorKind::InvalidArgument
    );
    assert!(fs.get_metadata("k").is_err());
    Ok(())
}

#[tokio::test]
async fn streamed_file_through_the_facade() -> Result<()> {
    let (_client, adapter) = adapter();
    let fs = Filesystem::new(adapter);
    let mut file = tempfile::NamedTempFile::new()?;
    std::io::Write::write_all(&mut file, b"on disk")?;

    let written = fs.write("copied", Content::from_file(file.path()).await?, true).await?;
    assert_eq!(written, 7);
    assert_eq!(fs.read("copied").await?, Bytes::from_static(b"on disk"));
    Ok(())
}
