// src/content.rs
//
// Write payloads: either a fully materialized buffer or a streaming reader
// that is only drained as it is uploaded.

use std::fmt;
use std::io::Cursor;
use std::path::Path;

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::StorageResult;

/// Boxed async byte source.
pub type DynReader = Box<dyn AsyncRead + Send + Unpin>;

/// Payload handed to `Adapter::write`.
pub enum Content {
    /// Whole object in memory. Never auto-chunked.
    Buffer(Bytes),
    /// Resource-backed source; `len` is known for files and similar handles.
    Stream { reader: DynReader, len: Option<u64> },
}

impl Content {
    pub fn from_reader<R>(reader: R) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        Content::Stream {
            reader: Box::new(reader),
            len: None,
        }
    }

    pub fn from_reader_with_len<R>(reader: R, len: u64) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        Content::Stream {
            reader: Box::new(reader),
            len: Some(len),
        }
    }

    /// Open a local file as a streaming payload with its on-disk length.
    pub async fn from_file(path: impl AsRef<Path>) -> StorageResult<Self> {
        let file = tokio::fs::File::open(path.as_ref()).await?;
        let len = file.metadata().await?.len();
        Ok(Self::from_reader_with_len(file, len))
    }

    /// Length if it is known without draining the source.
    pub fn known_len(&self) -> Option<u64> {
        match self {
            Content::Buffer(b) => Some(b.len() as u64),
            Content::Stream { len, .. } => *len,
        }
    }

    pub fn is_stream(&self) -> bool {
        matches!(self, Content::Stream { .. })
    }

    /// Read up to `n` leading bytes without losing them: the returned content
    /// yields the same byte sequence as `self`.
    pub async fn peek(self, n: usize) -> std::io::Result<(Bytes, Content)> {
        match self {
            Content::Buffer(b) => {
                let head = b.slice(..n.min(b.len()));
                Ok((head, Content::Buffer(b)))
            }
            Content::Stream { mut reader, len } => {
                let head = read_up_to(&mut reader, n as u64).await?;
                let head = Bytes::from(head);
                let rest = Cursor::new(head.clone()).chain(reader);
                Ok((
                    head,
                    Content::Stream {
                        reader: Box::new(rest),
                        len,
                    },
                ))
            }
        }
    }

    /// Drain the whole payload into memory.
    pub async fn into_bytes(self) -> std::io::Result<Bytes> {
        match self {
            Content::Buffer(b) => Ok(b),
            Content::Stream { mut reader, len } => {
                let hint = len.unwrap_or(0).min(crate::constants::MIN_MULTIPART_PART_SIZE);
                let mut buf = Vec::with_capacity(hint as usize);
                reader.read_to_end(&mut buf).await?;
                Ok(Bytes::from(buf))
            }
        }
    }
}

impl fmt::Debug for Content {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Content::Buffer(b) => f.debug_tuple("Buffer").field(&b.len()).finish(),
            Content::Stream { len, .. } => f.debug_struct("Stream").field("len", len).finish(),
        }
    }
}

impl From<Bytes> for Content {
    fn from(b: Bytes) -> Self {
        Content::Buffer(b)
    }
}

impl From<Vec<u8>> for Content {
    fn from(v: Vec<u8>) -> Self {
        Content::Buffer(Bytes::from(v))
    }
}

impl From<&'static [u8]> for Content {
    fn from(s: &'static [u8]) -> Self {
        Content::Buffer(Bytes::from_static(s))
    }
}

impl From<&'static str> for Content {
    fn from(s: &'static str) -> Self {
        Content::Buffer(Bytes::from_static(s.as_bytes()))
    }
}

impl From<String> for Content {
    fn from(s: String) -> Self {
        Content::Buffer(Bytes::from(s))
    }
}

/// Read until `limit` bytes or end of stream, whichever comes first.
/// A short result means the stream is exhausted.
pub async fn read_up_to<R>(reader: &mut R, limit: u64) -> std::io::Result<Vec<u8>>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut buf = Vec::with_capacity(limit.min(crate::constants::MIN_MULTIPART_PART_SIZE) as usize);
    reader.take(limit).read_to_end(&mut buf).await?;
    Ok(buf)
}
