// src/error.rs
//
// Error types for adapter and client operations.
//
// Two tiers: fatal configuration errors (missing bucket with auto-create off,
// invalid options) and operational errors, which always carry an ErrorKind so
// callers can tell "absent" from "denied" from "transient".

use std::fmt;

use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Coarse classification of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Object, bucket or upload session does not exist.
    NotFound,
    /// Credentials or ACLs rejected the request.
    PermissionDenied,
    /// Network, throttling or 5xx failures that may succeed on retry.
    TransientIo,
    /// Request was malformed or violates a backend bound.
    InvalidArgument,
    /// Target already exists (racing bucket create, overwrite guard).
    AlreadyExists,
    /// Anything else.
    Other,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NotFound => "not found",
            ErrorKind::PermissionDenied => "permission denied",
            ErrorKind::TransientIo => "transient I/O failure",
            ErrorKind::InvalidArgument => "invalid argument",
            ErrorKind::AlreadyExists => "already exists",
            ErrorKind::Other => "other",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug)]
pub enum StorageError {
    /// The backing bucket does not exist and auto-create is disabled.
    #[error("bucket '{bucket}' does not exist and automatic creation is disabled")]
    BucketMissing { bucket: String },

    /// Adapter options violate a backend bound.
    #[error("invalid adapter configuration: {0}")]
    Config(String),

    /// A client call failed before the adapter attributed it to a key.
    #[error("{kind}: {message}")]
    Client { kind: ErrorKind, message: String },

    /// An adapter operation failed for a specific key.
    #[error("{op} '{key}' failed ({kind}): {message}")]
    Operation {
        op: &'static str,
        key: String,
        kind: ErrorKind,
        message: String,
    },
}

impl StorageError {
    pub fn client(kind: ErrorKind, message: impl Into<String>) -> Self {
        StorageError::Client {
            kind,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::client(ErrorKind::NotFound, message)
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::client(ErrorKind::InvalidArgument, message)
    }

    /// Kind of the failure. Fatal configuration errors report `InvalidArgument`
    /// for bad options and `NotFound` for the missing bucket.
    pub fn kind(&self) -> ErrorKind {
        match self {
            StorageError::BucketMissing { .. } => ErrorKind::NotFound,
            StorageError::Config(_) => ErrorKind::InvalidArgument,
            StorageError::Client { kind, .. } | StorageError::Operation { kind, .. } => *kind,
        }
    }

    /// Fatal errors abort startup and are never worth retrying.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            StorageError::BucketMissing { .. } | StorageError::Config(_)
        )
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    /// Attribute a client failure to an adapter operation on `key`.
    /// Fatal errors pass through untouched.
    pub fn for_op(self, op: &'static str, key: &str) -> Self {
        match self {
            StorageError::Client { kind, message } => StorageError::Operation {
                op,
                key: key.to_string(),
                kind,
                message,
            },
            other => other,
        }
    }
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        let kind = match err.kind() {
            std::io::ErrorKind::NotFound => ErrorKind::NotFound,
            std::io::ErrorKind::PermissionDenied => ErrorKind::PermissionDenied,
            std::io::ErrorKind::InvalidInput | std::io::ErrorKind::InvalidData => {
                ErrorKind::InvalidArgument
            }
            std::io::ErrorKind::AlreadyExists => ErrorKind::AlreadyExists,
            _ => ErrorKind::TransientIo,
        };
        StorageError::client(kind, err.to_string())
    }
}

/// Attach an operation name and key to any `StorageResult`.
pub(crate) trait OpContext<T> {
    fn op(self, op: &'static str, key: &str) -> StorageResult<T>;
}

impl<T> OpContext<T> for StorageResult<T> {
    fn op(self, op: &'static str, key: &str) -> StorageResult<T> {
        self.map_err(|e| e.for_op(op, key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_error_is_tagged_with_operation() {
        let err = StorageError::not_found("NoSuchKey").for_op("read", "a/b.txt");
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(!err.is_fatal());
        assert_eq!(err.to_string(), "read 'a/b.txt' failed (not found): NoSuchKey");
    }

    #[test]
    fn fatal_errors_are_not_rewrapped() {
        let err = StorageError::BucketMissing { bucket: "b".into() }.for_op("write", "k");
        assert!(err.is_fatal());
        assert!(matches!(err, StorageError::BucketMissing { .. }));
    }

    #[test]
    fn io_errors_map_to_kinds() {
        let err: StorageError = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "nope").into();
        assert_eq!(err.kind(), ErrorKind::PermissionDenied);
        let err: StorageError = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "eof").into();
        assert_eq!(err.kind(), ErrorKind::TransientIo);
    }
}
