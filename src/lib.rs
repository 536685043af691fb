// src/lib.rs
//
// Copyright, 2025.  Signal65 / Futurum Group.
//
// Crate root: module tree and public re-exports.

// ===== Core Public API =====
pub mod adapter;
pub mod filesystem;
pub mod s3_adapter;

// ===== Internal Modules (Implementation) =====
// These are public for internal use but may change without notice

pub mod constants;
pub mod error;
pub mod config;
pub mod key_path;
pub mod metadata;
pub mod content;
pub mod sniff;
pub mod client;
pub mod bucket;
pub mod multipart;

pub use adapter::{
    Adapter, DirectoryAware, ListKeysAware, MetadataSupporter, MimeTypeProvider, MtimeCalculator,
    SizeCalculator,
};
pub use bucket::{BucketGuard, BucketState};
pub use client::{
    AwsS3Client, ClientCall, CompletedPart, GetOutput, ListPage, ListedObject, MemoryClient,
    ObjectHead, ObjectStoreClient, PutOptions, PutOutput,
};
pub use config::AdapterOptions;
pub use content::Content;
pub use error::{ErrorKind, StorageError, StorageResult};
pub use filesystem::Filesystem;
pub use key_path::KeyPathMapper;
pub use metadata::{Metadata, MetadataStore};
pub use multipart::{
    MultipartCompleteInfo, MultipartUploadConfig, MultipartUploadCoordinator, UploadSession,
    UploadState,
};
pub use s3_adapter::S3Adapter;
pub use sniff::ContentTypeSniffer;
