// src/constants.rs
//
// Centralized constants for objfs: backend hard bounds and adapter defaults.

/// Minimum multipart upload part size (5 MiB - S3 requirement).
/// The final part of an upload is exempt.
pub const MIN_MULTIPART_PART_SIZE: u64 = 5 * 1024 * 1024;

/// Maximum size of a single-shot PUT and of any one part (5 GiB - S3 requirement).
pub const MAX_SINGLE_PUT_SIZE: u64 = 5 * 1024 * 1024 * 1024;

/// Maximum number of parts in a multipart upload.
pub const MAX_MULTIPART_PARTS: i32 = 10_000;

/// Default part size for multipart uploads (5 MiB).
pub const DEFAULT_PART_SIZE: u64 = MIN_MULTIPART_PART_SIZE;

/// Default threshold above which streaming writes switch to multipart (5 GiB).
pub const DEFAULT_SIZE_LIMIT: u64 = MAX_SINGLE_PUT_SIZE;

/// Canned ACL applied to every write unless overridden.
pub const DEFAULT_ACL: &str = "private";

/// Number of leading bytes inspected when sniffing a content type.
pub const SNIFF_LEN: usize = 512;

/// Page size requested from the backend when listing keys.
pub const DEFAULT_LIST_PAGE_SIZE: i32 = 1000;

/// Directory separator used for key prefixes and emulated directories.
pub const PATH_SEPARATOR: char = '/';

/// Fallback content type when sniffing is inconclusive.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";
