// tests/common/mod.rs
//
// Shared fixtures for the adapter integration tests.
#![allow(dead_code)]

use std::sync::{Arc, Once};

use objfs::{AdapterOptions, ClientCall, MemoryClient, S3Adapter};

pub const BUCKET: &str = "objfs-test";
pub const MIB: usize = 1024 * 1024;

static TRACING: Once = Once::new();

/// Install an env-filtered subscriber once per test binary (`RUST_LOG=objfs=debug`).
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Adapter over a fresh in-memory client that already has [`BUCKET`].
pub fn adapter_with(options: AdapterOptions) -> (Arc<MemoryClient>, S3Adapter) {
    init_tracing();
    let client = Arc::new(MemoryClient::new().with_bucket(BUCKET));
    let adapter = S3Adapter::new(client.clone(), BUCKET, options)
        .expect("valid adapter options");
    (client, adapter)
}

pub fn adapter() -> (Arc<MemoryClient>, S3Adapter) {
    adapter_with(AdapterOptions::default())
}

/// Deterministic, non-repeating-per-part payload.
pub fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

/// Only the multipart requests from a call journal.
pub fn multipart_calls(calls: &[ClientCall]) -> Vec<ClientCall> {
    calls
        .iter()
        .filter(|c| {
            matches!(
                c,
                ClientCall::CreateMultipartUpload { .. }
                    | ClientCall::UploadPart { .. }
                    | ClientCall::CompleteMultipartUpload { .. }
                    | ClientCall::AbortMultipartUpload { .. }
            )
        })
        .cloned()
        .collect()
}

pub fn count_calls(calls: &[ClientCall], pred: impl Fn(&ClientCall) -> bool) -> usize {
    calls.iter().filter(|c| pred(c)).count()
}
