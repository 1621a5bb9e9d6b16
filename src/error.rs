use std::io;

use thiserror::Error;

use crate::harness::{EmptySetError, HarnessError};
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum BenchError {
    #[error(transparent)]
    Harness(#[from] HarnessError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("{name}: expected {expected_len} bytes (sha256 {expected_sha}), found {found_len} bytes (sha256 {found_sha})")]
    Verify {
        name: String,
        expected_len: u64,
        expected_sha: String,
        found_len: u64,
        found_sha: String,
    },

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl From<EmptySetError> for BenchError {
    fn from(e: EmptySetError) -> Self {
        BenchError::Harness(e.into())
    }
}
