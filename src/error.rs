use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DownloadError {
    /// HEAD did not yield a usable Content-Length.
    #[error("failed to discover size of {url}: {reason}")]
    SizeDiscovery { url: String, reason: String },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected response status: {status}")]
    HttpStatus { status: reqwest::StatusCode },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("no data received for {0:?}")]
    Timeout(Duration),

    #[error("response ended early: expected {expected} more bytes, got {received}")]
    ShortBody { expected: u64, received: u64 },

    #[error("block {index} failed after {attempts} attempts: {reason}")]
    BlockFailed {
        index: usize,
        attempts: u32,
        reason: String,
    },

    #[error("download failed: {failed_blocks} block(s) could not be fetched")]
    RunFailed { failed_blocks: usize },

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("invalid config: {0}")]
    InvalidConfig(String),
}

pub type Result<T, E = DownloadError> = std::result::Result<T, E>;
