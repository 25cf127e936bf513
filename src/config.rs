use std::time::Duration;

use crate::error::{DownloadError, Result};

/// Per-task tunables. Each `DownloadTask` owns its own copy, so tasks running
/// side by side never share mutable settings.
#[derive(Debug, Clone)]
pub struct DownloadConfig {
    /// Number of blocks the resource is split into, one worker each.
    pub concurrency: usize,
    /// Bytes read and written per step. Cancellation is polled once per chunk.
    pub chunk_size: usize,
    /// Attempts per block per run before the block is abandoned.
    pub max_retries: u32,
    /// Backoff unit; attempt `n` sleeps `n * retry_backoff`.
    pub retry_backoff: Duration,
    /// Applied to the response head and to every chunk read.
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
    /// Tick of the speed sampler.
    pub sample_interval: Duration,
    pub user_agent: String,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            concurrency: 16,
            chunk_size: 1024,
            max_retries: 3,
            retry_backoff: Duration::from_secs(1),
            request_timeout: Duration::from_secs(20),
            connect_timeout: Duration::from_secs(10),
            sample_interval: Duration::from_millis(100),
            user_agent: concat!("rangedl/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl DownloadConfig {
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(DownloadError::InvalidConfig("chunk_size must be positive".into()));
        }
        if self.max_retries == 0 {
            return Err(DownloadError::InvalidConfig("max_retries must be positive".into()));
        }
        if self.sample_interval.is_zero() {
            return Err(DownloadError::InvalidConfig(
                "sample_interval must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Builds the HTTP client used for size discovery and every block request.
    pub fn build_client(&self) -> Result<reqwest::Client> {
        let client = reqwest::Client::builder()
            .user_agent(self.user_agent.as_str())
            .connect_timeout(self.connect_timeout)
            .pool_max_idle_per_host(self.concurrency.max(1) * 2)
            .build()?;
        Ok(client)
    }
}
