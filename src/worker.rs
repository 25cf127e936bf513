//! Fetches one byte range into its slot of the output file.

use std::io;
use std::sync::Arc;

use futures::TryStreamExt;
use reqwest::{header, Client, StatusCode};
use tokio::io::AsyncReadExt;
use tokio_util::io::StreamReader;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::config::DownloadConfig;
use crate::error::{DownloadError, Result};
use crate::events::EventSink;
use crate::output::OutputFile;
use crate::planner::Block;
use crate::progress::ProgressTracker;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BlockOutcome {
    Completed,
    /// Stopped by a pause request; the block can be resumed from `begin`.
    Cancelled,
    /// Retries exhausted for this run.
    Failed,
}

enum Attempt {
    Complete,
    Cancelled,
}

pub(crate) struct BlockWorker {
    pub index: usize,
    pub url: String,
    pub client: Client,
    pub output: OutputFile,
    pub progress: ProgressTracker,
    pub cancel: CancellationToken,
    pub config: Arc<DownloadConfig>,
    pub events: EventSink,
}

impl BlockWorker {
    /// Drives the block to completion, cancellation or permanent failure and
    /// hands the advanced block back to the controller.
    pub async fn run(self, mut block: Block) -> (Block, BlockOutcome) {
        let mut attempts = 0;
        loop {
            let err = match self.fetch(&mut block).await {
                Ok(Attempt::Complete) => return (block, BlockOutcome::Completed),
                Ok(Attempt::Cancelled) => return (block, BlockOutcome::Cancelled),
                Err(e) => e,
            };

            attempts += 1;
            if attempts >= self.config.max_retries {
                error!(block = self.index, attempts, error = %err, "block abandoned");
                self.events.error(DownloadError::BlockFailed {
                    index: self.index,
                    attempts,
                    reason: err.to_string(),
                });
                return (block, BlockOutcome::Failed);
            }

            let backoff = self.config.retry_backoff * attempts;
            warn!(
                block = self.index,
                attempt = attempts,
                max = self.config.max_retries,
                error = %err,
                "block attempt failed, retrying in {:?}",
                backoff
            );
            tokio::select! {
                _ = self.cancel.cancelled() => return (block, BlockOutcome::Cancelled),
                _ = tokio::time::sleep(backoff) => {}
            }
        }
    }

    async fn fetch(&self, block: &mut Block) -> Result<Attempt> {
        if block.is_complete() {
            return Ok(Attempt::Complete);
        }
        if self.cancel.is_cancelled() {
            return Ok(Attempt::Cancelled);
        }

        let range = block.range_header();
        let mut request = self.client.get(&self.url);
        if let Some(range) = &range {
            request = request.header(header::RANGE, range.as_str());
        }
        debug!(block = self.index, range = ?range, "requesting");

        let timeout = self.config.request_timeout;
        let response = tokio::time::timeout(timeout, request.send())
            .await
            .map_err(|_| DownloadError::Timeout(timeout))??;

        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::HttpStatus { status });
        }

        // A plain 200 to a ranged request carries the resource from byte 0.
        let mut skip = if range.is_some() && status != StatusCode::PARTIAL_CONTENT {
            debug!(block = self.index, "range ignored by server, skipping {} bytes", block.begin);
            block.begin
        } else {
            0
        };

        let expected = block.remaining();
        let mut received = 0u64;
        let reader = StreamReader::new(response.bytes_stream().map_err(io::Error::other));
        tokio::pin!(reader);
        let mut buf = vec![0u8; self.config.chunk_size];

        loop {
            if self.cancel.is_cancelled() {
                return Ok(Attempt::Cancelled);
            }

            let n = tokio::time::timeout(timeout, reader.read(&mut buf))
                .await
                .map_err(|_| DownloadError::Timeout(timeout))??;
            if n == 0 {
                return match expected {
                    Some(expected) => Err(DownloadError::ShortBody { expected, received }),
                    None => Ok(Attempt::Complete),
                };
            }

            let mut chunk = &buf[..n];
            if skip > 0 {
                let dropped = skip.min(n as u64) as usize;
                skip -= dropped as u64;
                chunk = &chunk[dropped..];
                if chunk.is_empty() {
                    continue;
                }
            }

            let mut last = false;
            if let Some(left) = block.remaining() {
                if chunk.len() as u64 >= left {
                    if chunk.len() as u64 > left {
                        debug!(
                            block = self.index,
                            extra = chunk.len() as u64 - left,
                            "response overran the requested range, truncating"
                        );
                    }
                    chunk = &chunk[..left as usize];
                    last = true;
                }
            }

            let len = chunk.len() as u64;
            self.output.write_at(chunk.to_vec(), block.begin).await?;
            self.progress.add(len);
            block.begin += len;
            received += len;

            if last {
                return Ok(Attempt::Complete);
            }
        }
    }
}
