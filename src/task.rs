//! Lifecycle controller for one ranged download.

use std::fs::File;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use reqwest::{header, Client};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::config::DownloadConfig;
use crate::error::{DownloadError, Result};
use crate::events::EventSink;
use crate::output::OutputFile;
use crate::planner::{plan_blocks, Block};
use crate::progress::{ProgressTracker, Status};
use crate::utils::human_size;
use crate::worker::{BlockOutcome, BlockWorker};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Created,
    Running,
    Paused,
    Finished,
    Failed,
}

/// How a `start` or `resume` run ended. Exactly one matching event is emitted
/// per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Finished,
    Paused,
    Failed { failed_blocks: usize },
}

struct Control {
    phase: Phase,
    cancel: CancellationToken,
}

pub struct DownloadTask {
    url: String,
    total_size: Option<u64>,
    output: OutputFile,
    config: Arc<DownloadConfig>,
    client: Client,
    /// Remaining work per block. Held by a run from spawn until its barrier.
    blocks: tokio::sync::Mutex<Vec<Block>>,
    control: Mutex<Control>,
    progress: ProgressTracker,
    events: EventSink,
}

impl DownloadTask {
    /// Creates a task for `url` writing into `file`.
    ///
    /// Without a positive `known_size` the size is discovered with a HEAD
    /// request; a missing or zero Content-Length fails construction.
    pub async fn new(
        url: impl Into<String>,
        file: File,
        known_size: Option<u64>,
        config: DownloadConfig,
    ) -> Result<Self> {
        let url = url.into();
        config.validate()?;
        let client = config.build_client()?;

        let size = match known_size {
            Some(size) if size > 0 => size,
            _ => discover_size(&client, &url, config.request_timeout).await?,
        };
        debug!(%url, size, "size resolved");

        Ok(Self::build(url, file, Some(size), config, client))
    }

    /// Creates a task that streams the whole resource as a single open-ended
    /// block. Used when the size cannot be discovered up front.
    pub fn with_unknown_size(
        url: impl Into<String>,
        file: File,
        config: DownloadConfig,
    ) -> Result<Self> {
        config.validate()?;
        let client = config.build_client()?;
        Ok(Self::build(url.into(), file, None, config, client))
    }

    fn build(
        url: String,
        file: File,
        total_size: Option<u64>,
        config: DownloadConfig,
        client: Client,
    ) -> Self {
        Self {
            url,
            total_size,
            output: OutputFile::new(file),
            config: Arc::new(config),
            client,
            blocks: tokio::sync::Mutex::new(Vec::new()),
            control: Mutex::new(Control {
                phase: Phase::Created,
                cancel: CancellationToken::new(),
            }),
            progress: ProgressTracker::new(),
            events: EventSink::default(),
        }
    }

    pub fn on_start(&mut self, f: impl Fn() + Send + Sync + 'static) {
        self.events.set_on_start(f);
    }

    pub fn on_finish(&mut self, f: impl Fn() + Send + Sync + 'static) {
        self.events.set_on_finish(f);
    }

    pub fn on_pause(&mut self, f: impl Fn() + Send + Sync + 'static) {
        self.events.set_on_pause(f);
    }

    pub fn on_resume(&mut self, f: impl Fn() + Send + Sync + 'static) {
        self.events.set_on_resume(f);
    }

    /// Receives one `BlockFailed` per abandoned block and, when a run ends in
    /// failure, one `RunFailed`.
    pub fn on_error(&mut self, f: impl Fn(DownloadError) + Send + Sync + 'static) {
        self.events.set_on_error(f);
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn total_size(&self) -> Option<u64> {
        self.total_size
    }

    /// Size used for progress ratios; 1 while the size is unknown.
    pub fn effective_size(&self) -> u64 {
        self.total_size.unwrap_or(1)
    }

    pub fn human_size(&self) -> String {
        human_size(self.effective_size())
    }

    pub fn status(&self) -> Status {
        self.progress.snapshot()
    }

    pub fn phase(&self) -> Phase {
        self.control().phase
    }

    /// Remaining work per block. Waits for an in-flight run to reach its
    /// barrier.
    pub async fn blocks(&self) -> Vec<Block> {
        self.blocks.lock().await.clone()
    }

    /// Plans the blocks and runs them to the barrier.
    ///
    /// Preallocation happens before the task leaves `Created`, so a failure
    /// there is a plain setup error: no events fire and `start` may be retried.
    pub async fn start(&self) -> Result<RunOutcome> {
        self.expect_phase(Phase::Created)?;
        if let Some(size) = self.total_size {
            self.output.preallocate(size)?;
        }
        self.enter_running(Phase::Created)?;

        let blocks = plan_blocks(self.total_size, self.config.concurrency);
        info!(url = %self.url, blocks = blocks.len(), size = %self.human_size(), "download started");
        *self.blocks.lock().await = blocks;

        self.events.start();
        self.run().await
    }

    /// Requests a pause. Workers stop at their next chunk boundary; the run
    /// then ends with `RunOutcome::Paused` and the pause event.
    pub fn pause(&self) -> Result<()> {
        let control = self.control();
        if control.phase != Phase::Running {
            return Err(DownloadError::InvalidState(format!(
                "cannot pause a task that is {:?}",
                control.phase
            )));
        }
        control.cancel.cancel();
        debug!(url = %self.url, "pause requested");
        Ok(())
    }

    /// Continues a paused task from where each block stopped.
    pub async fn resume(&self) -> Result<RunOutcome> {
        if self.phase() == Phase::Created {
            return Err(DownloadError::InvalidState(
                "cannot resume a task that was never started".into(),
            ));
        }
        self.enter_running(Phase::Paused)?;

        info!(url = %self.url, downloaded = self.progress.downloaded(), "download resumed");
        self.events.resume();
        self.run().await
    }

    fn expect_phase(&self, expected: Phase) -> Result<()> {
        check_phase(self.control().phase, expected)
    }

    fn enter_running(&self, from: Phase) -> Result<()> {
        let mut control = self.control();
        check_phase(control.phase, from)?;
        control.phase = Phase::Running;
        control.cancel = CancellationToken::new();
        Ok(())
    }

    async fn run(&self) -> Result<RunOutcome> {
        let mut blocks = self.blocks.lock().await;
        let cancel = self.control().cancel.clone();

        let stop_sampler = CancellationToken::new();
        let sampler = self
            .progress
            .spawn_sampler(self.config.sample_interval, stop_sampler.clone());

        let mut handles = Vec::with_capacity(blocks.len());
        for (index, block) in blocks.iter().enumerate() {
            let worker = BlockWorker {
                index,
                url: self.url.clone(),
                client: self.client.clone(),
                output: self.output.clone(),
                progress: self.progress.clone(),
                cancel: cancel.clone(),
                config: self.config.clone(),
                events: self.events.clone(),
            };
            handles.push(tokio::spawn(worker.run(*block)));
        }

        let mut failed = 0;
        let mut cancelled = 0;
        for (index, (slot, handle)) in blocks.iter_mut().zip(handles).enumerate() {
            match handle.await {
                Ok((block, outcome)) => {
                    *slot = block;
                    match outcome {
                        BlockOutcome::Completed => {}
                        BlockOutcome::Cancelled => cancelled += 1,
                        BlockOutcome::Failed => failed += 1,
                    }
                }
                Err(e) => {
                    error!(block = index, error = %e, "block worker aborted");
                    failed += 1;
                }
            }
        }

        stop_sampler.cancel();
        let _ = sampler.await;

        if let Err(e) = self.output.sync() {
            error!(error = %e, "failed to sync output");
        }

        let outcome = if cancel.is_cancelled() && (cancelled > 0 || failed > 0) {
            RunOutcome::Paused
        } else if failed > 0 {
            RunOutcome::Failed {
                failed_blocks: failed,
            }
        } else {
            RunOutcome::Finished
        };

        self.control().phase = match outcome {
            RunOutcome::Finished => Phase::Finished,
            RunOutcome::Paused => Phase::Paused,
            RunOutcome::Failed { .. } => Phase::Failed,
        };
        drop(blocks);

        let downloaded = self.progress.downloaded();
        match outcome {
            RunOutcome::Finished => {
                info!(url = %self.url, downloaded, "download finished");
                self.events.finish();
            }
            RunOutcome::Paused => {
                info!(url = %self.url, downloaded, "download paused");
                self.events.pause();
            }
            RunOutcome::Failed { failed_blocks } => {
                error!(url = %self.url, downloaded, failed_blocks, "download failed");
                self.events.error(DownloadError::RunFailed { failed_blocks });
            }
        }
        Ok(outcome)
    }

    fn control(&self) -> MutexGuard<'_, Control> {
        self.control.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn check_phase(found: Phase, expected: Phase) -> Result<()> {
    if found != expected {
        return Err(DownloadError::InvalidState(format!(
            "expected a {:?} task, found {:?}",
            expected, found
        )));
    }
    Ok(())
}

/// Reads the resource length from a HEAD response's Content-Length header.
/// A server that does not answer within `timeout` fails discovery.
pub async fn discover_size(client: &Client, url: &str, timeout: Duration) -> Result<u64> {
    let failure = |reason: String| DownloadError::SizeDiscovery {
        url: url.to_string(),
        reason,
    };

    let response = tokio::time::timeout(timeout, client.head(url).send())
        .await
        .map_err(|_| failure(format!("no response within {:?}", timeout)))?
        .map_err(|e| failure(e.to_string()))?;
    if !response.status().is_success() {
        return Err(failure(format!("status {}", response.status())));
    }

    let size = response
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .ok_or_else(|| failure("response has no Content-Length".into()))?;
    if size == 0 {
        return Err(failure("Content-Length is zero".into()));
    }
    Ok(size)
}
