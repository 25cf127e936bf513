use anyhow::{Context, Result};
use indicatif::{HumanBytes, ProgressBar, ProgressDrawTarget, ProgressStyle};
use serde::Serialize;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::fs;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use rangedl::utils::get_filename_from_url;
use rangedl::{DownloadConfig, DownloadTask, RunOutcome, Status};

use crate::cli::{Args, ProgressMode};

pub const EXIT_OK: i32 = 0;
pub const EXIT_USAGE: i32 = 1;
pub const EXIT_INTERRUPTED: i32 = 2;
pub const EXIT_FAILED: i32 = 3;

pub async fn run_download(args: Args) -> Result<i32> {
    let started = Instant::now();
    let url = args.url.clone();
    let output = args
        .output()
        .cloned()
        .unwrap_or_else(|| PathBuf::from(get_filename_from_url(&url)));

    if output.exists() {
        println!("Ignore existed: {}", output.display());
        return Ok(EXIT_USAGE);
    }
    prepare_parent_dir(&output).await?;

    let file = OpenOptions::new()
        .create_new(true)
        .read(true)
        .write(true)
        .open(&output)
        .with_context(|| format!("Failed to create output file {}", output.display()))?;

    let config = args.download_config();
    let mut task = open_task(&url, file, config, args.single).await?;
    task.on_error(|err| warn!("{}", err));
    let task = Arc::new(task);

    let render_stop = CancellationToken::new();
    let renderer = tokio::spawn(render_progress(task.clone(), args.progress, render_stop.clone()));

    let mut runner = {
        let task = task.clone();
        tokio::spawn(async move { task.start().await })
    };

    let outcome = tokio::select! {
        result = &mut runner => result??,
        _ = tokio::signal::ctrl_c() => {
            info!("interrupt received, pausing");
            if let Err(e) = task.pause() {
                warn!("pause rejected: {}", e);
            }
            // The run returns only after every worker has stopped.
            runner.await??
        }
    };

    render_stop.cancel();
    if let Err(e) = renderer.await? {
        warn!("progress rendering failed: {}", e);
    }

    let downloaded = task.status().downloaded;
    drop(task);
    info!("took {:.2?}", started.elapsed());

    match outcome {
        RunOutcome::Finished => {
            info!("{} => {}", url, output.display());
            Ok(EXIT_OK)
        }
        RunOutcome::Paused => {
            if downloaded == 0 {
                fs::remove_file(&output)
                    .await
                    .context("Failed to delete unfinished file")?;
                info!("deleted unfinished file: {}", output.display());
            } else {
                info!("stopped after {} at {}", HumanBytes(downloaded), output.display());
            }
            Ok(EXIT_INTERRUPTED)
        }
        RunOutcome::Failed { failed_blocks } => {
            warn!(
                "{} block(s) failed, {} left partially written",
                failed_blocks,
                output.display()
            );
            Ok(EXIT_FAILED)
        }
    }
}

async fn prepare_parent_dir(output: &Path) -> Result<()> {
    if let Some(parent) = output.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)
                .await
                .context("Failed to create output directory")?;
        }
    }
    Ok(())
}

/// Sets up a ranged task, falling back to one open-ended stream when the
/// size cannot be discovered.
async fn open_task(
    url: &str,
    file: std::fs::File,
    config: DownloadConfig,
    single: bool,
) -> Result<DownloadTask> {
    if single {
        return Ok(DownloadTask::with_unknown_size(url, file, config)?);
    }

    match DownloadTask::new(url, file.try_clone()?, None, config.clone()).await {
        Ok(task) => {
            info!("total size: {}", task.human_size());
            Ok(task)
        }
        Err(e) => {
            warn!("{}; downloading as one stream", e);
            Ok(DownloadTask::with_unknown_size(url, file, config)?)
        }
    }
}

#[derive(Serialize)]
struct ProgressLine {
    #[serde(flatten)]
    status: Status,
    total: Option<u64>,
    at: String,
}

async fn render_progress(
    task: Arc<DownloadTask>,
    mode: ProgressMode,
    stop: CancellationToken,
) -> Result<()> {
    match mode {
        ProgressMode::Bar => render_bar(&task, &stop).await,
        ProgressMode::Json => render_json(&task, &stop).await,
        ProgressMode::Quiet => {
            stop.cancelled().await;
            Ok(())
        }
    }
}

async fn render_bar(task: &DownloadTask, stop: &CancellationToken) -> Result<()> {
    let pb = match task.total_size() {
        Some(total) => {
            let pb = ProgressBar::with_draw_target(Some(total), ProgressDrawTarget::stdout_with_hz(5));
            pb.set_style(ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes:>12}/{total_bytes:<12} {msg}")?
                .progress_chars("=>-"));
            pb
        }
        None => {
            let pb = ProgressBar::with_draw_target(None, ProgressDrawTarget::stdout_with_hz(5));
            pb.set_style(ProgressStyle::default_spinner()
                .template("{spinner:.green} [{elapsed_precise}] {bytes:>12} {msg}")?);
            pb
        }
    };

    let mut ticker = tokio::time::interval(Duration::from_millis(200));
    loop {
        let stopped = tokio::select! {
            _ = stop.cancelled() => true,
            _ = ticker.tick() => false,
        };
        let status = task.status();
        pb.set_position(status.downloaded);
        pb.set_message(format!("{}/s", HumanBytes(status.speed)));
        if stopped {
            pb.finish();
            return Ok(());
        }
    }
}

async fn render_json(task: &DownloadTask, stop: &CancellationToken) -> Result<()> {
    let mut ticker = tokio::time::interval(Duration::from_secs(1));
    loop {
        let stopped = tokio::select! {
            _ = stop.cancelled() => true,
            _ = ticker.tick() => false,
        };
        let line = ProgressLine {
            status: task.status(),
            total: task.total_size(),
            at: chrono::Local::now().to_rfc3339(),
        };
        println!("{}", serde_json::to_string(&line)?);
        if stopped {
            return Ok(());
        }
    }
}
