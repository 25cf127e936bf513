use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use rangedl::DownloadConfig;

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProgressMode {
    /// Live progress bar
    Bar,
    /// One JSON status line per second
    Json,
    /// No progress output
    #[value(name = "none")]
    Quiet,
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Concurrent, resumable ranged downloader", long_about = None)]
pub struct Args {
    /// URL to download
    #[arg(index = 1)]
    pub url: String,

    /// Output file path (defaults to the last segment of the URL)
    #[arg(index = 2, conflicts_with = "output")]
    pub output_path: Option<PathBuf>,

    /// Output file path
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,

    /// Number of byte ranges fetched in parallel
    #[arg(short = 't', long, default_value_t = 16)]
    pub threads: usize,

    /// Download as a single stream instead of ranged blocks
    #[arg(long)]
    pub single: bool,

    /// Attempts per block before it is abandoned
    #[arg(long, default_value_t = 3)]
    pub retries: u32,

    /// Bytes read and written per step
    #[arg(long = "chunk-size", default_value_t = 1024)]
    pub chunk_size: usize,

    /// Per-request timeout in seconds
    #[arg(long, default_value_t = 20)]
    pub timeout: u64,

    /// How progress is rendered
    #[arg(long, value_enum, default_value = "bar")]
    pub progress: ProgressMode,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Args {
    pub fn output(&self) -> Option<&PathBuf> {
        self.output.as_ref().or(self.output_path.as_ref())
    }

    pub fn download_config(&self) -> DownloadConfig {
        DownloadConfig {
            concurrency: self.threads,
            chunk_size: self.chunk_size,
            max_retries: self.retries,
            request_timeout: Duration::from_secs(self.timeout),
            ..DownloadConfig::default()
        }
    }
}
