//! # rangedl
//!
//! Concurrent, resumable downloads over HTTP range requests.
//!
//! A [`DownloadTask`] splits the remote resource into contiguous byte ranges,
//! fetches them in parallel and writes each one straight into its slot of the
//! output file. Progress is available as a [`Status`] snapshot while the task
//! runs, and lifecycle callbacks report start, pause, resume, finish and
//! errors.
//!
//! ```no_run
//! # async fn demo() -> rangedl::Result<()> {
//! use rangedl::{DownloadConfig, DownloadTask, RunOutcome};
//!
//! let file = std::fs::File::create("archive.zip")?;
//! let mut task = DownloadTask::new(
//!     "https://example.com/archive.zip",
//!     file,
//!     None,
//!     DownloadConfig::default(),
//! )
//! .await?;
//! task.on_finish(|| println!("done"));
//!
//! if task.start().await? == RunOutcome::Paused {
//!     task.resume().await?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod events;
pub mod output;
pub mod planner;
pub mod progress;
pub mod task;
pub mod utils;
mod worker;

pub use config::DownloadConfig;
pub use error::{DownloadError, Result};
pub use planner::{plan_blocks, Block};
pub use progress::Status;
pub use task::{DownloadTask, Phase, RunOutcome};
