mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;
use tracing::Level;

use crate::cli::Args;

fn main() -> Result<()> {
    let args = Args::parse();

    let level = match args.verbose {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    let rt = tokio::runtime::Runtime::new()?;
    let code = rt.block_on(crate::commands::run_download(args))?;
    drop(rt);

    if code != crate::commands::EXIT_OK {
        std::process::exit(code);
    }
    Ok(())
}
