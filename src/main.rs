use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use pb_video_seg::Config;

/// Engine crates log through `log`; keep them to warnings unless RUST_LOG says otherwise.
fn init_logging(verbose: bool) -> Result<()> {
    let default = if verbose {
        "pb_video_seg=debug,tract=warn"
    } else {
        "pb_video_seg=info,tract=warn"
    };
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(default))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {e}"))
}

fn main() -> Result<()> {
    let config = Config::parse();
    init_logging(config.verbose)?;

    let summary = pb_video_seg::run(&config).context("Video segmentation failed")?;

    if summary.stopped_early {
        tracing::info!("Stopped by user after {} frames", summary.frames);
    }
    Ok(())
}
