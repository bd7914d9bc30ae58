//! assetline - front-end asset pipeline with a live-reloading dev server.

mod cli;
mod compiler;
mod compose;
mod config;
mod core;
mod image;
mod logger;
mod registry;
mod reload;
mod serve;
mod task;
mod utils;
mod watch;

use anyhow::{Context, Result};
use clap::{ColorChoice, Parser};
use cli::Cli;
use compose::Pipeline;
use config::PipelineConfig;

fn main() -> Result<()> {
    // Setup global Ctrl+C handler (before any blocking operations)
    core::setup_shutdown_handler()?;

    let cli = Cli::parse();

    // Set global color override based on CLI option
    match cli.color {
        ColorChoice::Always => owo_colors::set_override(true),
        ColorChoice::Never => owo_colors::set_override(false),
        ColorChoice::Auto => {} // owo-colors auto-detects TTY
    }
    logger::set_verbose(cli.verbose);

    let mut config = PipelineConfig::load(cli.config.as_deref())?;
    cli::apply_overrides(&cli, &mut config);
    config.validate()?;
    let pipeline = Pipeline::new(config)?;

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to create tokio runtime")?;
    rt.block_on(cli::dispatch(&cli, &pipeline))
}
