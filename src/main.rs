mod calendar;
mod config;
mod index;
mod models;
mod pipeline;
mod scraper;
mod utils;

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::AppConfig;
use crate::pipeline::Pipeline;

/// Crawl the league fixtures site and write one calendar per team plus an index page.
#[derive(Parser)]
#[command(name = "fixture-calendars", version)]
struct Cli {
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Output directory (overrides output.root)
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "fixture_calendars=info,warn",
        1 => "fixture_calendars=debug,info",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(fmt::layer().compact().with_target(false))
        .with(EnvFilter::new(filter))
        .init();

    let mut config = AppConfig::load()?;
    if let Some(output) = cli.output {
        config.output.root = output;
    }

    let _t = utils::Timer::start("Fixture crawl");
    info!(
        "Writing calendars to {:?} ({}, {} min events)",
        config.output.root, config.calendar.timezone, config.calendar.event_minutes
    );

    let stats = Pipeline::new(config).run().await?;
    info!(
        "Done: {} teams, {} events, {} errors",
        stats.teams_written, stats.events_written, stats.errors
    );

    Ok(())
}
