//! reportcast CLI — periodic marketing/e-commerce report pipeline.
//!
//! Aggregates configured data sources into a combined markdown report and
//! publishes it, chunk by chunk, to a knowledge base.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
