//! Blockwise CLI — summarize the content blocks of structured documents.
//!
//! Reads a document JSON, asks a generation bridge for a short summary of
//! every eligible block, and writes the enriched document back out.

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
