//! trawl CLI: crawl a directory tree into a local full-text index.
//!
//! Files are classified, read, tagged with their trunk/branches project and
//! version, and written to an embedded libSQL index in batches.

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
