//! Offer Copilot CLI: run copywriting tools against AI providers, with
//! optional research context gathered from DeepSeek, Tavily, and Jina Reader.

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
