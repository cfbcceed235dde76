//! voicerelay CLI entry point.

use clap::Parser;
use voicerelay_cli::{init_tracing, run, Cli};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Initialize logging
    init_tracing(&cli);

    // Run the command
    run(cli).await
}
