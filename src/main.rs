//! wardead - Staffordshire war dead dashboard loader
//!
//! Entry point for the command-line tool. The logic lives in the library
//! modules for testability.

use anyhow::Result;
use clap::Parser;
use wardead::commands::{self, Cli};

#[tokio::main]
async fn main() -> Result<()> {
    wardead::logging::init();
    let cli = Cli::parse();
    commands::run(cli).await?;
    Ok(())
}
