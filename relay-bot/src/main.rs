//! relay-bot binary: `relay-bot run [--token <TOKEN>]`.

use anyhow::Result;
use clap::Parser;
use relay_bot::cli::{Cli, Commands};
use relay_bot::{run_bot, RelayConfig};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { token } => {
            let config = RelayConfig::load(token)?;
            run_bot(config).await
        }
    }
}
