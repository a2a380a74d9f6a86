//! chatgpt-telegram-bot: loads `.env`, parses the CLI and runs the bot.

use anyhow::Result;
use chatgpt_telegram_bot::run_chatgpt_bot;
use clap::Parser;
use telegram_bot::{load_config, Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { token } => {
            let config = load_config(token)?;
            run_chatgpt_bot(config).await
        }
    }
}
