mod approvals_cmd;
mod check_config_cmd;
mod serve_cmd;
mod terminal_output;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use dotenv::dotenv;

#[derive(Parser)]
#[command(name = "quickzip")]
#[command(about = "QuickZip: a Telegram bot that bundles the files you send it into one archive")]
#[command(version)]
struct Cli {
    /// Config file (defaults to $QUICKZIP_CONFIG, then ./quickzip.yaml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the bot
    Serve,
    /// Allow a chat to use the bot
    Approve {
        /// Telegram chat id
        #[arg(allow_negative_numbers = true)]
        chat_id: i64,
    },
    /// Revoke a chat's access
    Revoke {
        #[arg(allow_negative_numbers = true)]
        chat_id: i64,
    },
    /// List approved chats
    Approvals,
    /// Print the effective configuration with secrets masked and validate it
    CheckConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let cli = Cli::parse();
    let path = cli.config.unwrap_or_else(quickzip_config::config_file_path);

    match cli.command {
        Commands::Serve => serve_cmd::run(&path).await,
        Commands::Approve { chat_id } => approvals_cmd::approve(&path, chat_id).await,
        Commands::Revoke { chat_id } => approvals_cmd::revoke(&path, chat_id).await,
        Commands::Approvals => approvals_cmd::list(&path).await,
        Commands::CheckConfig => check_config_cmd::run(&path).await,
    }
}
