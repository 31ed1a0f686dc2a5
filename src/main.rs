mod backend_client;
mod cli;

use std::io;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use dotenv::dotenv;
use eyre::Result;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use crate::backend_client::BackendClient;
use crate::cli::chat::session::ChatSession;
use crate::cli::chat::ChatContext;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Input to send to the chat
    #[arg(short, long)]
    input: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a chat session
    Chat {
        /// Input to send to the chat
        #[arg(short, long)]
        input: Option<String>,

        /// Enable verbose logging
        #[arg(short, long)]
        verbose: bool,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Load environment variables from .env file
    dotenv().ok();

    let cli = Cli::parse();

    let verbose = match &cli.command {
        Some(Commands::Chat { verbose, .. }) => *verbose,
        None => cli.verbose,
    };

    let log_level = if verbose { Level::DEBUG } else { Level::INFO };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");

    info!("Starting LA Help.ai chat");

    let session = ChatSession::new(BackendClient::from_env());

    let input = match cli.command {
        Some(Commands::Chat { input, .. }) => input,
        None => cli.input,
    };

    let mut chat_context = ChatContext::new(Box::new(io::stdout()), input, true, session);
    chat_context.run().await
}
