use anyhow::Result;
use clap::{Parser, Subcommand};

pub mod chat;
pub mod models;
pub mod serve;

#[derive(Subcommand)]
enum Command {
    /// Run the chat server
    Serve {
        /// Set the server host address
        #[arg(long, default_value = "0.0.0.0")]
        host: String,

        /// Set the server port
        #[arg(long, default_value = "5000")]
        port: String,
    },
    /// Start an interactive chat session in the terminal
    Chat {
        /// Address of a running chat server
        #[arg(long, default_value = "http://127.0.0.1:5000")]
        url: String,

        /// Model to select at startup
        #[arg(long)]
        model: Option<String>,
    },
    /// List the models a chat server offers
    Models {
        /// Address of a running chat server
        #[arg(long, default_value = "http://127.0.0.1:5000")]
        url: String,

        /// List the models installed for ollama instead of the allow-list
        #[arg(long, action, default_value = "false")]
        installed: bool,
    },
}

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

pub async fn run() -> Result<()> {
    let args = Cli::parse();

    // Handle each sub command
    match args.command {
        Some(Command::Serve { host, port }) => {
            serve::run(host, port).await?;
        }
        Some(Command::Chat { url, model }) => {
            chat::run(&url, model).await?;
        }
        Some(Command::Models { url, installed }) => {
            models::run(&url, installed).await?;
        }
        None => {}
    }

    Ok(())
}
