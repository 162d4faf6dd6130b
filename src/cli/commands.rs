use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "aicompanion")]
#[command(about = "An emotionally-aware conversational companion")]
#[command(version)]
pub struct Args {
    /// Data directory (config.json, memory.json, training.jsonl)
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Send one message and print the reply
    Chat {
        message: String,
        /// Override the configured model
        #[arg(long)]
        model: Option<String>,
        /// Override the configured provider (ollama, openai)
        #[arg(long)]
        provider: Option<String>,
    },
    /// Interactive conversation; the companion may speak up on its own
    Talk {
        /// Seconds between proactive checks
        #[arg(long)]
        poll: Option<u64>,
    },
    /// Show mood and relationship metrics
    Status,
    /// Show what the companion has been thinking about
    Thoughts,
    /// Run one proactive check and print any message
    Proactive,
    /// Forget everything and start over
    Reset {
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
}
