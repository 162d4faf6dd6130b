use anyhow::Result;
use clap::Parser;

use aicompanion::cli::{self, Args, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("aicompanion=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    match args.command {
        Commands::Chat { message, model, provider } => {
            cli::handle_chat(message, args.data_dir, model, provider).await
        }
        Commands::Talk { poll } => cli::handle_talk(args.data_dir, poll).await,
        Commands::Status => cli::handle_status(args.data_dir).await,
        Commands::Thoughts => cli::handle_thoughts(args.data_dir).await,
        Commands::Proactive => cli::handle_proactive(args.data_dir).await,
        Commands::Reset { yes } => cli::handle_reset(args.data_dir, yes).await,
    }
}
