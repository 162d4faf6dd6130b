use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use colored::*;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, warn};

use crate::config::Config;
use crate::persona::Companion;
use crate::status::{render_reply, render_stats, render_thoughts};

pub use commands::{Args, Commands};

mod commands;

pub async fn handle_chat(
    message: String,
    data_dir: Option<PathBuf>,
    model: Option<String>,
    provider: Option<String>,
) -> Result<()> {
    let mut config = Config::new(data_dir)?;
    if let Some(provider) = provider {
        config.provider.provider = provider.parse()?;
    }
    if let Some(model) = model {
        config.provider.model = model;
    }

    let companion = Companion::from_config(&config).await;
    let signal = companion.handle_user_message(&message).await;
    println!("{}", render_reply(companion.name(), &signal));

    companion.flush().await.context("Failed to save memory")?;
    Ok(())
}

pub async fn handle_talk(data_dir: Option<PathBuf>, poll: Option<u64>) -> Result<()> {
    let config = Config::new(data_dir)?;
    let companion = Arc::new(Companion::from_config(&config).await);
    let poll = Duration::from_secs(poll.unwrap_or(config.proactive.poll_interval_secs).max(1));

    println!("{}", format!("Talking with {}...", companion.name()).cyan());
    println!("{}", "Type 'exit', 'quit', or 'bye' to end the conversation.".yellow());
    println!("{}", "---".dimmed());

    let proactive = tokio::spawn(proactive_loop(Arc::clone(&companion), poll));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("{} ", "You:".cyan().bold());
        io::stdout().flush()?;

        let line = match lines.next_line().await? {
            Some(line) => line,
            None => break,
        };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if matches!(input.to_lowercase().as_str(), "exit" | "quit" | "bye") {
            break;
        }

        let signal = companion.handle_user_message(input).await;
        println!("{}\n", render_reply(companion.name(), &signal));
    }

    proactive.abort();
    println!("{}", "Goodbye! 👋".green());
    if let Err(e) = companion.flush().await {
        warn!("Failed to save memory on exit: {}", e);
    }
    Ok(())
}

/// Poll the scheduler until the task is aborted.
async fn proactive_loop(companion: Arc<Companion>, poll: Duration) {
    let mut ticker = tokio::time::interval(poll);
    // first tick fires immediately
    ticker.tick().await;

    loop {
        ticker.tick().await;
        if let Some(thought) = companion.think().await {
            debug!(thought = %thought, "Companion is thinking");
        }
        if let Some(message) = companion.proactive_tick().await {
            println!("\n{}\n", render_reply(companion.name(), &message.signal));
        }
    }
}

pub async fn handle_status(data_dir: Option<PathBuf>) -> Result<()> {
    let config = Config::new(data_dir)?;
    let companion = Companion::from_config(&config).await;
    print!("{}", render_stats(companion.name(), &companion.stats().await));
    Ok(())
}

pub async fn handle_thoughts(data_dir: Option<PathBuf>) -> Result<()> {
    let config = Config::new(data_dir)?;
    let companion = Companion::from_config(&config).await;

    companion.think().await;
    print!("{}", render_thoughts(companion.name(), &companion.thoughts().await));

    companion.flush().await.context("Failed to save memory")?;
    Ok(())
}

pub async fn handle_proactive(data_dir: Option<PathBuf>) -> Result<()> {
    let config = Config::new(data_dir)?;
    let companion = Companion::from_config(&config).await;

    match companion.proactive_tick().await {
        Some(message) => {
            debug!(directive = %message.directive, "Proactive directive");
            println!("{}", render_reply(companion.name(), &message.signal));
        }
        None => println!("{}", format!("{} is quiet for now.", companion.name()).dimmed()),
    }

    companion.flush().await.context("Failed to save memory")?;
    Ok(())
}

pub async fn handle_reset(data_dir: Option<PathBuf>, yes: bool) -> Result<()> {
    let config = Config::new(data_dir)?;

    if !yes {
        print!("{}", "This erases all conversation history and relationship progress. Continue? [y/N] ".yellow());
        io::stdout().flush()?;
        let mut answer = String::new();
        io::stdin().read_line(&mut answer)?;
        if !matches!(answer.trim().to_lowercase().as_str(), "y" | "yes") {
            println!("Cancelled.");
            return Ok(());
        }
    }

    let companion = Companion::from_config(&config).await;
    companion.reset().await.context("Failed to reset memory")?;
    println!("{}", "Memory has been reset.".green());
    Ok(())
}
