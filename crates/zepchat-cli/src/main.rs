mod chat;
mod cli;
mod error;
mod render;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use zepchat_client::{ChatSession, StreamConsumer};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Logs go to stderr so they never interleave with the streamed answer.
    let default_filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_level(true)
        .init();

    if let Err(err) = run(cli).await {
        error::handle_error(err);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let consumer = Arc::new(StreamConsumer::http());
    let session = ChatSession::new(consumer.clone(), cli.endpoint.clone())
        .with_settings(cli.settings.into());
    let timeout = cli.timeout.map(Duration::from_secs);

    tracing::debug!(session_id = %session.id(), endpoint = %cli.endpoint, "Session ready");
    let _render = render::attach(&consumer, std::io::stdout());

    match cli.command {
        Commands::Ask { question } => chat::run_ask(&session, &question.join(" "), timeout).await,
        Commands::Chat => chat::run_chat(&session, timeout).await,
    }
}
