use std::sync::Arc;

use anyhow::Context;
use zepchat_server::{AppState, RetrievalChain, ServerConfig, router};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing logger
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,zepchat_server=debug".into()),
        )
        .with_target(false)
        .with_thread_ids(true)
        .with_line_number(true)
        .init();

    tracing::info!("Starting ZepChat server");

    let config = ServerConfig::load()?;
    match &config.zep {
        Some(zep) => tracing::info!(url = %zep.url, collection = %zep.collection, "Retrieval enabled"),
        None => tracing::warn!("ZEP_API_URL not configured, answering without retrieval"),
    }

    let state = AppState::new(Arc::new(RetrievalChain::from_config(&config)));
    let app = router(state);

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {addr}"))?;

    tracing::info!("ZepChat running on http://{}", addr);

    axum::serve(listener, app)
        .await
        .context("Failed to start server")
}
