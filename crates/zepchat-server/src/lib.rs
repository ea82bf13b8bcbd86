//! ZepChat server
//!
//! Serves the streaming chat endpoint: retrieve related documents from a Zep
//! collection, then stream an answer from an OpenAI-compatible model as
//! `text/plain`.

pub mod answer;
pub mod api;
pub mod config;
pub mod error;
pub mod llm;
pub mod zep;

use axum::{
    Json, Router,
    http::{Method, header},
    routing::{get, post},
};
use tower_http::cors::CorsLayer;
use zepchat_contracts::CHAT_PATH;

pub use answer::{AnswerSource, RetrievalChain};
pub use api::AppState;
pub use config::ServerConfig;
pub use error::{Result, ServerError};

#[derive(serde::Serialize)]
struct Health {
    status: String,
}

async fn health() -> Json<Health> {
    Json(Health {
        status: "ok".to_string(),
    })
}

/// Build the HTTP router.
pub fn router(state: AppState) -> Router {
    // The chat widget is served from another origin.
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    Router::new()
        .route("/health", get(health))
        .route(CHAT_PATH, post(api::chat::chat))
        .layer(cors)
        .with_state(state)
}
