use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, info};
use zepchat_client::build_http_client;
use zepchat_contracts::ChatRequest;

use super::{AnswerSource, build_system_prompt};
use crate::config::ServerConfig;
use crate::error::Result;
use crate::llm::{ChatMessage, OpenAIClient, TokenStream};
use crate::zep::ZepClient;

/// Retrieve related documents from Zep, then stream a grounded answer.
pub struct RetrievalChain {
    zep: Option<ZepClient>,
    llm: OpenAIClient,
}

impl RetrievalChain {
    pub fn new(zep: Option<ZepClient>, llm: OpenAIClient) -> Self {
        Self { zep, llm }
    }

    pub fn from_config(config: &ServerConfig) -> Self {
        Self::with_client(config, build_http_client())
    }

    /// Build both upstream clients on a shared `reqwest` client.
    pub fn with_client(config: &ServerConfig, client: Client) -> Self {
        let zep = config
            .zep
            .as_ref()
            .map(|zep| ZepClient::new(client.clone(), zep));
        Self::new(zep, OpenAIClient::new(client, &config.llm))
    }
}

#[async_trait]
impl AnswerSource for RetrievalChain {
    async fn answer(&self, request: &ChatRequest) -> Result<TokenStream> {
        let documents = match &self.zep {
            Some(zep) => {
                zep.search(&request.question, request.settings.relatedness)
                    .await?
            }
            None => {
                debug!("Retrieval disabled, answering without reference material");
                Vec::new()
            }
        };

        info!(
            documents = documents.len(),
            model = self.llm.model(),
            temperature = request.settings.temperature,
            "Generating answer"
        );

        let messages = [
            ChatMessage::system(build_system_prompt(&documents)),
            ChatMessage::user(request.question.clone()),
        ];
        self.llm
            .stream_chat(&messages, request.settings.temperature)
            .await
    }
}
