//! Answer generation behind the chat endpoint.

mod prompt;
mod retrieval;

use async_trait::async_trait;
use zepchat_contracts::ChatRequest;

use crate::error::Result;
use crate::llm::TokenStream;

pub use prompt::build_system_prompt;
pub use retrieval::RetrievalChain;

/// Produces the streamed answer to one question.
///
/// Failures before any token exists are returned as `Err` so the endpoint can
/// still answer with a proper error status; failures after that surface as
/// an `Err` item in the stream.
#[async_trait]
pub trait AnswerSource: Send + Sync {
    async fn answer(&self, request: &ChatRequest) -> Result<TokenStream>;
}
