//! Zep document collection search.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ZepConfig;
use crate::error::{Result, response_to_error};

/// A document returned by a collection search.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ZepDocument {
    #[serde(default)]
    pub uuid: Option<String>,
    #[serde(default)]
    pub document_id: Option<String>,
    pub content: String,
    /// Similarity to the query, higher is closer.
    #[serde(default)]
    pub score: f32,
}

#[derive(Serialize)]
struct SearchRequest<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<ZepDocument>,
}

/// Client for one Zep document collection.
#[derive(Debug, Clone)]
pub struct ZepClient {
    client: Client,
    base_url: String,
    collection: String,
    limit: usize,
}

impl ZepClient {
    pub fn new(client: Client, config: &ZepConfig) -> Self {
        Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            collection: config.collection.clone(),
            limit: config.search_limit,
        }
    }

    /// Documents similar to `text` scoring at least `min_score`, best first.
    pub async fn search(&self, text: &str, min_score: f32) -> Result<Vec<ZepDocument>> {
        let response = self
            .client
            .post(format!(
                "{}/api/v1/collection/{}/search?limit={}",
                self.base_url, self.collection, self.limit
            ))
            .json(&SearchRequest { text })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(response_to_error(response, "Zep").await);
        }

        let parsed: SearchResponse = response.json().await?;
        let total = parsed.results.len();
        let mut documents: Vec<ZepDocument> = parsed
            .results
            .into_iter()
            .filter(|doc| doc.score >= min_score)
            .collect();
        documents.sort_by(|a, b| b.score.total_cmp(&a.score));

        debug!(
            collection = %self.collection,
            total,
            kept = documents.len(),
            min_score,
            "Zep search completed"
        );
        Ok(documents)
    }
}
