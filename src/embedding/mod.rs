//! Embedding client abstraction and the OpenAI-compatible HTTP adapter.

use crate::config::get_config;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use thiserror::Error;

/// Errors raised by embedding providers.
#[derive(Debug, Error)]
pub enum EmbeddingClientError {
    /// Provider was unable to produce an embedding for the supplied input.
    #[error("Failed to generate embedding: {0}")]
    GenerationFailed(String),
    /// HTTP layer failed before receiving a response.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
}

/// Interface implemented by embedding backends.
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    /// Produce a fixed-length embedding vector for the supplied text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingClientError>;
}

/// HTTP client for an OpenAI-compatible embeddings endpoint.
pub struct EmbeddingHttpClient {
    pub(crate) client: Client,
    pub(crate) base_url: String,
    pub(crate) api_key: Option<String>,
    pub(crate) model: String,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Deserialize)]
struct EmbeddingDatum {
    embedding: Vec<f32>,
}

impl EmbeddingHttpClient {
    /// Construct a new client using configuration derived from the environment.
    pub fn new() -> Result<Self, EmbeddingClientError> {
        let config = get_config();
        let client = Client::builder()
            .user_agent("docpipe/0.1")
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.llm_endpoint.trim_end_matches('/').to_string(),
            api_key: config.llm_api_key.clone(),
            model: config.embedding_model.clone(),
        })
    }
}

#[async_trait]
impl EmbeddingClient for EmbeddingHttpClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingClientError> {
        let url = format!("{}/embeddings", self.base_url);
        let mut request = self.client.post(url).json(&json!({
            "model": self.model,
            "input": text,
        }));
        if let Some(api_key) = &self.api_key
            && !api_key.is_empty()
        {
            request = request.bearer_auth(api_key);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(EmbeddingClientError::GenerationFailed(format!(
                "{status}: {body}"
            )));
        }

        let payload: EmbeddingResponse = response.json().await?;
        payload
            .data
            .into_iter()
            .next()
            .map(|datum| datum.embedding)
            .ok_or_else(|| {
                EmbeddingClientError::GenerationFailed("provider returned no vectors".to_string())
            })
    }
}
