//! Remote document text extraction for binary formats (PDF, images, scans).
//!
//! The collaborator exposes an analyze-then-poll protocol: submitting a stored payload's
//! access URL returns an operation location, which is polled until the extraction
//! succeeds or fails. Polling is bounded so a hung service fails the task instead of
//! stranding it in `processing`.

use crate::config::get_config;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

/// Maximum number of status polls before giving up on an extraction operation.
const MAX_POLL_ATTEMPTS: u32 = 60;
/// Delay between status polls.
const POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Errors raised by the remote extraction collaborator.
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// HTTP layer failed before receiving a response.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Service responded with an unexpected status code.
    #[error("unexpected extraction response ({status}): {body}")]
    UnexpectedStatus {
        /// HTTP status returned from the service.
        status: StatusCode,
        /// Body payload associated with the failing response.
        body: String,
    },
    /// Submit succeeded but no operation location was returned.
    #[error("extraction service returned no operation location")]
    MissingOperationLocation,
    /// The service reported the analysis itself failed.
    #[error("extraction operation failed: {0}")]
    OperationFailed(String),
    /// The operation did not finish within the bounded number of polls.
    #[error("extraction operation timed out")]
    Timeout,
}

/// Interface to the remote extraction collaborator.
#[async_trait]
pub trait DocumentExtractor: Send + Sync {
    /// Extract plain text from the payload behind a previously stored access handle.
    async fn extract(&self, access_url: &str) -> Result<String, ExtractionError>;
}

/// HTTP client implementing the analyze/poll extraction protocol.
pub struct ExtractionClient {
    pub(crate) client: Client,
    pub(crate) base_url: String,
    pub(crate) api_key: Option<String>,
    pub(crate) poll_interval: Duration,
}

#[derive(Deserialize)]
struct OperationStatus {
    status: String,
    #[serde(default)]
    error: Option<serde_json::Value>,
    #[serde(default, rename = "analyzeResult")]
    analyze_result: Option<AnalyzeResult>,
}

#[derive(Deserialize)]
struct AnalyzeResult {
    #[serde(default)]
    content: String,
}

impl ExtractionClient {
    /// Construct a new client using configuration derived from the environment.
    pub fn new() -> Result<Self, ExtractionError> {
        let config = get_config();
        let client = Client::builder()
            .user_agent("docpipe/0.1")
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.extraction_endpoint.trim_end_matches('/').to_string(),
            api_key: config.extraction_api_key.clone(),
            poll_interval: POLL_INTERVAL,
        })
    }

    fn with_key(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if let Some(api_key) = &self.api_key
            && !api_key.is_empty()
        {
            req.header("api-key", api_key)
        } else {
            req
        }
    }

    async fn submit(&self, access_url: &str) -> Result<String, ExtractionError> {
        let url = format!("{}/analyze", self.base_url);
        let response = self
            .with_key(self.client.post(url))
            .json(&serde_json::json!({ "urlSource": access_url }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ExtractionError::UnexpectedStatus { status, body });
        }

        response
            .headers()
            .get("operation-location")
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
            .ok_or(ExtractionError::MissingOperationLocation)
    }

    async fn poll(&self, operation_url: &str) -> Result<String, ExtractionError> {
        for attempt in 0..MAX_POLL_ATTEMPTS {
            let response = self.with_key(self.client.get(operation_url)).send().await?;
            if !response.status().is_success() {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                return Err(ExtractionError::UnexpectedStatus { status, body });
            }

            let operation: OperationStatus = response.json().await?;
            match operation.status.as_str() {
                "succeeded" => {
                    let content = operation
                        .analyze_result
                        .map(|result| result.content)
                        .unwrap_or_default();
                    tracing::debug!(attempt, chars = content.len(), "Extraction succeeded");
                    return Ok(content);
                }
                "failed" => {
                    let detail = operation
                        .error
                        .map(|err| err.to_string())
                        .unwrap_or_else(|| "no error detail".to_string());
                    return Err(ExtractionError::OperationFailed(detail));
                }
                other => {
                    tracing::trace!(attempt, status = other, "Extraction still running");
                    tokio::time::sleep(self.poll_interval).await;
                }
            }
        }

        Err(ExtractionError::Timeout)
    }
}

#[async_trait]
impl DocumentExtractor for ExtractionClient {
    async fn extract(&self, access_url: &str) -> Result<String, ExtractionError> {
        let operation_url = self.submit(access_url).await?;
        self.poll(&operation_url).await
    }
}
